//! Pixel-block sampling around a detected centre, and integrity checks.

use image::GrayImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::SecretSalt;
use crate::detector::Center;
use crate::error::{Result, SealError};
use crate::record::SealRecord;

/// Sample a `block_size`² block of grayscale intensities centred on `center`.
pub fn extract(image_bytes: &[u8], center: Center, block_size: u32) -> Result<Vec<u8>> {
    let luma = image::load_from_memory(image_bytes)
        .map_err(|e| SealError::UnreadableImage(e.to_string()))?
        .to_luma8();
    extract_from_luma(&luma, center, block_size)
}

/// Sample rows `[cy - b/2, cy - b/2 + b)` and the matching columns.
///
/// A block that would leave the image fails with `ExtractionOutOfBounds`
/// instead of being clamped.
pub fn extract_from_luma(luma: &GrayImage, center: Center, block_size: u32) -> Result<Vec<u8>> {
    let (width, height) = luma.dimensions();
    let out_of_bounds = || SealError::ExtractionOutOfBounds {
        x: center.x,
        y: center.y,
        block_size,
        width,
        height,
    };

    if block_size == 0 {
        return Err(out_of_bounds());
    }
    let half = block_size / 2;
    let left = center.x.checked_sub(half).ok_or_else(out_of_bounds)?;
    let top = center.y.checked_sub(half).ok_or_else(out_of_bounds)?;
    if u64::from(left) + u64::from(block_size) > u64::from(width)
        || u64::from(top) + u64::from(block_size) > u64::from(height)
    {
        return Err(out_of_bounds());
    }

    let mut block = Vec::with_capacity((block_size * block_size) as usize);
    for y in top..top + block_size {
        for x in left..left + block_size {
            block.push(luma.get_pixel(x, y).0[0]);
        }
    }
    Ok(block)
}

/// Hex SHA-256 of a sampled block.
pub fn block_hash(block: &[u8]) -> String {
    hex::encode(Sha256::digest(block))
}

/// Outcome of checking a sampled block against a seal record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub seal_id: String,
    /// Whether the record hash matches its id, timestamp and the salt.
    pub record_authentic: bool,
    /// Digest of the sampled pixels.
    pub block_hash: String,
    pub block_len: usize,
    /// Whether `block_hash` equals the digest kept at embed time; `None` when
    /// the caller has no reference digest.
    pub block_matches: Option<bool>,
}

impl VerificationReport {
    pub fn is_valid(&self) -> bool {
        self.record_authentic && self.block_len > 0 && self.block_matches != Some(false)
    }
}

/// Checks sampled seals against their records.
///
/// The record hash proves the record was issued under this salt. The reference
/// digest, when the caller kept one, ties the detected seal to that record: a
/// seal from another image, or re-encoded pixels around the centre, fail the
/// block comparison even though the record itself is authentic.
#[derive(Debug, Clone)]
pub struct IntegrityVerifier {
    salt: SecretSalt,
}

impl IntegrityVerifier {
    pub fn new(salt: SecretSalt) -> Self {
        Self { salt }
    }

    pub fn verify(&self, block: &[u8], expected: &SealRecord, reference: Option<&str>) -> bool {
        self.report(block, expected, reference).is_valid()
    }

    /// Check `block` against `expected` and, when given, the hex digest of the
    /// block sampled at embed time.
    pub fn report(
        &self,
        block: &[u8],
        expected: &SealRecord,
        reference: Option<&str>,
    ) -> VerificationReport {
        let digest = block_hash(block);
        let report = VerificationReport {
            seal_id: expected.id().to_string(),
            record_authentic: expected.is_authentic(&self.salt),
            block_matches: reference.map(|r| r.eq_ignore_ascii_case(&digest)),
            block_hash: digest,
            block_len: block.len(),
        };

        if !report.record_authentic {
            tracing::warn!(seal_id = %report.seal_id, "Seal record hash does not match");
        }
        if report.block_matches == Some(false) {
            tracing::warn!(seal_id = %report.seal_id, "Sampled block does not match the sealed image");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SealId;
    use image::Luma;

    fn ramp(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x + y * width) % 256) as u8]))
    }

    #[test]
    fn test_block_is_centred() {
        let luma = ramp(16, 16);
        let block = extract_from_luma(&luma, Center { x: 8, y: 8 }, 8).unwrap();
        assert_eq!(block.len(), 64);
        assert_eq!(block[0], luma.get_pixel(4, 4).0[0]);
        assert_eq!(block[63], luma.get_pixel(11, 11).0[0]);
    }

    #[test]
    fn test_block_touching_edges_is_allowed() {
        let luma = ramp(8, 8);
        assert!(extract_from_luma(&luma, Center { x: 4, y: 4 }, 8).is_ok());
    }

    #[test]
    fn test_out_of_bounds_is_not_clamped() {
        let luma = ramp(16, 16);
        for center in [
            Center { x: 3, y: 8 },
            Center { x: 8, y: 3 },
            Center { x: 13, y: 8 },
            Center { x: 8, y: 13 },
        ] {
            let err = extract_from_luma(&luma, center, 8).unwrap_err();
            assert!(
                matches!(err, SealError::ExtractionOutOfBounds { block_size: 8, width: 16, .. }),
                "{:?}",
                center
            );
        }
    }

    #[test]
    fn test_block_hash_changes_with_pixels() {
        let a = block_hash(&[1, 2, 3]);
        let b = block_hash(&[1, 2, 4]);
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_verifier_binds_to_record_hash() {
        let salt = SecretSalt::new("pepper");
        let id = SealId::parse("MBH-202504-0042").unwrap();
        let record = SealRecord::new(id, 1_745_000_000_000, &salt);
        let block = vec![7u8; 64];

        assert!(IntegrityVerifier::new(salt).verify(&block, &record, None));
        assert!(!IntegrityVerifier::new(SecretSalt::new("other")).verify(&block, &record, None));
    }

    #[test]
    fn test_report_carries_block_digest() {
        let salt = SecretSalt::development();
        let record = SealRecord::create(&salt);
        let report = IntegrityVerifier::new(salt).report(&[9u8; 64], &record, None);
        assert_eq!(report.block_hash, block_hash(&[9u8; 64]));
        assert_eq!(report.seal_id, record.id().as_str());
        assert_eq!(report.block_matches, None);
        assert!(report.is_valid());
    }

    #[test]
    fn test_reference_digest_must_match_block() {
        let salt = SecretSalt::development();
        let record = SealRecord::create(&salt);
        let verifier = IntegrityVerifier::new(salt);
        let reference = block_hash(&[9u8; 64]);

        let report = verifier.report(&[9u8; 64], &record, Some(&reference.to_uppercase()));
        assert_eq!(report.block_matches, Some(true));
        assert!(report.is_valid());

        let report = verifier.report(&[8u8; 64], &record, Some(&reference));
        assert!(report.record_authentic);
        assert_eq!(report.block_matches, Some(false));
        assert!(!report.is_valid());
    }
}
