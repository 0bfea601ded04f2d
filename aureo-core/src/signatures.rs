//! Folding seal detection into a digital-signature analysis.

use serde::{Deserialize, Serialize};

use crate::detector::{Center, DetectionResult};

/// Score assigned when a seal is present (fully trusted).
pub const MAX_SIGNATURE_SCORE: u8 = 10;

/// Seal evidence attached to a signature analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualSignature {
    pub found: bool,
    pub center: Option<Center>,
    pub hash: Option<String>,
}

impl From<&DetectionResult> for VisualSignature {
    fn from(result: &DetectionResult) -> Self {
        Self {
            found: result.found,
            center: result.center,
            hash: result.hash.clone(),
        }
    }
}

/// Authenticity score of an image, with the seal evidence when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureAnalysis {
    pub score: u8,
    #[serde(rename = "firmaVisual", skip_serializing_if = "Option::is_none")]
    pub visual_signature: Option<VisualSignature>,
}

impl SignatureAnalysis {
    /// Combine an independent EXIF-based score with a detection result.
    ///
    /// A found seal overrides the score with the maximum; otherwise the EXIF
    /// score stands unchanged.
    pub fn fold(exif_score: u8, detection: &DetectionResult) -> Self {
        if detection.found {
            Self {
                score: MAX_SIGNATURE_SCORE,
                visual_signature: Some(VisualSignature::from(detection)),
            }
        } else {
            Self {
                score: exif_score.min(MAX_SIGNATURE_SCORE),
                visual_signature: None,
            }
        }
    }
}
