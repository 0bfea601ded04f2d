//! Container-level metadata capture and re-attachment.
//!
//! Re-encoding pixels through `image` drops EXIF, ICC, XMP and text chunks.
//! This module lifts those blocks out of the source file verbatim and splices
//! them into the re-encoded stream, so the sealed file carries byte-identical
//! metadata.
//!
//! The one JPEG exception is the Adobe APP14 segment: its colour transform
//! flag describes the source's entropy-coded data, not the YCbCr stream the
//! encoder writes, so it is dropped instead of carried.

use image::ImageFormat;

use crate::error::{Result, SealError};

const JPEG_SOI: u8 = 0xD8;
const JPEG_SOS: u8 = 0xDA;
const JPEG_COM: u8 = 0xFE;
const JPEG_TEM: u8 = 0x01;
const JPEG_APP14: u8 = 0xEE;
const ADOBE_IDENTIFIER: &[u8] = b"Adobe";

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// PNG chunks treated as metadata.
const PNG_METADATA_CHUNKS: [&[u8; 4]; 10] = [
    b"iCCP", b"sRGB", b"gAMA", b"cHRM", b"pHYs", b"tEXt", b"zTXt", b"iTXt", b"eXIf", b"tIME",
];

/// Containers whose metadata can be carried across a re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Png,
    Jpeg,
}

impl Container {
    pub fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Container::Png),
            ImageFormat::Jpeg => Some(Container::Jpeg),
            _ => None,
        }
    }

    pub fn format(&self) -> ImageFormat {
        match self {
            Container::Png => ImageFormat::Png,
            Container::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// Raw metadata segments of one file, in their original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataBlock {
    container: Container,
    /// Each entry is a complete segment (JPEG marker + length + payload) or
    /// chunk (PNG length + type + data + CRC).
    segments: Vec<Vec<u8>>,
}

impl MetadataBlock {
    /// Capture the metadata of `bytes`.
    pub fn extract(container: Container, bytes: &[u8]) -> Result<Self> {
        let segments = match container {
            Container::Jpeg => jpeg_segments(bytes)?
                .into_iter()
                .filter(|s| is_jpeg_metadata(s.marker))
                .map(|s| (s.marker, &bytes[s.start..s.end]))
                .filter(|&(marker, segment)| !is_adobe_transform(marker, segment))
                .map(|(_, segment)| segment.to_vec())
                .collect(),
            Container::Png => png_chunks(bytes)?
                .into_iter()
                .filter(|c| is_png_metadata(&c.kind))
                .map(|c| bytes[c.start..c.end].to_vec())
                .collect(),
        };
        Ok(Self {
            container,
            segments,
        })
    }

    pub fn container(&self) -> Container {
        self.container
    }

    pub fn segments(&self) -> &[Vec<u8>] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total size of the captured metadata in bytes.
    pub fn byte_len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    /// Replace whatever metadata `encoded` carries with this block.
    pub fn reattach(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        match self.container {
            Container::Jpeg => self.reattach_jpeg(encoded),
            Container::Png => self.reattach_png(encoded),
        }
    }

    fn reattach_jpeg(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        let segments = jpeg_segments(encoded)?;
        let mut out = Vec::with_capacity(encoded.len() + self.byte_len());
        out.extend_from_slice(&[0xFF, JPEG_SOI]);
        for segment in &self.segments {
            out.extend_from_slice(segment);
        }

        let mut scan_start = encoded.len();
        for segment in segments.iter().filter(|s| s.marker != JPEG_SOI) {
            if segment.marker == JPEG_SOS {
                scan_start = segment.start;
                break;
            }
            if !is_jpeg_metadata(segment.marker) {
                out.extend_from_slice(&encoded[segment.start..segment.end]);
            }
        }
        out.extend_from_slice(&encoded[scan_start..]);
        Ok(out)
    }

    fn reattach_png(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        let chunks = png_chunks(encoded)?;
        let mut out = Vec::with_capacity(encoded.len() + self.byte_len());
        out.extend_from_slice(&PNG_SIGNATURE);

        for chunk in &chunks {
            if is_png_metadata(&chunk.kind) {
                continue;
            }
            out.extend_from_slice(&encoded[chunk.start..chunk.end]);
            if &chunk.kind == b"IHDR" {
                for segment in &self.segments {
                    out.extend_from_slice(segment);
                }
            }
        }
        Ok(out)
    }
}

fn is_jpeg_metadata(marker: u8) -> bool {
    (0xE0..=0xEF).contains(&marker) || marker == JPEG_COM
}

/// Adobe APP14 segment, reported when found.
fn is_adobe_transform(marker: u8, segment: &[u8]) -> bool {
    let adobe = marker == JPEG_APP14
        && segment
            .get(4..)
            .is_some_and(|payload| payload.starts_with(ADOBE_IDENTIFIER));
    if adobe {
        tracing::warn!(
            bytes = segment.len(),
            transform = segment.get(15).copied(),
            "Dropping Adobe APP14 segment, its colour transform does not apply to the re-encoded stream"
        );
    }
    adobe
}

fn is_png_metadata(kind: &[u8; 4]) -> bool {
    PNG_METADATA_CHUNKS.iter().any(|k| *k == kind)
}

/// Byte range of one JPEG marker segment.
#[derive(Debug)]
struct JpegSegment {
    marker: u8,
    start: usize,
    end: usize,
}

/// Walk JPEG marker segments up to and including SOS.
fn jpeg_segments(data: &[u8]) -> Result<Vec<JpegSegment>> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != JPEG_SOI {
        return Err(SealError::UnreadableImage("JPEG stream lacks SOI".into()));
    }

    let mut segments = vec![JpegSegment {
        marker: JPEG_SOI,
        start: 0,
        end: 2,
    }];
    let mut pos = 2;

    loop {
        if pos + 1 >= data.len() {
            return Err(SealError::UnreadableImage(
                "JPEG stream ended before SOS".into(),
            ));
        }
        if data[pos] != 0xFF {
            return Err(SealError::UnreadableImage(format!(
                "expected JPEG marker at offset {}",
                pos
            )));
        }
        // Fill bytes
        if data[pos + 1] == 0xFF {
            pos += 1;
            continue;
        }

        let marker = data[pos + 1];
        let start = pos;
        if marker == JPEG_TEM || (0xD0..=0xD7).contains(&marker) {
            segments.push(JpegSegment {
                marker,
                start,
                end: pos + 2,
            });
            pos += 2;
            continue;
        }

        if pos + 3 >= data.len() {
            return Err(SealError::UnreadableImage(
                "truncated JPEG segment header".into(),
            ));
        }
        let length = usize::from(u16::from_be_bytes([data[pos + 2], data[pos + 3]]));
        if length < 2 || pos + 2 + length > data.len() {
            return Err(SealError::UnreadableImage(format!(
                "JPEG segment 0x{:02X} at offset {} overruns the stream",
                marker, pos
            )));
        }
        let end = pos + 2 + length;
        segments.push(JpegSegment { marker, start, end });

        if marker == JPEG_SOS {
            return Ok(segments);
        }
        pos = end;
    }
}

/// Byte range of one PNG chunk.
#[derive(Debug)]
struct PngChunk {
    kind: [u8; 4],
    start: usize,
    end: usize,
}

fn png_chunks(data: &[u8]) -> Result<Vec<PngChunk>> {
    if data.len() < PNG_SIGNATURE.len() || data[..8] != PNG_SIGNATURE {
        return Err(SealError::UnreadableImage("PNG signature missing".into()));
    }

    let mut chunks = Vec::new();
    let mut pos = PNG_SIGNATURE.len();
    while pos < data.len() {
        if pos + 8 > data.len() {
            return Err(SealError::UnreadableImage(
                "truncated PNG chunk header".into(),
            ));
        }
        let length =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let kind = [data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]];
        let end = pos
            .checked_add(12)
            .and_then(|p| p.checked_add(length))
            .filter(|&e| e <= data.len())
            .ok_or_else(|| {
                SealError::UnreadableImage(format!(
                    "PNG chunk {} overruns the stream",
                    String::from_utf8_lossy(&kind)
                ))
            })?;
        chunks.push(PngChunk {
            kind,
            start: pos,
            end,
        });
        pos = end;
        if &kind == b"IEND" {
            break;
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, marker];
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn fake_jpeg(meta: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0xFF, JPEG_SOI];
        for m in meta {
            out.extend_from_slice(m);
        }
        out.extend(segment(0xDB, &[0u8; 65]));
        out.extend(segment(JPEG_SOS, &[1, 1, 0, 0, 63, 0]));
        out.extend_from_slice(&[0x12, 0x34, 0xFF, 0x00, 0x56]);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }

    #[test]
    fn test_jpeg_extract_keeps_app_and_com_segments() {
        let exif = segment(0xE1, b"Exif\0\0payload");
        let comment = segment(JPEG_COM, b"hello");
        let data = fake_jpeg(&[exif.clone(), comment.clone()]);

        let block = MetadataBlock::extract(Container::Jpeg, &data).unwrap();
        assert_eq!(block.segments(), &[exif, comment]);
    }

    #[test]
    fn test_jpeg_reattach_replaces_encoder_metadata() {
        let source_exif = segment(0xE1, b"Exif\0\0source");
        let source = fake_jpeg(&[source_exif.clone()]);
        let encoded = fake_jpeg(&[segment(0xE0, b"JFIF\0\x01\x01")]);

        let block = MetadataBlock::extract(Container::Jpeg, &source).unwrap();
        let out = block.reattach(&encoded).unwrap();

        let restored = MetadataBlock::extract(Container::Jpeg, &out).unwrap();
        assert_eq!(restored.segments(), &[source_exif]);
        // Entropy-coded data and EOI survive untouched.
        assert!(out.ends_with(&[0x12, 0x34, 0xFF, 0x00, 0x56, 0xFF, 0xD9]));
    }

    #[test]
    fn test_jpeg_adobe_segment_is_not_carried() {
        let exif = segment(0xE1, b"Exif\0\0source");
        // Version 100, flags0, flags1, transform 0 (RGB).
        let adobe = segment(JPEG_APP14, b"Adobe\0\x64\0\0\0\0\0");
        let other_app14 = segment(JPEG_APP14, b"Vendor\0data");
        let source = fake_jpeg(&[exif.clone(), adobe, other_app14.clone()]);

        let block = MetadataBlock::extract(Container::Jpeg, &source).unwrap();
        assert_eq!(block.segments(), &[exif.clone(), other_app14.clone()]);

        let out = block.reattach(&fake_jpeg(&[])).unwrap();
        let restored = MetadataBlock::extract(Container::Jpeg, &out).unwrap();
        assert_eq!(restored.segments(), &[exif, other_app14]);
        assert!(!out.windows(5).any(|w| w == ADOBE_IDENTIFIER));
    }

    #[test]
    fn test_jpeg_rejects_truncated_stream() {
        let mut data = fake_jpeg(&[segment(0xE1, b"Exif\0\0abc")]);
        data.truncate(8);
        assert!(matches!(
            MetadataBlock::extract(Container::Jpeg, &data),
            Err(SealError::UnreadableImage(_))
        ));
    }

    fn chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = (data.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(data);
        // The splicer never checks CRCs.
        out.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        out
    }

    fn fake_png(meta: &[Vec<u8>]) -> Vec<u8> {
        let mut out = PNG_SIGNATURE.to_vec();
        out.extend(chunk(b"IHDR", &[0u8; 13]));
        for m in meta {
            out.extend_from_slice(m);
        }
        out.extend(chunk(b"IDAT", &[1, 2, 3]));
        out.extend(chunk(b"IEND", &[]));
        out
    }

    #[test]
    fn test_png_reattach_inserts_after_ihdr() {
        let text = chunk(b"tEXt", b"Author\0Gustavo");
        let source = fake_png(&[text.clone()]);
        let encoded = fake_png(&[chunk(b"gAMA", &[0, 0, 0xB1, 0x8F])]);

        let block = MetadataBlock::extract(Container::Png, &source).unwrap();
        let out = block.reattach(&encoded).unwrap();

        let expected = fake_png(&[text]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_png_without_metadata_is_empty() {
        let block = MetadataBlock::extract(Container::Png, &fake_png(&[])).unwrap();
        assert!(block.is_empty());
        assert_eq!(block.byte_len(), 0);
    }

    #[test]
    fn test_container_from_format() {
        assert_eq!(Container::from_format(ImageFormat::Png), Some(Container::Png));
        assert_eq!(Container::from_format(ImageFormat::Jpeg), Some(Container::Jpeg));
        assert_eq!(Container::from_format(ImageFormat::Gif), None);
    }
}
