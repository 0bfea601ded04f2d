//! Compositing of rasterized seals onto source images.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, GenericImageView, RgbaImage};

use crate::config::Anchor;
use crate::error::{Result, SealError};
use crate::metadata::{Container, MetadataBlock};
use crate::overlay::{rasterize, Overlay};

/// A decoded source image together with what is needed to re-encode it.
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: DynamicImage,
    container: Container,
    metadata: MetadataBlock,
}

impl SourceImage {
    /// Decode `bytes` and capture their metadata.
    ///
    /// Undecodable data fails with `UnreadableImage`; decodable containers other
    /// than PNG and JPEG fail with `Composition`, since their metadata could not
    /// be carried over.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes)
            .map_err(|e| SealError::UnreadableImage(format!("unknown container: {}", e)))?;
        let container = Container::from_format(format).ok_or_else(|| {
            SealError::Composition(format!("unsupported container {:?}", format))
        })?;

        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| SealError::UnreadableImage(e.to_string()))?;
        let metadata = MetadataBlock::extract(container, bytes)?;

        Ok(Self {
            image,
            container,
            metadata,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn container(&self) -> Container {
        self.container
    }

    pub fn metadata(&self) -> &MetadataBlock {
        &self.metadata
    }
}

/// Top-left pixel of a `seal_size` square centred on `anchor`.
///
/// Rejects anchors that are not finite, fall outside `[0, 1]`, or would push
/// any part of the seal off the canvas.
pub fn placement(width: u32, height: u32, seal_size: u32, anchor: Anchor) -> Result<(u32, u32)> {
    for (axis, value) in [("x", anchor.x), ("y", anchor.y)] {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(SealError::Composition(format!(
                "anchor {} = {} is outside [0, 1]",
                axis, value
            )));
        }
    }

    let half = f64::from(seal_size) / 2.0;
    let left = (f64::from(width) * anchor.x - half).round() as i64;
    let top = (f64::from(height) * anchor.y - half).round() as i64;
    let size = i64::from(seal_size);

    if left < 0 || top < 0 || left + size > i64::from(width) || top + size > i64::from(height) {
        return Err(SealError::Composition(format!(
            "{}px seal at ({}, {}) does not fit a {}x{} image",
            seal_size, left, top, width, height
        )));
    }

    Ok((left as u32, top as u32))
}

/// Blends seal overlays into source images and re-encodes them.
#[derive(Debug, Clone)]
pub struct SealCompositor {
    jpeg_quality: u8,
}

impl SealCompositor {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Composite `overlay` onto `source` at `anchor` and return the encoded
    /// file in the source's container, metadata included.
    pub fn composite(&self, source: &SourceImage, overlay: &Overlay, anchor: Anchor) -> Result<Vec<u8>> {
        let (width, height) = source.dimensions();
        let (left, top) = placement(width, height, overlay.size, anchor)?;

        let layer = rasterize(overlay);
        let mut canvas = source.image.to_rgba8();
        blend_layer(&mut canvas, &layer, left, top);

        let output = restore_color_type(canvas, source.image.color(), source.container);
        let encoded = self.encode(&output, source.container)?;
        let sealed = source.metadata.reattach(&encoded)?;

        tracing::debug!(
            width,
            height,
            left,
            top,
            seal_size = overlay.size,
            metadata_bytes = source.metadata.byte_len(),
            "Composited seal"
        );

        Ok(sealed)
    }

    fn encode(&self, image: &DynamicImage, container: Container) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let written = match container {
            Container::Png => image.write_with_encoder(PngEncoder::new(&mut buffer)),
            Container::Jpeg => image.write_with_encoder(JpegEncoder::new_with_quality(
                &mut buffer,
                self.jpeg_quality,
            )),
        };
        written.map_err(|e| SealError::Composition(format!("{:?} encode failed: {}", container, e)))?;
        Ok(buffer)
    }
}

/// Convenience wrapper: decode, composite and re-encode in one call.
pub fn composite(source: &[u8], overlay: &Overlay, anchor: Anchor, jpeg_quality: u8) -> Result<Vec<u8>> {
    let source = SourceImage::decode(source)?;
    SealCompositor::new(jpeg_quality).composite(&source, overlay, anchor)
}

/// Source-over blend of `layer` onto `canvas` with its top-left at (`left`, `top`).
fn blend_layer(canvas: &mut RgbaImage, layer: &RgbaImage, left: u32, top: u32) {
    for (x, y, over) in layer.enumerate_pixels() {
        let alpha = f32::from(over.0[3]) / 255.0;
        if alpha <= 0.0 {
            continue;
        }
        let dst = canvas.get_pixel_mut(left + x, top + y);
        let dst_alpha = f32::from(dst.0[3]) / 255.0;
        let out_alpha = alpha + dst_alpha * (1.0 - alpha);

        for channel in 0..3 {
            let src = f32::from(over.0[channel]);
            let below = f32::from(dst.0[channel]);
            let value = (src * alpha + below * dst_alpha * (1.0 - alpha)) / out_alpha;
            dst.0[channel] = value.round().clamp(0.0, 255.0) as u8;
        }
        dst.0[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

/// Convert the working RGBA buffer back to what the container should carry.
fn restore_color_type(canvas: RgbaImage, original: ColorType, container: Container) -> DynamicImage {
    let canvas = DynamicImage::ImageRgba8(canvas);
    let keeps_alpha = original.has_alpha() && container == Container::Png;
    match original {
        ColorType::L8 | ColorType::L16 => DynamicImage::ImageLuma8(canvas.to_luma8()),
        ColorType::La8 | ColorType::La16 if keeps_alpha => {
            DynamicImage::ImageLumaA8(canvas.to_luma_alpha8())
        }
        ColorType::La8 | ColorType::La16 => DynamicImage::ImageLuma8(canvas.to_luma8()),
        _ if keeps_alpha => canvas,
        _ => DynamicImage::ImageRgb8(canvas.to_rgb8()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SealConfig, SecretSalt};
    use crate::overlay::SealEncoder;
    use crate::record::{SealId, SealRecord};
    use image::{ImageFormat, Luma, Rgb};
    use std::io::Cursor;

    fn overlay(size: u32) -> Overlay {
        let id = SealId::parse("MBH-202504-0042").unwrap();
        let record = SealRecord::new(id, 1_745_000_000_000, &SecretSalt::development());
        SealEncoder::new(&SealConfig::default()).encode(size, &record).unwrap()
    }

    fn png_bytes(image: DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn gray_png(width: u32, height: u32) -> Vec<u8> {
        png_bytes(DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            Rgb([90, 90, 90]),
        )))
    }

    #[test]
    fn test_placement_centres_seal() {
        assert_eq!(placement(200, 100, 48, Anchor::CENTER).unwrap(), (76, 26));
    }

    #[test]
    fn test_placement_rejects_out_of_range_anchor() {
        for anchor in [
            Anchor::new(-0.1, 0.5),
            Anchor::new(0.5, 1.5),
            Anchor::new(f64::NAN, 0.5),
            Anchor::new(0.5, f64::INFINITY),
        ] {
            assert!(matches!(
                placement(200, 200, 48, anchor),
                Err(SealError::Composition(_))
            ));
        }
    }

    #[test]
    fn test_placement_rejects_seal_crossing_edge() {
        // Valid anchor, but the seal would hang off the left edge.
        let err = placement(200, 200, 48, Anchor::new(0.0, 0.5)).unwrap_err();
        assert!(matches!(err, SealError::Composition(_)));
    }

    #[test]
    fn test_composite_keeps_dimensions_and_container() {
        let sealed = composite(&gray_png(120, 80), &overlay(48), Anchor::CENTER, 95).unwrap();
        assert_eq!(image::guess_format(&sealed).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory(&sealed).unwrap();
        assert_eq!(decoded.dimensions(), (120, 80));
    }

    #[test]
    fn test_composite_writes_anchor_pixels_exactly() {
        let overlay = overlay(48);
        let sealed = composite(&gray_png(100, 100), &overlay, Anchor::CENTER, 95).unwrap();
        let decoded = image::load_from_memory(&sealed).unwrap().to_luma8();
        let (left, top) = placement(100, 100, 48, Anchor::CENTER).unwrap();
        for anchor in &overlay.anchors {
            assert_eq!(decoded.get_pixel(left + anchor.x, top + anchor.y).0[0], anchor.core);
            assert_eq!(decoded.get_pixel(left + anchor.x + 1, top + anchor.y).0[0], 0);
        }
    }

    #[test]
    fn test_grayscale_source_stays_grayscale() {
        let source = png_bytes(DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            64,
            64,
            Luma([128]),
        )));
        let sealed = composite(&source, &overlay(48), Anchor::CENTER, 95).unwrap();
        let decoded = image::load_from_memory(&sealed).unwrap();
        assert_eq!(decoded.color(), ColorType::L8);
    }

    #[test]
    fn test_oversized_overlay_is_rejected_before_encoding() {
        let err = composite(&gray_png(40, 40), &overlay(48), Anchor::CENTER, 95).unwrap_err();
        assert!(matches!(err, SealError::Composition(_)));
    }

    #[test]
    fn test_garbage_is_unreadable() {
        let err = SourceImage::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, SealError::UnreadableImage(_)));
    }
}
