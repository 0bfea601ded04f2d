//! Embedding: decode, build the seal, composite, re-encode.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::compositor::{placement, SealCompositor, SourceImage};
use crate::config::{Anchor, DetectorConfig, SealConfig, SecretSalt};
use crate::detector::Center;
use crate::error::{Result, SealError};
use crate::extract::{block_hash, extract};
use crate::metrics::{MetricsSink, NoopMetrics, Stage};
use crate::overlay::{Overlay, SealEncoder};
use crate::pool::CancelToken;
use crate::record::SealRecord;

/// Container of the sealed output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    SameAsInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedOptions {
    pub author_id: String,
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Seal centre; the configured default anchor when absent.
    #[serde(default)]
    pub anchor: Option<Anchor>,
}

impl EmbedOptions {
    pub fn new(author_id: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            output_format: OutputFormat::SameAsInput,
            anchor: None,
        }
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = Some(anchor);
        self
    }
}

/// A sealed image and the record bound to it.
#[derive(Debug, Clone)]
pub struct SealedImage {
    pub image: Vec<u8>,
    pub seal_id: String,
    pub created_at_ms: i64,
    pub processing_time_ms: u64,
    pub author_id: String,
    pub record: SealRecord,
    pub width: u32,
    pub height: u32,
    /// Hex SHA-256 of the block a detector samples from `image`.
    ///
    /// Kept with the record so a later verification can tell whether the
    /// detected seal is the one this record was issued for.
    pub block_hash: Option<String>,
}

/// Embeds seals into images.
#[derive(Clone)]
pub struct Sealer {
    config: SealConfig,
    salt: SecretSalt,
    encoder: SealEncoder,
    compositor: SealCompositor,
    block_size: u32,
    metrics: Arc<dyn MetricsSink>,
}

impl std::fmt::Debug for Sealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sealer")
            .field("config", &self.config)
            .field("salt", &self.salt)
            .finish_non_exhaustive()
    }
}

impl Sealer {
    pub fn new(config: SealConfig, salt: SecretSalt) -> Self {
        Self {
            encoder: SealEncoder::new(&config),
            compositor: SealCompositor::new(config.jpeg_quality),
            config,
            salt,
            block_size: DetectorConfig::default().block_size,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Sample reference blocks with the detector's block size.
    pub fn with_detector_config(mut self, detector: &DetectorConfig) -> Self {
        self.block_size = detector.block_size;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &SealConfig {
        &self.config
    }

    /// Seal `source` with a freshly created record.
    pub fn embed(&self, source: &[u8], options: &EmbedOptions) -> Result<SealedImage> {
        self.embed_with_cancel(source, options, &CancelToken::new())
    }

    /// Like [`Sealer::embed`], giving up with `SealError::Cancelled` once
    /// `cancel` is tripped. The token is checked before decoding and again
    /// before compositing.
    pub fn embed_with_cancel(
        &self,
        source: &[u8],
        options: &EmbedOptions,
        cancel: &CancelToken,
    ) -> Result<SealedImage> {
        validate_author(&options.author_id)?;
        let record = SealRecord::create(&self.salt);
        self.seal(source, options, record, cancel)
    }

    /// Seal `source` with an existing record.
    pub fn embed_record(
        &self,
        source: &[u8],
        options: &EmbedOptions,
        record: SealRecord,
    ) -> Result<SealedImage> {
        self.seal(source, options, record, &CancelToken::new())
    }

    fn seal(
        &self,
        source: &[u8],
        options: &EmbedOptions,
        record: SealRecord,
        cancel: &CancelToken,
    ) -> Result<SealedImage> {
        let start = Instant::now();
        validate_author(&options.author_id)?;
        check_cancelled(cancel, "decode")?;

        let source = SourceImage::decode(source).map_err(|e| {
            tracing::error!(stage = "decode", bytes = source.len(), error = %e, "Embedding failed");
            e
        })?;
        let (width, height) = source.dimensions();
        let seal_id = record.id();
        let fail = |stage: &'static str| {
            move |e: SealError| {
                tracing::error!(stage, width, height, seal_id = %seal_id, error = %e, "Embedding failed");
                e
            }
        };

        let seal_size = self.config.seal_size(width, height);
        let overlay = self.encoder.encode(seal_size, &record).map_err(fail("encode"))?;
        let anchor = options.anchor.unwrap_or(self.config.default_anchor);
        let origin = placement(width, height, seal_size, anchor).map_err(fail("composite"))?;
        check_cancelled(cancel, "composite")?;
        let image = self
            .compositor
            .composite(&source, &overlay, anchor)
            .map_err(fail("composite"))?;
        let block_hash = self.reference_block_hash(&image, &overlay, origin);

        let elapsed = start.elapsed();
        self.metrics.record_timing(Stage::Embed, elapsed);
        tracing::info!(
            seal_id = %record.id(),
            author_id = %options.author_id,
            width,
            height,
            seal_size,
            elapsed_ms = elapsed.as_millis() as u64,
            "Image sealed"
        );

        Ok(SealedImage {
            image,
            seal_id: record.id().to_string(),
            created_at_ms: record.created_at_ms(),
            processing_time_ms: elapsed.as_millis() as u64,
            author_id: options.author_id.clone(),
            record,
            width,
            height,
            block_hash,
        })
    }

    /// Digest of the block sampled around the seal centre of the encoded output.
    ///
    /// The centre is the midpoint of the outer anchors, the same point the
    /// detector derives, and the block is read back from the encoded bytes so
    /// lossy containers hash what a reader will see.
    fn reference_block_hash(
        &self,
        image: &[u8],
        overlay: &Overlay,
        origin: (u32, u32),
    ) -> Option<String> {
        let (left, top) = origin;
        let [first, _, last] = overlay.anchors;
        let center = Center {
            x: left + (first.x + last.x + 1) / 2,
            y: top + (first.y + last.y + 1) / 2,
        };

        match extract(image, center, self.block_size) {
            Ok(block) => Some(block_hash(&block)),
            Err(e) => {
                tracing::warn!(error = %e, "Sealed output has no reference block");
                None
            }
        }
    }
}

fn check_cancelled(cancel: &CancelToken, stage: &'static str) -> Result<()> {
    if cancel.is_cancelled() {
        tracing::warn!(stage, "Embedding cancelled");
        return Err(SealError::Cancelled { rows_scanned: 0 });
    }
    Ok(())
}

fn validate_author(author_id: &str) -> Result<()> {
    if author_id.trim().is_empty() {
        return Err(SealError::InvalidAuthor("author id must not be empty".into()));
    }
    if author_id.chars().any(char::is_control) {
        return Err(SealError::InvalidAuthor(
            "author id must not contain control characters".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryMetrics;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([40, 80, 120]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn sealer() -> Sealer {
        Sealer::new(SealConfig::default(), SecretSalt::development())
    }

    #[test]
    fn test_embed_reports_record() {
        let sealed = sealer().embed(&png(96, 64), &EmbedOptions::new("author")).unwrap();
        assert_eq!(sealed.seal_id, sealed.record.id().as_str());
        assert_eq!(sealed.created_at_ms, sealed.record.created_at_ms());
        assert_eq!(sealed.author_id, "author");
        assert_eq!((sealed.width, sealed.height), (96, 64));
        assert!(sealed.record.is_authentic(&SecretSalt::development()));
    }

    #[test]
    fn test_empty_author_is_rejected() {
        for author in ["", "   ", "bad\nname"] {
            let err = sealer().embed(&png(64, 64), &EmbedOptions::new(author)).unwrap_err();
            assert!(matches!(err, SealError::InvalidAuthor(_)), "{:?}", author);
        }
    }

    #[test]
    fn test_tiny_image_fails_geometry() {
        let err = sealer().embed(&png(12, 12), &EmbedOptions::new("a")).unwrap_err();
        assert!(matches!(err, SealError::InvalidGeometry(_)));
    }

    #[test]
    fn test_off_canvas_anchor_fails_composition() {
        let options = EmbedOptions::new("a").with_anchor(Anchor::new(1.0, 1.0));
        let err = sealer().embed(&png(200, 200), &options).unwrap_err();
        assert!(matches!(err, SealError::Composition(_)));
    }

    #[test]
    fn test_embed_records_timing() {
        let metrics = Arc::new(InMemoryMetrics::new());
        let sealer = sealer().with_metrics(metrics.clone());
        sealer.embed(&png(64, 64), &EmbedOptions::new("a")).unwrap();
        assert_eq!(metrics.snapshot().embeds, 1);
    }

    #[test]
    fn test_reference_block_matches_detection() {
        let sealed = sealer().embed(&png(160, 120), &EmbedOptions::new("a")).unwrap();
        let detected = crate::SpiralDetector::default().detect(&sealed.image).unwrap();
        assert!(detected.found);
        assert_eq!(sealed.block_hash, detected.hash);
    }

    #[test]
    fn test_cancelled_embed_is_abandoned() {
        let token = CancelToken::new();
        token.cancel();
        let err = sealer()
            .embed_with_cancel(&png(64, 64), &EmbedOptions::new("a"), &token)
            .unwrap_err();
        assert!(err.is_inconclusive(), "{:?}", err);
    }

    #[test]
    fn test_running_pool_job_stops_once_cancelled() {
        use crate::pool::{PoolConfig, SealPool};
        use std::sync::mpsc;
        use std::time::Duration;

        let pool = SealPool::new(PoolConfig {
            workers: 1,
            queue_capacity: 1,
        });
        let metrics = Arc::new(InMemoryMetrics::new());
        let sealer = sealer().with_metrics(metrics.clone());
        let source = png(64, 64);
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let handle = pool
            .submit(move |token| {
                started_tx.send(()).unwrap();
                release_rx.recv().ok();
                sealer.embed_with_cancel(&source, &EmbedOptions::new("a"), token)
            })
            .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.token().cancel();
        release_tx.send(()).unwrap();

        let err = handle.wait(Duration::from_secs(5)).unwrap().unwrap_err();
        assert!(matches!(err, SealError::Cancelled { .. }));
        assert_eq!(metrics.snapshot().embeds, 0);
    }

    #[test]
    fn test_untripped_token_embeds() {
        let sealed = sealer()
            .embed_with_cancel(&png(64, 64), &EmbedOptions::new("a"), &CancelToken::new())
            .unwrap();
        assert!(sealed.block_hash.is_some());
    }

    #[test]
    fn test_debug_hides_salt() {
        let sealer = Sealer::new(SealConfig::default(), SecretSalt::new("hunter2"));
        assert!(!format!("{:?}", sealer).contains("hunter2"));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: EmbedOptions = serde_json::from_str(r#"{"author_id":"a"}"#).unwrap();
        assert_eq!(options.output_format, OutputFormat::SameAsInput);
        assert_eq!(options.anchor, None);
    }
}
