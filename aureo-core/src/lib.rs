//! Aureo Core - golden-spiral authenticity seals for raster images
//!
//! This crate embeds a visual authenticity seal into PNG and JPEG images and
//! rediscovers it later without any side information.
//!
//! # Features
//!
//! - Deterministic golden-ratio spiral geometry carrying the seal payload
//! - SHA-256 integrity binding of seal id and timestamp to a secret salt
//! - Blind streaming detector with cooperative cancellation
//! - Byte-identical metadata carried across re-encoding
//! - Bounded worker pool for batch workloads
//!
//! # Example
//!
//! ```no_run
//! use aureo_core::{EmbedOptions, SealConfig, Sealer, SecretSalt, SpiralDetector};
//!
//! # fn example() -> aureo_core::Result<()> {
//! let source = std::fs::read("photo.png").expect("readable file");
//!
//! let sealer = Sealer::new(SealConfig::default(), SecretSalt::from_env());
//! let sealed = sealer.embed(&source, &EmbedOptions::new("GustavoHerraiz"))?;
//! println!("sealed as {}", sealed.seal_id);
//!
//! let result = SpiralDetector::default().detect(&sealed.image)?;
//! assert!(result.found);
//! # Ok(())
//! # }
//! ```

pub mod compositor;
pub mod config;
pub mod detector;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod metadata;
pub mod metrics;
pub mod overlay;
pub mod pool;
pub mod record;
pub mod sealer;
pub mod signatures;

// Re-export main types for convenience
pub use compositor::{composite, SealCompositor, SourceImage};
pub use config::{Anchor, DetectorConfig, SealConfig, SecretSalt, SALT_ENV_VAR};
pub use detector::{Center, ContrastPoint, DetectionResult, SpiralDetector};
pub use error::{Result, SealError, MIN_CANVAS_SIZE};
pub use extract::{block_hash, extract, IntegrityVerifier, VerificationReport};
pub use geometry::{SpiralGeometry, SpiralPoint, PHI};
pub use metadata::{Container, MetadataBlock};
pub use metrics::{InMemoryMetrics, MetricsSink, MetricsSnapshot, NoopMetrics, Stage};
pub use overlay::{Overlay, SealEncoder};
pub use pool::{CancelToken, JobHandle, PoolConfig, PoolError, SealPool};
pub use record::{SealId, SealRecord};
pub use sealer::{EmbedOptions, OutputFormat, SealedImage, Sealer};
pub use signatures::{SignatureAnalysis, VisualSignature, MAX_SIGNATURE_SCORE};
