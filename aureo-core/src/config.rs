//! Seal configuration.
//!
//! Configuration objects are built once at startup and passed by reference
//! into the embed and detect paths. Nothing in this crate reads global state.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::MIN_CANVAS_SIZE;

/// Environment variable holding the integrity salt.
pub const SALT_ENV_VAR: &str = "AUREO_SEAL_SALT";

const DEVELOPMENT_SALT: &str = "default-development-salt";

/// Relative position of the seal centre on the canvas, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Anchor {
    pub const CENTER: Anchor = Anchor { x: 0.5, y: 0.5 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Embed-side parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealConfig {
    /// Seal edge as a fraction of the image's shorter side.
    pub seal_size_ratio: f64,
    /// Lower bound for the seal edge in pixels (clamped to the shorter side).
    pub min_seal_size: u32,
    /// Number of points along the spiral.
    pub spiral_points: usize,
    /// Full turns described by the spiral.
    pub spiral_turns: u32,
    /// Quality used when the source container is JPEG.
    pub jpeg_quality: u8,
    /// Where the seal is placed when the caller does not say.
    pub default_anchor: Anchor,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            seal_size_ratio: 0.05,
            min_seal_size: MIN_CANVAS_SIZE,
            spiral_points: 21,
            spiral_turns: 3,
            jpeg_quality: 95,
            default_anchor: Anchor::CENTER,
        }
    }
}

impl SealConfig {
    /// Seal edge for an image of the given dimensions.
    pub fn seal_size(&self, width: u32, height: u32) -> u32 {
        let shorter = width.min(height);
        let scaled = (f64::from(shorter) * self.seal_size_ratio).floor() as u32;
        scaled.max(self.min_seal_size).min(shorter)
    }
}

/// Detect-side parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Accepted deviation of the spacing ratio from φ (inclusive).
    pub ratio_tolerance: f64,
    /// Edge of the square block sampled around the detected centre.
    pub block_size: u32,
    /// Rows scanned between two cancellation checks.
    pub cancel_check_rows: u32,
    /// Lowest contrast a retained point may have and still count as an anchor.
    ///
    /// Seal anchors score 800, 912 and 1020 while smooth content stays at or
    /// below 510; the floor leaves room for JPEG softening of the anchors.
    pub min_contrast: u16,
    /// Brightest luma allowed on the 8-neighbour ring of a retained point.
    ///
    /// Anchors are painted as a black ring around a bright core, which noise
    /// and texture almost never reproduce on all eight neighbours.
    pub max_ring_luma: u8,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ratio_tolerance: 0.1,
            block_size: 8,
            cancel_check_rows: 64,
            min_contrast: 640,
            max_ring_luma: 64,
        }
    }
}

/// Secret salt mixed into every integrity hash.
///
/// The value is wiped on drop and never printed.
#[derive(Clone)]
pub struct SecretSalt(Zeroizing<String>);

impl SecretSalt {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Load the salt from `AUREO_SEAL_SALT`, falling back to the development salt.
    pub fn from_env() -> Self {
        match std::env::var(SALT_ENV_VAR) {
            Ok(value) if !value.is_empty() => Self::new(value),
            _ => {
                tracing::warn!(
                    env = SALT_ENV_VAR,
                    "Seal salt not configured, using development salt"
                );
                Self::development()
            }
        }
    }

    pub fn development() -> Self {
        Self::new(DEVELOPMENT_SALT)
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for SecretSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretSalt(***)")
    }
}
