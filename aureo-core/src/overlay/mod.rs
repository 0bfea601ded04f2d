//! Seal overlay description and encoder.
//!
//! The encoder turns a [`SealRecord`] into a declarative [`Overlay`]: a faint
//! radial fade, the spiral drawn as line segments whose points carry the
//! record payload, the integrity hash as a row of glyphs, and three opaque
//! contrast anchors the detector keys on. Rasterization lives in [`raster`].

pub mod font;
pub mod raster;

use serde::{Deserialize, Serialize};

use crate::config::SealConfig;
use crate::error::{Result, SealError, MIN_CANVAS_SIZE};
use crate::geometry::{perturb, SpiralGeometry, SpiralPoint, PHI};
use crate::record::SealRecord;

pub use raster::rasterize;

const WHITE: [u8; 3] = [255, 255, 255];
const BLACK: [u8; 3] = [0, 0, 0];

const FADE_INNER_OPACITY: f64 = 0.01;
const STROKE_BASE_OPACITY: f64 = 0.02;
const STROKE_OPACITY_GAIN: f64 = 0.06;
const GLYPH_OPACITY: f64 = 0.08;

/// Core intensities of the three anchors, in raster order.
///
/// Each value is strictly brighter than the previous one so a streaming
/// running-maximum scan retains all three.
pub const ANCHOR_CORES: [u8; 3] = [200, 228, 255];

/// Worst spacing-ratio error accepted when placing the anchors.
const MAX_ANCHOR_RATIO_ERROR: f64 = 0.05;

/// Faint disk under the whole seal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialFade {
    pub center: SpiralPoint,
    pub radius: f64,
    pub inner_opacity: f64,
    pub outer_opacity: f64,
    pub color: [u8; 3],
}

/// A straight segment between two consecutive spiral points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub from: SpiralPoint,
    pub to: SpiralPoint,
    pub width: f64,
    pub opacity: f64,
    pub color: [u8; 3],
}

/// One hash character, centred on (`x`, `y`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub ch: char,
    pub x: f64,
    pub y: f64,
    /// Edge of one font cell in pixels.
    pub cell: u32,
    pub opacity: f64,
    pub color: [u8; 3],
}

/// Opaque 3×3 mark: dark ring around a bright core pixel at (`x`, `y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorMark {
    pub x: u32,
    pub y: u32,
    pub core: u8,
}

/// Declarative seal overlay on a square canvas of `size` pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub size: u32,
    pub fade: RadialFade,
    pub strokes: Vec<Stroke>,
    pub glyphs: Vec<Glyph>,
    pub anchors: [AnchorMark; 3],
}

/// Builds overlays from seal records.
#[derive(Debug, Clone)]
pub struct SealEncoder {
    geometry: SpiralGeometry,
}

impl SealEncoder {
    pub fn new(config: &SealConfig) -> Self {
        Self {
            geometry: SpiralGeometry::new(config.spiral_points, config.spiral_turns),
        }
    }

    /// Build the overlay for `record` on a `canvas_size` square.
    pub fn encode(&self, canvas_size: u32, record: &SealRecord) -> Result<Overlay> {
        if canvas_size == 0 {
            return Err(SealError::InvalidGeometry(
                "canvas size must be positive".into(),
            ));
        }
        if canvas_size < MIN_CANVAS_SIZE {
            return Err(SealError::InvalidGeometry(format!(
                "canvas of {}px cannot hold the seal (minimum {}px)",
                canvas_size, MIN_CANVAS_SIZE
            )));
        }

        let points = perturb(&self.geometry.generate(canvas_size), &record.payload());
        let size = f64::from(canvas_size);
        let center = size / 2.0;

        let overlay = Overlay {
            size: canvas_size,
            fade: RadialFade {
                center: SpiralPoint::new(center, center),
                radius: center,
                inner_opacity: FADE_INNER_OPACITY,
                outer_opacity: 0.0,
                color: WHITE,
            },
            strokes: spiral_strokes(&points),
            glyphs: hash_glyphs(record.hash(), size),
            anchors: place_anchors(canvas_size)?,
        };

        tracing::debug!(
            seal_id = %record.id(),
            canvas = canvas_size,
            strokes = overlay.strokes.len(),
            glyphs = overlay.glyphs.len(),
            "Encoded seal overlay"
        );

        Ok(overlay)
    }
}

fn spiral_strokes(points: &[SpiralPoint]) -> Vec<Stroke> {
    let n = points.len() as f64;
    points
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            // Outer turns come first; `outward` is 1 at the rim and falls toward the centre.
            let outward = 1.0 - (i + 1) as f64 / n;
            Stroke {
                from: pair[0],
                to: pair[1],
                width: 1.0 + outward,
                opacity: STROKE_BASE_OPACITY + STROKE_OPACITY_GAIN * outward,
                color: WHITE,
            }
        })
        .collect()
}

fn hash_glyphs(hash: &str, size: f64) -> Vec<Glyph> {
    let chars: Vec<char> = hash.to_uppercase().chars().collect();
    let count = chars.len() as f64;
    let spacing = size / (count + 1.0);
    let font_size = size / count / 2.0;
    let cell = ((font_size / f64::from(font::GLYPH_HEIGHT)).floor() as u32).max(1);
    let center = size / 2.0;

    chars
        .into_iter()
        .enumerate()
        .map(|(i, ch)| Glyph {
            ch,
            x: spacing * (i + 1) as f64,
            y: center,
            cell,
            opacity: GLYPH_OPACITY,
            color: BLACK,
        })
        .collect()
}

/// Place the anchors on a `size` canvas.
///
/// The outer anchors sit on the vertical diameter, symmetric about the centre,
/// so their midpoint is the seal centre. The middle anchor is the pixel between
/// them whose spacing ratio is closest to φ, preferring the diameter itself.
fn place_anchors(size: u32) -> Result<[AnchorMark; 3]> {
    let c = size / 2;
    let first = (c, 2);
    let last = (c, 2 * c - 2);

    let distance = |a: (u32, u32), b: (u32, u32)| {
        (f64::from(a.0) - f64::from(b.0)).hypot(f64::from(a.1) - f64::from(b.1))
    };

    let mut best: Option<((u32, u32), f64)> = None;
    for y in (first.1 + 3)..=(last.1 - 3) {
        for x in 2..=(size - 3) {
            let candidate = (x, y);
            let ratio = distance(candidate, last) / distance(first, candidate);
            let score = (ratio - PHI).abs() + 1e-3 * f64::from(x.abs_diff(c));
            if best.map_or(true, |(_, s)| score < s) {
                best = Some((candidate, score));
            }
        }
    }

    let (middle, _) = best.ok_or_else(|| {
        SealError::InvalidGeometry(format!("no room for anchors on a {}px canvas", size))
    })?;
    let error = (distance(middle, last) / distance(first, middle) - PHI).abs();
    if error > MAX_ANCHOR_RATIO_ERROR {
        return Err(SealError::InvalidGeometry(format!(
            "anchor spacing on a {}px canvas deviates {:.3} from the golden ratio",
            size, error
        )));
    }

    Ok([
        AnchorMark {
            x: first.0,
            y: first.1,
            core: ANCHOR_CORES[0],
        },
        AnchorMark {
            x: middle.0,
            y: middle.1,
            core: ANCHOR_CORES[1],
        },
        AnchorMark {
            x: last.0,
            y: last.1,
            core: ANCHOR_CORES[2],
        },
    ])
}
