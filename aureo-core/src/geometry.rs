//! Golden-ratio spiral geometry.
//!
//! The spiral is the skeleton of the seal: it is drawn by the overlay encoder,
//! carries the geometric payload, and defines the spacing the detector looks
//! for. Generation is deterministic and allocation is the only side effect.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// The golden ratio φ.
pub const PHI: f64 = 1.618033988749895;

/// Points on the default spiral.
pub const DEFAULT_SPIRAL_POINTS: usize = 21;

/// Full turns of the default spiral.
pub const DEFAULT_SPIRAL_TURNS: u32 = 3;

/// A point on the spiral in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpiralPoint {
    pub x: f64,
    pub y: f64,
}

impl SpiralPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &SpiralPoint) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Spiral parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiralGeometry {
    points: usize,
    turns: u32,
}

impl Default for SpiralGeometry {
    fn default() -> Self {
        Self::new(DEFAULT_SPIRAL_POINTS, DEFAULT_SPIRAL_TURNS)
    }
}

impl SpiralGeometry {
    pub fn new(points: usize, turns: u32) -> Self {
        Self { points, turns }
    }

    /// Generate the ordered point sequence for a square canvas.
    ///
    /// Point `i` sits at angle `(i/n)·2π·turns` scaled by φ, on a radius that
    /// shrinks linearly from half the canvas toward the centre.
    pub fn generate(&self, canvas_size: u32) -> Vec<SpiralPoint> {
        let n = self.points as f64;
        let center = f64::from(canvas_size) / 2.0;
        let max_radius = center;

        (0..self.points)
            .map(|i| {
                let t = i as f64 / n;
                let angle = t * 2.0 * PI * f64::from(self.turns);
                let radius = max_radius * (1.0 - t);
                SpiralPoint {
                    x: center + radius * (angle * PHI).cos(),
                    y: center + radius * (angle * PHI).sin(),
                }
            })
            .collect()
    }
}

/// Shift the first points of the spiral by the payload bytes.
///
/// Point `i` moves by `(byte[i] mod 4) − 2` on both axes; points beyond the
/// payload length are left in place.
pub fn perturb(points: &[SpiralPoint], payload: &[u8]) -> Vec<SpiralPoint> {
    points
        .iter()
        .enumerate()
        .map(|(i, point)| match payload.get(i) {
            Some(byte) => {
                let shift = f64::from(byte % 4) - 2.0;
                SpiralPoint::new(point.x + shift, point.y + shift)
            }
            None => *point,
        })
        .collect()
}
