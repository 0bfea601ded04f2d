//! Blind seal detection.
//!
//! The detector scans the grayscale image in raster order and keeps a window
//! of the last three pixels whose 4-neighbour contrast beat every contrast
//! seen before them. A seal is reported when the spacing of those three
//! points follows the golden ratio.
//!
//! The window is a streaming top-3-with-recency, not a global top-3: the
//! verdict depends on scan order and a strong edge earlier in the image can
//! mask the seal. Sealed images carry anchors with increasing contrast so the
//! scan retains them on smooth content.
//!
//! Before the ratio test, each retained point must look like an anchor: its
//! contrast reaches `DetectorConfig::min_contrast` and all eight neighbours
//! are at most `DetectorConfig::max_ring_luma`. Texture and sensor noise
//! produce golden-looking triples of weak or unringed points; those are
//! rejected here.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::error::{Result, SealError};
use crate::extract::{block_hash, extract_from_luma};
use crate::geometry::PHI;
use crate::metrics::{MetricsSink, NoopMetrics, Stage};
use crate::pool::CancelToken;

const WINDOW_CAPACITY: usize = 3;

/// Pixel retained during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContrastPoint {
    pub x: u32,
    pub y: u32,
    pub intensity: u8,
    /// Sum of absolute differences to the 4 neighbours (0..=1020).
    pub contrast: u16,
}

impl ContrastPoint {
    pub fn distance(&self, other: &ContrastPoint) -> f64 {
        (f64::from(self.x) - f64::from(other.x)).hypot(f64::from(self.y) - f64::from(other.y))
    }
}

/// Detected seal centre in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Center {
    pub x: u32,
    pub y: u32,
}

impl Center {
    /// Midpoint of two points, halves rounded up.
    pub fn midpoint(a: &ContrastPoint, b: &ContrastPoint) -> Self {
        Self {
            x: ((u64::from(a.x) + u64::from(b.x) + 1) / 2) as u32,
            y: ((u64::from(a.y) + u64::from(b.y) + 1) / 2) as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub found: bool,
    pub center: Option<Center>,
    pub sampled_block: Option<Vec<u8>>,
    /// Hex SHA-256 of the sampled block.
    pub hash: Option<String>,
}

impl DetectionResult {
    pub fn not_found() -> Self {
        Self {
            found: false,
            center: None,
            sampled_block: None,
            hash: None,
        }
    }
}

/// Fixed-capacity window of contrast points in discovery order.
#[derive(Debug, Clone, Default)]
pub struct ContrastWindow {
    points: VecDeque<ContrastPoint>,
    running_max: u16,
    pushes: usize,
}

impl ContrastWindow {
    pub fn new() -> Self {
        Self {
            points: VecDeque::with_capacity(WINDOW_CAPACITY),
            running_max: 0,
            pushes: 0,
        }
    }

    /// Retain `point` if its contrast is strictly above everything seen so far.
    pub fn offer(&mut self, point: ContrastPoint) -> bool {
        if point.contrast <= self.running_max {
            return false;
        }
        self.running_max = point.contrast;
        if self.points.len() == WINDOW_CAPACITY {
            self.points.pop_front();
        }
        self.points.push_back(point);
        self.pushes += 1;
        true
    }

    pub fn points(&self) -> Vec<ContrastPoint> {
        self.points.iter().copied().collect()
    }

    /// Number of points ever retained, evicted ones included.
    pub fn pushes(&self) -> usize {
        self.pushes
    }

    pub fn is_full(&self) -> bool {
        self.points.len() == WINDOW_CAPACITY
    }
}

/// Contrast of the interior pixel at (`x`, `y`).
fn contrast_at(luma: &GrayImage, x: u32, y: u32) -> u16 {
    let value = |x: u32, y: u32| i16::from(luma.get_pixel(x, y).0[0]);
    let here = value(x, y);
    [
        value(x - 1, y),
        value(x + 1, y),
        value(x, y - 1),
        value(x, y + 1),
    ]
    .iter()
    .map(|&n| (here - n).unsigned_abs())
    .sum()
}

/// Scan every interior pixel of `luma` in raster order.
///
/// `cancel` is polled every `check_rows` rows; a tripped token ends the scan
/// with `SealError::Cancelled`.
pub fn scan_contrast_points(
    luma: &GrayImage,
    cancel: &CancelToken,
    check_rows: u32,
) -> Result<ContrastWindow> {
    let (width, height) = luma.dimensions();
    let mut window = ContrastWindow::new();
    if width < 3 || height < 3 {
        return Ok(window);
    }

    let check_rows = check_rows.max(1);
    for y in 1..height - 1 {
        if (y - 1) % check_rows == 0 && cancel.is_cancelled() {
            return Err(SealError::Cancelled { rows_scanned: y - 1 });
        }
        for x in 1..width - 1 {
            window.offer(ContrastPoint {
                x,
                y,
                intensity: luma.get_pixel(x, y).0[0],
                contrast: contrast_at(luma, x, y),
            });
        }
    }
    Ok(window)
}

/// Whether `point` has the contrast and dark 8-neighbour ring of a seal anchor.
///
/// `point` must be an interior pixel of `luma`.
pub fn is_anchor_like(luma: &GrayImage, point: &ContrastPoint, config: &DetectorConfig) -> bool {
    if point.contrast < config.min_contrast {
        return false;
    }
    (0..3u32)
        .flat_map(|dy| (0..3u32).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| (dx, dy) != (1, 1))
        .all(|(dx, dy)| {
            luma.get_pixel(point.x + dx - 1, point.y + dy - 1).0[0] <= config.max_ring_luma
        })
}

/// `dist(P1, P2) / dist(P0, P1)`, or `None` when P0 and P1 coincide.
pub fn spacing_ratio(points: &[ContrastPoint; 3]) -> Option<f64> {
    let first = points[0].distance(&points[1]);
    if first == 0.0 {
        return None;
    }
    Some(points[1].distance(&points[2]) / first)
}

/// Inclusive tolerance check against φ.
pub fn golden_ratio_matches(ratio: f64, tolerance: f64) -> bool {
    ratio.is_finite() && (ratio - PHI).abs() <= tolerance
}

pub fn is_golden_triple(points: &[ContrastPoint; 3], tolerance: f64) -> bool {
    spacing_ratio(points).is_some_and(|ratio| golden_ratio_matches(ratio, tolerance))
}

/// Locates seals without any side information.
#[derive(Clone)]
pub struct SpiralDetector {
    config: DetectorConfig,
    metrics: Arc<dyn MetricsSink>,
}

impl std::fmt::Debug for SpiralDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiralDetector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for SpiralDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl SpiralDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect a seal in encoded image bytes.
    ///
    /// Only undecodable input is an error; every other miss is `found: false`.
    pub fn detect(&self, image_bytes: &[u8]) -> Result<DetectionResult> {
        self.detect_with_cancel(image_bytes, &CancelToken::new())
    }

    pub fn detect_with_cancel(
        &self,
        image_bytes: &[u8],
        cancel: &CancelToken,
    ) -> Result<DetectionResult> {
        let luma = image::load_from_memory(image_bytes)
            .map_err(|e| {
                tracing::warn!(bytes = image_bytes.len(), error = %e, "Detection input is not a decodable image");
                SealError::UnreadableImage(e.to_string())
            })?
            .to_luma8();
        self.detect_luma(&luma, cancel)
    }

    /// Detect a seal in an already decoded grayscale image.
    pub fn detect_luma(&self, luma: &GrayImage, cancel: &CancelToken) -> Result<DetectionResult> {
        let start = Instant::now();
        let (width, height) = luma.dimensions();

        let window = match scan_contrast_points(luma, cancel, self.config.cancel_check_rows) {
            Ok(window) => window,
            Err(e) => {
                tracing::warn!(width, height, stage = "scan", error = %e, "Detection abandoned");
                return Err(e);
            }
        };
        let result = self.evaluate(luma, &window);

        let elapsed = start.elapsed();
        self.metrics.record_timing(Stage::Detect, elapsed);
        self.metrics.record_detection(result.found);
        tracing::debug!(
            width,
            height,
            found = result.found,
            pushes = window.pushes(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Seal detection finished"
        );

        Ok(result)
    }

    fn evaluate(&self, luma: &GrayImage, window: &ContrastWindow) -> DetectionResult {
        let points: [ContrastPoint; 3] = match window.points().try_into() {
            Ok(points) => points,
            Err(_) => return DetectionResult::not_found(),
        };
        if !points.iter().all(|p| is_anchor_like(luma, p, &self.config)) {
            tracing::trace!(
                contrasts = ?points.map(|p| p.contrast),
                "Retained points do not look like seal anchors"
            );
            return DetectionResult::not_found();
        }
        if !is_golden_triple(&points, self.config.ratio_tolerance) {
            return DetectionResult::not_found();
        }

        let center = Center::midpoint(&points[0], &points[2]);
        match extract_from_luma(luma, center, self.config.block_size) {
            Ok(block) => DetectionResult {
                found: true,
                center: Some(center),
                hash: Some(block_hash(&block)),
                sampled_block: Some(block),
            },
            Err(e) => {
                let (width, height) = luma.dimensions();
                tracing::warn!(width, height, stage = "extract", error = %e, "Seal centre too close to the edge");
                DetectionResult::not_found()
            }
        }
    }
}
