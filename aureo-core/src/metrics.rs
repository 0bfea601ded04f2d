//! Timing and detection counters.
//!
//! Seal operations report into an injected [`MetricsSink`]; nothing here is
//! global.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Pipeline stage a timing belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embed,
    Detect,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Embed => "embed",
            Stage::Detect => "detect",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver for seal metrics.
pub trait MetricsSink: Send + Sync {
    fn record_timing(&self, stage: Stage, elapsed: Duration);
    fn record_detection(&self, found: bool);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_timing(&self, _stage: Stage, _elapsed: Duration) {}
    fn record_detection(&self, _found: bool) {}
}

#[derive(Debug, Default)]
struct StageCounter {
    count: AtomicU64,
    total_micros: AtomicU64,
}

impl StageCounter {
    fn record(&self, elapsed: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);
    }

    fn average_ms(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.total_micros.load(Ordering::Relaxed) as f64 / count as f64 / 1000.0
    }
}

/// Lock-free in-process counters.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    embed: StageCounter,
    detect: StageCounter,
    detections: AtomicU64,
    seals_found: AtomicU64,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            embeds: self.embed.count.load(Ordering::Relaxed),
            embed_avg_ms: self.embed.average_ms(),
            detections: self.detections.load(Ordering::Relaxed),
            seals_found: self.seals_found.load(Ordering::Relaxed),
            detect_avg_ms: self.detect.average_ms(),
        }
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_timing(&self, stage: Stage, elapsed: Duration) {
        match stage {
            Stage::Embed => self.embed.record(elapsed),
            Stage::Detect => self.detect.record(elapsed),
        }
    }

    fn record_detection(&self, found: bool) {
        self.detections.fetch_add(1, Ordering::Relaxed);
        if found {
            self.seals_found.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Point-in-time view of [`InMemoryMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub embeds: u64,
    pub embed_avg_ms: f64,
    pub detections: u64,
    pub seals_found: u64,
    pub detect_avg_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_detections() {
        let metrics = InMemoryMetrics::new();
        metrics.record_detection(true);
        metrics.record_detection(false);
        metrics.record_detection(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.detections, 3);
        assert_eq!(snapshot.seals_found, 2);
    }

    #[test]
    fn test_averages_timings_per_stage() {
        let metrics = InMemoryMetrics::new();
        metrics.record_timing(Stage::Embed, Duration::from_millis(10));
        metrics.record_timing(Stage::Embed, Duration::from_millis(30));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.embeds, 2);
        assert!((snapshot.embed_avg_ms - 20.0).abs() < 1e-9);
        assert_eq!(snapshot.detect_avg_ms, 0.0);
    }
}
