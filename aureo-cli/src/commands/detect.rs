//! Detect command implementation.
//!
//! Images are scanned on the bounded worker pool. Each scan gets the same
//! time budget; a scan that overruns it is cancelled and reported as
//! inconclusive.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use aureo_core::{
    DetectionResult, JobHandle, PoolConfig, PoolError, SealError, SealPool, SpiralDetector,
};
use colored::Colorize;
use serde::Serialize;
use tracing::{debug, warn};

/// Outcome for one scanned file.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Verdict {
    Found { result: DetectionResult },
    NotFound,
    Inconclusive { reason: String },
    Unreadable { reason: String },
}

#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    #[serde(flatten)]
    verdict: Verdict,
}

type Pending = (PathBuf, JobHandle<aureo_core::Result<DetectionResult>>);

/// Execute the detect command.
pub fn execute(files: Vec<PathBuf>, json: bool, timeout_ms: u64, quiet: bool) -> Result<()> {
    let timeout = Duration::from_millis(timeout_ms);
    let pool = SealPool::new(PoolConfig::default());
    let detector = Arc::new(SpiralDetector::default());

    let mut pending: VecDeque<Pending> = VecDeque::new();
    let mut reports = Vec::with_capacity(files.len());

    for file in files {
        let bytes = Arc::new(
            std::fs::read(&file)
                .with_context(|| format!("Failed to read file: {}", file.display()))?,
        );

        loop {
            let job_bytes = Arc::clone(&bytes);
            let job_detector = Arc::clone(&detector);
            match pool.submit(move |token| job_detector.detect_with_cancel(&job_bytes, token)) {
                Ok(handle) => {
                    pending.push_back((file, handle));
                    break;
                }
                Err(PoolError::QueueFull { .. }) => match pending.pop_front() {
                    // Make room by finishing the oldest scan first.
                    Some(oldest) => reports.push(collect(oldest, timeout)),
                    None => bail!("Detection queue rejected work with nothing pending"),
                },
                Err(e) => return Err(e).context("Failed to schedule detection"),
            }
        }
    }
    reports.extend(pending.into_iter().map(|job| collect(job, timeout)));

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialize results")?
        );
    } else if !quiet {
        for report in &reports {
            print_report(report);
        }
    }

    summarize(&reports)
}

fn collect((file, handle): Pending, timeout: Duration) -> FileReport {
    let verdict = match handle.wait(timeout) {
        Ok(Ok(result)) if result.found => Verdict::Found { result },
        Ok(Ok(_)) => Verdict::NotFound,
        Ok(Err(e @ SealError::UnreadableImage(_))) => Verdict::Unreadable {
            reason: e.to_string(),
        },
        Ok(Err(e)) if e.is_inconclusive() => Verdict::Inconclusive {
            reason: e.to_string(),
        },
        Ok(Err(e)) => Verdict::Unreadable {
            reason: e.to_string(),
        },
        Err(e) => {
            warn!(file = %file.display(), error = %e, "Detection inconclusive");
            Verdict::Inconclusive {
                reason: e.to_string(),
            }
        }
    };
    debug!(file = %file.display(), verdict = ?verdict, "Scanned");

    FileReport {
        file: file.display().to_string(),
        verdict,
    }
}

fn print_report(report: &FileReport) {
    match &report.verdict {
        Verdict::Found { result } => {
            println!("{} {}", "SEALED".green().bold(), report.file);
            if let Some(center) = result.center {
                println!("   {} ({}, {})", "Centre:".dimmed(), center.x, center.y);
            }
            if let Some(hash) = &result.hash {
                println!("   {} {}", "Block hash:".dimmed(), &hash[..16.min(hash.len())]);
            }
        }
        Verdict::NotFound => println!("{} {}", "NO SEAL".yellow().bold(), report.file),
        Verdict::Inconclusive { reason } => {
            println!("{} {} ({})", "INCONCLUSIVE".yellow().bold(), report.file, reason)
        }
        Verdict::Unreadable { reason } => {
            println!("{} {} ({})", "UNREADABLE".red().bold(), report.file, reason)
        }
    }
}

/// Fold the per-file verdicts into the command's exit status.
fn summarize(reports: &[FileReport]) -> Result<()> {
    let count = |predicate: fn(&Verdict) -> bool| {
        reports.iter().filter(|r| predicate(&r.verdict)).count()
    };
    let unreadable = count(|v| matches!(v, Verdict::Unreadable { .. }));
    let inconclusive = count(|v| matches!(v, Verdict::Inconclusive { .. }));
    let missing = count(|v| matches!(v, Verdict::NotFound));

    if unreadable > 0 {
        bail!("Failed to read {} of {} images", unreadable, reports.len());
    }
    if inconclusive > 0 {
        bail!("Detection inconclusive for {} of {} images", inconclusive, reports.len());
    }
    if missing > 0 {
        bail!("No seal found in {} of {} images", missing, reports.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(verdict: Verdict) -> FileReport {
        FileReport {
            file: "x.png".into(),
            verdict,
        }
    }

    #[test]
    fn test_summary_precedence() {
        let reports = vec![
            report(Verdict::NotFound),
            report(Verdict::Inconclusive {
                reason: "timed out".into(),
            }),
        ];
        let message = summarize(&reports).unwrap_err().to_string();
        assert!(message.contains("inconclusive"));

        assert!(summarize(&[report(Verdict::NotFound)])
            .unwrap_err()
            .to_string()
            .contains("No seal found"));
        assert!(summarize(&[]).is_ok());
    }

    #[test]
    fn test_report_serializes_with_status_tag() {
        let json = serde_json::to_value(report(Verdict::NotFound)).unwrap();
        assert_eq!(json["file"], "x.png");
        assert_eq!(json["status"], "not_found");
    }
}
