//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use aureo_core::SealRecord;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::OutputFormat;

/// Everything needed to verify a sealed image later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealReceipt {
    pub record: SealRecord,
    pub author_id: String,
    pub image_file: String,
    pub width: u32,
    pub height: u32,
    /// Digest of the block a detector samples from the sealed image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
}

/// Build the sealed image path from the original file path.
///
/// Transforms `photo.jpg` into `photo.sealed.jpg`.
pub fn build_sealed_path(file: &Path) -> PathBuf {
    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    match file.extension().and_then(|e| e.to_str()) {
        Some(ext) => file.with_file_name(format!("{}.sealed.{}", stem, ext)),
        None => file.with_file_name(format!("{}.sealed", stem)),
    }
}

/// Build the receipt path from the sealed image path.
///
/// Transforms `photo.sealed.jpg` into `photo.sealed.jpg.aureo`.
pub fn build_receipt_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(".aureo");
    PathBuf::from(name)
}

pub fn write_receipt(path: &Path, receipt: &SealReceipt, format: OutputFormat) -> Result<()> {
    let bytes = match format {
        OutputFormat::Json => {
            serde_json::to_vec_pretty(receipt).context("Failed to serialize receipt to JSON")?
        }
        OutputFormat::Cbor => {
            let mut bytes = Vec::new();
            ciborium::into_writer(receipt, &mut bytes)
                .context("Failed to serialize receipt to CBOR")?;
            bytes
        }
    };
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write receipt: {}", path.display()))?;
    debug!(format = ?format, path = %path.display(), "Receipt written");
    Ok(())
}

/// Load a receipt, trying CBOR first then JSON.
pub fn load_receipt(path: &Path) -> Result<SealReceipt> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read receipt: {}", path.display()))?;

    let receipt = if let Ok(receipt) = ciborium::from_reader::<SealReceipt, _>(bytes.as_slice()) {
        debug!(format = "cbor", "Parsed receipt");
        receipt
    } else if let Ok(receipt) = serde_json::from_slice(&bytes) {
        debug!(format = "json", "Parsed receipt");
        receipt
    } else {
        bail!("Failed to parse receipt (tried CBOR and JSON)");
    };

    Ok(receipt)
}

/// Format a Unix timestamp (milliseconds) as a human-readable UTC string.
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match Utc.timestamp_millis_opt(timestamp_ms) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        _ => format!("{}ms", timestamp_ms),
    }
}
