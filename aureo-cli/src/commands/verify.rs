//! Verify command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use aureo_core::{IntegrityVerifier, SecretSalt, SpiralDetector};
use colored::Colorize;
use tracing::{debug, error, info, warn};

use crate::utils::{build_receipt_path, format_timestamp, load_receipt};

/// Execute the verify command.
pub fn execute(file: PathBuf, receipt_path: Option<PathBuf>, quiet: bool) -> Result<()> {
    let receipt_path = receipt_path.unwrap_or_else(|| build_receipt_path(&file));

    let content =
        std::fs::read(&file).with_context(|| format!("Failed to read file: {}", file.display()))?;
    info!(path = %file.display(), bytes = content.len(), "Read file");

    let receipt = load_receipt(&receipt_path)?;
    info!(path = %receipt_path.display(), seal_id = %receipt.record.id(), "Read receipt");

    let detection = SpiralDetector::default()
        .detect(&content)
        .context("Failed to read image")?;

    let block = match (detection.found, detection.sampled_block.as_deref()) {
        (true, Some(block)) => block,
        _ => {
            error!(path = %file.display(), "No seal found");
            if !quiet {
                print_banner("NOT SEALED", false);
                println!("   {} {}", "Seal:".dimmed(), "not detected in image".red());
            }
            bail!("Verification failed: no seal found in {}", file.display())
        }
    };

    debug!(center = ?detection.center, "Seal located");
    let report = IntegrityVerifier::new(SecretSalt::from_env()).report(
        block,
        &receipt.record,
        receipt.block_hash.as_deref(),
    );

    if !report.record_authentic {
        error!(seal_id = %report.seal_id, "Record hash does not match");
        if !quiet {
            print_banner("TAMPERED", false);
            println!("   {} {}", "Seal:".dimmed(), "Detected".green());
            println!("   {} {}", "Record:".dimmed(), "hash does not match".red());
        }
        bail!("Verification failed: record {} does not verify", report.seal_id)
    }

    if !report.is_valid() {
        error!(seal_id = %report.seal_id, block_hash = %report.block_hash, "Block does not match receipt");
        if !quiet {
            print_banner("TAMPERED", false);
            println!("   {} {}", "Seal:".dimmed(), "Detected".green());
            println!("   {} {}", "Record:".dimmed(), "authentic".green());
            println!("   {} {}", "Pixels:".dimmed(), "corroboration failed".red());
        }
        bail!(
            "Verification failed: seal in {} was not issued with record {}",
            file.display(),
            report.seal_id
        )
    }

    if receipt.block_hash.is_none() {
        warn!(seal_id = %report.seal_id, "Receipt has no block hash, pixels not corroborated");
    }

    info!(seal_id = %report.seal_id, "Verification successful");
    if !quiet {
        print_banner("AUTHENTIC", true);
        println!("   {} {}", "Seal id:".dimmed(), report.seal_id);
        println!("   {} {}", "Author:".dimmed(), receipt.author_id);
        println!(
            "   {} {}",
            "Sealed at:".dimmed(),
            format_timestamp(receipt.record.created_at_ms())
        );
        if let Some(center) = detection.center {
            println!("   {} ({}, {})", "Centre:".dimmed(), center.x, center.y);
        }
        println!("   {} {}", "Block hash:".dimmed(), &report.block_hash[..16]);
    }
    Ok(())
}

fn print_banner(label: &str, ok: bool) {
    let top = "╔════════════════════════════════════════╗";
    let bottom = "╚════════════════════════════════════════╝";
    let middle = format!("║{:^40}║", label);
    println!();
    if ok {
        println!("{}", top.green());
        println!("{}", middle.green().bold());
        println!("{}", bottom.green());
    } else {
        println!("{}", top.red());
        println!("{}", middle.red().bold());
        println!("{}", bottom.red());
    }
    println!();
}
