//! Seal command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use aureo_core::{Anchor, EmbedOptions, SealConfig, Sealer, SecretSalt, SourceImage};
use colored::Colorize;
use tracing::{debug, info};

use crate::utils::{build_receipt_path, build_sealed_path, format_timestamp, write_receipt, SealReceipt};
use crate::OutputFormat;

pub struct SealArgs {
    pub file: PathBuf,
    pub author: String,
    pub output: Option<PathBuf>,
    pub anchor_x: Option<f64>,
    pub anchor_y: Option<f64>,
    pub format: OutputFormat,
    pub dry_run: bool,
}

impl SealArgs {
    fn anchor(&self, default: Anchor) -> Option<Anchor> {
        if self.anchor_x.is_none() && self.anchor_y.is_none() {
            return None;
        }
        Some(Anchor::new(
            self.anchor_x.unwrap_or(default.x),
            self.anchor_y.unwrap_or(default.y),
        ))
    }
}

/// Execute the seal command.
pub fn execute(args: SealArgs, quiet: bool) -> Result<()> {
    let content = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read file: {}", args.file.display()))?;

    info!(path = %args.file.display(), bytes = content.len(), "Read file");

    let config = SealConfig::default();
    let output = args.output.clone().unwrap_or_else(|| build_sealed_path(&args.file));
    let receipt_path = build_receipt_path(&output);

    if args.dry_run {
        let source = SourceImage::decode(&content).context("Failed to read image")?;
        let (width, height) = source.dimensions();
        println!("{}", "[DRY RUN] No files will be written".yellow().bold());
        println!();
        println!("   {} {}", "Input file:".dimmed(), args.file.display());
        println!("   {} {}x{} {:?}", "Image:".dimmed(), width, height, source.container());
        println!("   {} {}px", "Seal size:".dimmed(), config.seal_size(width, height));
        println!("   {} {} bytes", "Metadata:".dimmed(), source.metadata().byte_len());
        println!("   {} {}", "Sealed image:".dimmed(), output.display());
        println!("   {} {}", "Receipt:".dimmed(), receipt_path.display());
        println!("   {} {:?}", "Output format:".dimmed(), args.format);
        return Ok(());
    }

    let mut options = EmbedOptions::new(args.author.clone());
    if let Some(anchor) = args.anchor(config.default_anchor) {
        options = options.with_anchor(anchor);
    }
    debug!(anchor = ?options.anchor, "Embedding seal");

    let sealer = Sealer::new(config, SecretSalt::from_env());
    let sealed = sealer
        .embed(&content, &options)
        .context("Failed to seal image")?;

    std::fs::write(&output, &sealed.image)
        .with_context(|| format!("Failed to write sealed image: {}", output.display()))?;

    let receipt = SealReceipt {
        record: sealed.record.clone(),
        author_id: sealed.author_id.clone(),
        image_file: output.display().to_string(),
        width: sealed.width,
        height: sealed.height,
        block_hash: sealed.block_hash.clone(),
    };
    write_receipt(&receipt_path, &receipt, args.format)?;

    info!(
        seal_id = %sealed.seal_id,
        output = %output.display(),
        receipt = %receipt_path.display(),
        "Seal saved"
    );

    if !quiet {
        println!();
        println!("{}", "Image sealed".green().bold());
        println!();
        println!("   {} {}", "Seal id:".dimmed(), sealed.seal_id);
        println!("   {} {}", "Author:".dimmed(), sealed.author_id);
        println!("   {} {}", "Sealed at:".dimmed(), format_timestamp(sealed.created_at_ms));
        println!("   {} {}", "Image saved:".dimmed(), output.display());
        println!("   {} {}", "Receipt saved:".dimmed(), receipt_path.display());
        println!("   {} {} ms", "Processing time:".dimmed(), sealed.processing_time_ms);
    }

    Ok(())
}
