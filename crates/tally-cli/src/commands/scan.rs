//! Scan command - extract fields from a single receipt image.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use super::{build_pipeline, check_image_path, format_extraction, load_config, EngineArg, OutputFormat};

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Receipt image
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also extract priced line items
    #[arg(long)]
    itemize: bool,

    /// OCR engine (overrides the config file)
    #[arg(short, long, value_enum)]
    engine: Option<EngineArg>,

    /// Print the raw OCR text after the extraction
    #[arg(long)]
    show_text: bool,
}

pub async fn run(args: ScanArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(engine) = args.engine {
        config.ocr.engine = engine.into();
    }

    check_image_path(&args.input)?;
    info!("Scanning receipt: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message("Reading receipt...");

    let bytes = fs::read(&args.input)?;
    let pipeline = build_pipeline(&config, args.itemize)?;

    pb.set_message("Running OCR...");
    let result = pipeline.scan(&bytes).await;
    pb.finish_and_clear();
    let result = result?;

    let output = format_extraction(&result.extracted, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output.trim_end());
    }

    if args.show_text {
        println!();
        println!("{}", style("OCR text:").bold());
        println!("{}", result.raw_text);
    }

    if result.extracted.is_empty() {
        eprintln!(
            "{} No fields recognized in {}",
            style("!").yellow(),
            args.input.display()
        );
    }

    debug!(
        "Pipeline took {}ms, total {:?}",
        result.processing_time_ms,
        start.elapsed()
    );

    Ok(())
}
