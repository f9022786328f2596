//! Submit command - scan a receipt, store it in the backend, classify items.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use rust_decimal::Decimal;
use tracing::{info, warn};

use tally_core::models::receipt::{Category, ClassifiedReceipt};
use tally_core::{classify_items, BackendClient};

use super::{build_pipeline, check_image_path, load_config};

/// Arguments for the submit command.
#[derive(Args)]
pub struct SubmitArgs {
    /// Receipt image
    #[arg(required = true)]
    input: PathBuf,

    /// Backend URL (overrides the config file)
    #[arg(long)]
    backend_url: Option<String>,

    /// Skip item classification
    #[arg(long)]
    no_classify: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

pub async fn run(args: SubmitArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(url) = args.backend_url {
        config.backend.url = url;
    }

    check_image_path(&args.input)?;
    let bytes = fs::read(&args.input)?;

    let pipeline = build_pipeline(&config, false)?;
    let scan = pipeline.scan(&bytes).await?;
    info!(
        "Local extraction: vendor={:?} amount={:?}",
        scan.extracted.vendor, scan.extracted.amount
    );

    let file_name = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("receipt.png")
        .to_string();

    let client = BackendClient::new(&config.backend)?;
    let record = client.upload(&file_name, bytes, Some(&scan)).await?;

    let categories: Vec<Category> = if config.backend.classify_items && !args.no_classify {
        classify_items(&client, &record.items)
            .await
            .into_iter()
            .map(|item| item.category)
            .collect()
    } else {
        warn!("Item classification disabled, using {}", Category::Other);
        Vec::new()
    };

    let receipt = ClassifiedReceipt::from_record(record, categories);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
    } else {
        print_receipt(&receipt);
    }

    Ok(())
}

fn print_receipt(receipt: &ClassifiedReceipt) {
    println!(
        "{} Stored receipt #{}",
        style("✓").green(),
        receipt.id
    );
    println!("  Vendor: {}", receipt.vendor.as_deref().unwrap_or("-"));
    println!("  Date:   {}", receipt.date.as_deref().unwrap_or("-"));

    let money = |v: Option<Decimal>| v.map(|d| format!("${}", d)).unwrap_or_else(|| "-".to_string());
    println!("  Amount: {}", money(receipt.amount));
    println!("  Tax:    {}", money(receipt.tax));
    println!("  Total:  {}", money(receipt.total));

    if !receipt.items.is_empty() {
        println!();
        for item in &receipt.items {
            println!(
                "  {:<32} {:>9}  {}",
                item.description,
                format!("${}", item.price),
                style(item.category).cyan()
            );
        }
    }
}
