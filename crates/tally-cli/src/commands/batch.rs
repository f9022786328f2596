//! Batch processing command for multiple receipt images.
//!
//! Successful receipts are appended to a [`ReceiptLedger`]; a receipt whose
//! pipeline fails is reported and leaves the ledger untouched.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use tracing::{debug, error, warn};

use tally_core::models::receipt::ExtractedData;

use super::{build_pipeline, is_image_path, load_config, EngineArg};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for receipt images
    #[arg(required = true)]
    input: String,

    /// Output directory for per-receipt JSON and the combined CSV
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the receipt table when done
    #[arg(long)]
    summary: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    /// Also extract priced line items
    #[arg(long)]
    itemize: bool,

    /// OCR engine (overrides the config file)
    #[arg(short, long, value_enum)]
    engine: Option<EngineArg>,
}

/// A receipt accepted into the ledger.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: u64,
    pub source: PathBuf,
    pub data: ExtractedData,
}

/// Running table of successfully processed receipts.
#[derive(Debug, Default)]
pub struct ReceiptLedger {
    entries: Vec<LedgerEntry>,
}

impl ReceiptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pipeline result. Errors are handed back and nothing is
    /// recorded for them.
    pub fn record<E>(
        &mut self,
        source: &Path,
        result: Result<ExtractedData, E>,
    ) -> Result<u64, E> {
        let data = result?;
        let id = self.entries.len() as u64 + 1;
        self.entries.push(LedgerEntry {
            id,
            source: source.to_path_buf(),
            data,
        });
        Ok(id)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the recognized amounts.
    pub fn total(&self) -> Decimal {
        self.entries.iter().filter_map(|e| e.data.amount).sum()
    }

    /// Write the table as CSV, one row per line item.
    ///
    /// Receipts without items get a single row with empty item columns.
    pub fn write_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        wtr.write_record(["Receipt ID", "Date", "Vendor", "Amount", "Item", "Price"])?;

        for entry in &self.entries {
            let id = entry.id.to_string();
            let date = entry.data.date.clone().unwrap_or_default();
            let vendor = entry.data.vendor.clone().unwrap_or_default();
            let amount = entry.data.amount.map(|a| a.to_string()).unwrap_or_default();

            match entry.data.items.as_deref() {
                Some(items) if !items.is_empty() => {
                    for item in items {
                        wtr.write_record([
                            id.as_str(),
                            date.as_str(),
                            vendor.as_str(),
                            amount.as_str(),
                            item.description.as_str(),
                            &item.price.to_string(),
                        ])?;
                    }
                }
                _ => wtr.write_record([
                    id.as_str(),
                    date.as_str(),
                    vendor.as_str(),
                    amount.as_str(),
                    "",
                    "",
                ])?,
            }
        }

        wtr.flush()?;
        Ok(())
    }
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(engine) = args.engine {
        config.ocr.engine = engine.into();
    }

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_image_path(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} receipts to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} receipts")?
            .progress_chars("=>-"),
    );

    let pipeline = build_pipeline(&config, args.itemize)?;
    let mut ledger = ReceiptLedger::new();
    let mut failed: Vec<(PathBuf, String)> = Vec::new();

    for path in files {
        let result = match fs::read(&path) {
            Ok(bytes) => pipeline.process_receipt(&bytes).await.map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };

        match ledger.record(&path, result) {
            Ok(id) => {
                debug!("Recorded {} as receipt {}", path.display(), id);
                if let Some(output_dir) = &args.output_dir {
                    write_receipt_json(output_dir, &ledger)?;
                }
            }
            Err(e) => {
                if args.continue_on_error {
                    warn!("Failed to process {}: {:#}", path.display(), e);
                    failed.push((path, format!("{:#}", e)));
                } else {
                    pb.abandon();
                    error!("Failed to process {}: {:#}", path.display(), e);
                    anyhow::bail!("Processing failed for {}: {:#}", path.display(), e);
                }
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    let csv_path = args
        .output_dir
        .as_ref()
        .map(|d| d.join("receipts.csv"))
        .unwrap_or_else(|| PathBuf::from("receipts.csv"));
    ledger.write_csv(fs::File::create(&csv_path)?)?;
    println!(
        "{} Receipt table written to {}",
        style("✓").green(),
        csv_path.display()
    );

    if args.summary {
        if ledger.is_empty() {
            println!("{} No receipts were recognized", style("!").yellow());
        } else {
            print_table(&ledger);
        }
    }

    println!();
    println!(
        "{} Processed {} receipts in {:?}",
        style("✓").green(),
        ledger.len() + failed.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(ledger.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed receipts:").red());
        for (path, error) in &failed {
            println!("  - {}: {}", path.display(), error);
        }
    }

    Ok(())
}

/// Write the most recent ledger entry next to the combined table.
fn write_receipt_json(output_dir: &Path, ledger: &ReceiptLedger) -> anyhow::Result<()> {
    let Some(entry) = ledger.entries().last() else {
        return Ok(());
    };

    // `<id>_<file name>.json`, so `a.png` and `a.jpg` never share a file.
    let name = entry
        .source
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("receipt");
    let output_path = output_dir.join(format!("{}_{}.json", entry.id, name));

    fs::write(&output_path, serde_json::to_string_pretty(&entry.data)?)?;
    debug!("Wrote output to {}", output_path.display());
    Ok(())
}

fn print_table(ledger: &ReceiptLedger) {
    println!();
    println!(
        "{}",
        style(format!("{:>4}  {:<12} {:<28} {:>10}", "ID", "Date", "Vendor", "Amount")).bold()
    );

    for entry in ledger.entries() {
        let amount = entry
            .data
            .amount
            .map(|a| format!("${}", a))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4}  {:<12} {:<28} {:>10}",
            entry.id,
            entry.data.date.as_deref().unwrap_or("-"),
            truncate(entry.data.vendor.as_deref().unwrap_or("-"), 28),
            amount
        );
    }

    println!(
        "{}",
        style(format!("{:>4}  {:<12} {:<28} {:>10}", "", "", "Total", format!("${}", ledger.total()))).bold()
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tally_core::LineItem;

    fn receipt(vendor: &str, amount: &str) -> ExtractedData {
        ExtractedData {
            vendor: Some(vendor.to_string()),
            amount: Some(Decimal::from_str(amount).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_failed_receipt_does_not_mutate_ledger() {
        let mut ledger = ReceiptLedger::new();

        assert_eq!(ledger.record(Path::new("a.png"), Ok::<_, String>(receipt("A", "1.50"))), Ok(1));
        assert!(ledger.record(Path::new("b.png"), Err("OCR timed out".to_string())).is_err());
        assert_eq!(ledger.record(Path::new("c.png"), Ok::<_, String>(receipt("C", "2.25"))), Ok(2));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.entries()[1].source, PathBuf::from("c.png"));
        assert_eq!(ledger.total(), Decimal::from_str("3.75").unwrap());
    }

    #[test]
    fn test_same_stem_receipts_get_separate_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ReceiptLedger::new();

        ledger.record(Path::new("scans/a.png"), Ok::<_, String>(receipt("PNG SHOP", "1.50"))).unwrap();
        write_receipt_json(dir.path(), &ledger).unwrap();
        ledger.record(Path::new("scans/a.jpg"), Ok::<_, String>(receipt("JPG SHOP", "2.25"))).unwrap();
        write_receipt_json(dir.path(), &ledger).unwrap();

        let png = fs::read_to_string(dir.path().join("1_a.png.json")).unwrap();
        let jpg = fs::read_to_string(dir.path().join("2_a.jpg.json")).unwrap();
        assert!(png.contains("PNG SHOP"));
        assert!(jpg.contains("JPG SHOP"));
    }

    #[test]
    fn test_csv_rows_per_item() {
        let mut ledger = ReceiptLedger::new();
        let mut with_items = receipt("SHOP", "9.98");
        with_items.date = Some("03/15/2024".to_string());
        with_items.items = Some(vec![
            LineItem {
                description: "Milk".to_string(),
                price: Decimal::from_str("3.99").unwrap(),
            },
            LineItem {
                description: "Bread".to_string(),
                price: Decimal::from_str("5.99").unwrap(),
            },
        ]);
        ledger.record(Path::new("a.png"), Ok::<_, String>(with_items)).unwrap();
        ledger.record(Path::new("b.png"), Ok::<_, String>(receipt("KIOSK", "1.00"))).unwrap();

        let mut buf = Vec::new();
        ledger.write_csv(&mut buf).unwrap();
        let csv = String::from_utf8(buf).unwrap();

        assert_eq!(
            csv,
            "Receipt ID,Date,Vendor,Amount,Item,Price\n\
             1,03/15/2024,SHOP,9.98,Milk,3.99\n\
             1,03/15/2024,SHOP,9.98,Bread,5.99\n\
             2,,KIOSK,1.00,,\n"
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long vendor name", 6), "a ver…");
    }
}
