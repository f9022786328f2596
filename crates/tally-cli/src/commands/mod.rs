//! Subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod export;
pub mod parse;
pub mod scan;
pub mod submit;

use std::path::{Path, PathBuf};

use tracing::debug;

use tally_core::models::config::{EngineKind, TallyConfig};
use tally_core::models::receipt::ExtractedData;
use tally_core::ocr::{AnyEngine, ImagingRuntime};
use tally_core::{ReceiptPipeline, RuleBasedExtractor};

/// Image extensions accepted by `scan`, `batch` and `submit`.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "tiff", "tif", "bmp", "gif"];

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

/// OCR engine selectable on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum EngineArg {
    /// Tesseract command line tool
    Tesseract,
    /// Bundled ONNX models
    Onnx,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Tesseract => EngineKind::Tesseract,
            EngineArg::Onnx => EngineKind::Onnx,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally")
        .join("config.json")
}

/// Load the explicit config file, else the default one, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<TallyConfig> {
    if let Some(path) = config_path {
        return Ok(TallyConfig::from_file(Path::new(path))?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Loading config from {}", default_path.display());
        Ok(TallyConfig::from_file(&default_path)?)
    } else {
        Ok(TallyConfig::default())
    }
}

/// Build the receipt pipeline for a command.
pub fn build_pipeline(
    config: &TallyConfig,
    itemize: bool,
) -> anyhow::Result<ReceiptPipeline<AnyEngine>> {
    let runtime = std::sync::Arc::new(ImagingRuntime::new());
    let pipeline = ReceiptPipeline::from_config(&config.ocr, runtime)?
        .with_extractor(RuleBasedExtractor::new().with_line_items(itemize));
    Ok(pipeline)
}

/// Fail early with a readable message when the input is not a usable image path.
pub fn check_image_path(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    Ok(())
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn format_extraction(data: &ExtractedData, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(data)?),
        OutputFormat::Csv => format_csv(data),
        OutputFormat::Text => Ok(format_text(data)),
    }
}

fn format_csv(data: &ExtractedData) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["date", "vendor", "amount", "item", "price"])?;

    let date = data.date.clone().unwrap_or_default();
    let vendor = data.vendor.clone().unwrap_or_default();
    let amount = data.amount.map(|a| a.to_string()).unwrap_or_default();

    match data.items.as_deref() {
        Some(items) if !items.is_empty() => {
            for item in items {
                wtr.write_record([
                    date.as_str(),
                    vendor.as_str(),
                    amount.as_str(),
                    item.description.as_str(),
                    &item.price.to_string(),
                ])?;
            }
        }
        _ => wtr.write_record([date.as_str(), vendor.as_str(), amount.as_str(), "", ""])?,
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(data: &ExtractedData) -> String {
    let mut output = String::new();

    let unknown = "-".to_string();
    output.push_str(&format!("Vendor: {}\n", data.vendor.as_ref().unwrap_or(&unknown)));
    output.push_str(&format!("Date:   {}\n", data.date.as_ref().unwrap_or(&unknown)));
    output.push_str(&format!(
        "Amount: {}\n",
        data.amount.map(|a| format!("${}", a)).unwrap_or(unknown)
    ));

    if let Some(items) = &data.items {
        output.push_str("\nItems:\n");
        for item in items {
            output.push_str(&format!("  {:<32} ${}\n", item.description, item.price));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tally_core::LineItem;

    fn sample() -> ExtractedData {
        ExtractedData {
            date: Some("03/15/2024".to_string()),
            vendor: Some("WALMART".to_string()),
            amount: Some(Decimal::from_str("9.98").unwrap()),
            items: None,
        }
    }

    #[test]
    fn test_json_skips_missing_fields() {
        let data = ExtractedData {
            vendor: Some("SHOP".to_string()),
            ..Default::default()
        };
        assert_eq!(format_extraction(&data, OutputFormat::Json).unwrap(), r#"{"vendor":"SHOP"}"#);
    }

    #[test]
    fn test_csv_one_row_per_item() {
        let mut data = sample();
        data.items = Some(vec![
            LineItem {
                description: "Milk".to_string(),
                price: Decimal::from_str("3.99").unwrap(),
            },
            LineItem {
                description: "Bread".to_string(),
                price: Decimal::from_str("5.99").unwrap(),
            },
        ]);

        let csv = format_extraction(&data, OutputFormat::Csv).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "date,vendor,amount,item,price");
        assert_eq!(lines[2], "03/15/2024,WALMART,9.98,Bread,5.99");
    }

    #[test]
    fn test_text_marks_missing_fields() {
        let text = format_extraction(&ExtractedData::default(), OutputFormat::Text).unwrap();
        assert!(text.contains("Vendor: -"));
        assert!(text.contains("Amount: -"));
    }

    #[test]
    fn test_image_extensions() {
        assert!(is_image_path(Path::new("a/receipt.JPG")));
        assert!(is_image_path(Path::new("scan.png")));
        assert!(!is_image_path(Path::new("notes.txt")));
        assert!(!is_image_path(Path::new("noext")));
    }
}
