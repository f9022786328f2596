//! Parse command - run field extraction on OCR text.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use clap::Args;

use tally_core::{ReceiptExtractor, RuleBasedExtractor};

use super::{format_extraction, OutputFormat};

/// Arguments for the parse command.
#[derive(Args)]
pub struct ParseArgs {
    /// Text file with OCR output, or "-" for stdin
    input: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also extract priced line items
    #[arg(long)]
    itemize: bool,
}

pub async fn run(args: ParseArgs) -> anyhow::Result<()> {
    let text = match &args.input {
        Some(path) if path.as_os_str() != "-" => {
            if !path.exists() {
                anyhow::bail!("Input file not found: {}", path.display());
            }
            fs::read_to_string(path)?
        }
        _ => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    let extractor = RuleBasedExtractor::new().with_line_items(args.itemize);
    let data = extractor.extract(&text);

    println!("{}", format_extraction(&data, args.format)?.trim_end());

    Ok(())
}
