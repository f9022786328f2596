//! Export command - download the backend CSV export.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use futures_util::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use tally_core::{BackendClient, BackendError};

use super::load_config;

/// Arguments for the export command.
#[derive(Args)]
pub struct ExportArgs {
    /// Output file (default: <prefix>_<YYYYMMDD>.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Backend URL (overrides the config file)
    #[arg(long)]
    backend_url: Option<String>,
}

pub async fn run(args: ExportArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(url) = args.backend_url {
        config.backend.url = url;
    }

    let output = args.output.unwrap_or_else(|| {
        let today = chrono::Local::now().date_naive();
        PathBuf::from(export_file_name(&config.export.file_prefix, today))
    });

    let client = BackendClient::new(&config.backend)?;
    let response = match client.export_csv().await {
        Ok(response) => response,
        Err(BackendError::NoReceipts) => {
            anyhow::bail!("The backend has no receipts to export yet. Submit one with 'tally submit'.")
        }
        Err(e) => return Err(e.into()),
    };

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("Downloading export");

    if let Some(content_length) = response.content_length() {
        pb.set_length(content_length);
    }

    let bytes = download(response.bytes_stream(), &output, &pb).await?;
    pb.finish_and_clear();

    println!(
        "{} Exported {} bytes to {}",
        style("✓").green(),
        bytes,
        output.display()
    );

    Ok(())
}

/// Default export name, e.g. `receipts_export_20240315.csv`.
pub fn export_file_name(prefix: &str, date: chrono::NaiveDate) -> String {
    format!("{}_{}.csv", prefix, date.format("%Y%m%d"))
}

/// Stream chunks into `path` through a temporary file.
///
/// The temporary file is removed if any chunk fails.
async fn download<S, B, E>(stream: S, path: &Path, pb: &ProgressBar) -> anyhow::Result<u64>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<anyhow::Error>,
{
    let temp_path = path.with_extension("tmp");

    match write_chunks(stream, &temp_path, pb).await {
        Ok(downloaded) => {
            fs::rename(&temp_path, path)?;
            debug!("Saved export to {}", path.display());
            Ok(downloaded)
        }
        Err(e) => {
            if let Err(remove_err) = fs::remove_file(&temp_path) {
                debug!("Could not remove {}: {}", temp_path.display(), remove_err);
            }
            Err(e)
        }
    }
}

async fn write_chunks<S, B, E>(stream: S, temp_path: &Path, pb: &ProgressBar) -> anyhow::Result<u64>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<anyhow::Error>,
{
    let mut stream = std::pin::pin!(stream);
    let mut file = File::create(temp_path)?;
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::<anyhow::Error>::into)?;
        let chunk = chunk.as_ref();
        file.write_all(chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.flush()?;
    Ok(downloaded)
}
