//! OCR engine wrapping the `tesseract` command-line tool.

use std::io::ErrorKind;
use std::path::Path;

use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use crate::error::OcrError;

use super::engine::{RecognitionEngine, RecognitionSession};
use super::preprocessing::ProcessedImage;

/// Tesseract engine configuration.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: String,
    language: String,
    page_segmentation_mode: Option<u8>,
}

impl TesseractEngine {
    /// Create an engine that runs `command` with the given language.
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
            page_segmentation_mode: None,
        }
    }

    /// Pass `--psm` to tesseract.
    pub fn with_page_segmentation_mode(mut self, psm: u8) -> Self {
        self.page_segmentation_mode = Some(psm);
        self
    }
}

impl RecognitionEngine for TesseractEngine {
    type Session = TesseractSession;

    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn open_session(&self) -> Result<TesseractSession, OcrError> {
        let output = Command::new(&self.command)
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    OcrError::Init(format!("`{}` not found on PATH", self.command))
                }
                _ => OcrError::Init(format!("cannot run `{}`: {}", self.command, e)),
            })?;

        if !output.status.success() {
            return Err(OcrError::Init(format!(
                "`{} --version` exited with {}",
                self.command, output.status
            )));
        }

        let workdir = tempfile::Builder::new()
            .prefix("tally-ocr")
            .tempdir()
            .map_err(|e| OcrError::Init(format!("cannot create session directory: {}", e)))?;

        debug!("Tesseract session directory: {}", workdir.path().display());

        Ok(TesseractSession {
            command: self.command.clone(),
            language: self.language.clone(),
            page_segmentation_mode: self.page_segmentation_mode,
            workdir,
        })
    }
}

/// One tesseract run with its private scratch directory.
///
/// The directory is removed when the session is dropped; a child process
/// still running at that point is killed.
#[derive(Debug)]
pub struct TesseractSession {
    command: String,
    language: String,
    page_segmentation_mode: Option<u8>,
    workdir: TempDir,
}

impl TesseractSession {
    /// Scratch directory owned by this session.
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }
}

impl RecognitionSession for TesseractSession {
    async fn recognize(&mut self, image: &ProcessedImage) -> Result<String, OcrError> {
        let input_path = self.workdir.path().join("input.png");
        let png = image
            .to_png_bytes()
            .map_err(|e| OcrError::Engine(e.to_string()))?;
        tokio::fs::write(&input_path, png)
            .await
            .map_err(|e| OcrError::Engine(format!("cannot write tesseract input: {}", e)))?;

        let mut command = Command::new(&self.command);
        command
            .arg(&input_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language);
        if let Some(psm) = self.page_segmentation_mode {
            command.arg("--psm").arg(psm.to_string());
        }

        let output = command
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| OcrError::Engine(format!("cannot run tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Drop for TesseractSession {
    fn drop(&mut self) {
        debug!("Closing tesseract session {}", self.workdir.path().display());
    }
}
