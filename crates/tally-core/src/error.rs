//! Error types for the tally-core library.

use std::time::Duration;

use thiserror::Error;

/// Main error type for the tally library.
#[derive(Error, Debug)]
pub enum TallyError {
    /// Image preprocessing error.
    #[error("preprocessing error: {0}")]
    Preprocess(#[from] PreprocessError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Receipt backend error.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while turning uploaded bytes into a binarized image.
#[derive(Error, Debug)]
pub enum PreprocessError {
    /// The input bytes are not a decodable image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The imaging runtime failed to initialize or a filter failed.
    #[error("image processing failed: {0}")]
    Processing(String),
}

/// Errors related to text recognition.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The recognition engine could not be started.
    #[error("failed to start OCR engine: {0}")]
    Init(String),

    /// Recognition did not finish within the configured bound.
    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),

    /// Any other failure reported by the engine.
    #[error("OCR engine failed: {0}")]
    Engine(String),
}

/// Errors returned by the receipt backend client.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The backend answered with a body we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The export endpoint reported that nothing is stored yet.
    #[error("no receipts to export")]
    NoReceipts,
}

/// Result type for the tally library.
pub type Result<T> = std::result::Result<T, TallyError>;
