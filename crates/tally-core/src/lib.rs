//! Core library for receipt OCR processing.
//!
//! This crate provides:
//! - Image preprocessing (adaptive thresholding and denoising)
//! - Text recognition through Tesseract or pure Rust ONNX models
//! - Receipt field extraction (date, vendor, total, line items)
//! - A client for the receipt storage and classification backend

pub mod backend;
pub mod error;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod receipt;

pub use backend::{classify_items, BackendClient, ItemClassifier};
pub use error::{BackendError, OcrError, PreprocessError, Result, TallyError};
pub use models::config::{BackendConfig, EngineKind, ExportConfig, OcrConfig, TallyConfig};
pub use models::receipt::{
    Category, ClassifiedItem, ClassifiedReceipt, ExtractedData, LineItem, ReceiptRecord,
};
pub use ocr::{create_engine, ImagePreprocessor, ImagingRuntime, OcrAdapter, ProcessedImage};
pub use pipeline::{ReceiptPipeline, ScanResult};
pub use receipt::{extract, ReceiptExtractor, RuleBasedExtractor};
