//! Receipt processing pipeline.
//!
//! Composes preprocessing, recognition and field extraction for a single
//! receipt. A stage failure returns immediately; nothing downstream of the
//! failed stage runs and no partial result is produced.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::config::OcrConfig;
use crate::models::receipt::ExtractedData;
use crate::ocr::{create_engine, AnyEngine, ImagePreprocessor, ImagingRuntime, OcrAdapter, RecognitionEngine};
use crate::receipt::{ReceiptExtractor, RuleBasedExtractor};

/// Everything a successful pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    /// Structured fields.
    pub extracted: ExtractedData,
    /// Text returned by the OCR engine.
    pub raw_text: String,
    /// Dimensions of the decoded image (width, height).
    pub image_size: (u32, u32),
    /// Wall clock time for the whole run.
    pub processing_time_ms: u64,
}

/// Single entry point from raw file bytes to extracted fields.
pub struct ReceiptPipeline<E, X = RuleBasedExtractor> {
    preprocessor: ImagePreprocessor,
    ocr: OcrAdapter<E>,
    extractor: X,
}

impl ReceiptPipeline<AnyEngine> {
    /// Build a pipeline with the configured engine and the default rules.
    pub fn from_config(config: &OcrConfig, runtime: Arc<ImagingRuntime>) -> Result<Self> {
        let ocr = create_engine(config)?;
        Ok(Self::new(runtime, ocr, RuleBasedExtractor::new()))
    }
}

impl<E: RecognitionEngine, X: ReceiptExtractor> ReceiptPipeline<E, X> {
    /// Create a pipeline from its stages.
    pub fn new(runtime: Arc<ImagingRuntime>, ocr: OcrAdapter<E>, extractor: X) -> Self {
        Self {
            preprocessor: ImagePreprocessor::new(runtime),
            ocr,
            extractor,
        }
    }

    /// Replace the field extractor.
    pub fn with_extractor<Y: ReceiptExtractor>(self, extractor: Y) -> ReceiptPipeline<E, Y> {
        ReceiptPipeline {
            preprocessor: self.preprocessor,
            ocr: self.ocr,
            extractor,
        }
    }

    /// Process a receipt and return only the extracted fields.
    pub async fn process_receipt(&self, bytes: &[u8]) -> Result<ExtractedData> {
        self.scan(bytes).await.map(|result| result.extracted)
    }

    /// Process a receipt, keeping the OCR text and timings.
    pub async fn scan(&self, bytes: &[u8]) -> Result<ScanResult> {
        let start = Instant::now();
        info!("Processing receipt ({} bytes)", bytes.len());

        let image = self.preprocessor.preprocess(bytes).await?;
        let image_size = image.dimensions();
        debug!("Preprocessed image: {}x{}", image_size.0, image_size.1);

        let raw_text = self.ocr.recognize(&image).await?;
        drop(image);

        let extracted = self.extractor.extract(&raw_text);
        let processing_time_ms = start.elapsed().as_millis() as u64;

        info!("Receipt processed in {}ms", processing_time_ms);

        Ok(ScanResult {
            extracted,
            raw_text,
            image_size,
            processing_time_ms,
        })
    }
}
