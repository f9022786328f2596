//! Receipt field extraction module.

mod parser;
pub mod rules;

pub use parser::{extract, RuleBasedExtractor};

use crate::models::receipt::ExtractedData;

/// Trait for receipt field extractors.
///
/// Extraction is total: a field that cannot be found is left unset and
/// never turns into an error.
pub trait ReceiptExtractor {
    /// Extract structured fields from raw OCR text.
    fn extract(&self, text: &str) -> ExtractedData;
}
