//! Rule-based receipt parser.

use tracing::debug;

use crate::models::receipt::ExtractedData;

use super::rules::{
    AmountExtractor, DateExtractor, FieldExtractor, LineItemExtractor, VendorExtractor,
};
use super::ReceiptExtractor;

/// Receipt parser applying the date, amount and vendor rules independently.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedExtractor {
    dates: DateExtractor,
    amounts: AmountExtractor,
    vendor: VendorExtractor,
    /// Itemize lines locally instead of leaving items to the backend.
    line_items: Option<LineItemExtractor>,
}

impl RuleBasedExtractor {
    /// Create a parser that leaves `items` unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable local line item extraction.
    pub fn with_line_items(mut self, enabled: bool) -> Self {
        self.line_items = enabled.then(LineItemExtractor::new);
        self
    }
}

impl ReceiptExtractor for RuleBasedExtractor {
    fn extract(&self, text: &str) -> ExtractedData {
        let date = self.dates.extract(text).map(|m| m.value);
        let amount = self.amounts.extract(text).map(|m| m.value);
        let vendor = self.vendor.extract(text).map(|m| m.value);

        let items = self
            .line_items
            .as_ref()
            .map(|extractor| extractor.extract_all(text))
            .filter(|items| !items.is_empty());

        debug!(
            "Extracted date={:?} vendor={:?} amount={:?} items={}",
            date,
            vendor,
            amount,
            items.as_ref().map_or(0, |i| i.len())
        );

        ExtractedData {
            date,
            vendor,
            amount,
            items,
        }
    }
}

/// Extract receipt fields with the default rules.
pub fn extract(text: &str) -> ExtractedData {
    RuleBasedExtractor::new().extract(text)
}
