//! Line item extraction for receipts.
//!
//! Used for offline itemization only. In the normal flow the backend
//! produces the items and the pipeline leaves them unset.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::receipt::LineItem;

use super::patterns::PRICE_PATTERN;

/// Lines containing any of these words summarize rather than itemize.
const SUMMARY_KEYWORDS: [&str; 4] = ["total", "subtotal", "tax", "balance"];

/// True for totals, tax and balance lines.
pub fn is_summary_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    SUMMARY_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Line item extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineItemExtractor;

impl LineItemExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parse a single line into an item.
    ///
    /// The first price on the line is the item price; every price token is
    /// removed to form the description. Lines left with no description are
    /// skipped.
    pub fn parse_line(&self, line: &str) -> Option<LineItem> {
        if line.trim().is_empty() || is_summary_line(line) {
            return None;
        }

        let caps = PRICE_PATTERN.captures(line)?;
        let price = Decimal::from_str(&caps[1]).ok()?;

        let description = PRICE_PATTERN.replace_all(line, "").trim().to_string();
        if description.is_empty() {
            return None;
        }

        Some(LineItem { description, price })
    }

    /// Extract every item line in order.
    pub fn extract_all(&self, text: &str) -> Vec<LineItem> {
        text.lines().filter_map(|line| self.parse_line(line)).collect()
    }
}

/// Extract line items from receipt text.
pub fn extract_line_items(text: &str) -> Vec<LineItem> {
    LineItemExtractor::new().extract_all(text)
}
