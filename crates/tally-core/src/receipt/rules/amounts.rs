//! Amount extraction for receipts.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::AMOUNT_PATTERN;
use super::{ExtractionMatch, FieldExtractor, Precedence};

/// Amount field extractor.
///
/// The grand total is printed after the itemized lines, so the last
/// amount-shaped token is reported. Labels such as TOTAL or TAX are not
/// interpreted; a change-due line printed after the total wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmountExtractor;

impl AmountExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = Decimal;

    fn precedence(&self) -> Precedence {
        Precedence::Last
    }

    fn extract_all(&self, text: &str) -> Vec<ExtractionMatch<Decimal>> {
        AMOUNT_PATTERN
            .find_iter(text)
            .filter_map(|m| {
                parse_amount(m.as_str())
                    .map(|amount| ExtractionMatch::new(amount, m.as_str(), m.start(), m.end()))
            })
            .collect()
    }
}

/// Parse an amount token such as `"$ 12.50"`.
///
/// The dollar sign and surrounding whitespace are dropped; the scale of the
/// digits is kept, so `"5.90"` parses to a decimal with two fractional digits.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned = s.trim().trim_start_matches('$').trim();
    Decimal::from_str(cleaned).ok()
}
