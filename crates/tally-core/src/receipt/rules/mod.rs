//! Rule-based field extractors for receipts.
//!
//! Each extractor scans the text for every candidate in reading order
//! (`extract_all`) and a [`Precedence`] decides which candidate wins
//! (`extract`). The scanning and the policy are tested separately.

pub mod amounts;
pub mod dates;
pub mod items;
pub mod patterns;
pub mod vendor;

pub use amounts::{parse_amount, AmountExtractor};
pub use dates::DateExtractor;
pub use items::{extract_line_items, is_summary_line, LineItemExtractor};
pub use patterns::*;
pub use vendor::VendorExtractor;

/// Which candidate an extractor reports when several match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    /// The first match in reading order.
    First,
    /// The last match in reading order.
    Last,
}

impl Precedence {
    /// Pick one candidate from matches listed in reading order.
    pub fn select<T>(self, candidates: Vec<T>) -> Option<T> {
        match self {
            Precedence::First => candidates.into_iter().next(),
            Precedence::Last => candidates.into_iter().last(),
        }
    }
}

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Selection policy applied by [`extract`](FieldExtractor::extract).
    fn precedence(&self) -> Precedence;

    /// Extract all occurrences of the field, in reading order.
    fn extract_all(&self, text: &str) -> Vec<ExtractionMatch<Self::Output>>;

    /// Extract the field according to the extractor's precedence.
    fn extract(&self, text: &str) -> Option<ExtractionMatch<Self::Output>> {
        self.precedence().select(self.extract_all(text))
    }
}

/// A value found in the text, with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Byte range in the source text.
    pub position: (usize, usize),
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, source: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            value,
            position: (start, end),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_select() {
        assert_eq!(Precedence::First.select(vec![1, 2, 3]), Some(1));
        assert_eq!(Precedence::Last.select(vec![1, 2, 3]), Some(3));
        assert_eq!(Precedence::First.select(Vec::<i32>::new()), None);
        assert_eq!(Precedence::Last.select(Vec::<i32>::new()), None);
    }
}
