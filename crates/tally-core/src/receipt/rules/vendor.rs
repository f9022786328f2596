//! Vendor name extraction for receipts.

use super::{ExtractionMatch, FieldExtractor, Precedence};

/// Vendor field extractor.
///
/// Receipts print the merchant name as the first printed line, so the
/// first non-blank line, trimmed, is reported verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct VendorExtractor;

impl VendorExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FieldExtractor for VendorExtractor {
    type Output = String;

    fn precedence(&self) -> Precedence {
        Precedence::First
    }

    fn extract_all(&self, text: &str) -> Vec<ExtractionMatch<String>> {
        let mut offset = 0;
        let mut results = Vec::new();

        for line in text.split('\n') {
            let start = offset;
            offset += line.len() + 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let lead = line.len() - line.trim_start().len();
            results.push(ExtractionMatch::new(
                trimmed.to_string(),
                trimmed,
                start + lead,
                start + lead + trimmed.len(),
            ));
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_blank_line() {
        let extractor = VendorExtractor::new();

        let result = extractor.extract("\nWALMART\n123 Main St\nItem $5.99").unwrap();
        assert_eq!(result.value, "WALMART");
        assert_eq!(result.position, (1, 8));
    }

    #[test]
    fn test_indented_lines_are_trimmed() {
        let extractor = VendorExtractor::new();
        let text = "\n      WALMART\n      123 Main St\n";

        assert_eq!(extractor.extract(text).unwrap().value, "WALMART");
        assert_eq!(extractor.extract_all(text).len(), 2);
    }

    #[test]
    fn test_crlf_lines() {
        let extractor = VendorExtractor::new();
        assert_eq!(
            extractor.extract("\r\n  \r\nTRADER JOE'S\r\n").unwrap().value,
            "TRADER JOE'S"
        );
    }

    #[test]
    fn test_blank_text_has_no_vendor() {
        let extractor = VendorExtractor::new();

        assert!(extractor.extract("").is_none());
        assert!(extractor.extract(" \n\t\n  ").is_none());
    }
}
