//! Date extraction for receipts.

use super::patterns::DATE_PATTERN;
use super::{ExtractionMatch, FieldExtractor, Precedence};

/// Date field extractor.
///
/// Reports the first date-shaped token verbatim; the token is not
/// normalized or checked against the calendar.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FieldExtractor for DateExtractor {
    type Output = String;

    fn precedence(&self) -> Precedence {
        Precedence::First
    }

    fn extract_all(&self, text: &str) -> Vec<ExtractionMatch<String>> {
        DATE_PATTERN
            .find_iter(text)
            .map(|m| ExtractionMatch::new(m.as_str().to_string(), m.as_str(), m.start(), m.end()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_date_verbatim() {
        let extractor = DateExtractor::new();

        let result = extractor.extract("STORE\n03/15/2024\nItem $5.99").unwrap();
        assert_eq!(result.value, "03/15/2024");
        assert_eq!(result.position, (6, 16));
    }

    #[test]
    fn test_short_and_dashed_forms() {
        let extractor = DateExtractor::new();

        assert_eq!(extractor.extract("on 3-5-24 at noon").unwrap().value, "3-5-24");
        assert_eq!(extractor.extract("1/2/2023").unwrap().value, "1/2/2023");
    }

    #[test]
    fn test_first_date_wins() {
        let extractor = DateExtractor::new();
        let text = "Sale 01/02/2024\nReturn by 02/01/2024";

        assert_eq!(extractor.extract_all(text).len(), 2);
        assert_eq!(extractor.extract(text).unwrap().value, "01/02/2024");
    }

    #[test]
    fn test_no_calendar_validation() {
        let extractor = DateExtractor::new();
        assert_eq!(extractor.extract("99/99/99").unwrap().value, "99/99/99");
    }

    #[test]
    fn test_non_ascii_neighbor_is_a_boundary() {
        let extractor = DateExtractor::new();

        assert_eq!(extractor.extract("é03/15/2024").unwrap().value, "03/15/2024");
        assert_eq!(extractor.extract("Dateé03/15/2024ü").unwrap().value, "03/15/2024");
        assert!(extractor.extract("x03/15/2024").is_none());
    }

    #[test]
    fn test_rejects_non_dates() {
        let extractor = DateExtractor::new();

        assert!(extractor.extract("TOTAL $9.98").is_none());
        assert!(extractor.extract("03.15.2024").is_none());
        assert!(extractor.extract("2024/03/15").is_none());
        assert!(extractor.extract("03/15/202").is_none());
    }
}
