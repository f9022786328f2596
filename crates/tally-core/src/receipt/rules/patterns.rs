//! Regex patterns for receipt field extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Numeric dates: 3/15/24, 03-15-2024. No calendar validation.
    // Word boundaries are ASCII-only, so OCR noise such as `é` next to a
    // token does not hide it.
    pub static ref DATE_PATTERN: Regex = Regex::new(
        r"(?-u:\b)[0-9]{1,2}[-/][0-9]{1,2}[-/](?:[0-9]{2}|[0-9]{4})(?-u:\b)"
    ).unwrap();

    // Dollar amounts with exactly two decimals: $5.99, $ 12.00, 9.98
    pub static ref AMOUNT_PATTERN: Regex = Regex::new(
        r"\$?\s*[0-9]{1,10}\.[0-9]{2}(?-u:\b)"
    ).unwrap();

    // Price on an item line, digits captured
    pub static ref PRICE_PATTERN: Regex = Regex::new(
        r"\$?\s*([0-9]+\.[0-9]{2})"
    ).unwrap();
}
