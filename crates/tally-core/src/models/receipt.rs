//! Receipt data models shared by the pipeline, the backend client, and the CLI.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Structured fields recovered from a single receipt.
///
/// Every field is independently optional: a missing date never prevents
/// the amount or vendor from being reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedData {
    /// Calendar date token exactly as it appeared in the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Best-guess merchant name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    /// Best-guess total, keeping the two fractional digits from the source.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub amount: Option<Decimal>,

    /// Line items. Reserved for the backend; the pipeline leaves this unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<LineItem>>,
}

impl ExtractedData {
    /// True when no field was recovered.
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.vendor.is_none() && self.amount.is_none() && self.items.is_none()
    }
}

/// A priced line on a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item description with the price removed.
    pub description: String,

    /// Item price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// Spending category assigned to a line item by the classification endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Food,
    Beverage,
    Grocery,
    Household,
    Electronics,
    PersonalCare,
    Clothing,
    #[default]
    Other,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 8] = [
        Category::Food,
        Category::Beverage,
        Category::Grocery,
        Category::Household,
        Category::Electronics,
        Category::PersonalCare,
        Category::Clothing,
        Category::Other,
    ];

    /// Wire label of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "FOOD",
            Category::Beverage => "BEVERAGE",
            Category::Grocery => "GROCERY",
            Category::Household => "HOUSEHOLD",
            Category::Electronics => "ELECTRONICS",
            Category::PersonalCare => "PERSONAL_CARE",
            Category::Clothing => "CLOTHING",
            Category::Other => "OTHER",
        }
    }

    /// Parse a wire label, falling back to `Other` for anything unknown.
    pub fn parse_or_other(label: &str) -> Self {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(label))
            .unwrap_or(Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line item after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedItem {
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub category: Category,
}

impl ClassifiedItem {
    pub fn new(item: LineItem, category: Category) -> Self {
        Self {
            description: item.description,
            price: item.price,
            category,
        }
    }
}

/// Receipt record returned by the backend upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Backend-assigned identifier.
    pub id: u64,

    #[serde(default)]
    pub date: Option<String>,

    #[serde(default)]
    pub vendor: Option<String>,

    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,

    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub tax: Option<Decimal>,

    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub total: Option<Decimal>,

    /// Items in receipt order, without categories.
    #[serde(default)]
    pub items: Vec<LineItem>,

    /// OCR text the backend recognized, if it echoes it back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Backend timestamp, if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A backend record whose items carry categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedReceipt {
    pub id: u64,
    pub date: Option<String>,
    pub vendor: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub tax: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub total: Option<Decimal>,
    pub items: Vec<ClassifiedItem>,
}

impl ClassifiedReceipt {
    /// Attach categories to a record. `categories` must follow item order.
    pub fn from_record(record: ReceiptRecord, categories: Vec<Category>) -> Self {
        let items = record
            .items
            .into_iter()
            .zip(categories.into_iter().chain(std::iter::repeat(Category::Other)))
            .map(|(item, category)| ClassifiedItem::new(item, category))
            .collect();

        Self {
            id: record.id,
            date: record.date,
            vendor: record.vendor,
            amount: record.amount,
            tax: record.tax,
            total: record.total,
            items,
        }
    }
}
