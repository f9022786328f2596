//! Client for the receipt backend.
//!
//! The backend stores uploaded receipts, classifies line items, and renders
//! the CSV export. Only its HTTP contract lives here:
//!
//! - `POST /upload`: multipart `file`, plus optional `text`, `date`,
//!   `vendor` and `amount` fields; answers with a [`ReceiptRecord`].
//! - `POST /classify-item`: `{"description": ...}`; answers with
//!   `{"category": ...}`.
//! - `GET /export-csv`: CSV bytes, or 404 when nothing is stored.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::BackendError;
use crate::models::config::BackendConfig;
use crate::models::receipt::{Category, ClassifiedItem, LineItem, ReceiptRecord};
use crate::pipeline::ScanResult;

const UPLOAD_ENDPOINT: &str = "/upload";
const CLASSIFY_ENDPOINT: &str = "/classify-item";
const EXPORT_ENDPOINT: &str = "/export-csv";

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    category: String,
}

/// Assigns a spending category to an item description.
#[allow(async_fn_in_trait)]
pub trait ItemClassifier {
    async fn classify(&self, description: &str) -> Result<Category, BackendError>;
}

/// HTTP client for the receipt backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    /// Create a client for the configured backend.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Upload the original file, with the local extraction when available.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        scan: Option<&ScanResult>,
    ) -> Result<ReceiptRecord, BackendError> {
        info!("Uploading {} ({} bytes)", file_name, bytes.len());

        let mut form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        if let Some(scan) = scan {
            form = form.text("text", scan.raw_text.clone());
            let extracted = &scan.extracted;
            if let Some(date) = &extracted.date {
                form = form.text("date", date.clone());
            }
            if let Some(vendor) = &extracted.vendor {
                form = form.text("vendor", vendor.clone());
            }
            if let Some(amount) = extracted.amount {
                form = form.text("amount", amount.to_string());
            }
        }

        let response = self
            .client
            .post(self.url(UPLOAD_ENDPOINT))
            .multipart(form)
            .send()
            .await?;
        let body = check_status(UPLOAD_ENDPOINT, response).await?.text().await?;

        let record: ReceiptRecord = serde_json::from_str(&body)
            .map_err(|e| BackendError::InvalidResponse(format!("upload: {}", e)))?;
        debug!("Backend stored receipt {} with {} items", record.id, record.items.len());
        Ok(record)
    }

    /// Ask the backend for the category of one item.
    pub async fn classify_item(&self, description: &str) -> Result<Category, BackendError> {
        let response = self
            .client
            .post(self.url(CLASSIFY_ENDPOINT))
            .json(&ClassifyRequest { description })
            .send()
            .await?;
        let body = check_status(CLASSIFY_ENDPOINT, response).await?.text().await?;

        let parsed: ClassifyResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::InvalidResponse(format!("classify-item: {}", e)))?;
        Ok(Category::parse_or_other(&parsed.category))
    }

    /// Start the CSV export. The response body is left for the caller to
    /// stream.
    pub async fn export_csv(&self) -> Result<Response, BackendError> {
        let response = self.client.get(self.url(EXPORT_ENDPOINT)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::NoReceipts);
        }
        check_status(EXPORT_ENDPOINT, response).await
    }
}

impl ItemClassifier for BackendClient {
    async fn classify(&self, description: &str) -> Result<Category, BackendError> {
        self.classify_item(description).await
    }
}

async fn check_status(endpoint: &str, response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Classify every item, in order.
///
/// A failed classification is logged and the item falls back to
/// [`Category::Other`]; the receipt itself never fails here.
pub async fn classify_items<C: ItemClassifier>(
    classifier: &C,
    items: &[LineItem],
) -> Vec<ClassifiedItem> {
    let mut classified = Vec::with_capacity(items.len());

    for item in items {
        let category = match classifier.classify(&item.description).await {
            Ok(category) => category,
            Err(e) => {
                warn!("Failed to classify {:?}: {}", item.description, e);
                Category::Other
            }
        };
        classified.push(ClassifiedItem::new(item.clone(), category));
    }

    classified
}
