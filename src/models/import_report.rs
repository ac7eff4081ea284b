//! Bulk book import request and report

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Batch of book records, either inline or as base64-encoded JSON array
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BulkImportRequest {
    #[schema(value_type = Option<Vec<Object>>)]
    pub records: Option<Vec<serde_json::Value>>,
    /// Base64 of a JSON array of book records
    pub payload_b64: Option<String>,
}

/// A record that could not be imported
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ImportError {
    /// Position of the record in the submitted batch
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    pub message: String,
}

/// Outcome of a bulk import; records are inserted independently
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BulkImportReport {
    pub created_ids: Vec<i32>,
    #[serde(default)]
    pub errors: Vec<ImportError>,
}
