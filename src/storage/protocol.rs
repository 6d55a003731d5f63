//! Record API Protocol
//!
//! Route paths and the JSON envelopes returned by the record CRUD and bulk
//! import endpoints.

use super::types::{Record, RecordInput};
use serde::{Deserialize, Serialize};

pub const ENDPOINT_RECORDS: &str = "/records";
pub const ENDPOINT_RECORD: &str = "/records/:id";
pub const ENDPOINT_IMPORT: &str = "/records/import";

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordListResponse {
    pub success: bool,
    pub records: Vec<Record>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub records: Vec<RecordInput>,
}

/// An input that was refused during a bulk import, by position in the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRejection {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: Vec<Record>,
    pub rejected: Vec<ImportRejection>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportResponse {
    pub success: bool,
    pub imported: usize,
    pub rejected: Vec<ImportRejection>,
}
