use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::memory::MemoryRecordStore;
use super::protocol::{
    DeleteResponse, ImportRequest, ImportResponse, RecordListResponse, RecordResponse,
};
use super::types::RecordInput;
use super::RecordStore;
use crate::error::SearchError;

pub async fn handle_list_records(
    Extension(store): Extension<Arc<MemoryRecordStore>>,
) -> (StatusCode, Json<RecordListResponse>) {
    let records = store.snapshot();
    (
        StatusCode::OK,
        Json(RecordListResponse {
            success: true,
            count: records.len(),
            records,
        }),
    )
}

pub async fn handle_get_record(
    Extension(store): Extension<Arc<MemoryRecordStore>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<RecordResponse>) {
    match store.get(&id) {
        Some(record) => (StatusCode::OK, Json(found(record))),
        None => not_found(&id),
    }
}

pub async fn handle_create_record(
    Extension(store): Extension<Arc<MemoryRecordStore>>,
    body: Result<Json<RecordInput>, JsonRejection>,
) -> (StatusCode, Json<RecordResponse>) {
    let input = match body {
        Ok(Json(input)) => input,
        Err(rejection) => return failure(rejection.into()),
    };
    match store.create(input) {
        Ok(record) => {
            tracing::info!("Created record {}", record.id);
            (StatusCode::CREATED, Json(found(record)))
        }
        Err(e) => failure(e),
    }
}

pub async fn handle_update_record(
    Extension(store): Extension<Arc<MemoryRecordStore>>,
    Path(id): Path<String>,
    body: Result<Json<RecordInput>, JsonRejection>,
) -> (StatusCode, Json<RecordResponse>) {
    let input = match body {
        Ok(Json(input)) => input,
        Err(rejection) => return failure(rejection.into()),
    };
    match store.update(&id, input) {
        Ok(Some(record)) => (StatusCode::OK, Json(found(record))),
        Ok(None) => not_found(&id),
        Err(e) => failure(e),
    }
}

pub async fn handle_delete_record(
    Extension(store): Extension<Arc<MemoryRecordStore>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<DeleteResponse>) {
    let deleted = store.delete(&id);
    let status = if deleted {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    (
        status,
        Json(DeleteResponse {
            success: deleted,
            deleted,
        }),
    )
}

pub async fn handle_import_records(
    Extension(store): Extension<Arc<MemoryRecordStore>>,
    body: Result<Json<ImportRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ImportResponse>), (StatusCode, Json<RecordResponse>)> {
    let Json(req) = body.map_err(|rejection| failure(rejection.into()))?;
    let report = store.import(req.records);
    let status = if report.imported.is_empty() && !report.rejected.is_empty() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(ImportResponse {
            success: !report.imported.is_empty() || report.rejected.is_empty(),
            imported: report.imported.len(),
            rejected: report.rejected,
        }),
    ))
}

fn found(record: super::types::Record) -> RecordResponse {
    RecordResponse {
        success: true,
        record: Some(record),
        message: None,
    }
}

fn not_found(id: &str) -> (StatusCode, Json<RecordResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(RecordResponse {
            success: false,
            record: None,
            message: Some(format!("Record {} not found", id)),
        }),
    )
}

fn failure(err: SearchError) -> (StatusCode, Json<RecordResponse>) {
    let status = match err {
        SearchError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::debug!("Record operation failed: {}", err);
    (
        status,
        Json(RecordResponse {
            success: false,
            record: None,
            message: Some(err.to_string()),
        }),
    )
}
