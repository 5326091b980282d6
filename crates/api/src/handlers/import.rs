//! Bulk import of scraped place records.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use explorer_core::import::{split_payload, transform_place, BulkImportReport};
use serde_json::Value;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/upload-bulk
///
/// Accepts one place object or an array of them. Each record is transformed
/// and upserted on its own; a failing record is counted in the report and
/// does not stop the batch.
pub async fn upload_bulk(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> AppResult<impl IntoResponse> {
    let mut report = BulkImportReport::default();

    for raw in split_payload(body) {
        let result = match transform_place(&raw) {
            Ok(place) => state.remote.upsert_place(&place).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => report.record_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping place in bulk import");
                report.record_failure(&raw, &e);
            }
        }
    }

    tracing::info!(
        processed = report.processed,
        succeeded = report.succeeded,
        failed = report.failed,
        "Bulk import finished",
    );

    Ok(Json(DataResponse { data: report }))
}
