use axum::routing::post;
use axum::Router;

use crate::handlers::import;
use crate::state::AppState;

/// Bulk import route, merged at the API root.
///
/// ```text
/// POST   /upload-bulk    -> upload_bulk (admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/upload-bulk", post(import::upload_bulk))
}
