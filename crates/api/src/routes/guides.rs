use axum::routing::get;
use axum::Router;

use crate::handlers::guides;
use crate::state::AppState;

/// Guide routes mounted at `/guides`.
///
/// ```text
/// GET    /        -> list_guides
/// GET    /{id}    -> get_guide
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(guides::list_guides))
        .route("/{id}", get(guides::get_guide))
}
