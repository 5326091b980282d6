use axum::routing::{get, post};
use axum::Router;

use crate::handlers::favorites;
use crate::state::AppState;

/// Favorite routes mounted at `/favorites`.
///
/// ```text
/// GET    /        -> list_favorites
/// POST   /{id}    -> toggle_favorite
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(favorites::list_favorites))
        .route("/{id}", post(favorites::toggle_favorite))
}
