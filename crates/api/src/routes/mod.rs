pub mod entities;
pub mod favorites;
pub mod guides;
pub mod health;
pub mod import;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /entities                                 list, create (admin)
/// /entities/{id}                            get, update, delete (admin)
/// /entities/{id}/status                     moderation transition (admin, PUT)
/// /entities/{id}/report                     flag an active entity (POST)
/// /entities/{id}/comments                   feed, add comment
/// /entities/{id}/comments/{comment_id}      delete user comment (admin)
///
/// /favorites                                list favorites
/// /favorites/{id}                           toggle favorite (POST)
///
/// /guides                                   list, optionally by category
/// /guides/{id}                              guide with blocks and related entities
///
/// /upload-bulk                              bulk place import (admin, POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/entities", entities::router())
        .nest("/favorites", favorites::router())
        .nest("/guides", guides::router())
        .merge(import::router())
}
