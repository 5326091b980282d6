//! Route definitions for entities and their comments.

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::{comments, entities};
use crate::state::AppState;

/// Entity routes mounted at `/entities`.
///
/// ```text
/// GET    /                                 -> list_entities
/// POST   /                                 -> create_entity (admin)
/// GET    /{id}                             -> get_entity
/// PUT    /{id}                             -> update_entity (admin)
/// DELETE /{id}                             -> delete_entity (admin)
/// PUT    /{id}/status                      -> update_status (admin)
/// POST   /{id}/report                      -> report_entity
/// GET    /{id}/comments                    -> list_comments
/// POST   /{id}/comments                    -> add_comment
/// DELETE /{id}/comments/{comment_id}       -> delete_comment (admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(entities::list_entities).post(entities::create_entity),
        )
        .route(
            "/{id}",
            get(entities::get_entity)
                .put(entities::update_entity)
                .delete(entities::delete_entity),
        )
        .route("/{id}/status", put(entities::update_status))
        .route("/{id}/report", post(entities::report_entity))
        .route(
            "/{id}/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route(
            "/{id}/comments/{comment_id}",
            delete(comments::delete_comment),
        )
}
