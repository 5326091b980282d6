//! Handlers for the per-entity comment feed.
//!
//! The feed combines reviews imported with the entity, user comments from
//! the local cache and the curated seed comment. Only user comments can be
//! added or deleted.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use explorer_core::comments::{
    aggregate_comments, CommentFeed, FeedEntry, NewComment, RatingDistribution,
};
use explorer_core::error::CoreError;
use serde::Serialize;

use super::entities::locate;
use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{MaybeAdmin, RequireAdmin};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CommentFeedResponse {
    pub comments: Vec<FeedEntry>,
    pub total: usize,
    pub distribution: RatingDistribution,
    /// Mean rating, absent when there are no rated comments.
    pub average: Option<f64>,
}

async fn load_feed(
    state: &AppState,
    id: &str,
    include_unpublished: bool,
) -> AppResult<CommentFeed> {
    let located = locate(state, id, include_unpublished).await?;
    let (imported, user) = tokio::join!(
        state.source(located.source).imported_reviews(id),
        state.local.user_comments(id),
    );
    Ok(aggregate_comments(
        id,
        &imported?,
        &user?,
        state.seed_comments.get(id),
    ))
}

/// GET /api/v1/entities/{id}/comments
///
/// The combined feed, newest first, with its rating distribution.
pub async fn list_comments(
    MaybeAdmin(is_admin): MaybeAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let feed = load_feed(&state, &id, is_admin).await?;
    let distribution = feed.distribution();

    Ok(Json(DataResponse {
        data: CommentFeedResponse {
            comments: feed.entries().to_vec(),
            total: feed.len(),
            average: distribution.average(),
            distribution,
        },
    }))
}

/// POST /api/v1/entities/{id}/comments
///
/// Leave a user comment on a published entity.
pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<NewComment>,
) -> AppResult<impl IntoResponse> {
    locate(&state, &id, false).await?;

    let comment = input.into_comment(&id, Utc::now())?;
    let comment = state.local.add_comment(comment).await?;

    tracing::info!(
        entity_id = %id,
        comment_id = %comment.id,
        rating = comment.rating,
        "Comment added",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: comment })))
}

/// DELETE /api/v1/entities/{id}/comments/{comment_id}
///
/// Remove a user comment. Imported reviews and seed comments are refused
/// with 403.
pub async fn delete_comment(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let mut feed = load_feed(&state, &id, true).await?;
    feed.delete(&comment_id)?;

    if !state.local.delete_comment(&id, &comment_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "comment",
            id: comment_id,
        }));
    }

    tracing::info!(entity_id = %id, comment_id = %comment_id, "Comment deleted");

    Ok(StatusCode::NO_CONTENT)
}
