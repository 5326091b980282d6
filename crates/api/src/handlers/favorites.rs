//! Handlers for favorites.
//!
//! Favorites are a single ordered id list in the local cache. Ids that no
//! longer resolve are kept in the list but skipped when listing entities.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use explorer_core::entity::Entity;
use explorer_core::merge::resolve_related;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub ids: Vec<String>,
    pub entities: Vec<Entity>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteToggled {
    pub entity_id: String,
    pub favorite: bool,
}

/// GET /api/v1/favorites
pub async fn list_favorites(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let ids = state.local.favorites().await?;
    let entities = resolve_related(
        &ids,
        state.remote.as_ref(),
        state.local.as_ref(),
        state.config.remote_timeout(),
    )
    .await;

    Ok(Json(DataResponse {
        data: FavoritesResponse { ids, entities },
    }))
}

/// POST /api/v1/favorites/{id}
///
/// Toggle an id in the favorites list.
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let favorite = state.local.toggle_favorite(&entity_id).await?;

    tracing::debug!(entity_id = %entity_id, favorite, "Favorite toggled");

    Ok(Json(DataResponse {
        data: FavoriteToggled {
            entity_id,
            favorite,
        },
    }))
}
