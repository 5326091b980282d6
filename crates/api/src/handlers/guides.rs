//! Handlers for editorial guides.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use explorer_core::entity::Entity;
use explorer_core::error::CoreError;
use explorer_core::guide::{parse_guide_blocks, Guide, GuideBlock};
use explorer_core::merge::resolve_related;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::query::CategoryParams;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct GuideListResponse {
    pub guides: Vec<Guide>,
    pub total: usize,
    pub categories: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GuideDetail {
    #[serde(flatten)]
    pub guide: Guide,
    pub blocks: Vec<GuideBlock>,
    /// Related entities that resolved; missing or failing ids are skipped.
    pub related: Vec<Entity>,
}

/// GET /api/v1/guides
pub async fn list_guides(
    State(state): State<AppState>,
    Query(params): Query<CategoryParams>,
) -> AppResult<impl IntoResponse> {
    let category = params
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let guides: Vec<Guide> = state.guides.list(category).into_iter().cloned().collect();

    Ok(Json(DataResponse {
        data: GuideListResponse {
            total: guides.len(),
            guides,
            categories: state
                .guides
                .categories()
                .into_iter()
                .map(str::to_string)
                .collect(),
        },
    }))
}

/// GET /api/v1/guides/{id}
///
/// The guide with its content parsed into blocks and related entities
/// resolved concurrently.
pub async fn get_guide(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let guide = state
        .guides
        .get(&id)
        .cloned()
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "guide",
            id: id.clone(),
        }))?;

    let related = resolve_related(
        &guide.related_entities,
        state.remote.as_ref(),
        state.local.as_ref(),
        state.config.remote_timeout(),
    )
    .await;

    Ok(Json(DataResponse {
        data: GuideDetail {
            blocks: parse_guide_blocks(&guide.content),
            related,
            guide,
        },
    }))
}
