//! Handlers for the entity catalog.
//!
//! Reads go through the merge layer so both sources answer every request.
//! Writes are routed to whichever source holds the entity; new entities go
//! to the relational store unless `?target=local` is given.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use explorer_core::draft::EntityDraft;
use explorer_core::entity::{Entity, EntityStatus};
use explorer_core::error::CoreError;
use explorer_core::merge::{self, ListedEntity, Located};
use explorer_core::normalize::{normalize, to_raw, SourceKind};
use explorer_core::view::EntityView;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{MaybeAdmin, RequireAdmin};
use crate::query::{ListParams, PointParams, TargetParams};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct EntityListResponse {
    pub entities: Vec<ListedEntity>,
    pub total: usize,
    /// Records dropped because they failed to normalize.
    pub rejected: usize,
    /// Set when one source failed and the list holds the other only.
    pub partial: bool,
}

#[derive(Debug, Serialize)]
pub struct EntityDetail {
    #[serde(flatten)]
    pub view: EntityView,
    pub source: SourceKind,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

/// Find an entity in either source or fail with 404.
pub(crate) async fn locate(
    state: &AppState,
    id: &str,
    include_unpublished: bool,
) -> AppResult<Located> {
    merge::get_entity(
        id,
        state.remote.as_ref(),
        state.local.as_ref(),
        state.config.remote_timeout(),
        include_unpublished,
    )
    .await?
    .ok_or_else(|| not_found(id))
}

fn not_found(id: &str) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "entity",
        id: id.to_string(),
    })
}

/// Write a remote-shaped patch to the source holding the entity.
async fn apply_patch(state: &AppState, located: &Located, patch: Value) -> AppResult<Entity> {
    let id = &located.entity.id;
    let raw = state
        .source(located.source)
        .update(id, patch)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(normalize(&raw, located.source)?)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/entities
///
/// Merged listing from both sources. See [`ListParams`] for the filters.
pub async fn list_entities(
    MaybeAdmin(is_admin): MaybeAdmin,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<impl IntoResponse> {
    let filters = params.into_filters(is_admin)?;
    let outcome = merge::list_entities(
        &filters,
        state.remote.as_ref(),
        state.local.as_ref(),
        state.config.remote_timeout(),
    )
    .await?;

    let partial = outcome.is_partial();
    Ok(Json(DataResponse {
        data: EntityListResponse {
            total: outcome.entities.len(),
            rejected: outcome.rejected.len(),
            partial,
            entities: outcome.entities,
        },
    }))
}

/// GET /api/v1/entities/{id}
///
/// One entity with its derived view. Unpublished entities are visible to
/// admins only.
pub async fn get_entity(
    MaybeAdmin(is_admin): MaybeAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PointParams>,
) -> AppResult<impl IntoResponse> {
    let user_point = params.point()?;
    let located = locate(&state, &id, is_admin).await?;

    Ok(Json(DataResponse {
        data: EntityDetail {
            view: EntityView::derive(located.entity, Utc::now(), user_point),
            source: located.source,
        },
    }))
}

// ---------------------------------------------------------------------------
// Admin writes
// ---------------------------------------------------------------------------

/// POST /api/v1/entities
///
/// Finalize a draft and store it. New entities start unverified.
pub async fn create_entity(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Query(params): Query<TargetParams>,
    Json(draft): Json<EntityDraft>,
) -> AppResult<impl IntoResponse> {
    let target = params.kind();
    let entity = draft.finalize(Utc::now())?;

    let stored = state.source(target).create(to_raw(&entity, target)).await?;
    let entity = normalize(&stored, target)?;

    tracing::info!(entity_id = %entity.id, source = %target, "Entity created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: entity })))
}

/// PUT /api/v1/entities/{id}
///
/// Partial update using remote record field names. Status changes go through
/// `PUT /entities/{id}/status`.
pub async fn update_entity(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> AppResult<impl IntoResponse> {
    let Some(fields) = patch.as_object() else {
        return Err(AppError::BadRequest("patch must be a JSON object".into()));
    };
    if fields.contains_key("status") {
        return Err(AppError::BadRequest(
            "status changes use PUT /entities/{id}/status".into(),
        ));
    }

    let located = locate(&state, &id, true).await?;
    let entity = apply_patch(&state, &located, patch).await?;

    tracing::info!(entity_id = %id, source = %located.source, "Entity updated");

    Ok(Json(DataResponse { data: entity }))
}

/// DELETE /api/v1/entities/{id}
///
/// Hard delete from the source holding the entity.
pub async fn delete_entity(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let located = locate(&state, &id, true).await?;
    let deleted = state.source(located.source).delete(&id).await?;

    if !deleted {
        return Err(not_found(&id));
    }

    tracing::info!(entity_id = %id, source = %located.source, "Entity deleted");

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Moderation
// ---------------------------------------------------------------------------

/// PUT /api/v1/entities/{id}/status
///
/// Move an entity through the moderation lifecycle. Activation stamps
/// `last_confirmed_at`.
pub async fn update_status(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<StatusChange>,
) -> AppResult<impl IntoResponse> {
    let next = EntityStatus::parse(&input.status).ok_or_else(|| {
        AppError::Core(CoreError::Validation(format!(
            "unknown status '{}'",
            input.status
        )))
    })?;

    let located = locate(&state, &id, true).await?;
    let current = located.entity.status;
    if !current.can_transition_to(next) {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "cannot move entity from {current} to {next}"
        ))));
    }

    let mut patch = json!({ "status": next.as_str() });
    if next == EntityStatus::Active {
        patch["last_confirmed_at"] = json!(Utc::now());
    }
    let entity = apply_patch(&state, &located, patch).await?;

    tracing::info!(entity_id = %id, from = %current, to = %next, "Entity status changed");

    Ok(Json(DataResponse { data: entity }))
}

/// POST /api/v1/entities/{id}/report
///
/// Flag an active entity for review. Reporting an already flagged entity
/// is a no-op; other statuses are not publicly visible and report as 404.
pub async fn report_entity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let located = locate(&state, &id, true).await?;

    let entity = match located.entity.status {
        EntityStatus::Flagged => located.entity,
        EntityStatus::Active => {
            let entity = apply_patch(
                &state,
                &located,
                json!({ "status": EntityStatus::Flagged.as_str() }),
            )
            .await?;
            tracing::info!(entity_id = %id, "Entity reported");
            entity
        }
        _ => return Err(not_found(&id)),
    };

    Ok(Json(DataResponse { data: entity }))
}
