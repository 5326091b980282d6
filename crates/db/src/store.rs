//! The relational store behind the [`EntitySource`] seam.

use async_trait::async_trait;
use explorer_core::entity::{EntityStatus, EntityType};
use explorer_core::error::CoreError;
use explorer_core::import::ImportedPlace;
use explorer_core::merge::ListFilters;
use explorer_core::normalize::{normalize, SourceKind};
use explorer_core::source::EntitySource;
use serde_json::Value;

use crate::models::entity::{EntityRow, UpdateEntity};
use crate::repositories::{EntityListQuery, EntityRepo, ReviewRepo};
use crate::DbPool;

#[derive(Clone)]
pub struct PgEntitySource {
    pool: DbPool,
}

impl PgEntitySource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Translate filters into the pushed-down SQL query.
pub fn list_query(filters: &ListFilters) -> EntityListQuery {
    EntityListQuery {
        entity_type: filters.entity_type.map(|t| t.as_str().to_string()),
        area: filters
            .area
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string),
        status: filters.status.map(|s| s.as_str().to_string()),
        tags: filters
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect(),
        text: filters
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string),
        limit: filters.fetch_limit() as i64,
    }
}

/// Map a database error onto the domain taxonomy.
pub fn store_error(err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => CoreError::Conflict(match db.constraint() {
                Some(c) => format!("duplicate value violates {c}"),
                None => db.message().to_string(),
            }),
            Some("23502") | Some("23514") | Some("22P02") => {
                CoreError::Validation(db.message().to_string())
            }
            _ => {
                tracing::error!(error = %err, "Unexpected database error");
                CoreError::Internal(err.to_string())
            }
        },
        sqlx::Error::RowNotFound => CoreError::Internal("expected row was not found".to_string()),
        _ => CoreError::Upstream(format!("relational store: {err}")),
    }
}

fn parse_patch(patch: Value) -> Result<UpdateEntity, CoreError> {
    let update: UpdateEntity = serde_json::from_value(patch)
        .map_err(|e| CoreError::Validation(format!("invalid entity patch: {e}")))?;
    if let Some(status) = update.status.as_deref() {
        EntityStatus::parse(status)
            .ok_or_else(|| CoreError::Validation(format!("unknown status '{status}'")))?;
    }
    if let Some(entity_type) = update.entity_type.as_deref() {
        EntityType::parse(entity_type)
            .ok_or_else(|| CoreError::Validation(format!("unknown type '{entity_type}'")))?;
    }
    if update.price_level.is_some_and(|p| !(0..=4).contains(&p)) {
        return Err(CoreError::Validation("price level must be 0-4".to_string()));
    }
    Ok(update)
}

#[async_trait]
impl EntitySource for PgEntitySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    async fn list(&self, filters: &ListFilters) -> Result<Vec<Value>, CoreError> {
        let rows = EntityRepo::list(&self.pool, &list_query(filters))
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(EntityRow::into_record).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Value>, CoreError> {
        let row = EntityRepo::find_by_id(&self.pool, id)
            .await
            .map_err(store_error)?;
        Ok(row.map(EntityRow::into_record))
    }

    async fn create(&self, raw: Value) -> Result<Value, CoreError> {
        let entity = normalize(&raw, SourceKind::Remote)?;
        let row = EntityRepo::create(&self.pool, &entity)
            .await
            .map_err(store_error)?;
        tracing::info!(entity_id = %row.id, "Entity stored");
        Ok(row.into_record())
    }

    async fn update(&self, id: &str, patch: Value) -> Result<Option<Value>, CoreError> {
        let update = parse_patch(patch)?;
        let row = EntityRepo::update(&self.pool, id, &update)
            .await
            .map_err(store_error)?;
        Ok(row.map(EntityRow::into_record))
    }

    async fn delete(&self, id: &str) -> Result<bool, CoreError> {
        EntityRepo::delete(&self.pool, id)
            .await
            .map_err(store_error)
    }

    async fn imported_reviews(&self, id: &str) -> Result<Vec<Value>, CoreError> {
        let rows = ReviewRepo::list_for_entity(&self.pool, id)
            .await
            .map_err(store_error)?;
        Ok(rows.iter().map(|r| r.to_loose()).collect())
    }

    async fn ping(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(store_error)
    }

    async fn upsert_place(&self, place: &ImportedPlace) -> Result<(), CoreError> {
        let id = EntityRepo::upsert_place(&self.pool, place)
            .await
            .map_err(store_error)?;
        tracing::info!(
            entity_id = %id,
            place_id = ?place.place_id,
            images = place.images.len(),
            reviews = place.reviews.len(),
            "Place imported",
        );
        Ok(())
    }
}
