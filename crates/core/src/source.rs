//! The storage seam shared by the relational store and the local cache.
//!
//! Both backends speak raw JSON records in their own shape; callers pass
//! results through [`crate::normalize::normalize`] with the matching
//! [`SourceKind`].

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CoreError;
use crate::import::ImportedPlace;
use crate::merge::ListFilters;
use crate::normalize::SourceKind;

#[async_trait]
pub trait EntitySource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Candidate records for a listing. Backends may push down any subset of
    /// `filters`; the merge layer re-applies all of them.
    async fn list(&self, filters: &ListFilters) -> Result<Vec<Value>, CoreError>;

    async fn get(&self, id: &str) -> Result<Option<Value>, CoreError>;

    /// Store a new record and return it as stored.
    async fn create(&self, raw: Value) -> Result<Value, CoreError>;

    /// Apply a partial update. `None` when the id is unknown.
    async fn update(&self, id: &str, patch: Value) -> Result<Option<Value>, CoreError>;

    /// Hard delete, cascading to owned images and reviews. `false` when the
    /// id is unknown.
    async fn delete(&self, id: &str) -> Result<bool, CoreError>;

    /// Reviews scraped alongside the entity, in their loose external shape.
    async fn imported_reviews(&self, id: &str) -> Result<Vec<Value>, CoreError>;

    /// Cheap reachability probe for health reporting.
    async fn ping(&self) -> Result<(), CoreError> {
        Ok(())
    }

    /// Insert or replace a bulk-imported place keyed by its external place id.
    async fn upsert_place(&self, place: &ImportedPlace) -> Result<(), CoreError> {
        Err(CoreError::Forbidden(format!(
            "{} source does not accept bulk imports (place {})",
            self.kind(),
            place.id
        )))
    }
}
