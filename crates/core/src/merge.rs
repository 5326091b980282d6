//! Combining the remote store and the local cache into one listing.
//!
//! Both sources are fetched concurrently and normalized with their own
//! adapter. Local records only contribute when active. Filters are re-applied
//! to the combined list so local-only entries obey the full filter set, then
//! the list is sorted and truncated. A failing source degrades the result to
//! the other one; only a failure of both is an error.
//!
//! The same place stored in both sources under different ids is listed
//! twice. No key reliably identifies a place across sources.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;

use crate::entity::{Entity, EntityStatus, EntityType};
use crate::error::CoreError;
use crate::geo::GeoPoint;
use crate::normalize::{normalize, normalize_batch, Rejection, SourceKind};
use crate::source::EntitySource;

/// Default page size for listings.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Upper bound on rows requested from a backend.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Default bound on how long the remote store may take.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum SortOrder {
    /// Remote order, local entries appended.
    #[default]
    Source,
    /// Highest rating first.
    Rating,
    /// Nearest first; entries without coordinates are dropped.
    Distance { origin: GeoPoint },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListFilters {
    pub entity_type: Option<EntityType>,
    pub area: Option<String>,
    /// Matches entities carrying any of these tags.
    pub tags: Vec<String>,
    pub query: Option<String>,
    pub status: Option<EntityStatus>,
    /// Let non-active local records through. Set for moderation views only.
    pub include_unpublished: bool,
    pub sort: SortOrder,
    pub limit: usize,
}

impl Default for ListFilters {
    fn default() -> Self {
        Self {
            entity_type: None,
            area: None,
            tags: Vec::new(),
            query: None,
            status: None,
            include_unpublished: false,
            sort: SortOrder::default(),
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl ListFilters {
    pub fn matches(&self, entity: &Entity) -> bool {
        if self.entity_type.is_some_and(|t| t != entity.entity_type) {
            return false;
        }
        if self.status.is_some_and(|s| s != entity.status) {
            return false;
        }
        if let Some(area) = self.area.as_deref().filter(|a| !a.is_empty()) {
            if entity.area != area {
                return false;
            }
        }
        if !self.tags.is_empty() {
            let any_tag = self.tags.iter().any(|wanted| {
                entity
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase() == wanted.to_lowercase())
            });
            if !any_tag {
                return false;
            }
        }
        match self.query.as_deref() {
            Some(q) => entity.matches_text(q),
            None => true,
        }
    }

    /// Rows a backend should return so that truncation after merging still
    /// fills the page. Distance ordering cannot be pushed down, so it scans
    /// the maximum.
    pub fn fetch_limit(&self) -> usize {
        match self.sort {
            SortOrder::Distance { .. } => MAX_LIST_LIMIT,
            _ => self.limit.clamp(1, MAX_LIST_LIMIT),
        }
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListedEntity {
    #[serde(flatten)]
    pub entity: Entity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeOutcome {
    pub entities: Vec<ListedEntity>,
    pub rejected: Vec<Rejection>,
    /// Set when the remote store failed or timed out.
    pub remote_error: Option<String>,
    pub local_error: Option<String>,
}

impl MergeOutcome {
    /// Whether one source was missing from the result.
    pub fn is_partial(&self) -> bool {
        self.remote_error.is_some() || self.local_error.is_some()
    }
}

/// List entities from both sources.
pub async fn list_entities(
    filters: &ListFilters,
    remote: &dyn EntitySource,
    local: &dyn EntitySource,
    remote_timeout: Duration,
) -> Result<MergeOutcome, CoreError> {
    let (remote_result, local_result) = tokio::join!(
        with_timeout(remote_timeout, remote.list(filters)),
        local.list(filters),
    );

    if let (Err(remote_err), Err(local_err)) = (&remote_result, &local_result) {
        tracing::error!(
            remote_error = %remote_err,
            local_error = %local_err,
            "Both entity sources failed",
        );
        return Err(CoreError::Upstream(format!(
            "remote: {remote_err}; local: {local_err}"
        )));
    }

    let mut outcome = MergeOutcome::default();
    let mut merged: Vec<Entity> = Vec::new();

    match remote_result {
        Ok(raws) => {
            let (entities, rejected) = normalize_batch(&raws, remote.kind());
            merged.extend(entities);
            outcome.rejected.extend(rejected);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Remote source failed, listing local entries only");
            outcome.remote_error = Some(e.to_string());
        }
    }

    match local_result {
        Ok(raws) => {
            let (entities, rejected) = normalize_batch(&raws, local.kind());
            merged.extend(
                entities
                    .into_iter()
                    .filter(|e| filters.include_unpublished || e.status.is_public()),
            );
            outcome.rejected.extend(rejected);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Local cache failed, listing remote entries only");
            outcome.local_error = Some(e.to_string());
        }
    }

    if !outcome.rejected.is_empty() {
        for rejection in &outcome.rejected {
            tracing::debug!(
                source = %rejection.source,
                index = rejection.index,
                id = ?rejection.id,
                reason = %rejection.reason,
                "Rejected entity record",
            );
        }
        tracing::warn!(count = outcome.rejected.len(), "Dropped malformed entity records");
    }

    merged.retain(|e| filters.matches(e));

    let mut listed: Vec<ListedEntity> = match filters.sort {
        SortOrder::Distance { origin } => merged
            .into_iter()
            .filter_map(|entity| {
                let distance_km = origin.distance_km(&entity.geo_point()?);
                Some(ListedEntity {
                    entity,
                    distance_km: Some(distance_km),
                })
            })
            .collect(),
        _ => merged
            .into_iter()
            .map(|entity| ListedEntity {
                entity,
                distance_km: None,
            })
            .collect(),
    };

    match filters.sort {
        SortOrder::Source => {}
        SortOrder::Rating => {
            listed.sort_by(|a, b| b.entity.rating.total_cmp(&a.entity.rating));
        }
        SortOrder::Distance { .. } => {
            listed.sort_by(|a, b| {
                let a = a.distance_km.unwrap_or(f64::INFINITY);
                let b = b.distance_km.unwrap_or(f64::INFINITY);
                a.total_cmp(&b)
            });
        }
    }

    listed.truncate(filters.limit);
    outcome.entities = listed;
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Single lookups
// ---------------------------------------------------------------------------

/// An entity together with the source holding it.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub entity: Entity,
    pub source: SourceKind,
}

/// Find one entity, preferring the local record when both sources have it.
///
/// Unless `include_unpublished` is set, non-active entities are reported as
/// absent. A miss while the remote store is unreachable is an upstream
/// error, not a not-found.
pub async fn get_entity(
    id: &str,
    remote: &dyn EntitySource,
    local: &dyn EntitySource,
    remote_timeout: Duration,
    include_unpublished: bool,
) -> Result<Option<Located>, CoreError> {
    let (remote_result, local_result) = tokio::join!(
        with_timeout(remote_timeout, remote.get(id)),
        local.get(id),
    );

    let visible = |raw: Option<serde_json::Value>, kind: SourceKind| -> Option<Located> {
        let raw = raw?;
        match normalize(&raw, kind) {
            Ok(entity) if include_unpublished || entity.status.is_public() => {
                Some(Located { entity, source: kind })
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(id, source = %kind, error = %e, "Stored entity failed to normalize");
                None
            }
        }
    };

    let local_hit = match &local_result {
        Ok(raw) => visible(raw.clone(), local.kind()),
        Err(_) => None,
    };
    if local_hit.is_some() {
        return Ok(local_hit);
    }

    match (remote_result, local_result) {
        (Ok(raw), _) => Ok(visible(raw, remote.kind())),
        (Err(remote_err), Ok(_)) => {
            tracing::warn!(id, error = %remote_err, "Remote lookup failed");
            Err(remote_err)
        }
        (Err(remote_err), Err(local_err)) => Err(CoreError::Upstream(format!(
            "remote: {remote_err}; local: {local_err}"
        ))),
    }
}

/// Resolve a list of ids concurrently, skipping any that fail or are absent.
/// Order follows `ids`.
pub async fn resolve_related(
    ids: &[String],
    remote: &dyn EntitySource,
    local: &dyn EntitySource,
    remote_timeout: Duration,
) -> Vec<Entity> {
    let lookups = ids
        .iter()
        .map(|id| get_entity(id, remote, local, remote_timeout, false));
    join_all(lookups)
        .await
        .into_iter()
        .zip(ids)
        .filter_map(|(result, id)| match result {
            Ok(found) => found.map(|l| l.entity),
            Err(e) => {
                tracing::debug!(id = %id, error = %e, "Skipping related entity");
                None
            }
        })
        .collect()
}

async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, CoreError>>,
) -> Result<T, CoreError> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        CoreError::Upstream(format!(
            "remote source timed out after {}ms",
            limit.as_millis()
        ))
    })?
}


#[cfg(test)]
mod tests {
    use super::testing::StaticSource;
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::{json, Value};

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn remote_row(id: &str, rating: f64) -> Value {
        json!({ "id": id, "title": format!("Remote {id}"), "total_score": rating })
    }

    fn local_row(id: &str, rating: f64, status: &str) -> Value {
        json!({ "id": id, "title": format!("Local {id}"), "totalScore": rating, "status": status })
    }

    fn ids(outcome: &MergeOutcome) -> Vec<&str> {
        outcome.entities.iter().map(|l| l.entity.id.as_str()).collect()
    }

    // -- ordering --

    #[tokio::test]
    async fn popular_view_sorts_by_rating_and_hides_unverified() {
        let remote = StaticSource::new(
            SourceKind::Remote,
            vec![remote_row("A", 4.0), remote_row("B", 3.0)],
        );
        let local = StaticSource::new(
            SourceKind::Local,
            vec![local_row("C", 5.0, "active"), local_row("D", 4.9, "unverified")],
        );
        let filters = ListFilters {
            sort: SortOrder::Rating,
            ..Default::default()
        };
        let outcome = list_entities(&filters, &remote, &local, TIMEOUT).await.unwrap();
        assert_eq!(ids(&outcome), vec!["C", "A", "B"]);
        assert!(!outcome.is_partial());
    }

    #[tokio::test]
    async fn moderation_view_includes_unpublished_local_records() {
        let remote = StaticSource::new(SourceKind::Remote, Vec::new());
        let local = StaticSource::new(
            SourceKind::Local,
            vec![local_row("C", 5.0, "active"), local_row("D", 4.9, "unverified")],
        );
        let filters = ListFilters {
            status: Some(EntityStatus::Unverified),
            include_unpublished: true,
            ..Default::default()
        };
        let outcome = list_entities(&filters, &remote, &local, TIMEOUT).await.unwrap();
        assert_eq!(ids(&outcome), vec!["D"]);
    }

    #[tokio::test]
    async fn default_view_keeps_remote_order_then_local() {
        let remote = StaticSource::new(
            SourceKind::Remote,
            vec![remote_row("B", 1.0), remote_row("A", 5.0)],
        );
        let local = StaticSource::new(SourceKind::Local, vec![local_row("C", 3.0, "active")]);
        let outcome = list_entities(&ListFilters::default(), &remote, &local, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(ids(&outcome), vec!["B", "A", "C"]);
    }

    #[tokio::test]
    async fn distance_view_sorts_nearest_first_regardless_of_rating() {
        let origin = GeoPoint::new(-8.6478, 115.1395).unwrap();
        let at = |id: &str, lat: f64, rating: f64| {
            json!({
                "id": id, "title": id, "total_score": rating,
                "location_lat": lat, "location_lng": 115.1395
            })
        };
        let remote = StaticSource::new(
            SourceKind::Remote,
            vec![
                at("far", -8.5066, 5.0),
                at("here", -8.6478, 1.0),
                at("near", -8.6271, 3.0),
                json!({ "id": "nowhere", "title": "No coords", "total_score": 5.0 }),
            ],
        );
        let local = StaticSource::new(SourceKind::Local, Vec::new());
        let filters = ListFilters {
            sort: SortOrder::Distance { origin },
            ..Default::default()
        };
        let outcome = list_entities(&filters, &remote, &local, TIMEOUT).await.unwrap();
        assert_eq!(ids(&outcome), vec!["here", "near", "far"]);
        let distances: Vec<f64> = outcome
            .entities
            .iter()
            .map(|l| l.distance_km.unwrap())
            .collect();
        assert_eq!(distances[0], 0.0);
        assert!(distances[1] > 2.0 && distances[1] < 2.5);
        assert!(distances[2] > 15.0 && distances[2] < 16.5);
    }

    #[tokio::test]
    async fn limit_applies_after_combination() {
        let remote = StaticSource::new(
            SourceKind::Remote,
            vec![remote_row("A", 4.0), remote_row("B", 3.0)],
        );
        let local = StaticSource::new(
            SourceKind::Local,
            vec![local_row("C", 5.0, "active"), local_row("E", 3.5, "active")],
        );
        let filters = ListFilters {
            sort: SortOrder::Rating,
            limit: 3,
            ..Default::default()
        };
        let outcome = list_entities(&filters, &remote, &local, TIMEOUT).await.unwrap();
        assert_eq!(ids(&outcome), vec!["C", "A", "E"]);
    }

    // -- filters --

    #[tokio::test]
    async fn filters_cover_local_entries() {
        let remote = StaticSource::new(SourceKind::Remote, Vec::new());
        let local = StaticSource::new(
            SourceKind::Local,
            vec![
                json!({ "id": "1", "title": "Yoga Barn", "status": "active", "area": "Ubud",
                        "type": "service", "tags": ["Yoga"] }),
                json!({ "id": "2", "title": "Surf Camp", "status": "active", "area": "Canggu",
                        "type": "service", "tags": ["surf"] }),
                json!({ "id": "3", "title": "Yoga Shala", "status": "active", "area": "Ubud",
                        "type": "place" }),
            ],
        );
        let filters = ListFilters {
            entity_type: Some(EntityType::Service),
            area: Some("Ubud".into()),
            tags: vec!["yoga".into(), "pilates".into()],
            query: Some("yoga".into()),
            ..Default::default()
        };
        let outcome = list_entities(&filters, &remote, &local, TIMEOUT).await.unwrap();
        assert_eq!(ids(&outcome), vec!["1"]);
    }

    #[tokio::test]
    async fn cross_source_duplicates_are_both_listed() {
        let remote = StaticSource::new(
            SourceKind::Remote,
            vec![json!({ "id": "r-1", "title": "Crate Cafe", "place_id": "ChIJx" })],
        );
        let local = StaticSource::new(
            SourceKind::Local,
            vec![json!({ "id": "l-1", "title": "Crate Cafe", "placeId": "ChIJx", "status": "active" })],
        );
        let outcome = list_entities(&ListFilters::default(), &remote, &local, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(ids(&outcome), vec!["r-1", "l-1"]);
    }

    // -- failures --

    #[tokio::test]
    async fn rejected_records_are_counted_and_excluded() {
        let remote = StaticSource::new(
            SourceKind::Remote,
            vec![remote_row("A", 4.0), json!({ "id": "broken" })],
        );
        let local = StaticSource::new(SourceKind::Local, Vec::new());
        let outcome = list_entities(&ListFilters::default(), &remote, &local, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(ids(&outcome), vec!["A"]);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].id.as_deref(), Some("broken"));
    }

    #[tokio::test]
    async fn remote_failure_degrades_to_local() {
        let remote = StaticSource::failing(SourceKind::Remote);
        let local = StaticSource::new(SourceKind::Local, vec![local_row("C", 5.0, "active")]);
        let outcome = list_entities(&ListFilters::default(), &remote, &local, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(ids(&outcome), vec!["C"]);
        assert!(outcome.is_partial());
        assert!(outcome.remote_error.is_some());
    }

    #[tokio::test]
    async fn slow_remote_times_out() {
        let remote = StaticSource {
            delay: Some(Duration::from_millis(500)),
            ..StaticSource::new(SourceKind::Remote, vec![remote_row("A", 4.0)])
        };
        let local = StaticSource::new(SourceKind::Local, vec![local_row("C", 5.0, "active")]);
        let outcome = list_entities(
            &ListFilters::default(),
            &remote,
            &local,
            Duration::from_millis(20),
        )
        .await
        .unwrap();
        assert_eq!(ids(&outcome), vec!["C"]);
        assert!(outcome.remote_error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn both_sources_failing_is_an_error() {
        let remote = StaticSource::failing(SourceKind::Remote);
        let local = StaticSource::failing(SourceKind::Local);
        let result = list_entities(&ListFilters::default(), &remote, &local, TIMEOUT).await;
        assert_matches!(result, Err(CoreError::Upstream(_)));
    }

    #[tokio::test]
    async fn empty_sources_give_empty_list() {
        let remote = StaticSource::new(SourceKind::Remote, Vec::new());
        let local = StaticSource::new(SourceKind::Local, Vec::new());
        let outcome = list_entities(&ListFilters::default(), &remote, &local, TIMEOUT)
            .await
            .unwrap();
        assert!(outcome.entities.is_empty());
        assert!(!outcome.is_partial());
    }

    // -- single lookups --

    #[tokio::test]
    async fn lookup_prefers_local_record() {
        let remote = StaticSource::new(SourceKind::Remote, vec![remote_row("X", 1.0)]);
        let local = StaticSource::new(SourceKind::Local, vec![local_row("X", 5.0, "active")]);
        let found = get_entity("X", &remote, &local, TIMEOUT, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.source, SourceKind::Local);
        assert_eq!(found.entity.rating, 5.0);
    }

    #[tokio::test]
    async fn lookup_hides_unpublished_unless_asked() {
        let remote = StaticSource::new(SourceKind::Remote, Vec::new());
        let local = StaticSource::new(SourceKind::Local, vec![local_row("U", 2.0, "unverified")]);
        assert_eq!(get_entity("U", &remote, &local, TIMEOUT, false).await.unwrap(), None);
        let found = get_entity("U", &remote, &local, TIMEOUT, true).await.unwrap();
        assert_eq!(found.unwrap().entity.status, EntityStatus::Unverified);
    }

    #[tokio::test]
    async fn lookup_miss_with_remote_down_is_upstream_error() {
        let remote = StaticSource::failing(SourceKind::Remote);
        let local = StaticSource::new(SourceKind::Local, Vec::new());
        let result = get_entity("X", &remote, &local, TIMEOUT, false).await;
        assert_matches!(result, Err(CoreError::Upstream(_)));
    }

    #[tokio::test]
    async fn related_resolution_skips_missing_ids() {
        let remote = StaticSource::new(
            SourceKind::Remote,
            vec![remote_row("A", 4.0), remote_row("B", 3.0)],
        );
        let local = StaticSource::new(SourceKind::Local, Vec::new());
        let wanted = vec!["B".to_string(), "missing".to_string(), "A".to_string()];
        let related = resolve_related(&wanted, &remote, &local, TIMEOUT).await;
        let got: Vec<&str> = related.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(got, vec!["B", "A"]);
    }
}
