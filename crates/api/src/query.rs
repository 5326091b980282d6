//! Shared query parameter types for API handlers.

use explorer_core::entity::{EntityStatus, EntityType};
use explorer_core::error::CoreError;
use explorer_core::geo::GeoPoint;
use explorer_core::merge::{ListFilters, SortOrder, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use explorer_core::normalize::SourceKind;
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Optional user position (`?lat=&lng=`). Both or neither must be given.
#[derive(Debug, Default, Deserialize)]
pub struct PointParams {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl PointParams {
    pub fn point(&self) -> AppResult<Option<GeoPoint>> {
        parse_point(self.lat, self.lng)
    }
}

/// Query parameters for `GET /entities`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub area: Option<String>,
    /// Comma-separated; an entity matches when it carries any of them.
    pub tags: Option<String>,
    pub q: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub popular: bool,
    pub limit: Option<i64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl ListParams {
    /// Translate the query into merge-layer filters.
    ///
    /// Visitors only ever see active entities; asking for any other status
    /// requires admin rights. `popular` sorts by rating and wins over a
    /// supplied position; a position alone sorts by distance.
    pub fn into_filters(self, is_admin: bool) -> AppResult<ListFilters> {
        let entity_type = match self.entity_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                EntityType::parse(raw)
                    .ok_or_else(|| AppError::BadRequest(format!("unknown type '{raw}'")))?,
            ),
        };

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                EntityStatus::parse(raw)
                    .ok_or_else(|| AppError::BadRequest(format!("unknown status '{raw}'")))?,
            ),
        };
        if !is_admin && status.is_some_and(|s| !s.is_public()) {
            return Err(AppError::Core(CoreError::Forbidden(
                "Only active entities are listed publicly".into(),
            )));
        }
        let status = if is_admin {
            status
        } else {
            Some(EntityStatus::Active)
        };

        let tags = self
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let limit = self
            .limit
            .map(|l| l.clamp(1, MAX_LIST_LIMIT as i64) as usize)
            .unwrap_or(DEFAULT_LIST_LIMIT);

        let sort = match (self.popular, parse_point(self.lat, self.lng)?) {
            (true, _) => SortOrder::Rating,
            (false, Some(origin)) => SortOrder::Distance { origin },
            (false, None) => SortOrder::Source,
        };

        Ok(ListFilters {
            entity_type,
            area: self.area.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
            tags,
            query: self.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
            status,
            include_unpublished: is_admin,
            sort,
            limit,
        })
    }
}

/// `?category=` filter for guides.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryParams {
    pub category: Option<String>,
}

/// `?target=remote|local` selecting where a new entity is stored.
#[derive(Debug, Default, Deserialize)]
pub struct TargetParams {
    pub target: Option<SourceKind>,
}

impl TargetParams {
    pub fn kind(&self) -> SourceKind {
        self.target.unwrap_or(SourceKind::Remote)
    }
}

fn parse_point(lat: Option<f64>, lng: Option<f64>) -> AppResult<Option<GeoPoint>> {
    match (lat, lng) {
        (None, None) => Ok(None),
        (Some(lat), Some(lng)) => GeoPoint::new(lat, lng)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("invalid coordinates {lat},{lng}"))),
        _ => Err(AppError::BadRequest(
            "lat and lng must be given together".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn visitors_get_active_entities_only() {
        let filters = ListParams::default().into_filters(false).unwrap();
        assert_eq!(filters.status, Some(EntityStatus::Active));
        assert!(!filters.include_unpublished);
        assert_eq!(filters.limit, DEFAULT_LIST_LIMIT);

        let params = ListParams {
            status: Some("flagged".into()),
            ..Default::default()
        };
        assert_matches!(
            params.into_filters(false),
            Err(AppError::Core(CoreError::Forbidden(_)))
        );
    }

    #[test]
    fn admins_may_list_any_status() {
        let params = ListParams {
            status: Some("unverified".into()),
            ..Default::default()
        };
        let filters = params.into_filters(true).unwrap();
        assert_eq!(filters.status, Some(EntityStatus::Unverified));
        assert!(filters.include_unpublished);

        let filters = ListParams::default().into_filters(true).unwrap();
        assert_eq!(filters.status, None);
    }

    #[test]
    fn tags_are_split_and_limit_clamped() {
        let params = ListParams {
            tags: Some(" yoga, ,surf ".into()),
            limit: Some(50_000),
            ..Default::default()
        };
        let filters = params.into_filters(false).unwrap();
        assert_eq!(filters.tags, vec!["yoga", "surf"]);
        assert_eq!(filters.limit, MAX_LIST_LIMIT);
    }

    #[test]
    fn sort_follows_popular_then_position() {
        let near = ListParams {
            lat: Some(-8.6478),
            lng: Some(115.1395),
            ..Default::default()
        };
        assert_matches!(
            near.into_filters(false).unwrap().sort,
            SortOrder::Distance { .. }
        );

        let popular = ListParams {
            popular: true,
            lat: Some(-8.6478),
            lng: Some(115.1395),
            ..Default::default()
        };
        assert_eq!(popular.into_filters(false).unwrap().sort, SortOrder::Rating);
    }

    #[test]
    fn bad_values_are_rejected() {
        let half_point = ListParams {
            lat: Some(-8.6),
            ..Default::default()
        };
        assert_matches!(half_point.into_filters(false), Err(AppError::BadRequest(_)));

        let bad_type = ListParams {
            entity_type: Some("spaceship".into()),
            ..Default::default()
        };
        assert_matches!(bad_type.into_filters(false), Err(AppError::BadRequest(_)));

        assert_matches!(
            PointParams { lat: Some(91.0), lng: Some(0.0) }.point(),
            Err(AppError::BadRequest(_))
        );
    }
}
