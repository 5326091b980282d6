//! Render-time state derived from an [`Entity`].
//!
//! Everything here is computed on demand and never stored. Each field
//! degrades to its empty value on bad data so one broken schedule or
//! histogram does not take the whole card down.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::busyness::{resolve_busyness, Busyness};
use crate::entity::Entity;
use crate::features::{cap_features, extract_features, feature_icon, FEATURE_DISPLAY_CAP};
use crate::geo::GeoPoint;
use crate::work_hours::{format_week, open_status, DayOfWeek, OpenStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureBadge {
    pub name: String,
    pub icon: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekLine {
    pub day: DayOfWeek,
    pub label: &'static str,
    pub hours: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityView {
    #[serde(flatten)]
    pub entity: Entity,
    pub open_status: Option<OpenStatus>,
    pub open_label: Option<String>,
    pub busyness: Option<Busyness>,
    pub distance_km: Option<f64>,
    pub features: Vec<FeatureBadge>,
    /// Features beyond the display cap, rendered as "+N".
    pub hidden_features: usize,
    /// Digits-and-plus phone for `tel:` links.
    pub tel: Option<String>,
    pub price_indicator: Option<String>,
    pub preview_images: Vec<String>,
    pub week: Vec<WeekLine>,
}

impl EntityView {
    pub fn derive(entity: Entity, now: DateTime<Utc>, user_point: Option<GeoPoint>) -> Self {
        let open_status = match open_status(entity.work_hours.as_ref(), now) {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!(entity_id = %entity.id, error = %e, "Unreadable schedule");
                None
            }
        };
        let open_label = open_status.as_ref().map(ToString::to_string);

        let busyness = resolve_busyness(
            entity.popular_times_histogram.as_ref(),
            entity.popular_times_live_text.as_deref(),
            now,
        );

        let distance_km = match (user_point, entity.geo_point()) {
            (Some(user), Some(place)) => Some(user.distance_km(&place)),
            _ => None,
        };

        let extracted = entity
            .additional_info
            .as_ref()
            .map(extract_features)
            .unwrap_or_default();
        let capped = cap_features(extracted, FEATURE_DISPLAY_CAP);
        let features = capped
            .shown
            .into_iter()
            .map(|name| FeatureBadge {
                icon: feature_icon(&name),
                name,
            })
            .collect();

        let week = entity
            .work_hours
            .as_ref()
            .filter(|w| !w.is_empty())
            .map(|w| {
                format_week(w)
                    .into_iter()
                    .map(|(day, hours)| WeekLine {
                        day,
                        label: day.short_label(),
                        hours,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            open_status,
            open_label,
            busyness,
            distance_km,
            features,
            hidden_features: capped.hidden,
            tel: entity.contacts.dialable_phone(),
            price_indicator: entity.price_indicator(),
            preview_images: entity
                .preview_images()
                .into_iter()
                .map(str::to_string)
                .collect(),
            week,
            entity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures;
    use crate::work_hours::{DayHours, WorkHours};
    use chrono::TimeZone;
    use serde_json::json;

    /// Monday 10:30 in Bali.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 2, 30, 0).unwrap()
    }

    #[test]
    fn bare_entity_has_empty_view() {
        let view = EntityView::derive(fixtures::entity("e1", "Warung"), now(), None);
        assert_eq!(view.open_status, None);
        assert_eq!(view.open_label, None);
        assert_eq!(view.busyness, None);
        assert_eq!(view.distance_km, None);
        assert!(view.features.is_empty());
        assert_eq!(view.hidden_features, 0);
        assert_eq!(view.tel, None);
        assert_eq!(view.price_indicator, None);
        assert!(view.week.is_empty());
    }

    #[test]
    fn derives_all_fields() {
        let mut e = fixtures::entity("e1", "Warung");
        e.work_hours = Some(WorkHours::default_week());
        e.geo_lat = Some(-8.6478);
        e.geo_lng = Some(115.1385);
        e.price_level = 2;
        e.contacts.phone = Some("+62 812-345".into());
        e.additional_info = Some(json!({ "Amenities": [{ "Wi-Fi": true }, { "Pool": true }] }));
        e.popular_times_histogram = Some(json!([{ "data": [{ "hour": 10, "occupancy": 40 }] }]));

        let user = GeoPoint::new(-8.6478, 115.1385);
        let view = EntityView::derive(e, now(), user);

        assert_eq!(
            view.open_status,
            Some(OpenStatus::OpenUntil { close: "18:00".into() })
        );
        assert_eq!(view.open_label.as_deref(), Some("Open until 18:00"));
        assert_eq!(view.busyness.unwrap().percentage, 40);
        assert_eq!(view.distance_km, Some(0.0));
        assert_eq!(view.features.len(), 2);
        assert_eq!(view.features[0].name, "Wi-Fi");
        assert_eq!(view.tel.as_deref(), Some("+62812345"));
        assert_eq!(view.price_indicator.as_deref(), Some("$$"));
        assert_eq!(view.week.len(), 7);
        assert_eq!(view.week[0].hours, "09:00 - 18:00");
        assert_eq!(view.week[6].day, DayOfWeek::Sunday);
    }

    #[test]
    fn bad_schedule_only_drops_open_status() {
        let mut hours = WorkHours::new();
        hours.insert(DayOfWeek::Monday, DayHours::new("nine", "18:00"));
        let mut e = fixtures::entity("e1", "Warung");
        e.work_hours = Some(hours);
        e.price_level = 1;
        let view = EntityView::derive(e, now(), None);
        assert_eq!(view.open_status, None);
        assert_eq!(view.price_indicator.as_deref(), Some("$"));
        assert_eq!(view.week[0].hours, "nine - 18:00");
    }

    #[test]
    fn features_beyond_cap_are_counted() {
        let flags: Vec<_> = (0..11).map(|i| json!({ format!("Feature {i}"): true })).collect();
        let mut e = fixtures::entity("e1", "Warung");
        e.additional_info = Some(json!({ "Misc": flags }));
        let view = EntityView::derive(e, now(), None);
        assert_eq!(view.features.len(), FEATURE_DISPLAY_CAP);
        assert_eq!(view.hidden_features, 3);
    }

    #[test]
    fn view_serializes_flat() {
        let view = EntityView::derive(fixtures::entity("e1", "Warung"), now(), None);
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["id"], "e1");
        assert_eq!(value["type"], "place");
        assert!(value["open_status"].is_null());
    }
}
