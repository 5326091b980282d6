//! Amenity extraction from scraped `additionalInfo` blobs.
//!
//! The blob groups amenities into categories, each a list of single-key
//! objects: `{"Service options": [{"Outdoor seating": true}, {"Delivery": false}]}`.
//! Only keys whose value is exactly `true` count as features.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

/// How many features a card shows before collapsing the rest into "+N".
pub const FEATURE_DISPLAY_CAP: usize = 8;

/// Icon used when no keyword matches.
pub const DEFAULT_FEATURE_ICON: &str = "\u{2728}";

/// Keyword table for [`feature_icon`]. First match wins.
const ICON_KEYWORDS: &[(&[&str], &str)] = &[
    (&["wifi", "wi-fi", "вай-фай"], "\u{1F4F6}"),
    (&["terrace", "терраса", "терасса"], "\u{1F3E1}"),
    (&["parking", "парковка"], "\u{1F17F}\u{FE0F}"),
    (&["air conditioning", "кондиционер"], "\u{2744}\u{FE0F}"),
    (&["cocktail", "коктейл"], "\u{1F379}"),
    (&["bar", "бар"], "\u{1F378}"),
    (&["view", "вид"], "\u{1F305}"),
    (&["beach", "пляж"], "\u{1F3D6}\u{FE0F}"),
    (&["pool", "бассейн"], "\u{1F3CA}"),
    (&["music", "музыка"], "\u{1F3B5}"),
    (&["vegan", "веган"], "\u{1F331}"),
    (&["kid", "child", "детск"], "\u{1F476}"),
    (&["card", "карт"], "\u{1F4B3}"),
    (&["delivery", "достав"], "\u{1F69A}"),
    (&["breakfast", "завтрак"], "\u{1F373}"),
    (&["coffee", "кофе"], "\u{2615}"),
    (&["outdoor", "street", "улица"], "\u{1F333}"),
];

/// Collect the names of all features flagged `true`, first occurrence order,
/// without duplicates.
///
/// Accepts the category map or a bare list of flag objects. Items that are
/// not single-key objects are skipped. Anything else yields an empty list;
/// this never fails.
pub fn extract_features(additional_info: &Value) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut features = Vec::new();

    let mut collect = |bucket: &Value| {
        let Some(items) = bucket.as_array() else {
            return;
        };
        for item in items {
            let Some((name, flag)) = item
                .as_object()
                .filter(|flags| flags.len() == 1)
                .and_then(|flags| flags.iter().next())
            else {
                continue;
            };
            if flag == &Value::Bool(true) && seen.insert(name.clone()) {
                features.push(name.clone());
            }
        }
    };

    match additional_info {
        Value::Object(categories) => categories.values().for_each(&mut collect),
        Value::Array(_) => collect(additional_info),
        _ => {}
    }

    features
}

/// Pick a display icon for a feature name by keyword.
pub fn feature_icon(feature: &str) -> &'static str {
    let lower = feature.to_lowercase();
    if lower.split(|c: char| !c.is_alphanumeric()).any(|word| word == "ac") {
        return "\u{2744}\u{FE0F}";
    }
    ICON_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, icon)| *icon)
        .unwrap_or(DEFAULT_FEATURE_ICON)
}

/// Features trimmed to a display cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureList {
    pub shown: Vec<String>,
    /// Count rendered as "+N"; zero when everything fits.
    pub hidden: usize,
}

pub fn cap_features(mut features: Vec<String>, cap: usize) -> FeatureList {
    let hidden = features.len().saturating_sub(cap);
    features.truncate(cap);
    FeatureList {
        shown: features,
        hidden,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_only_true_flags_and_dedupes() {
        let info = json!([{ "WiFi": true }, { "Parking": false }, { "WiFi": true }]);
        assert_eq!(extract_features(&info), vec!["WiFi"]);
    }

    #[test]
    fn reads_category_map() {
        let info = json!({
            "Amenities": [{ "Outdoor seating": true }, { "Restroom": "yes" }],
            "Payments": [{ "Credit cards": true }, { "Outdoor seating": true }]
        });
        let features = extract_features(&info);
        assert_eq!(features.len(), 2);
        assert!(features.contains(&"Outdoor seating".to_string()));
        assert!(features.contains(&"Credit cards".to_string()));
    }

    #[test]
    fn multi_key_items_are_skipped() {
        let info = json!({ "Amenities": [{ "WiFi": true, "Parking": true }, { "Bar": true }] });
        assert_eq!(extract_features(&info), vec!["Bar"]);

        let info = json!([{}, { "Pool": true }]);
        assert_eq!(extract_features(&info), vec!["Pool"]);
    }

    #[test]
    fn truthy_non_bool_values_are_ignored() {
        let info = json!({ "Misc": [{ "Pets": 1 }, { "Music": "true" }, { "Bar": null }] });
        assert!(extract_features(&info).is_empty());
    }

    #[test]
    fn malformed_shapes_yield_nothing() {
        assert!(extract_features(&json!(null)).is_empty());
        assert!(extract_features(&json!("wifi")).is_empty());
        assert!(extract_features(&json!({ "Amenities": "wifi" })).is_empty());
        assert!(extract_features(&json!({ "Amenities": ["wifi", 3] })).is_empty());
    }

    #[test]
    fn icons_match_keywords_in_both_languages() {
        assert_eq!(feature_icon("Free Wi-Fi"), "\u{1F4F6}");
        assert_eq!(feature_icon("Терраса"), "\u{1F3E1}");
        assert_eq!(feature_icon("Cocktails"), "\u{1F379}");
        assert_eq!(feature_icon("AC"), "\u{2744}\u{FE0F}");
        assert_eq!(feature_icon("Beach access"), "\u{1F3D6}\u{FE0F}");
        assert_eq!(feature_icon("Quiet"), DEFAULT_FEATURE_ICON);
    }

    #[test]
    fn cap_reports_hidden_count() {
        let features: Vec<String> = (0..11).map(|i| format!("f{i}")).collect();
        let list = cap_features(features, FEATURE_DISPLAY_CAP);
        assert_eq!(list.shown.len(), 8);
        assert_eq!(list.hidden, 3);

        let list = cap_features(vec!["a".into()], FEATURE_DISPLAY_CAP);
        assert_eq!(list.hidden, 0);
    }
}
