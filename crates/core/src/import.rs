//! Bulk import of scraped place exports.
//!
//! The upload is a JSON array (or a single object) of Google-Places-style
//! records. Each record is transformed into an [`ImportedPlace`] and then
//! upserted by its external place id; images and reviews are replaced
//! wholesale on every import. A bad record is counted and reported without
//! stopping the batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::{EntityId, Timestamp};
use crate::work_hours::WorkHours;

/// Images kept per imported place.
pub const MAX_IMPORT_IMAGES: usize = 20;

/// Reviews kept per imported place.
pub const MAX_IMPORT_REVIEWS: usize = 50;

/// Title used when an export record has none.
pub const UNTITLED_PLACE: &str = "Untitled";

/// Number of trailing place-id characters used in derived entity ids.
const PLACE_ID_SUFFIX_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One review row as stored with an imported place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedReviewRow {
    pub author_name: Option<String>,
    pub author_photo: Option<String>,
    /// `1..=5`; anything else is stored as unknown.
    pub rating: Option<i16>,
    pub text: Option<String>,
    pub published_at: Option<Timestamp>,
}

/// A place ready to be upserted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedPlace {
    pub id: EntityId,
    pub place_id: Option<String>,
    pub title: String,
    pub category_name: Option<String>,
    pub total_score: Option<f64>,
    pub reviews_count: i32,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub average_check: Option<String>,
    pub image_url: Option<String>,
    pub opening_hours: Option<WorkHours>,
    pub additional_info: Option<Value>,
    pub popular_times_histogram: Option<Value>,
    pub popular_times_live_text: Option<String>,
    pub images: Vec<String>,
    pub reviews: Vec<ImportedReviewRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkImportReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl BulkImportReport {
    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    /// Count a failed record, labelled by its title when it has one.
    pub fn record_failure(&mut self, raw: &Value, error: &CoreError) {
        self.processed += 1;
        self.failed += 1;
        let label = raw
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Unknown");
        self.errors.push(format!("{label}: {error}"));
    }
}

// ---------------------------------------------------------------------------
// Transformation
// ---------------------------------------------------------------------------

/// Split an upload body into records. A lone object is a batch of one.
pub fn split_payload(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// Entity id derived from an external place id: `place-` plus its last
/// eight characters.
pub fn entity_id_for_place(place_id: &str) -> EntityId {
    let chars: Vec<char> = place_id.chars().collect();
    let start = chars.len().saturating_sub(PLACE_ID_SUFFIX_LEN);
    let suffix: String = chars[start..].iter().collect();
    format!("place-{suffix}")
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlaceRecord {
    place_id: Option<String>,
    title: Option<String>,
    category_name: Option<String>,
    total_score: Option<f64>,
    reviews_count: Option<f64>,
    address: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    location: Option<Location>,
    price: Option<String>,
    image_url: Option<String>,
    image_urls: Option<Vec<String>>,
    gallery: Option<Vec<String>>,
    opening_hours: Option<Value>,
    additional_info: Option<Value>,
    popular_times_histogram: Option<Value>,
    popular_times_live_text: Option<String>,
    reviews: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct Location {
    lat: Option<f64>,
    lng: Option<f64>,
}

/// Transform one export record.
///
/// Fails with a parse error when the record does not have the expected
/// field types (e.g. a string where coordinates belong).
pub fn transform_place(raw: &Value) -> Result<ImportedPlace, CoreError> {
    if !raw.is_object() {
        return Err(CoreError::Parse("place record must be a JSON object".to_string()));
    }
    let record = PlaceRecord::deserialize(raw)
        .map_err(|e| CoreError::Parse(format!("place record: {e}")))?;

    let place_id = non_empty(record.place_id);
    let id = match place_id.as_deref() {
        Some(pid) => entity_id_for_place(pid),
        None => format!("entity-{}", uuid::Uuid::new_v4().simple()),
    };

    let mut images: Vec<String> = record
        .image_urls
        .or(record.gallery)
        .unwrap_or_default()
        .into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect();
    images.truncate(MAX_IMPORT_IMAGES);
    let image_url = non_empty(record.image_url).or_else(|| images.first().cloned());

    let reviews = record
        .reviews
        .unwrap_or_default()
        .iter()
        .take(MAX_IMPORT_REVIEWS)
        .map(review_row)
        .collect();

    let (location_lat, location_lng) = record
        .location
        .map(|l| (l.lat, l.lng))
        .unwrap_or((None, None));

    Ok(ImportedPlace {
        id,
        place_id,
        title: non_empty(record.title).unwrap_or_else(|| UNTITLED_PLACE.to_string()),
        category_name: non_empty(record.category_name),
        total_score: record.total_score.filter(|s| s.is_finite() && *s > 0.0),
        reviews_count: record
            .reviews_count
            .filter(|c| c.is_finite() && *c >= 0.0)
            .map(|c| c.min(f64::from(i32::MAX)) as i32)
            .unwrap_or(0),
        address: non_empty(record.address),
        phone: non_empty(record.phone),
        website: non_empty(record.website),
        location_lat,
        location_lng,
        average_check: non_empty(record.price),
        image_url,
        opening_hours: record.opening_hours.as_ref().and_then(WorkHours::from_value),
        additional_info: record.additional_info.filter(|v| v.is_object() || v.is_array()),
        popular_times_histogram: record
            .popular_times_histogram
            .filter(|v| v.is_object() || v.is_array()),
        popular_times_live_text: non_empty(record.popular_times_live_text),
        images,
        reviews,
    })
}

fn review_row(raw: &Value) -> ImportedReviewRow {
    let text = |key: &str| {
        raw.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let rating = ["stars", "rating"]
        .iter()
        .find_map(|k| raw.get(*k).and_then(Value::as_f64))
        .filter(|r| r.fract() == 0.0 && (1.0..=5.0).contains(r))
        .map(|r| r as i16);
    let published_at = text("publishedAtDate")
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc));

    ImportedReviewRow {
        author_name: text("name"),
        author_photo: text("reviewerPhotoUrl").or_else(|| text("profilePhotoUrl")),
        rating,
        text: text("text").or_else(|| text("textTranslated")),
        published_at,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
