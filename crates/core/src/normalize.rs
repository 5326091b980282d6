//! Raw record normalization.
//!
//! Records reach us in two shapes: snake_case rows from the relational store
//! (`SourceKind::Remote`) and camelCase scraper-style objects from the local
//! cache (`SourceKind::Local`). Each shape has its own adapter struct naming
//! the fields it may carry; both converge on [`Entity`]. Values are coerced
//! leniently (numbers stored as strings, JSON stored as text) and nothing
//! here reads the clock.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::entity::{Contacts, Entity, EntityStatus, EntityType};
use crate::error::CoreError;
use crate::types::Timestamp;
use crate::work_hours::WorkHours;

/// Which backend a raw record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Remote,
    Local,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Remote => "remote",
            SourceKind::Local => "local",
        }
    }

    /// Status assumed when a record carries none. Rows in the relational
    /// store predate moderation and are live; local additions await review.
    pub fn default_status(self) -> EntityStatus {
        match self {
            SourceKind::Remote => EntityStatus::Active,
            SourceKind::Local => EntityStatus::Unverified,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw record that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub source: SourceKind,
    /// Position of the record in the fetched batch.
    pub index: usize,
    pub id: Option<String>,
    pub reason: String,
}

/// Normalize one raw record. Records without an id or title are rejected.
pub fn normalize(raw: &Value, kind: SourceKind) -> Result<Entity, CoreError> {
    if !raw.is_object() {
        return Err(CoreError::Parse(format!(
            "{kind} record must be a JSON object"
        )));
    }
    let parse_error = |e: serde_json::Error| CoreError::Parse(format!("{kind} record: {e}"));
    match kind {
        SourceKind::Remote => RemoteRecord::deserialize(raw)
            .map_err(parse_error)?
            .into_entity(),
        SourceKind::Local => LocalRecord::deserialize(raw)
            .map_err(parse_error)?
            .into_entity(),
    }
}

/// Normalize a batch, splitting it into entities and rejections.
pub fn normalize_batch(raws: &[Value], kind: SourceKind) -> (Vec<Entity>, Vec<Rejection>) {
    let mut entities = Vec::with_capacity(raws.len());
    let mut rejected = Vec::new();
    for (index, raw) in raws.iter().enumerate() {
        match normalize(raw, kind) {
            Ok(entity) => entities.push(entity),
            Err(e) => rejected.push(Rejection {
                source: kind,
                index,
                id: raw.get("id").and_then(text),
                reason: e.to_string(),
            }),
        }
    }
    (entities, rejected)
}

// ---------------------------------------------------------------------------
// Remote adapter
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RemoteRecord {
    id: Option<Value>,
    place_id: Option<Value>,
    #[serde(rename = "type")]
    entity_type: Option<Value>,
    status: Option<Value>,
    title: Option<Value>,
    short_description: Option<Value>,
    area: Option<Value>,
    address: Option<Value>,
    address_text: Option<Value>,
    category_name: Option<Value>,
    location_lat: Option<Value>,
    location_lng: Option<Value>,
    geo_lat: Option<Value>,
    geo_lng: Option<Value>,
    contacts: Option<Value>,
    phone: Option<Value>,
    website: Option<Value>,
    price_level: Option<Value>,
    average_check: Option<Value>,
    total_score: Option<Value>,
    rating: Option<Value>,
    reviews_count: Option<Value>,
    rating_count: Option<Value>,
    places_tags: Option<Value>,
    tags: Option<Value>,
    image_url: Option<Value>,
    gallery: Option<Value>,
    work_hours: Option<Value>,
    opening_hours: Option<Value>,
    additional_info: Option<Value>,
    popular_times_histogram: Option<Value>,
    popular_times_live_text: Option<Value>,
    last_confirmed_at: Option<Value>,
    created_at: Option<Value>,
    updated_at: Option<Value>,
}

impl RemoteRecord {
    fn into_entity(self) -> Result<Entity, CoreError> {
        let id = required_id(self.id.as_ref())?;
        let title = required_title(&id, self.title.as_ref())?;
        let address_text = first_text(&[&self.address, &self.address_text]).unwrap_or_default();
        let (geo_lat, geo_lng) = first_geo_pair(&[
            (self.location_lat.as_ref(), self.location_lng.as_ref()),
            (self.geo_lat.as_ref(), self.geo_lng.as_ref()),
        ]);
        let gallery = string_list(self.gallery.as_ref());
        let image_url = opt_text(&self.image_url).or_else(|| gallery.first().cloned());

        Ok(Entity {
            place_id: opt_text(&self.place_id),
            entity_type: entity_type(self.entity_type.as_ref()),
            status: entity_status(self.status.as_ref(), SourceKind::Remote),
            short_description: distinct_from_address(opt_text(&self.short_description), &address_text),
            area: opt_text(&self.area).unwrap_or_default(),
            category_name: opt_text(&self.category_name).unwrap_or_default(),
            geo_lat,
            geo_lng,
            contacts: contacts(
                self.contacts.as_ref(),
                opt_text(&self.phone),
                opt_text(&self.website),
            ),
            price_level: price_level(self.price_level.as_ref()),
            average_check: opt_text(&self.average_check),
            rating: first_f64(&[&self.total_score, &self.rating]).unwrap_or(0.0),
            rating_count: first_u32(&[&self.reviews_count, &self.rating_count]).unwrap_or(0),
            tags: first_list(&[&self.places_tags, &self.tags]),
            image_url,
            gallery,
            work_hours: first_work_hours(&[&self.work_hours, &self.opening_hours]),
            additional_info: structured(self.additional_info.as_ref()),
            popular_times_histogram: structured(self.popular_times_histogram.as_ref()),
            popular_times_live_text: opt_text(&self.popular_times_live_text),
            last_confirmed_at: timestamp(self.last_confirmed_at.as_ref()),
            created_at: timestamp(self.created_at.as_ref()),
            updated_at: timestamp(self.updated_at.as_ref()),
            id,
            title,
            address_text,
        })
    }
}

// ---------------------------------------------------------------------------
// Local adapter
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LocalRecord {
    id: Option<Value>,
    place_id: Option<Value>,
    #[serde(rename = "type")]
    entity_type: Option<Value>,
    status: Option<Value>,
    title: Option<Value>,
    #[serde(rename = "short_description")]
    short_description: Option<Value>,
    area: Option<Value>,
    address: Option<Value>,
    #[serde(rename = "address_text")]
    address_text: Option<Value>,
    category_name: Option<Value>,
    location: Option<Value>,
    #[serde(rename = "geo_lat")]
    geo_lat: Option<Value>,
    #[serde(rename = "geo_lng")]
    geo_lng: Option<Value>,
    contacts: Option<Value>,
    phone: Option<Value>,
    website: Option<Value>,
    #[serde(rename = "price_level")]
    price_level: Option<Value>,
    price: Option<Value>,
    #[serde(rename = "average_check")]
    average_check: Option<Value>,
    total_score: Option<Value>,
    rating: Option<Value>,
    reviews_count: Option<Value>,
    #[serde(rename = "rating_count")]
    rating_count: Option<Value>,
    places_tags: Option<Value>,
    tags: Option<Value>,
    #[serde(rename = "imageUrl")]
    parser_image_url: Option<Value>,
    #[serde(rename = "image_url")]
    image_url: Option<Value>,
    image_urls: Option<Value>,
    gallery: Option<Value>,
    #[serde(alias = "opening_hours")]
    opening_hours: Option<Value>,
    #[serde(rename = "work_hours")]
    work_hours: Option<Value>,
    additional_info: Option<Value>,
    popular_times_histogram: Option<Value>,
    popular_times_live_text: Option<Value>,
    #[serde(rename = "last_confirmed_at")]
    last_confirmed_at: Option<Value>,
    #[serde(rename = "created_at")]
    created_at: Option<Value>,
    #[serde(rename = "updated_at")]
    updated_at: Option<Value>,
}

impl LocalRecord {
    fn into_entity(self) -> Result<Entity, CoreError> {
        let id = required_id(self.id.as_ref())?;
        let title = required_title(&id, self.title.as_ref())?;
        let address_text = first_text(&[&self.address, &self.address_text]).unwrap_or_default();
        let nested = self.location.as_ref();
        let (geo_lat, geo_lng) = first_geo_pair(&[
            (
                nested.and_then(|l| l.get("lat")),
                nested.and_then(|l| l.get("lng")),
            ),
            (self.geo_lat.as_ref(), self.geo_lng.as_ref()),
        ]);

        // Scraper exports put either "$$" or a money range in `price`.
        let price_text = opt_text(&self.price);
        let dollar_price = price_text
            .as_deref()
            .filter(|p| !p.is_empty() && p.chars().all(|c| c == '$'))
            .map(|p| Value::from(p.len()));
        let price_level = price_level(self.price_level.as_ref().or(dollar_price.as_ref()));
        let average_check = opt_text(&self.average_check)
            .or_else(|| price_text.filter(|_| dollar_price.is_none()));

        let mut gallery = string_list(self.image_urls.as_ref());
        if gallery.is_empty() {
            gallery = string_list(self.gallery.as_ref());
        }

        Ok(Entity {
            place_id: opt_text(&self.place_id),
            entity_type: entity_type(self.entity_type.as_ref()),
            status: entity_status(self.status.as_ref(), SourceKind::Local),
            short_description: distinct_from_address(opt_text(&self.short_description), &address_text),
            area: opt_text(&self.area).unwrap_or_default(),
            category_name: opt_text(&self.category_name).unwrap_or_default(),
            geo_lat,
            geo_lng,
            contacts: contacts(
                self.contacts.as_ref(),
                opt_text(&self.phone),
                opt_text(&self.website),
            ),
            price_level,
            average_check,
            rating: first_f64(&[&self.total_score, &self.rating]).unwrap_or(0.0),
            rating_count: first_u32(&[&self.reviews_count, &self.rating_count]).unwrap_or(0),
            tags: first_list(&[&self.places_tags, &self.tags]),
            image_url: first_text(&[&self.parser_image_url, &self.image_url]),
            gallery,
            work_hours: first_work_hours(&[&self.opening_hours, &self.work_hours]),
            additional_info: structured(self.additional_info.as_ref()),
            popular_times_histogram: structured(self.popular_times_histogram.as_ref()),
            popular_times_live_text: opt_text(&self.popular_times_live_text),
            last_confirmed_at: timestamp(self.last_confirmed_at.as_ref()),
            created_at: timestamp(self.created_at.as_ref()),
            updated_at: timestamp(self.updated_at.as_ref()),
            id,
            title,
            address_text,
        })
    }
}

/// Every key the local adapter reads. A rewritten local record drops these
/// before taking the fresh fields so a stale alias cannot shadow them.
pub const LOCAL_RECORD_KEYS: &[&str] = &[
    "id",
    "placeId",
    "type",
    "status",
    "title",
    "short_description",
    "area",
    "address",
    "address_text",
    "categoryName",
    "location",
    "geo_lat",
    "geo_lng",
    "contacts",
    "phone",
    "website",
    "price_level",
    "price",
    "average_check",
    "totalScore",
    "rating",
    "reviewsCount",
    "rating_count",
    "placesTags",
    "tags",
    "imageUrl",
    "image_url",
    "imageUrls",
    "gallery",
    "openingHours",
    "opening_hours",
    "work_hours",
    "additionalInfo",
    "popularTimesHistogram",
    "popularTimesLiveText",
    "last_confirmed_at",
    "created_at",
    "updated_at",
];

// ---------------------------------------------------------------------------
// Back to source shape
// ---------------------------------------------------------------------------

/// Express an entity in the raw shape of `kind`.
///
/// `normalize(&to_raw(&e, kind), kind)` yields `e` again for any entity that
/// came out of `normalize`.
pub fn to_raw(entity: &Entity, kind: SourceKind) -> Value {
    match kind {
        SourceKind::Remote => json!({
            "id": entity.id,
            "place_id": entity.place_id,
            "type": entity.entity_type,
            "status": entity.status,
            "title": entity.title,
            "short_description": entity.short_description,
            "area": entity.area,
            "address": entity.address_text,
            "category_name": entity.category_name,
            "location_lat": entity.geo_lat,
            "location_lng": entity.geo_lng,
            "contacts": entity.contacts,
            "price_level": entity.price_level,
            "average_check": entity.average_check,
            "total_score": entity.rating,
            "reviews_count": entity.rating_count,
            "tags": entity.tags,
            "image_url": entity.image_url,
            "gallery": entity.gallery,
            "work_hours": entity.work_hours,
            "additional_info": entity.additional_info,
            "popular_times_histogram": entity.popular_times_histogram,
            "popular_times_live_text": entity.popular_times_live_text,
            "last_confirmed_at": entity.last_confirmed_at,
            "created_at": entity.created_at,
            "updated_at": entity.updated_at,
        }),
        SourceKind::Local => {
            let location = match (entity.geo_lat, entity.geo_lng) {
                (Some(lat), Some(lng)) => json!({ "lat": lat, "lng": lng }),
                _ => Value::Null,
            };
            json!({
                "id": entity.id,
                "placeId": entity.place_id,
                "type": entity.entity_type,
                "status": entity.status,
                "title": entity.title,
                "short_description": entity.short_description,
                "area": entity.area,
                "address": entity.address_text,
                "categoryName": entity.category_name,
                "location": location,
                "geo_lat": entity.geo_lat,
                "geo_lng": entity.geo_lng,
                "contacts": entity.contacts,
                "price_level": entity.price_level,
                "average_check": entity.average_check,
                "totalScore": entity.rating,
                "reviewsCount": entity.rating_count,
                "tags": entity.tags,
                "imageUrl": entity.image_url,
                "imageUrls": entity.gallery,
                "openingHours": entity.work_hours,
                "additionalInfo": entity.additional_info,
                "popularTimesHistogram": entity.popular_times_histogram,
                "popularTimesLiveText": entity.popular_times_live_text,
                "last_confirmed_at": entity.last_confirmed_at,
                "created_at": entity.created_at,
                "updated_at": entity.updated_at,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Coercion helpers
// ---------------------------------------------------------------------------

/// Trimmed, non-empty text from a string or number.
fn text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn opt_text(value: &Option<Value>) -> Option<String> {
    value.as_ref().and_then(text)
}

fn first_text(candidates: &[&Option<Value>]) -> Option<String> {
    candidates.iter().find_map(|v| opt_text(v))
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn first_f64(candidates: &[&Option<Value>]) -> Option<f64> {
    candidates.iter().find_map(|v| v.as_ref().and_then(number))
}

fn first_u32(candidates: &[&Option<Value>]) -> Option<u32> {
    candidates.iter().find_map(|v| {
        v.as_ref()
            .and_then(number)
            .filter(|n| *n >= 0.0 && *n <= f64::from(u32::MAX))
            .map(|n| n.round() as u32)
    })
}

fn required_id(value: Option<&Value>) -> Result<String, CoreError> {
    value
        .and_then(text)
        .ok_or_else(|| CoreError::Validation("record is missing an id".to_string()))
}

fn required_title(id: &str, value: Option<&Value>) -> Result<String, CoreError> {
    value
        .and_then(text)
        .ok_or_else(|| CoreError::Validation(format!("record {id} is missing a title")))
}

fn entity_type(value: Option<&Value>) -> EntityType {
    value
        .and_then(Value::as_str)
        .and_then(EntityType::parse)
        .unwrap_or_default()
}

fn entity_status(value: Option<&Value>, kind: SourceKind) -> EntityStatus {
    value
        .and_then(Value::as_str)
        .and_then(EntityStatus::parse)
        .unwrap_or_else(|| kind.default_status())
}

fn distinct_from_address(description: Option<String>, address: &str) -> String {
    match description {
        Some(d) if d != address.trim() => d,
        _ => String::new(),
    }
}

/// Parse one coordinate pair. A `0/0` pair is a missing-value sentinel.
fn geo_pair(lat: Option<&Value>, lng: Option<&Value>) -> (Option<f64>, Option<f64>) {
    let lat = lat.and_then(number).filter(|v| (-90.0..=90.0).contains(v));
    let lng = lng.and_then(number).filter(|v| (-180.0..=180.0).contains(v));
    match (lat, lng) {
        (Some(a), Some(b)) if a == 0.0 && b == 0.0 => (None, None),
        pair => pair,
    }
}

fn first_geo_pair(candidates: &[(Option<&Value>, Option<&Value>)]) -> (Option<f64>, Option<f64>) {
    candidates
        .iter()
        .map(|(lat, lng)| geo_pair(*lat, *lng))
        .find(|(lat, lng)| lat.is_some() || lng.is_some())
        .unwrap_or((None, None))
}

fn contacts(structured: Option<&Value>, phone: Option<String>, website: Option<String>) -> Contacts {
    let parsed = structured
        .and_then(json_value)
        .filter(Value::is_object)
        .map(|v| Contacts {
            phone: v.get("phone").and_then(text),
            whatsapp: v.get("whatsapp").and_then(text),
            telegram: v.get("telegram").and_then(text),
            instagram: v.get("instagram").and_then(text),
            website: v.get("website").and_then(text),
        });
    match parsed {
        Some(contacts) => contacts,
        None => Contacts {
            phone,
            website,
            ..Default::default()
        },
    }
}

fn price_level(value: Option<&Value>) -> u8 {
    value
        .and_then(number)
        .filter(|n| n.fract() == 0.0 && (1.0..=4.0).contains(n))
        .map(|n| n as u8)
        .unwrap_or(0)
}

/// Decode JSON stored as text; pass other values through.
fn json_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) => serde_json::from_str::<Value>(s).ok(),
        other => Some(other.clone()),
    }
}

/// Only objects and arrays are meaningful for structured blobs.
fn structured(value: Option<&Value>) -> Option<Value> {
    value
        .and_then(json_value)
        .filter(|v| v.is_object() || v.is_array())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if s.trim_start().starts_with('[') => {
            serde_json::from_str::<Value>(s)
                .map(|v| string_list(Some(&v)))
                .unwrap_or_default()
        }
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items.iter().filter_map(text).collect(),
        _ => Vec::new(),
    }
}

fn first_list(candidates: &[&Option<Value>]) -> Vec<String> {
    candidates
        .iter()
        .map(|v| string_list(v.as_ref()))
        .find(|list| !list.is_empty())
        .unwrap_or_default()
}

fn first_work_hours(candidates: &[&Option<Value>]) -> Option<WorkHours> {
    candidates
        .iter()
        .find_map(|v| v.as_ref().and_then(WorkHours::from_value))
}

/// RFC 3339, a naive `YYYY-MM-DD HH:MM:SS` in UTC, or epoch milliseconds.
fn timestamp(value: Option<&Value>) -> Option<Timestamp> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
                        .iter()
                        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single(),
        _ => None,
    }
}
