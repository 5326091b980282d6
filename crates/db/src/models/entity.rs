//! Entity row model and patch DTO.

use explorer_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;

/// An `entities` row with its ordered gallery aggregated from `images`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EntityRow {
    pub id: String,
    pub place_id: Option<String>,
    pub entity_type: String,
    pub status: String,
    pub title: String,
    pub short_description: Option<String>,
    pub area: Option<String>,
    pub address: Option<String>,
    pub category_name: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub telegram: Option<String>,
    pub instagram: Option<String>,
    pub website: Option<String>,
    pub price_level: i16,
    pub average_check: Option<String>,
    pub total_score: Option<f64>,
    pub reviews_count: i32,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub gallery: Vec<String>,
    pub opening_hours: Option<Value>,
    pub additional_info: Option<Value>,
    pub popular_times_histogram: Option<Value>,
    pub popular_times_live_text: Option<String>,
    pub last_confirmed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EntityRow {
    /// The row as a raw remote record, ready for the remote adapter.
    pub fn into_record(self) -> Value {
        json!({
            "id": self.id,
            "place_id": self.place_id,
            "type": self.entity_type,
            "status": self.status,
            "title": self.title,
            "short_description": self.short_description,
            "area": self.area,
            "address": self.address,
            "category_name": self.category_name,
            "location_lat": self.location_lat,
            "location_lng": self.location_lng,
            "contacts": {
                "phone": self.phone,
                "whatsapp": self.whatsapp,
                "telegram": self.telegram,
                "instagram": self.instagram,
                "website": self.website,
            },
            "price_level": self.price_level,
            "average_check": self.average_check,
            "total_score": self.total_score,
            "reviews_count": self.reviews_count,
            "tags": self.tags,
            "image_url": self.image_url,
            "gallery": self.gallery,
            "opening_hours": self.opening_hours,
            "additional_info": self.additional_info,
            "popular_times_histogram": self.popular_times_histogram,
            "popular_times_live_text": self.popular_times_live_text,
            "last_confirmed_at": self.last_confirmed_at,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}

/// Partial update in remote record field names. Absent fields are kept.
///
/// `gallery`, when present, replaces the entity's images wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEntity {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub status: Option<String>,
    pub short_description: Option<String>,
    pub area: Option<String>,
    pub address: Option<String>,
    pub category_name: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub telegram: Option<String>,
    pub instagram: Option<String>,
    pub website: Option<String>,
    pub price_level: Option<i16>,
    pub average_check: Option<String>,
    pub tags: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub gallery: Option<Vec<String>>,
    pub opening_hours: Option<Value>,
    pub additional_info: Option<Value>,
    pub last_confirmed_at: Option<Timestamp>,
}
