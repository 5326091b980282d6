//! The canonical catalog entry every source is normalized into.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geo::GeoPoint;
use crate::types::{EntityId, Timestamp};
use crate::work_hours::WorkHours;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    #[default]
    Place,
    Service,
    Specialist,
    Realtor,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Place => "place",
            EntityType::Service => "service",
            EntityType::Specialist => "specialist",
            EntityType::Realtor => "realtor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "place" => Some(EntityType::Place),
            "service" => Some(EntityType::Service),
            "specialist" => Some(EntityType::Specialist),
            "realtor" => Some(EntityType::Realtor),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Active,
    Unverified,
    Flagged,
    Archived,
}

impl EntityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityStatus::Active => "active",
            EntityStatus::Unverified => "unverified",
            EntityStatus::Flagged => "flagged",
            EntityStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "active" => Some(EntityStatus::Active),
            "unverified" => Some(EntityStatus::Unverified),
            "flagged" => Some(EntityStatus::Flagged),
            "archived" => Some(EntityStatus::Archived),
            _ => None,
        }
    }

    /// Whether a moderator may move an entity from `self` to `next`.
    ///
    /// New submissions are approved or archived, live entries can be flagged
    /// by users, flags are resolved either way, and archived entries can be
    /// restored.
    pub fn can_transition_to(self, next: EntityStatus) -> bool {
        use EntityStatus::*;
        matches!(
            (self, next),
            (Unverified, Active)
                | (Unverified, Archived)
                | (Active, Flagged)
                | (Active, Archived)
                | (Flagged, Active)
                | (Flagged, Archived)
                | (Archived, Active)
        )
    }

    /// Only active entries are shown outside the admin view.
    pub fn is_public(self) -> bool {
        self == EntityStatus::Active
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl Contacts {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none()
            && self.whatsapp.is_none()
            && self.telegram.is_none()
            && self.instagram.is_none()
            && self.website.is_none()
    }

    /// The phone number reduced to digits and `+`, suitable for `tel:` links.
    pub fn dialable_phone(&self) -> Option<String> {
        self.phone.as_deref().and_then(dialable)
    }
}

/// Strip everything except digits and `+`. `None` when nothing remains.
pub fn dialable(phone: &str) -> Option<String> {
    let digits: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    (!digits.is_empty()).then_some(digits)
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A catalog listing after normalization.
///
/// Derived display state (open status, busyness, distance, features) is not
/// stored here; see [`crate::view::EntityView`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub place_id: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub status: EntityStatus,
    pub title: String,
    /// Empty when the source text merely repeated the address.
    pub short_description: String,
    /// Empty string rather than missing, so area filters compare strings.
    pub area: String,
    pub address_text: String,
    pub category_name: String,
    pub geo_lat: Option<f64>,
    pub geo_lng: Option<f64>,
    pub contacts: Contacts,
    /// `1..=4`, or `0` when unknown.
    pub price_level: u8,
    pub average_check: Option<String>,
    pub rating: f64,
    pub rating_count: u32,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub gallery: Vec<String>,
    pub work_hours: Option<WorkHours>,
    pub additional_info: Option<Value>,
    pub popular_times_histogram: Option<Value>,
    pub popular_times_live_text: Option<String>,
    pub last_confirmed_at: Option<Timestamp>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

impl Entity {
    /// The entity's coordinates, when both are known.
    pub fn geo_point(&self) -> Option<GeoPoint> {
        GeoPoint::new(self.geo_lat?, self.geo_lng?)
    }

    /// `"$$"`-style indicator; `None` for unknown price level.
    pub fn price_indicator(&self) -> Option<String> {
        (1..=4)
            .contains(&self.price_level)
            .then(|| "$".repeat(self.price_level as usize))
    }

    /// The two card thumbnails, `gallery[1..3]`. Slot 0 mirrors the primary
    /// image, so galleries shorter than three have no previews.
    pub fn preview_images(&self) -> Vec<&str> {
        if self.gallery.len() < 3 {
            return Vec::new();
        }
        self.gallery[1..3].iter().map(String::as_str).collect()
    }

    /// Case-insensitive free-text match over title, description, address
    /// and tags.
    pub fn matches_text(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [&self.title, &self.short_description, &self.address_text]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
            || self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }
}
