//! Admin-submitted entity drafts.
//!
//! A draft carries the loosely filled form: five fixed gallery slots plus an
//! overflow list, a formatted phone number, and an optional schedule.
//! [`EntityDraft::finalize`] validates it and produces the [`Entity`] to
//! store, assembling the gallery and filling schedule defaults on the way.

use serde::Deserialize;
use validator::Validate;

use crate::entity::{Contacts, Entity, EntityStatus, EntityType};
use crate::error::CoreError;
use crate::geo::GeoPoint;
use crate::import::entity_id_for_place;
use crate::types::Timestamp;
use crate::work_hours::WorkHours;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct EntityDraft {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    pub category_name: Option<String>,
    #[validate(length(max = 500))]
    pub short_description: Option<String>,
    pub area: Option<String>,
    pub address: Option<String>,
    pub place_id: Option<String>,
    #[validate(range(min = -90.0, max = 90.0, message = "latitude out of range"))]
    pub lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "longitude out of range"))]
    pub lng: Option<f64>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub telegram: Option<String>,
    pub instagram: Option<String>,
    pub website: Option<String>,
    #[validate(range(min = 0, max = 4, message = "price level must be 0-4"))]
    pub price_level: Option<u8>,
    pub average_check: Option<String>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub gallery_1: Option<String>,
    pub gallery_2: Option<String>,
    pub gallery_3: Option<String>,
    pub gallery_4: Option<String>,
    pub gallery_5: Option<String>,
    pub gallery_extra: Vec<String>,
    pub work_hours: Option<WorkHours>,
}

impl EntityDraft {
    /// Slots then overflow, blanks dropped, order kept.
    pub fn gallery(&self) -> Vec<String> {
        [
            &self.gallery_1,
            &self.gallery_2,
            &self.gallery_3,
            &self.gallery_4,
            &self.gallery_5,
        ]
        .into_iter()
        .flatten()
        .chain(self.gallery_extra.iter())
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
    }

    /// Validate the draft and build the entity to store.
    ///
    /// New entities start `unverified`. Days missing from the schedule get
    /// the default hours; an absent schedule becomes the default week.
    pub fn finalize(self, now: Timestamp) -> Result<Entity, CoreError> {
        self.validate().map_err(CoreError::from_validation)?;

        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(CoreError::Validation("title must not be blank".to_string()));
        }

        let (geo_lat, geo_lng) = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => {
                let point = GeoPoint::new(lat, lng).ok_or_else(|| {
                    CoreError::Validation(format!("invalid coordinates {lat},{lng}"))
                })?;
                (Some(point.lat), Some(point.lng))
            }
            (None, None) => (None, None),
            _ => {
                return Err(CoreError::Validation(
                    "latitude and longitude must be given together".to_string(),
                ))
            }
        };

        let work_hours = self
            .work_hours
            .clone()
            .unwrap_or_default()
            .with_default_days();
        work_hours.validate()?;

        let gallery = self.gallery();
        let image_url = clean(self.image_url).or_else(|| gallery.first().cloned());
        let place_id = clean(self.place_id);
        let id = match place_id.as_deref() {
            Some(pid) => entity_id_for_place(pid),
            None => format!("entity-{}", uuid::Uuid::new_v4().simple()),
        };
        let address_text = clean(self.address).unwrap_or_default();
        let short_description = clean(self.short_description)
            .filter(|d| *d != address_text)
            .unwrap_or_default();

        Ok(Entity {
            id,
            place_id,
            entity_type: self.entity_type,
            status: EntityStatus::Unverified,
            title,
            short_description,
            area: clean(self.area).unwrap_or_default(),
            address_text,
            category_name: clean(self.category_name).unwrap_or_default(),
            geo_lat,
            geo_lng,
            contacts: Contacts {
                phone: clean(self.phone),
                whatsapp: clean(self.whatsapp),
                telegram: clean(self.telegram),
                instagram: clean(self.instagram),
                website: clean(self.website),
            },
            price_level: self.price_level.unwrap_or(0),
            average_check: clean(self.average_check),
            rating: 0.0,
            rating_count: 0,
            tags: self
                .tags
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            image_url,
            gallery,
            work_hours: Some(work_hours),
            additional_info: None,
            popular_times_histogram: None,
            popular_times_live_text: None,
            last_confirmed_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
