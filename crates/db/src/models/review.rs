//! Imported review rows.

use explorer_core::types::{DbId, Timestamp};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::FromRow;

/// A row from the `reviews` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReviewRow {
    pub id: DbId,
    pub entity_id: String,
    pub author_name: Option<String>,
    pub author_photo: Option<String>,
    pub rating: Option<i16>,
    pub text: Option<String>,
    pub published_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl ReviewRow {
    /// The review in the scraper's loose shape, as the comment feed reads it.
    pub fn to_loose(&self) -> Value {
        json!({
            "name": self.author_name,
            "profilePhotoUrl": self.author_photo,
            "stars": self.rating,
            "text": self.text,
            "publishedAtDate": self.published_at.map(|t| t.to_rfc3339()),
        })
    }
}
