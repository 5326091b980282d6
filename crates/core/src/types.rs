/// Entities are keyed by opaque strings shared by both sources.
pub type EntityId = String;

/// Row identifiers for images and reviews (`BIGSERIAL`).
pub type DbId = i64;

/// All timestamps use UTC with timezone info.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
