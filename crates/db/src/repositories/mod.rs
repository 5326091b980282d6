//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod entity_repo;
pub mod image_repo;
pub mod review_repo;

pub use entity_repo::{EntityListQuery, EntityRepo};
pub use image_repo::ImageRepo;
pub use review_repo::ReviewRepo;
