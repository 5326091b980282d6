//! Domain logic for the Bali explorer directory.
//!
//! Everything in this crate is pure or talks to storage only through the
//! [`source::EntitySource`] seam, so the rules can be exercised without a
//! database or a filesystem.

pub mod busyness;
pub mod comments;
pub mod draft;
pub mod entity;
pub mod error;
pub mod features;
pub mod geo;
pub mod guide;
pub mod import;
pub mod merge;
pub mod normalize;
pub mod source;
pub mod types;
pub mod view;
pub mod work_hours;
