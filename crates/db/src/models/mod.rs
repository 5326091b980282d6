//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` struct matching the database row and,
//! where the table is written through a patch, an all-`Option` update DTO.

pub mod entity;
pub mod review;
