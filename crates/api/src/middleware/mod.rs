//! Authorization extractors.
//!
//! - [`rbac::RequireAdmin`] -- Requires a valid admin token.
//! - [`rbac::MaybeAdmin`] -- Reports whether the caller is an admin.

pub mod rbac;
