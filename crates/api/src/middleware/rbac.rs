//! Admin gate extractors.
//!
//! Moderation endpoints are guarded by a shared token sent in the
//! `x-admin-token` header and compared against `ADMIN_TOKEN`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use explorer_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the admin token.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Requires a valid admin token.
///
/// A missing header is 401 Unauthorized; a wrong token, or a server without
/// a configured token, is 403 Forbidden.
///
/// ```ignore
/// async fn admin_only(_admin: RequireAdmin) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireAdmin;

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(presented) = presented_token(parts) else {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Missing admin token".into(),
            )));
        };
        if !token_matches(state, presented) {
            return Err(AppError::Core(CoreError::Forbidden(
                "Admin rights required".into(),
            )));
        }
        Ok(RequireAdmin)
    }
}

/// Whether the caller presented a valid admin token. Never rejects.
///
/// Read endpoints use this to widen visibility to unpublished entities.
pub struct MaybeAdmin(pub bool);

impl FromRequestParts<AppState> for MaybeAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let is_admin = presented_token(parts).is_some_and(|t| token_matches(state, t));
        Ok(MaybeAdmin(is_admin))
    }
}

fn presented_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn token_matches(state: &AppState, presented: &str) -> bool {
    state
        .config
        .admin_token
        .as_deref()
        .is_some_and(|expected| expected == presented)
}
