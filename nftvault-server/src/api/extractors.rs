//! Custom Axum extractors for request authentication.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::error::ApiError;
use crate::state::AppState;

/// Header carrying the plaintext admin secret.
pub const ADMIN_AUTH_HEADER: &str = "Vault-Admin-Authorization";

/// Proof that the request carries the admin secret.
///
/// The header value is checked against the argon2 hash from the config.
pub(crate) struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .ok_or(ApiError::Unauthorized)?
            .to_str()
            .map_err(|_| ApiError::Unauthorized)?;

        if !state.admin.verify_secret(secret) {
            tracing::warn!("Rejected admin request with wrong secret");
            return Err(ApiError::Unauthorized);
        }
        Ok(AdminAuth)
    }
}
