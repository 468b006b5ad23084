//! Authentication extractors.
//!
//! This module provides extractors for:
//! - `AuthUser` - end-user identity forwarded by the forum frontend
//! - `ServiceAuth` - forum-to-service authentication via API key

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use yaks_core::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// An authenticated user extracted from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user id.
    pub user_id: UserId,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        // The forum frontend forwards identity as "user-token:<user-uuid>".
        // TODO: validate a signature over the token against the forum's SSO
        // secret instead of trusting the raw id.
        if let Some(user_id_str) = token.strip_prefix("user-token:") {
            let user_id = user_id_str
                .parse::<UserId>()
                .map_err(|_| ApiError::Unauthorized)?;

            return Ok(AuthUser { user_id });
        }

        Err(ApiError::Unauthorized)
    }
}

/// Service authentication via API key.
///
/// Used for forum-to-service requests (earning hooks, admin surface).
#[derive(Debug, Clone)]
pub struct ServiceAuth {
    /// The calling service name, when provided.
    pub service_name: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for ServiceAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let expected_key = state
            .config
            .service_api_key
            .as_ref()
            .ok_or(ApiError::Unauthorized)?;

        if api_key != expected_key {
            return Err(ApiError::Unauthorized);
        }

        let service_name = parts
            .headers
            .get("x-service-name")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Ok(ServiceAuth { service_name })
    }
}
