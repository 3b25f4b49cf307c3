//! Identity boundary for the upgrade endpoint.
//!
//! The server never validates credentials itself. A resolver turns request
//! headers into an [`Identity`] or rejects the request before any upgrade.

use axum::Json;
use axum::http::header::InvalidHeaderName;
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use parley_core::UserId;
use serde_json::json;

/// Who a connection belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Authenticated user id.
    pub user_id: UserId,
    /// Display name for the session.
    pub username: String,
}

/// Why a request could not be tied to a user. The payload names the header.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityRejection {
    /// The identity header was absent.
    #[error("missing identity header {0}")]
    Missing(String),
    /// The identity header was present but unusable.
    #[error("invalid identity header {0}")]
    Invalid(String),
}

impl IdentityRejection {
    /// Stable error code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Missing(_) => "MISSING_IDENTITY",
            Self::Invalid(_) => "INVALID_IDENTITY",
        }
    }
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.to_string(), "code": self.code() });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Resolves the identity of an upgrade request.
pub trait IdentityResolver: Send + Sync + 'static {
    /// Inspect request headers and return the caller's identity.
    fn resolve(&self, headers: &HeaderMap) -> Result<Identity, IdentityRejection>;
}

/// Trusts identity headers set by an authenticating gateway in front of the server.
///
/// The username header is optional and falls back to the user id.
#[derive(Clone, Debug)]
pub struct TrustedHeaderResolver {
    user_id_header: HeaderName,
    username_header: HeaderName,
}

impl TrustedHeaderResolver {
    /// Resolver reading the given header names.
    pub fn new(user_id_header: &str, username_header: &str) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            user_id_header: HeaderName::from_bytes(user_id_header.as_bytes())?,
            username_header: HeaderName::from_bytes(username_header.as_bytes())?,
        })
    }

    fn read<'a>(
        headers: &'a HeaderMap,
        name: &HeaderName,
    ) -> Result<Option<&'a str>, IdentityRejection> {
        let Some(value) = headers.get(name) else {
            return Ok(None);
        };
        let value = value
            .to_str()
            .map_err(|_| IdentityRejection::Invalid(name.to_string()))?
            .trim();
        if value.is_empty() {
            return Err(IdentityRejection::Invalid(name.to_string()));
        }
        Ok(Some(value))
    }
}

impl Default for TrustedHeaderResolver {
    fn default() -> Self {
        Self {
            user_id_header: HeaderName::from_static("x-user-id"),
            username_header: HeaderName::from_static("x-username"),
        }
    }
}

impl IdentityResolver for TrustedHeaderResolver {
    fn resolve(&self, headers: &HeaderMap) -> Result<Identity, IdentityRejection> {
        let user_id = Self::read(headers, &self.user_id_header)?
            .ok_or_else(|| IdentityRejection::Missing(self.user_id_header.to_string()))?;
        let username = Self::read(headers, &self.username_header)?.unwrap_or(user_id);
        Ok(Identity {
            user_id: UserId::from(user_id),
            username: username.to_owned(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
