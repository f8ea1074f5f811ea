use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{config::AppConfig, error::ApiError};

/// Claims
///
/// The payload signed into every session token. `id` is optional on the way in so that a
/// correctly signed token without an identity can be told apart from a forged one.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Issued At (iat), seconds since the epoch.
    pub iat: u64,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: u64,
}

/// Why a token was rejected. Both variants surface to clients as the same
/// `ApiError::InvalidToken` so the response never says which check failed.
#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("token is malformed or its signature does not verify")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("failed to sign token")]
    Signing,
}

/// TokenService
///
/// Issues and verifies HS256 bearer tokens. Built once from `AppConfig` and shared through
/// the application state; the secret itself never leaves this struct.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl)
    }

    /// issue
    ///
    /// Signs `{id, iat, exp}` for `user_id`, expiring `ttl` from now.
    pub fn issue(&self, user_id: Uuid) -> Result<String, TokenError> {
        let now = Utc::now().timestamp().max(0) as u64;
        self.sign(&Claims {
            id: Some(user_id.to_string()),
            iat: now,
            exp: now + self.ttl.as_secs(),
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "failed to sign token");
            TokenError::Signing
        })
    }

    /// verify
    ///
    /// Checks signature, algorithm and expiry (no leeway) and returns the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })
    }

    /// authenticate
    ///
    /// Turns a raw token into an identity. Verification failures are `InvalidToken` (401);
    /// a verified token whose `id` claim is absent or empty is `Unauthorized` (403).
    pub fn authenticate(&self, token: &str) -> Result<AuthUser, ApiError> {
        let claims = self.verify(token).map_err(|e| {
            tracing::debug!(reason = %e, "rejected bearer token");
            ApiError::InvalidToken
        })?;

        let raw_id = claims
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ApiError::Unauthorized)?;

        let id = Uuid::parse_str(&raw_id).map_err(|_| {
            tracing::debug!(reason = %TokenError::Malformed, "identity claim is not a UUID");
            ApiError::InvalidToken
        })?;

        Ok(AuthUser { id })
    }
}

/// bearer_token
///
/// Pulls the token out of `Authorization: Bearer <token>`: exactly one space after the
/// scheme and no whitespace inside the token. Any other shape, including a bare token
/// without the scheme, is rejected.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::InvalidToken)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(ApiError::InvalidToken)?;

    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(ApiError::InvalidToken);
    }
    Ok(token)
}

/// AuthUser
///
/// The authenticated identity bound into request extensions by the auth gate
/// (`auth_middleware` in lib.rs). Handlers take it as an argument; it carries only the
/// account id because every authorization decision here is an ownership comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().copied().ok_or_else(|| {
            tracing::warn!("AuthUser requested on a route without the auth gate");
            ApiError::InvalidToken
        })
    }
}

// Used by read routes that run the soft identification layer instead of the gate.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthUser>().copied())
    }
}
