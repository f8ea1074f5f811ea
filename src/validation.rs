use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{
        CreatePostRequest, DeleteAccountRequest, ProfileLookupRequest, PublishRequest,
        SigninRequest, SignupRequest, UpdatePostRequest, UpdateProfileRequest,
    },
};

pub const MIN_PASSWORD_LEN: usize = 6;
const MAX_EMAIL_LEN: usize = 254;

/// Shape checks run on a request body after it deserialized and before any storage access.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// ValidatedJson
///
/// Drop-in replacement for `axum::Json` on mutating routes. Malformed JSON, a wrong
/// content type, mistyped fields (e.g. `"published": "yes"`) and failed `Validate` checks
/// all come back as `ApiError::InvalidInput` (400) instead of axum's default 415/422.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            tracing::debug!(%rejection, "request body rejected");
            ApiError::InvalidInput("Invalid inputs".to_string())
        })?;

        value.validate().map_err(|reason| {
            tracing::debug!(%reason, "request body failed validation");
            ApiError::InvalidInput(reason)
        })?;

        Ok(Self(value))
    }
}

/// IdPath
///
/// A single UUID path segment. A segment that does not parse is `InvalidInput` with the
/// usual JSON body rather than axum's plain-text rejection.
pub struct IdPath(pub Uuid);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::InvalidInput("Invalid id".to_string()))?;
        Ok(Self(id))
    }
}

/// is_valid_email
///
/// Structural address check: one `@`, a non-empty local part, and a dotted domain
/// without empty labels. No whitespace anywhere.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

fn check_email(email: &str) -> Result<(), String> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err("Invalid email address".to_string())
    }
}

fn check_password(password: &str) -> Result<(), String> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ))
    }
}

fn check_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}

impl Validate for SignupRequest {
    fn validate(&self) -> Result<(), String> {
        check_email(&self.email)?;
        check_password(&self.password)
    }
}

impl Validate for SigninRequest {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("email", &self.email)?;
        check_non_empty("password", &self.password)
    }
}

impl Validate for ProfileLookupRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        if let Some(password) = &self.password {
            check_password(password)?;
        }
        Ok(())
    }
}

impl Validate for DeleteAccountRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl Validate for CreatePostRequest {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("title", &self.title)?;
        check_non_empty("content", &self.content)
    }
}

impl Validate for UpdatePostRequest {
    fn validate(&self) -> Result<(), String> {
        if self.title.is_none() && self.content.is_none() && self.published.is_none() {
            return Err("Nothing to update".to_string());
        }
        if let Some(title) = &self.title {
            check_non_empty("title", title)?;
        }
        if let Some(content) = &self.content {
            check_non_empty("content", content)?;
        }
        Ok(())
    }
}

// Type checks on `published` already happened during deserialization.
impl Validate for PublishRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}
