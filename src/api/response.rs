use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use bytes::Bytes;
use serde::de::DeserializeOwned;

use super::pages;
use crate::auth::AuthError;
use crate::catalog::CatalogError;
use crate::ingest::IngestError;
use crate::links::LinkError;

// ============================================================================
// Unified error type for handlers
// ============================================================================

/// Either a client failure (4xx) shown to the caller as-is, or a server error
/// (5xx) whose detail only goes to the log.
#[derive(Debug)]
pub enum ApiError {
    Fail(StatusCode, String),
    Error(StatusCode, String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Fail(code, msg) => (code, Html(pages::error_page(code, &msg))).into_response(),
            ApiError::Error(code, msg) => {
                tracing::error!(status = code.as_u16(), error = %msg, "Request failed");
                (
                    code,
                    Html(pages::error_page(code, "Something went wrong on our side.")),
                )
                    .into_response()
            }
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::BAD_REQUEST, message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::UNAUTHORIZED, message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::FORBIDDEN, message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::NOT_FOUND, message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::CONFLICT, message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::PAYLOAD_TOO_LARGE, message.into())
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::UNSUPPORTED_MEDIA_TYPE, message.into())
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::TOO_MANY_REQUESTS, message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Error(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Fail(code, _) | ApiError::Error(code, _) => *code,
        }
    }
}

const LINK_UNAVAILABLE: &str = "This link does not exist or is no longer valid.";

impl From<LinkError> for ApiError {
    fn from(e: LinkError) -> Self {
        match e {
            e if e.is_token_rejection() => {
                tracing::warn!(reason = %e, "Rejected link token");
                ApiError::not_found(LINK_UNAVAILABLE)
            }
            LinkError::Validation(msg) => ApiError::bad_request(msg),
            e => ApiError::internal(e.to_string()),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Empty => ApiError::bad_request("The uploaded file is empty."),
            IngestError::TooLarge(max) => {
                ApiError::payload_too_large(format!("Files may be at most {max} bytes."))
            }
            IngestError::UnsafeContent(reason) => {
                tracing::warn!(%reason, "Rejected upload content");
                ApiError::unsupported_media_type("This type of file is not accepted.")
            }
            IngestError::InvalidTarget(msg) => ApiError::bad_request(msg),
            IngestError::FileExists => ApiError::conflict("A file with this name already exists."),
            IngestError::Link(e) => e.into(),
            e @ (IngestError::Storage(_) | IngestError::Io(_)) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::InvalidName(_) | CatalogError::NotFound(_) | CatalogError::TooLarge => {
                ApiError::not_found("File not found.")
            }
            CatalogError::Io(e) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => ApiError::unauthorized("Invalid credentials."),
            AuthError::RateLimited => {
                ApiError::too_many_requests("Too many login attempts, try again shortly.")
            }
            AuthError::InvalidState | AuthError::Provider(_) => {
                tracing::warn!(error = %e, "Sign-in failed");
                ApiError::unauthorized("Sign-in failed.")
            }
            AuthError::Forbidden(reason) => {
                tracing::warn!(%reason, "Sign-in refused");
                ApiError::forbidden("This account may not sign in.")
            }
            e @ (AuthError::Config(_) | AuthError::Storage(_)) => ApiError::internal(e.to_string()),
        }
    }
}

// ============================================================================
// Custom extractors
// ============================================================================

/// `application/x-www-form-urlencoded` body parsed with serde_qs, rejecting with
/// an HTML [`ApiError`].
pub struct AppForm<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);
        if !is_form {
            return Err(ApiError::bad_request(
                "Expected a form submission (application/x-www-form-urlencoded)",
            ));
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|_| ApiError::bad_request("Failed to read request body"))?;

        serde_qs::from_bytes(&body)
            .map(AppForm)
            .map_err(|e| ApiError::bad_request(friendly_form_error(&e.to_string())))
    }
}

/// Drop-in replacement for `axum::extract::Query` that rejects with an HTML [`ApiError`].
pub struct AppQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, ApiError> {
        let query = parts.uri.query().unwrap_or_default();
        serde_qs::from_str(query)
            .map(AppQuery)
            .map_err(|e| ApiError::bad_request(friendly_form_error(&e.to_string())))
    }
}

/// Translate serde/serde_qs error messages into human-friendly descriptions.
fn friendly_form_error(raw: &str) -> String {
    let cleaned = raw
        .replace("u32", "non-negative integer")
        .replace("u64", "non-negative integer")
        .replace("i32", "integer")
        .replace("i64", "integer");

    format!("Invalid form field: {cleaned}")
}
