mod admin;
mod auth;
mod download;
mod home;
mod upload;

use std::io;

use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use futures::TryStreamExt;
use serde::Deserialize;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::api::response::ApiError;
use crate::ingest::IngestError;

pub use admin::{
    admin_download, admin_home, admin_upload, create_link, deactivate_link, delete_link,
    list_directories, list_directory, share_directory, unshare_directory,
};
pub use auth::{login, login_redirect, logout, oauth_callback};
pub use download::{download_file, download_listing};
pub use home::home;
pub use upload::{upload, upload_failed, upload_form, uploaded};

/// Multipart field that carries the uploaded file.
const FILE_FIELD: &str = "file";

/// A multipart failure surfaced through the byte stream handed to the pipeline.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
struct MultipartStreamError {
    status: StatusCode,
    message: String,
}

/// Adapt a multipart field into an `AsyncRead` for the upload pipeline.
fn field_reader<'a>(field: Field<'a>) -> impl AsyncRead + Unpin + Send + 'a {
    StreamReader::new(Box::pin(field.map_err(|e| {
        io::Error::other(MultipartStreamError {
            status: e.status(),
            message: e.body_text(),
        })
    })))
}

/// Map a pipeline failure to a response, recognising errors that came from the
/// multipart body itself (truncated, malformed or over the body limit).
fn ingest_error(e: IngestError) -> ApiError {
    if let IngestError::Io(io_err) = &e {
        if let Some(inner) = io_err
            .get_ref()
            .and_then(|r| r.downcast_ref::<MultipartStreamError>())
        {
            return multipart_error(inner.status, inner.message.clone());
        }
    }
    e.into()
}

/// Map a failure to advance to the next multipart field.
fn next_field_error(e: MultipartError) -> ApiError {
    multipart_error(e.status(), e.body_text())
}

fn multipart_error(status: StatusCode, message: String) -> ApiError {
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => {
            ApiError::payload_too_large("The upload exceeds the maximum size.")
        }
        status if status.is_client_error() => {
            ApiError::bad_request(format!("Invalid multipart data: {message}"))
        }
        _ => ApiError::internal(message),
    }
}

/// `expiresIn`/`uses` pair shared by link-creating forms.
#[derive(Debug, Deserialize)]
pub struct LinkForm {
    #[serde(rename = "expiresIn")]
    pub expires_in: String,
    pub uses: i64,
}

#[derive(Debug, Deserialize)]
pub struct TokenForm {
    #[serde(default)]
    pub token: String,
}
