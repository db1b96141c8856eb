use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::api::pages;
use crate::api::response::ApiError;
use crate::links::LinkError;
use crate::paths;
use crate::AppState;

/// Route: GET /download/:token
///
/// Listing a directory does not use up the link.
pub async fn download_listing(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Html<String>, ApiError> {
    let link = state.downloads.validate_token(&token)?;
    let listing = state.catalog.list_files(&link.directory).await?;
    Ok(Html(pages::download_listing(&token, &listing)))
}

/// Route: GET /download/:token/:file
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path((token, file_name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let link = state.downloads.validate_token(&token)?;
    let (path, meta) = state
        .catalog
        .resolve_file_path(&link.directory, &file_name)
        .await?;
    let file = File::open(&path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to open {}: {e}", path.display())))?;

    // Last point at which the request can still be refused.
    if !state.downloads.consume(&token)? {
        return Err(LinkError::TokenExhausted.into());
    }

    tracing::info!(
        link_id = link.id,
        directory = %link.directory,
        file = %file_name,
        "Serving download"
    );
    Ok(attachment(file, meta.len(), &file_name))
}

/// Stream a file to the client as a download named after its display name.
pub(super) fn attachment(file: File, len: u64, stored_name: &str) -> Response {
    let display = paths::display_name(stored_name);
    let mime = mime_guess::from_path(display).first_or_octet_stream();

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.as_ref())
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    let quoted = display.replace(['"', '\\'], "_");
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{quoted}\""))
        .unwrap_or(HeaderValue::from_static("attachment"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    response
}
