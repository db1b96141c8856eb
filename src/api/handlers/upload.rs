use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};

use super::{field_reader, ingest_error, next_field_error, FILE_FIELD};
use crate::api::pages;
use crate::api::response::ApiError;
use crate::ingest::IngestTarget;
use crate::AppState;

/// Route: GET /upload/:token
pub async fn upload_form(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Html<String>, ApiError> {
    state.uploads.validate_token(&token)?;
    let config = &state.config.upload;
    Ok(Html(pages::upload_form(
        &token,
        &config.allowed_extensions,
        config.max_file_size,
    )))
}

/// Route: POST /upload/:token
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let link = state.uploads.validate_token(&token)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(next_field_error)?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);

        let path = state
            .ingest
            .ingest(
                field_reader(field),
                &file_name,
                content_type.as_deref(),
                IngestTarget::Link(&link),
            )
            .await
            .map_err(ingest_error)?;

        tracing::info!(
            link_id = link.id,
            directory = %link.directory,
            path = %path.display(),
            "Upload stored"
        );
        return Ok(Redirect::to("/uploaded").into_response());
    }

    Err(ApiError::bad_request("No file was provided."))
}

/// Route: GET /uploaded
pub async fn uploaded() -> Html<String> {
    Html(pages::uploaded())
}

/// Route: GET /upload-failed
pub async fn upload_failed() -> Html<String> {
    Html(pages::upload_failed())
}
