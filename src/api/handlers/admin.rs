use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use tokio::fs::File;

use super::download::attachment;
use super::{
    field_reader, ingest_error, next_field_error, LinkForm, TokenForm, FILE_FIELD,
};
use crate::api::pages;
use crate::api::response::{ApiError, AppForm};
use crate::catalog::CatalogError;
use crate::config::parse_duration;
use crate::ingest::IngestTarget;
use crate::paths;
use crate::AppState;

/// Marker used in place of a token in the names of admin uploads.
const ADMIN_MARKER: &str = "admin";

#[derive(Debug, serde::Deserialize)]
pub struct CreateLinkForm {
    #[serde(default)]
    pub directory: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: String,
    pub uses: i64,
}

fn expires_at(
    state: &AppState,
    expires_in: &str,
) -> Result<chrono::DateTime<chrono::Utc>, ApiError> {
    let expires_in = parse_duration(expires_in)
        .map_err(|e| ApiError::bad_request(format!("Invalid expiration: {e}")))?;
    chrono::Duration::from_std(expires_in)
        .ok()
        .and_then(|d| state.clock.now().checked_add_signed(d))
        .ok_or_else(|| ApiError::bad_request("Expiration is too far in the future"))
}

/// Redirect target for a directory page. Names that would not survive as a
/// plain path segment fall back to the directory list.
fn directory_url(directory: &str) -> String {
    match paths::sanitize_directory(directory) {
        Some(clean) if clean == directory => format!("/admin/files/{clean}"),
        _ => "/admin/files".to_string(),
    }
}

/// Route: GET /admin/home
pub async fn admin_home(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let links = state.uploads.list_active()?;
    Ok(Html(pages::admin_home(&links, &state.config.server.base_url)))
}

/// Route: POST /admin/links/new
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    AppForm(form): AppForm<CreateLinkForm>,
) -> Result<Redirect, ApiError> {
    let expires_at = expires_at(&state, &form.expires_in)?;
    let link = state
        .uploads
        .create_link(&form.directory, expires_at, form.uses)?;
    tracing::info!(link_id = link.id, directory = %link.directory, "Upload link created");
    Ok(Redirect::to("/admin/home"))
}

/// Route: POST /admin/links/deactivate
pub async fn deactivate_link(
    State(state): State<Arc<AppState>>,
    AppForm(form): AppForm<TokenForm>,
) -> Result<Redirect, ApiError> {
    state.uploads.deactivate_link(&form.token)?;
    Ok(Redirect::to("/admin/home"))
}

/// Route: POST /admin/links/delete
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    AppForm(form): AppForm<TokenForm>,
) -> Result<Redirect, ApiError> {
    state.uploads.delete_link(&form.token)?;
    Ok(Redirect::to("/admin/home"))
}

/// Route: GET /admin/files
pub async fn list_directories(
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, ApiError> {
    let directories = state.catalog.list_directories().await?;
    Ok(Html(pages::admin_directories(&directories)))
}

/// Route: GET /admin/files/:directory
pub async fn list_directory(
    State(state): State<Arc<AppState>>,
    Path(directory): Path<String>,
) -> Result<Html<String>, ApiError> {
    let listing = state
        .catalog
        .list_files(&directory)
        .await
        .map_err(|e| match e {
            CatalogError::NotFound(_) | CatalogError::InvalidName(_) => {
                ApiError::not_found("Directory not found.")
            }
            e => e.into(),
        })?;

    let links: Vec<_> = state
        .downloads
        .list_active()?
        .into_iter()
        .filter(|l| l.directory == listing.name)
        .collect();

    Ok(Html(pages::admin_directory(
        &listing,
        &links,
        &state.config.server.base_url,
    )))
}

/// Route: GET /admin/files/:directory/download/:filename
pub async fn admin_download(
    State(state): State<Arc<AppState>>,
    Path((directory, file_name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let (path, meta) = state
        .catalog
        .resolve_file_path(&directory, &file_name)
        .await?;
    let file = File::open(&path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to open {}: {e}", path.display())))?;
    Ok(attachment(file, meta.len(), &file_name))
}

/// Route: POST /admin/files/:directory/share
pub async fn share_directory(
    State(state): State<Arc<AppState>>,
    Path(directory): Path<String>,
    AppForm(form): AppForm<LinkForm>,
) -> Result<Redirect, ApiError> {
    let expires_at = expires_at(&state, &form.expires_in)?;
    let link = state
        .downloads
        .create_link(&directory, expires_at, form.uses)?;
    tracing::info!(link_id = link.id, directory = %link.directory, "Download link created");
    Ok(Redirect::to(&directory_url(&link.directory)))
}

/// Route: POST /admin/files/:directory/unshare
pub async fn unshare_directory(
    State(state): State<Arc<AppState>>,
    Path(directory): Path<String>,
    AppForm(form): AppForm<TokenForm>,
) -> Result<Redirect, ApiError> {
    state.downloads.deactivate_link(&form.token)?;
    Ok(Redirect::to(&directory_url(&directory)))
}

/// Route: POST /admin/files/:directory/upload
pub async fn admin_upload(
    State(state): State<Arc<AppState>>,
    Path(directory): Path<String>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
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
                IngestTarget::Directory {
                    name: &directory,
                    marker: ADMIN_MARKER,
                },
            )
            .await
            .map_err(ingest_error)?;

        tracing::info!(directory = %directory, path = %path.display(), "Admin upload stored");
        return Ok(Redirect::to(&directory_url(&directory)).into_response());
    }

    Err(ApiError::bad_request("No file was provided."))
}
