use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::api::pages;
use crate::api::response::{ApiError, AppQuery};
use crate::auth::LoginMethod;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HomeParams {
    /// Set after a failed static login.
    #[serde(default)]
    pub state: Option<String>,
}

/// Route: GET /
pub async fn home(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppQuery(params): AppQuery<HomeParams>,
) -> Result<Response, ApiError> {
    if state.sessions.validate(&jar)? {
        return Ok(Redirect::to("/admin/home").into_response());
    }

    let google = matches!(state.login, LoginMethod::Provider(_));
    let incorrect = params.state.is_some_and(|s| !s.is_empty());
    Ok(Html(pages::home(google, incorrect)).into_response())
}
