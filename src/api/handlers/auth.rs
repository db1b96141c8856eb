use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::api::response::{ApiError, AppForm, AppQuery};
use crate::auth::LoginMethod;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Route: GET /login (identity provider sign-in)
pub async fn login_redirect(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    match &state.login {
        LoginMethod::Provider(provider) => {
            let (jar, url) = provider.redirect(jar)?;
            Ok((jar, Redirect::to(&url)).into_response())
        }
        LoginMethod::Static { .. } => Ok(Redirect::to("/").into_response()),
    }
}

/// Route: POST /login (static credentials)
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppForm(form): AppForm<LoginForm>,
) -> Result<Response, ApiError> {
    let LoginMethod::Static {
        credentials,
        limiter,
    } = &state.login
    else {
        return Err(ApiError::not_found("Not found."));
    };

    if let Err(e) = limiter.check() {
        tracing::warn!(username = %form.username, "Login rate limit exceeded");
        return Err(e.into());
    }

    if !credentials.verify(&form.username, &form.password) {
        tracing::warn!(username = %form.username, "Invalid login attempt");
        return Ok(Redirect::to("/?state=1").into_response());
    }

    let jar = state.sessions.create(jar)?;
    tracing::info!(username = %form.username, "Admin signed in");
    Ok((jar, Redirect::to("/admin/home")).into_response())
}

/// Route: GET /oauth/callback
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppQuery(params): AppQuery<CallbackParams>,
) -> Result<Response, ApiError> {
    let LoginMethod::Provider(provider) = &state.login else {
        return Err(ApiError::not_found("Not found."));
    };

    if let Some(error) = params.error.filter(|e| !e.is_empty()) {
        tracing::warn!(%error, "Identity provider returned an error");
        return Err(ApiError::unauthorized("Sign-in was cancelled or refused."));
    }

    let (jar, identity) = provider.callback(jar, &params.code, &params.state).await?;
    let jar = state.sessions.create(jar)?;
    tracing::info!(email = %identity.email, "Admin signed in");
    Ok((jar, Redirect::to("/admin/home")).into_response())
}

/// Route: GET /logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let jar = state.sessions.destroy(jar)?;
    Ok((
        jar,
        [(header::HeaderName::from_static("clear-site-data"), "\"cookies\"")],
        Redirect::to("/"),
    )
        .into_response())
}
