use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::auth::require_admin;
use crate::AppState;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = usize::try_from(state.config.upload.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let admin = Router::new()
        .route("/admin/home", get(handlers::admin_home))
        .route("/admin/links/new", post(handlers::create_link))
        .route("/admin/links/deactivate", post(handlers::deactivate_link))
        .route("/admin/links/delete", post(handlers::delete_link))
        .route("/admin/files", get(handlers::list_directories))
        .route("/admin/files/:directory", get(handlers::list_directory))
        .route(
            "/admin/files/:directory/download/:filename",
            get(handlers::admin_download),
        )
        .route(
            "/admin/files/:directory/share",
            post(handlers::share_directory),
        )
        .route(
            "/admin/files/:directory/unshare",
            post(handlers::unshare_directory),
        )
        .route(
            "/admin/files/:directory/upload",
            post(handlers::admin_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_admin,
        ));

    let mut router = Router::new()
        .route("/", get(handlers::home))
        // Auth
        .route("/login", get(handlers::login_redirect).post(handlers::login))
        .route("/logout", get(handlers::logout))
        .route("/oauth/callback", get(handlers::oauth_callback))
        // Token-gated
        .route(
            "/upload/:token",
            get(handlers::upload_form)
                .post(handlers::upload)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/uploaded", get(handlers::uploaded))
        .route("/upload-failed", get(handlers::upload_failed))
        .route("/download/:token", get(handlers::download_listing))
        .route("/download/:token/:file", get(handlers::download_file))
        .merge(admin);

    if state.config.server.use_security_headers {
        router = router
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::REFERRER_POLICY,
                HeaderValue::from_static("no-referrer"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static("default-src 'self'; frame-ancestors 'none'"),
            ));
    }
    if state.config.server.use_hsts {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        ));
    }

    router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Duration;
    use tower::ServiceExt;

    use crate::testutil::{epoch, test_state, TEST_PASSWORD, TEST_USER};

    const BOUNDARY: &str = "linkdrop-test-boundary";

    fn multipart(file_name: &str, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={BOUNDARY}"), body)
    }

    fn location(response: &axum::response::Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8_lossy(&bytes).to_string()
    }

    async fn sign_in(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::post("/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(format!(
                        "username={TEST_USER}&password={}",
                        TEST_PASSWORD.replace(' ', "+")
                    )))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/home");

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .unwrap();
        assert!(set_cookie.contains("HttpOnly"));
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_admin_requires_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(Request::get("/admin/home").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let response = app
            .oneshot(
                Request::post("/admin/links/new")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("directory=reports&expiresIn=1h&uses=1"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_and_create_link() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let app = create_router(Arc::clone(&state));
        let cookie = sign_in(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::post("/admin/links/new")
                    .header(header::COOKIE, &cookie)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("directory=reports&expiresIn=2h&uses=3"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/home");

        let links = state.uploads.list_active().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].directory, "reports");
        assert_eq!(links[0].remaining_uses, 3);
        assert_eq!(links[0].expires_at, epoch() + Duration::hours(2));

        let response = app
            .oneshot(
                Request::get("/admin/home")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(&links[0].token));
    }

    #[tokio::test]
    async fn test_wrong_password_redirects_home() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::post("/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(format!("username={TEST_USER}&password=wrong")))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/?state=1");
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let app = create_router(state);
        let cookie = sign_in(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::get("/logout")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = app
            .oneshot(
                Request::get("/admin/files")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let app = create_router(state);

        for uri in ["/upload/nope", "/download/nope", "/download/nope/file.txt"] {
            let response = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_upload_through_link() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let link = state
            .uploads
            .create_link("reports", epoch() + Duration::hours(1), 1)
            .unwrap();
        let app = create_router(Arc::clone(&state));
        let uri = format!("/upload/{}", link.token);

        let response = app
            .clone()
            .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (content_type, body) = multipart("notes.txt", "text/plain", b"hello there\n");
        let response = app
            .clone()
            .oneshot(
                Request::post(&uri)
                    .header(header::CONTENT_TYPE, &content_type)
                    .body(Body::from(body.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/uploaded");

        let dir = state.config.upload.storage_root.join("reports");
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);

        // Single use: the link is now spent.
        let response = app
            .oneshot(
                Request::post(&uri)
                    .header(header::CONTENT_TYPE, &content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_upload_rejects_disguised_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let link = state
            .uploads
            .create_link("reports", epoch() + Duration::hours(1), 1)
            .unwrap();
        let app = create_router(Arc::clone(&state));

        let (content_type, body) = multipart("invoice.txt", "text/plain", b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n");
        let response = app
            .oneshot(
                Request::post(format!("/upload/{}", link.token))
                    .header(header::CONTENT_TYPE, content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(
            state.uploads.validate_token(&link.token).unwrap().remaining_uses,
            1
        );
    }

    #[tokio::test]
    async fn test_download_consumes_one_use() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let dir = state.config.upload.storage_root.join("shared");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("AAAA-admin-report.txt"), b"contents").unwrap();

        let link = state
            .downloads
            .create_link("shared", epoch() + Duration::hours(1), 1)
            .unwrap();
        let app = create_router(Arc::clone(&state));

        // Listing is free.
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(
                    Request::get(format!("/download/{}", link.token))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_text(response).await.contains("report.txt"));
        }

        let uri = format!("/download/{}/AAAA-admin-report.txt", link.token);
        let response = app
            .clone()
            .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"report.txt\""
        );
        assert_eq!(body_text(response).await, "contents");

        let response = app
            .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_expired_download_link() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, clock) = test_state(&temp_dir);
        std::fs::create_dir_all(state.config.upload.storage_root.join("shared")).unwrap();
        let link = state
            .downloads
            .create_link("shared", epoch() + Duration::minutes(5), 10)
            .unwrap();
        let app = create_router(Arc::clone(&state));

        clock.advance(Duration::minutes(5));
        let response = app
            .oneshot(
                Request::get(format!("/download/{}", link.token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    fn form(uri: &str, cookie: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn files_in(dir: &std::path::Path) -> Vec<String> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_expiration_out_of_range_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        std::fs::create_dir_all(state.config.upload.storage_root.join("shared")).unwrap();
        let app = create_router(Arc::clone(&state));
        let cookie = sign_in(&app).await;

        let response = app
            .clone()
            .oneshot(form(
                "/admin/links/new",
                &cookie,
                "directory=reports&expiresIn=100000000d&uses=1",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("too far in the future"));
        assert!(state.uploads.list_active().unwrap().is_empty());

        let response = app
            .oneshot(form(
                "/admin/files/shared/share",
                &cookie,
                "expiresIn=100000000d&uses=1",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.downloads.list_active().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_upload_is_payload_too_large() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let link = state
            .uploads
            .create_link("reports", epoch() + Duration::hours(1), 1)
            .unwrap();
        let app = create_router(Arc::clone(&state));

        let data = vec![b'a'; 10 * 1024 * 1024 + 128 * 1024];
        let (content_type, body) = multipart("big.txt", "text/plain", &data);
        let response = app
            .oneshot(
                Request::post(format!("/upload/{}", link.token))
                    .header(header::CONTENT_TYPE, content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(files_in(&state.config.upload.storage_root.join("reports")).is_empty());
        assert_eq!(
            state.uploads.validate_token(&link.token).unwrap().remaining_uses,
            1
        );
    }

    #[tokio::test]
    async fn test_body_over_limit_before_file_field_is_payload_too_large() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let link = state
            .uploads
            .create_link("reports", epoch() + Duration::hours(1), 1)
            .unwrap();
        let app = create_router(Arc::clone(&state));

        // A large leading field is skipped, so the limit trips while looking
        // for the file field.
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\n"
        )
        .into_bytes();
        body.extend(std::iter::repeat(b'n').take(10 * 1024 * 1024 + 128 * 1024));
        let (content_type, file_part) = multipart("notes.txt", "text/plain", b"hello\n");
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&file_part);

        let response = app
            .oneshot(
                Request::post(format!("/upload/{}", link.token))
                    .header(header::CONTENT_TYPE, content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(files_in(&state.config.upload.storage_root.join("reports")).is_empty());
        assert_eq!(
            state.uploads.validate_token(&link.token).unwrap().remaining_uses,
            1
        );
    }

    #[tokio::test]
    async fn test_share_then_unshare_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let dir = state.config.upload.storage_root.join("shared");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("AAAA-admin-report.txt"), b"contents").unwrap();
        let app = create_router(Arc::clone(&state));
        let cookie = sign_in(&app).await;

        let response = app
            .clone()
            .oneshot(form(
                "/admin/files/shared/share",
                &cookie,
                "expiresIn=1h&uses=2",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/files/shared");

        let links = state.downloads.list_active().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].directory, "shared");
        assert_eq!(links[0].remaining_uses, 2);
        assert_eq!(links[0].expires_at, epoch() + Duration::hours(1));
        let token = links[0].token.clone();

        let response = app
            .clone()
            .oneshot(
                Request::get("/admin/files/shared")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_text(response).await;
        assert!(page.contains(&token));
        assert!(page.contains("report.txt"));

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/download/{token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(form(
                "/admin/files/shared/unshare",
                &cookie,
                &format!("token={token}"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/files/shared");
        assert!(state.downloads.list_active().unwrap().is_empty());

        for uri in [
            format!("/download/{token}"),
            format!("/download/{token}/AAAA-admin-report.txt"),
        ] {
            let response = app
                .clone()
                .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_share_missing_directory_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let app = create_router(Arc::clone(&state));
        let cookie = sign_in(&app).await;

        let response = app
            .oneshot(form(
                "/admin/files/ghost/share",
                &cookie,
                "expiresIn=1h&uses=1",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.downloads.list_active().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admin_upload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let dir = state.config.upload.storage_root.join("shared");
        std::fs::create_dir_all(&dir).unwrap();
        let app = create_router(Arc::clone(&state));
        let cookie = sign_in(&app).await;

        let (content_type, body) = multipart("notes.txt", "text/plain", b"for the team\n");
        let response = app
            .clone()
            .oneshot(
                Request::post("/admin/files/shared/upload")
                    .header(header::COOKIE, &cookie)
                    .header(header::CONTENT_TYPE, &content_type)
                    .body(Body::from(body.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/files/shared");

        let files = files_in(&dir);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("-admin-notes.txt"), "unexpected name {}", files[0]);
        assert_eq!(std::fs::read(dir.join(&files[0])).unwrap(), b"for the team\n");

        let response = app
            .oneshot(
                Request::post("/admin/files/missing/upload")
                    .header(header::COOKIE, &cookie)
                    .header(header::CONTENT_TYPE, &content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!state.config.upload.storage_root.join("missing").exists());
    }

    #[tokio::test]
    async fn test_deactivated_upload_link_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let link = state
            .uploads
            .create_link("reports", epoch() + Duration::hours(1), 5)
            .unwrap();
        let app = create_router(Arc::clone(&state));
        let cookie = sign_in(&app).await;
        let uri = format!("/upload/{}", link.token);

        let response = app
            .clone()
            .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(form(
                "/admin/links/deactivate",
                &cookie,
                &format!("token={}", link.token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/home");

        let response = app
            .clone()
            .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let (content_type, body) = multipart("notes.txt", "text/plain", b"late\n");
        let response = app
            .oneshot(
                Request::post(&uri)
                    .header(header::CONTENT_TYPE, content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(files_in(&state.config.upload.storage_root.join("reports")).is_empty());
    }

    #[tokio::test]
    async fn test_security_headers() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (state, _clock) = test_state(&temp_dir);
        let Some(mut state) = Arc::into_inner(state) else {
            panic!("state is shared");
        };
        state.config.server.use_security_headers = true;
        state.config.server.use_hsts = true;
        let app = create_router(Arc::new(state));

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
        assert!(headers.contains_key("x-request-id"));
    }
}
