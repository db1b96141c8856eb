//! Shared test helpers for linkdrop unit tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::auth::{hash_password, LoginLimiter, LoginMethod, StaticCredentials};
use crate::clock::{ManualClock, OsTokens};
use crate::config::{
    AuthConfig, AuthType, Config, GoogleConfig, ServerConfig, SessionConfig, UploadConfig,
};
use crate::storage::Database;
use crate::AppState;

pub const TEST_USER: &str = "admin";
pub const TEST_PASSWORD: &str = "correct horse";

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap()
}

pub fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            base_url: "http://localhost:8080".to_string(),
            data_dir: temp_dir.path().join("data").to_string_lossy().to_string(),
            use_security_headers: false,
            use_hsts: false,
        },
        upload: UploadConfig {
            storage_root: temp_dir.path().join("uploads"),
            ..UploadConfig::default()
        },
        session: SessionConfig::default(),
        auth: AuthConfig {
            auth_type: AuthType::Static,
            static_users_path: String::new(),
            login_rate_limit: 1000,
            google: GoogleConfig {
                client_id: String::new(),
                client_secret: String::new(),
                redirect_url: String::new(),
                service_account_json_path: None,
                allowed_domains: vec![],
                allowed_groups: vec![],
                scopes: vec![],
            },
        },
    }
}

/// Create a test AppState with a temporary database, storage root and a
/// manually driven clock.
pub fn test_state(temp_dir: &tempfile::TempDir) -> (Arc<AppState>, Arc<ManualClock>) {
    let config = test_config(temp_dir);
    let db = Database::open(&config.server.data_dir).expect("Failed to open test database");
    let clock = Arc::new(ManualClock::new(epoch()));

    let mut users = std::collections::HashMap::new();
    users.insert(
        TEST_USER.to_string(),
        hash_password(TEST_PASSWORD).expect("Failed to hash test password"),
    );
    let login = LoginMethod::Static {
        credentials: StaticCredentials::from_users(users).expect("Failed to build credentials"),
        limiter: LoginLimiter::per_second(config.auth.login_rate_limit),
    };

    let state = AppState::new(
        config,
        db,
        clock.clone(),
        Arc::new(OsTokens::new()),
        login,
    )
    .expect("Failed to build test state");

    (Arc::new(state), clock)
}
