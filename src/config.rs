use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub session: SessionConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Public origin used to build absolute link URLs, without trailing slash
    pub base_url: String,
    /// Directory holding the redb file
    pub data_dir: String,
    pub use_security_headers: bool,
    pub use_hsts: bool,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Root of the directory tree links point into
    pub storage_root: PathBuf,
    /// Largest accepted upload, and largest file served for download, in bytes
    pub max_file_size: u64,
    /// Case-sensitive, with leading dot (".txt")
    pub allowed_extensions: Vec<String>,
    /// Matched as prefixes of both declared and sniffed types
    pub allowed_mime_types: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSitePolicy {
    Lax,
    Strict,
    None,
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
    pub secure: bool,
    pub same_site: SameSitePolicy,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fixed at issuance, never renewed
    pub lifetime: Duration,
    pub cookie: CookieConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    Static,
    Google,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub service_account_json_path: Option<String>,
    /// Empty means every domain is accepted
    pub allowed_domains: Vec<String>,
    /// Empty means no group membership is required
    pub allowed_groups: Vec<String>,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub auth_type: AuthType,
    /// users.json mapping usernames to argon2 hashes
    pub static_users_path: String,
    /// Static login attempts allowed per second
    pub login_rate_limit: u32,
    pub google: GoogleConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./uploads"),
            max_file_size: 10 * 1024 * 1024, // 10MB
            allowed_extensions: vec![".txt".to_string()],
            allowed_mime_types: vec!["text/plain".to_string()],
        }
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            path: "/".to_string(),
            secure: false,
            same_site: SameSitePolicy::Lax,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime: Duration::from_secs(8 * 60 * 60),
            cookie: CookieConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| {
            var(key)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false)
        };

        let bind_address = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let base_url = var("BASE_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();
        let data_dir = var("DATA_DIR").unwrap_or_else(|| "./data".to_string());

        let max_file_size = match var("MAX_FILE_SIZE_BYTES") {
            Some(v) => v.parse().map_err(|e| {
                ConfigError::ValidationError(format!("MAX_FILE_SIZE_BYTES: {e}"))
            })?,
            None => UploadConfig::default().max_file_size,
        };

        let upload = UploadConfig {
            storage_root: PathBuf::from(var("UPLOAD_PATH").unwrap_or_else(|| "./uploads".into())),
            max_file_size,
            allowed_extensions: var("ALLOWED_EXTENSIONS")
                .map(|v| split_list(&v))
                .unwrap_or_else(|| UploadConfig::default().allowed_extensions),
            allowed_mime_types: var("ALLOWED_MIME_TYPES")
                .map(|v| split_list(&v))
                .unwrap_or_else(|| UploadConfig::default().allowed_mime_types),
        };

        let lifetime = match var("SESSION_LIFETIME") {
            Some(v) => parse_duration(&v)
                .map_err(|e| ConfigError::ValidationError(format!("SESSION_LIFETIME: {e}")))?,
            None => SessionConfig::default().lifetime,
        };

        let same_site = match var("COOKIE_SAME_SITE")
            .unwrap_or_else(|| "lax".to_string())
            .to_lowercase()
            .as_str()
        {
            "lax" => SameSitePolicy::Lax,
            "strict" => SameSitePolicy::Strict,
            "none" => SameSitePolicy::None,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "COOKIE_SAME_SITE must be lax, strict or none, got '{other}'"
                )))
            }
        };

        let session = SessionConfig {
            lifetime,
            cookie: CookieConfig {
                name: var("COOKIE_NAME").unwrap_or_else(|| "session".to_string()),
                path: "/".to_string(),
                secure: flag("COOKIE_SECURE"),
                same_site,
            },
        };

        let auth_type = match var("AUTH_TYPE")
            .unwrap_or_else(|| "static".to_string())
            .to_lowercase()
            .as_str()
        {
            "static" => AuthType::Static,
            "google" => AuthType::Google,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "invalid AUTH_TYPE: {other}"
                )))
            }
        };

        let login_rate_limit = match var("LOGIN_RATE_LIMIT") {
            Some(v) => v
                .parse()
                .map_err(|e| ConfigError::ValidationError(format!("LOGIN_RATE_LIMIT: {e}")))?,
            None => 1,
        };

        let google = GoogleConfig {
            client_id: var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            client_secret: var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            redirect_url: format!("{base_url}/oauth/callback"),
            service_account_json_path: var("GOOGLE_SERVICE_ACCOUNT_CONFIG_JSON_PATH"),
            allowed_domains: var("ALLOWED_DOMAINS")
                .filter(|v| v != "*")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            allowed_groups: var("ALLOWED_GROUPS")
                .filter(|v| v != "*")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            scopes: var("SCOPES")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_else(|| {
                    vec![
                        "openid".to_string(),
                        "https://www.googleapis.com/auth/userinfo.email".to_string(),
                        "https://www.googleapis.com/auth/userinfo.profile".to_string(),
                    ]
                }),
        };

        let config = Config {
            server: ServerConfig {
                bind_address,
                base_url,
                data_dir,
                use_security_headers: flag("USE_SECURITY_HEADERS"),
                use_hsts: flag("USE_HSTS"),
            },
            upload,
            session,
            auth: AuthConfig {
                auth_type,
                static_users_path: var("STATIC_AUTH_PATH")
                    .unwrap_or_else(|| "users.json".to_string()),
                login_rate_limit,
                google,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.upload.max_file_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_FILE_SIZE_BYTES must be greater than 0".to_string(),
            ));
        }

        if let Some(ext) = self
            .upload
            .allowed_extensions
            .iter()
            .find(|e| !e.starts_with('.'))
        {
            return Err(ConfigError::ValidationError(format!(
                "ALLOWED_EXTENSIONS entries must start with '.', got '{ext}'"
            )));
        }

        if self.session.lifetime.is_zero() {
            return Err(ConfigError::ValidationError(
                "SESSION_LIFETIME must be greater than 0".to_string(),
            ));
        }

        if self.session.cookie.same_site == SameSitePolicy::None && !self.session.cookie.secure {
            return Err(ConfigError::ValidationError(
                "COOKIE_SAME_SITE=none requires COOKIE_SECURE=true".to_string(),
            ));
        }

        if self.auth.login_rate_limit == 0 {
            return Err(ConfigError::ValidationError(
                "LOGIN_RATE_LIMIT must be greater than 0".to_string(),
            ));
        }

        if self.auth.auth_type == AuthType::Google {
            let google = &self.auth.google;
            let mut missing = Vec::new();
            if google.client_id.is_empty() {
                missing.push("GOOGLE_CLIENT_ID");
            }
            if google.client_secret.is_empty() {
                missing.push("GOOGLE_CLIENT_SECRET");
            }
            if !google.allowed_groups.is_empty() && google.service_account_json_path.is_none() {
                missing.push("GOOGLE_SERVICE_ACCOUNT_CONFIG_JSON_PATH");
            }
            if !missing.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "AUTH_TYPE=google requires {}",
                    missing.join(", ")
                )));
            }
            if google.allowed_domains.is_empty() {
                tracing::warn!("ALLOWED_DOMAINS is empty, every Google account domain is accepted");
            }
        }

        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse a Go-style duration such as `90s`, `15m`, `1h30m` or `7d`.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total: u64 = 0;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(format!("invalid duration '{input}'"));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid duration '{input}'"))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let seconds = match &rest[..unit_len] {
            "s" => 1,
            "m" => 60,
            "h" => 60 * 60,
            "d" => 24 * 60 * 60,
            "" => return Err(format!("missing unit in duration '{input}'")),
            unit => return Err(format!("unknown unit '{unit}' in duration '{input}'")),
        };
        rest = &rest[unit_len..];

        total = value
            .checked_mul(seconds)
            .and_then(|s| total.checked_add(s))
            .ok_or_else(|| format!("duration '{input}' is too large"))?;
    }

    Ok(Duration::from_secs(total))
}
