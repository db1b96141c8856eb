use std::sync::Arc;

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use cookie::time::Duration as CookieDuration;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use super::{AuthError, Identity, IdentityProvider};
use crate::clock::{TokenSource, TOKEN_LENGTH};
use crate::config::GoogleConfig;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const DIRECTORY_SCOPE: &str =
    "https://www.googleapis.com/auth/admin.directory.group.member.readonly";

const STATE_COOKIE: &str = "gstate";
const STATE_LIFETIME_SECS: i64 = 10 * 60;

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    email: String,
    #[serde(default)]
    email_verified: Option<bool>,
}

/// Google OAuth sign-in restricted by account domain and group membership.
pub struct GoogleProvider {
    config: GoogleConfig,
    client: Client,
    tokens: Arc<dyn TokenSource>,
    cookie_secure: bool,
    service_account: Option<ServiceAccountKey>,
}

impl GoogleProvider {
    pub fn new(
        config: GoogleConfig,
        tokens: Arc<dyn TokenSource>,
        cookie_secure: bool,
    ) -> Result<Self, AuthError> {
        let client = Client::builder().build()?;

        let service_account = match config.service_account_json_path.as_deref() {
            Some(path) => {
                let key_json = std::fs::read_to_string(path).map_err(|e| {
                    AuthError::Config(format!("failed to read service account key {path}: {e}"))
                })?;
                let key: ServiceAccountKey = serde_json::from_str(&key_json).map_err(|e| {
                    AuthError::Config(format!("failed to parse service account key {path}: {e}"))
                })?;
                Some(key)
            }
            None => None,
        };

        if !config.allowed_groups.is_empty() && service_account.is_none() {
            return Err(AuthError::Config(
                "group restrictions need a service account key".into(),
            ));
        }

        Ok(Self {
            config,
            client,
            tokens,
            cookie_secure,
            service_account,
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        let resp: TokenResponse = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    async fn user_info(&self, access_token: &str) -> Result<UserInfo, AuthError> {
        let info = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(info)
    }

    fn domain_allowed(&self, email: &str) -> bool {
        if self.config.allowed_domains.is_empty() {
            return true;
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.contains('@') => self
                .config
                .allowed_domains
                .iter()
                .any(|d| d.eq_ignore_ascii_case(domain)),
            _ => false,
        }
    }

    async fn group_member(&self, email: &str) -> Result<bool, AuthError> {
        if self.config.allowed_groups.is_empty() {
            return Ok(true);
        }
        let key = self
            .service_account
            .as_ref()
            .ok_or_else(|| AuthError::Config("missing service account key".into()))?;
        let token = self.directory_token(key).await?;

        for group in &self.config.allowed_groups {
            let url = format!(
                "https://admin.googleapis.com/admin/directory/v1/groups/{group}/members/{email}"
            );
            let resp = self.client.get(url).bearer_auth(&token).send().await?;
            match resp.status() {
                s if s.is_success() => return Ok(true),
                StatusCode::NOT_FOUND => continue,
                s => {
                    tracing::warn!(group = %group, status = %s, "Group membership lookup failed");
                }
            }
        }
        Ok(false)
    }

    /// Access token for the Admin Directory API via a signed service-account assertion.
    async fn directory_token(&self, key: &ServiceAccountKey) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": key.client_email,
            "scope": DIRECTORY_SCOPE,
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        });

        let header = base64_url_encode(
            serde_json::json!({ "alg": "RS256", "typ": "JWT" })
                .to_string()
                .as_bytes(),
        );
        let payload = base64_url_encode(claims.to_string().as_bytes());
        let unsigned = format!("{header}.{payload}");

        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let jwt = format!("{unsigned}.{}", base64_url_encode(&signature));

        let resp: TokenResponse = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    fn state_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((STATE_COOKIE, value))
            .path("/")
            .http_only(true)
            .secure(self.cookie_secure)
            .same_site(SameSite::Lax)
            .max_age(CookieDuration::seconds(STATE_LIFETIME_SECS))
            .build()
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn redirect(&self, jar: CookieJar) -> Result<(CookieJar, String), AuthError> {
        let state = self.tokens.token(TOKEN_LENGTH);
        let scopes = self.config.scopes.join(" ");
        let url = Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", scopes.as_str()),
                ("state", state.as_str()),
                ("access_type", "online"),
            ],
        )
        .map_err(|e| AuthError::Config(format!("authorization url: {e}")))?;

        Ok((jar.add(self.state_cookie(state)), url.to_string()))
    }

    async fn callback(
        &self,
        jar: CookieJar,
        code: &str,
        state: &str,
    ) -> Result<(CookieJar, Identity), AuthError> {
        let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
        let jar = jar.remove(Cookie::build((STATE_COOKIE, "")).path("/").build());

        match expected {
            Some(expected) if !expected.is_empty() && expected == state => {}
            _ => return Err(AuthError::InvalidState),
        }
        if code.is_empty() {
            return Err(AuthError::Provider("missing authorization code".into()));
        }

        let access_token = self.exchange_code(code).await?;
        let info = self.user_info(&access_token).await?;

        if info.email_verified == Some(false) {
            return Err(AuthError::Forbidden("email address is not verified".into()));
        }
        if !self.domain_allowed(&info.email) {
            tracing::warn!(email = %info.email, "Sign-in from a domain that is not allowed");
            return Err(AuthError::Forbidden("domain is not allowed".into()));
        }
        if !self.group_member(&info.email).await? {
            tracing::warn!(email = %info.email, "Sign-in from a user outside the allowed groups");
            return Err(AuthError::Forbidden("not a member of an allowed group".into()));
        }

        Ok((
            jar,
            Identity { email: info.email },
        ))
    }
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, AuthError> {
    use base64::Engine;

    let der_b64: String = private_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = base64::engine::general_purpose::STANDARD
        .decode(der_b64.trim())
        .map_err(|e| AuthError::Config(format!("invalid service account key: {e}")))?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| AuthError::Config(format!("failed to parse RSA key: {e}")))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            data,
            &mut signature,
        )
        .map_err(|e| AuthError::Provider(format!("failed to sign assertion: {e}")))?;

    Ok(signature)
}
