// Bearer token management
//
// Email/password login yields an access/refresh token pair. The provider
// hands out the access token on demand and swaps it for a fresh one when it
// is about to expire, falling back to a full login if the refresh is refused.

use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Error;
use crate::models::TokenResponse;
use crate::transport::TransportConfig;

/// Tokens expiring within this window are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the API does not report one.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Account credentials for the SpaNET cloud.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
    /// Per-install identifier the API ties the session to.
    pub device_id: String,
}

impl Credentials {
    /// Credentials with a freshly generated install identifier.
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
            device_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// An access/refresh token pair with its expiry.
#[derive(Debug, Clone)]
pub struct Token {
    pub access: SecretString,
    pub refresh: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    fn from_response(resp: TokenResponse, now: DateTime<Utc>) -> Self {
        let lifetime = resp.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Self {
            access: SecretString::from(resp.access_token),
            refresh: SecretString::from(resp.refresh_token),
            expires_at: now + Duration::seconds(lifetime),
        }
    }

    /// `true` if the token is expired or expires within the refresh margin.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= Duration::seconds(REFRESH_MARGIN_SECS)
    }
}

/// Produces a valid bearer credential on demand.
pub struct TokenProvider {
    http: reqwest::Client,
    transport: TransportConfig,
    credentials: Credentials,
    current: Mutex<Option<Token>>,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, transport: TransportConfig, credentials: Credentials) -> Self {
        Self {
            http,
            transport,
            credentials,
            current: Mutex::new(None),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Return a usable access token, logging in or refreshing as needed.
    pub async fn token(&self) -> Result<SecretString, Error> {
        let mut guard = self.current.lock().await;
        let now = Utc::now();

        let token = match guard.take() {
            Some(token) if !token.needs_refresh(now) => token,
            Some(stale) => match self.refresh(&stale).await {
                Ok(fresh) => fresh,
                Err(e) if e.is_auth_error() => {
                    debug!(error = %e, "token refresh rejected, logging in again");
                    self.login().await?
                }
                Err(e) => {
                    *guard = Some(stale);
                    return Err(e);
                }
            },
            None => self.login().await?,
        };

        let access = token.access.clone();
        *guard = Some(token);
        Ok(access)
    }

    /// Drop the cached token so the next call logs in from scratch.
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }

    /// Force a login now, replacing any cached token.
    pub async fn authenticate(&self) -> Result<(), Error> {
        let token = self.login().await?;
        *self.current.lock().await = Some(token);
        Ok(())
    }

    async fn login(&self) -> Result<Token, Error> {
        let url = self.transport.endpoint("Login/Authenticate")?;
        debug!("logging in at {}", url);

        let body = json!({
            "email": self.credentials.email,
            "password": self.credentials.password.expose_secret(),
            "userDeviceId": self.credentials.device_id,
            "language": "en_AU",
        });

        let token = self.request_token(url, &body).await?;
        info!(email = %self.credentials.email, "authenticated with SpaNET");
        Ok(token)
    }

    async fn refresh(&self, stale: &Token) -> Result<Token, Error> {
        let url = self.transport.endpoint("OAuth/Token")?;
        debug!("refreshing access token");

        let body = json!({
            "refreshToken": stale.refresh.expose_secret(),
            "userDeviceId": self.credentials.device_id,
        });

        self.request_token(url, &body).await
    }

    async fn request_token(&self, url: url::Url, body: &serde_json::Value) -> Result<Token, Error> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            // Only an explicit refusal is an auth failure; outages stay API errors.
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Error::Authentication {
                        message: format!("HTTP {status}: {}", crate::client::preview(&body)),
                    }
                }
                _ => Error::Api {
                    status: status.as_u16(),
                    message: crate::client::preview(&body),
                },
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Authentication {
                message: format!("malformed token response: {e}"),
            })?;
        Ok(Token::from_response(parsed, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_expiring_in(secs: i64, now: DateTime<Utc>) -> Token {
        Token {
            access: SecretString::from("a".to_string()),
            refresh: SecretString::from("r".to_string()),
            expires_at: now + Duration::seconds(secs),
        }
    }

    #[test]
    fn fresh_token_is_reused() {
        let now = Utc::now();
        assert!(!token_expiring_in(600, now).needs_refresh(now));
    }

    #[test]
    fn token_inside_margin_is_refreshed() {
        let now = Utc::now();
        assert!(token_expiring_in(59, now).needs_refresh(now));
        assert!(token_expiring_in(60, now).needs_refresh(now));
        assert!(!token_expiring_in(61, now).needs_refresh(now));
    }

    #[test]
    fn expired_token_is_refreshed() {
        let now = Utc::now();
        assert!(token_expiring_in(-5, now).needs_refresh(now));
    }

    #[test]
    fn missing_lifetime_uses_default() {
        let now = Utc::now();
        let token = Token::from_response(
            TokenResponse {
                access_token: "a".into(),
                refresh_token: "r".into(),
                expires_in: None,
            },
            now,
        );
        assert_eq!(token.expires_at, now + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
    }

    #[test]
    fn credentials_get_unique_device_ids() {
        let a = Credentials::new("me@example.com", SecretString::from("pw".to_string()));
        let b = Credentials::new("me@example.com", SecretString::from("pw".to_string()));
        assert_ne!(a.device_id, b.device_id);
    }
}
