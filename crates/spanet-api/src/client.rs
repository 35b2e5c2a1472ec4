// SpaNET cloud HTTP client
//
// Wraps `reqwest::Client` with endpoint URL construction, bearer auth, and
// status/body decoding. Per-spa endpoints live on the `Spa` handle in
// `spa.rs`; this module keeps to account-level calls and transport mechanics.

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::auth::{Credentials, TokenProvider};
use crate::error::Error;
use crate::models::{DevicesResponse, SpaSummary};
use crate::spa::Spa;
use crate::transport::TransportConfig;

/// Client for the SpaNET cloud API.
///
/// Cheaply cloneable; all clones share the HTTP connection pool and the
/// cached bearer token.
#[derive(Clone)]
pub struct SpaNetClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    transport: TransportConfig,
    tokens: TokenProvider,
}

impl SpaNetClient {
    /// Create a client. Does not contact the API until the first call.
    pub fn new(transport: TransportConfig, credentials: Credentials) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, transport, credentials))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        transport: TransportConfig,
        credentials: Credentials,
    ) -> Self {
        let tokens = TokenProvider::new(http.clone(), transport.clone(), credentials);
        Self {
            inner: Arc::new(ClientInner {
                http,
                transport,
                tokens,
            }),
        }
    }

    /// The API root URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.transport.base_url
    }

    /// The credential provider backing this client.
    pub fn tokens(&self) -> &TokenProvider {
        &self.inner.tokens
    }

    // ── Account ──────────────────────────────────────────────────────

    /// Log in and discover the spas registered on the account.
    pub async fn authenticate(&self) -> Result<Vec<SpaSummary>, Error> {
        self.inner.tokens.authenticate().await?;
        let spas = self.list_spas().await?;
        info!(count = spas.len(), "discovered spas");
        Ok(spas)
    }

    /// List spas on the account.
    ///
    /// `GET /Devices`
    pub async fn list_spas(&self) -> Result<Vec<SpaSummary>, Error> {
        let resp: DevicesResponse = self.get("Devices").await?;
        Ok(resp.devices)
    }

    /// Resolve a handle for one spa.
    ///
    /// Fails with [`Error::UnknownDevice`] if the account has no spa with
    /// this id.
    pub async fn spa(&self, spa_id: u64) -> Result<Spa, Error> {
        debug!(spa_id, "resolving spa handle");
        let summary = self
            .list_spas()
            .await?
            .into_iter()
            .find(|s| s.id == spa_id)
            .ok_or_else(|| Error::UnknownDevice {
                id: spa_id.to_string(),
            })?;
        Ok(Spa::new(self.clone(), summary))
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated GET and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.inner.transport.endpoint(path)?;
        debug!("GET {}", url);

        let token = self.inner.tokens.token().await?;
        let resp = self
            .inner
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(Error::Transport)?;

        let body = self.check_status(resp).await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview = preview(&body);
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }

    /// Send an authenticated PUT with a JSON body.
    ///
    /// Command endpoints answer with loosely shaped acknowledgements, so the
    /// response body is not decoded.
    pub(crate) async fn put(&self, path: &str, body: &(impl Serialize + Sync)) -> Result<(), Error> {
        let url = self.inner.transport.endpoint(path)?;
        debug!("PUT {}", url);

        let token = self.inner.tokens.token().await?;
        let resp = self
            .inner
            .http
            .put(url)
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        self.check_status(resp).await?;
        Ok(())
    }

    /// Map HTTP status to errors, returning the body text on success.
    ///
    /// A 401 drops the cached token so the next request logs in again.
    async fn check_status(&self, resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            self.inner.tokens.invalidate().await;
            return Err(Error::Authentication {
                message: "access token rejected".into(),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: preview(&body),
            });
        }

        resp.text().await.map_err(Error::Transport)
    }
}

/// First 200 characters of a response body, for error messages.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
