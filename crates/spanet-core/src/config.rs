// ── Runtime connection configuration ──
//
// Describes *how* to reach the SpaNET cloud and how the coordinator polls.
// Built by the CLI from a resolved profile; no file I/O happens here.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use spanet_api::{Credentials, SpaNetClient, TransportConfig};

use crate::error::CoreError;

// ── Polling cadence ─────────────────────────────────────────────────

/// Dashboard (temperatures, status flags).
pub const DASHBOARD_INTERVAL: Duration = Duration::from_secs(120);
/// Pump configuration and state.
pub const PUMPS_INTERVAL: Duration = Duration::from_secs(300);
/// Operating settings summary.
pub const INFORMATION_INTERVAL: Duration = Duration::from_secs(1200);
/// Period of the coordinator's update loop.
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(60);
/// Upper bound on one refresh cycle.
pub const CYCLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Credentials and transport settings for the cloud API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub email: String,
    pub password: SecretString,
    pub base_url: Url,
    pub timeout: Duration,
    /// Install id sent on login. A fresh UUID is generated when unset.
    pub device_id: Option<String>,
}

impl ClientConfig {
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        let transport = TransportConfig::default();
        Self {
            email: email.into(),
            password,
            base_url: transport.base_url,
            timeout: transport.timeout,
            device_id: None,
        }
    }

    /// Build the HTTP client. Does not contact the API.
    pub fn build_client(&self) -> Result<SpaNetClient, CoreError> {
        let mut credentials = Credentials::new(self.email.clone(), self.password.clone());
        if let Some(ref id) = self.device_id {
            credentials.device_id.clone_from(id);
        }
        let transport = TransportConfig {
            base_url: self.base_url.clone(),
            timeout: self.timeout,
        };
        SpaNetClient::new(transport, credentials).map_err(CoreError::from)
    }
}

/// Per-spa coordinator behaviour.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Cycles running longer than this are abandoned.
    pub cycle_timeout: Duration,
    /// Expose the heat pump mode property.
    pub enable_heat_pump: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cycle_timeout: CYCLE_TIMEOUT,
            enable_heat_pump: false,
        }
    }
}
