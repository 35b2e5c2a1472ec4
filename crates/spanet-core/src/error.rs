// ── Core error types ──
//
// Domain-level errors from spanet-core. Consumers never see HTTP status
// codes or JSON parse failures directly: the `From<spanet_api::Error>` impl
// translates transport-layer errors into the kinds the coordinator acts on.

use std::time::Duration;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Lost connection to SpaNET: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Unknown spa: {id}")]
    UnknownDevice { id: String },

    /// The spa connection was dropped earlier in this cycle.
    #[error("Not connected to the spa")]
    NotConnected,

    #[error("Refresh failed: {reason}")]
    RefreshFailed { reason: String },

    #[error("Refresh cycle timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    // ── State errors ─────────────────────────────────────────────────
    /// The path has not been populated by any refresh yet.
    #[error("State key not found: {path}")]
    StateKey { path: String },

    #[error("Invalid value at {path}: {reason}")]
    InvalidStateValue { path: String, reason: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for failures that invalidate the spa connection.
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }

    /// `true` when a refresh task could not start and should simply wait
    /// for the next cycle.
    pub fn is_deferral(&self) -> bool {
        matches!(self, Self::NotConnected)
    }

    /// `true` when the cache simply has not been filled in yet.
    pub fn is_state_key(&self) -> bool {
        matches!(self, Self::StateKey { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<spanet_api::Error> for CoreError {
    fn from(err: spanet_api::Error) -> Self {
        if err.is_connection_error() {
            return CoreError::ConnectionFailed {
                reason: err.to_string(),
            };
        }
        match err {
            spanet_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            spanet_api::Error::UnknownDevice { id } => CoreError::UnknownDevice { id },
            spanet_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            spanet_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            spanet_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("Deserialization error: {message}"),
                status: None,
            },
            spanet_api::Error::Transport(e) => CoreError::ConnectionFailed {
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_failure_maps_to_connection_loss() {
        let err: CoreError = spanet_api::Error::Api {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert!(err.is_connection_loss());
    }

    #[test]
    fn missing_endpoint_stays_an_api_error() {
        let err: CoreError = spanet_api::Error::Api {
            status: 404,
            message: "pumps unsupported".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Api { status: Some(404), .. }));
        assert!(!err.is_connection_loss());
    }

    #[test]
    fn auth_and_unknown_device_keep_their_kind() {
        let auth: CoreError = spanet_api::Error::Authentication {
            message: "nope".into(),
        }
        .into();
        assert!(matches!(auth, CoreError::AuthenticationFailed { .. }));

        let unknown: CoreError = spanet_api::Error::UnknownDevice { id: "3".into() }.into();
        assert!(matches!(unknown, CoreError::UnknownDevice { ref id } if id == "3"));
    }
}
