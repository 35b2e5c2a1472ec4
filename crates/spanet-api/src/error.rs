use thiserror::Error;

/// Top-level error type for the `spanet-api` crate.
///
/// Covers every failure mode of the cloud API: authentication, transport,
/// HTTP status errors, payload decoding, and device lookup.
/// `spanet-core` maps these into domain-level failures.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login or token refresh rejected (wrong credentials, revoked token, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success HTTP status from an API endpoint.
    #[error("SpaNET API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Devices ─────────────────────────────────────────────────────
    /// The requested spa is not registered on this account.
    #[error("Unknown spa: {id}")]
    UnknownDevice { id: String },
}

impl Error {
    /// Returns `true` if the credentials were rejected.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if the failure happened at the network level or the
    /// server itself failed. Such errors invalidate the cached spa handle.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } | Self::UnknownDevice { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_connection_errors() {
        let err = Error::Api {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.is_connection_error());
        assert!(!err.is_auth_error());
    }

    #[test]
    fn client_errors_stay_local() {
        let err = Error::Api {
            status: 404,
            message: "no pumps".into(),
        };
        assert!(!err.is_connection_error());
        assert!(err.is_not_found());
    }

    #[test]
    fn unknown_device_is_not_found() {
        let err = Error::UnknownDevice { id: "42".into() };
        assert!(err.is_not_found());
        assert!(!err.is_connection_error());
    }
}
