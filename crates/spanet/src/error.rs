//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use spanet_config::ConfigError;
use spanet_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the SpaNET API: {reason}")]
    #[diagnostic(
        code(spanet::connection_failed),
        help(
            "Check your network connection, or the API root given with --api-url.\n\
             The session is re-established on the next command."
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Refresh failed: {reason}")]
    #[diagnostic(
        code(spanet::refresh_failed),
        help("Values shown may be stale. Re-run with -v for per-task errors.")
    )]
    RefreshFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(spanet::auth_failed),
        help(
            "Verify the account email and password.\n\
             Run: spanet config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(spanet::no_credentials),
        help(
            "Configure credentials with: spanet config init\n\
             Or set the SPANET_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(spanet::not_found),
        help("Run: spanet {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error ({status}): {message}")]
    #[diagnostic(code(spanet::api_error))]
    ApiError { status: String, message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(spanet::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(spanet::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: spanet config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No configuration found")]
    #[diagnostic(
        code(spanet::no_config),
        help(
            "Create one with: spanet config init\n\
             Expected at: {path}\n\
             Or set SPANET_EMAIL and SPANET_PASSWORD."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(spanet::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Refresh timed out after {elapsed}")]
    #[diagnostic(
        code(spanet::timeout),
        help("Increase the request timeout with --timeout, or try again later.")
    )]
    Timeout { elapsed: String },

    // ── Internal ─────────────────────────────────────────────────────

    #[error("{0}")]
    #[diagnostic(code(spanet::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout {
            elapsed: humantime::format_duration(elapsed).to_string(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::UnknownDevice { id } => CliError::NotFound {
                resource_type: "spa".into(),
                identifier: id,
                list_command: "spas".into(),
            },

            CoreError::NotConnected => CliError::ConnectionFailed {
                reason: "not connected to the spa".into(),
            },

            CoreError::RefreshFailed { reason } => CliError::RefreshFailed { reason },

            CoreError::Timeout { timeout } => CliError::timeout(timeout),

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Api { message, status } => CliError::ApiError {
                status: status.map_or_else(|| "unknown".into(), |s| s.to_string()),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::StateKey { path } => {
                CliError::Internal(format!("state key '{path}' has not been populated"))
            }

            CoreError::InvalidStateValue { path, reason } => {
                CliError::Internal(format!("invalid cached value at '{path}': {reason}"))
            }

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            other => CliError::Config(Box::new(other)),
        }
    }
}
