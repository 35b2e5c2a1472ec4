// spanet-api: Async Rust client for the SpaNET spa controller cloud API

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod spa;
pub mod transport;

pub use auth::{Credentials, Token, TokenProvider};
pub use client::SpaNetClient;
pub use error::Error;
pub use models::{Dashboard, Pump, SettingsSummary, SpaSummary};
pub use spa::Spa;
pub use transport::TransportConfig;
