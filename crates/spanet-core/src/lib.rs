//! Polling engine and command layer for SpaNET spas.
//!
//! One [`Coordinator`] per spa keeps a [`StateStore`] fresh by running
//! periodic refresh tasks through a [`Scheduler`]: dashboard every two
//! minutes, pumps every five, settings every twenty. Commands write to the
//! cache optimistically, call the cloud API, and request a refresh.
//! [`Integration`] authenticates an account and owns its coordinators;
//! [`adapter`] exposes typed property views for display and control.

pub mod adapter;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use adapter::{PropertyAdapter, PropertyKind, PropertyValue, spa_properties};
pub use config::{ClientConfig, CoordinatorConfig};
pub use coordinator::{Coordinator, RefreshStatus, RefreshTasks};
pub use error::CoreError;
pub use model::{ModeSetting, PumpMode};
pub use registry::Integration;
pub use scheduler::{Scheduler, TaskHandle};
pub use store::StateStore;

pub use spanet_api::SpaSummary;
