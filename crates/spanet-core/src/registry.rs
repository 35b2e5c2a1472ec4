// ── Account-level registry ──
//
// Authenticates once, then owns one coordinator per spa on the account in
// discovery order. Replaces any process-wide table of coordinators.

use indexmap::IndexMap;
use tracing::{info, warn};

use spanet_api::SpaNetClient;

use crate::adapter::{PropertyAdapter, spa_properties};
use crate::config::CoordinatorConfig;
use crate::coordinator::Coordinator;
use crate::error::CoreError;

/// All coordinators for one account.
pub struct Integration {
    client: SpaNetClient,
    coordinators: IndexMap<u64, Coordinator>,
}

impl Integration {
    /// Log in, discover spas, and run an initial refresh for each.
    ///
    /// Authentication failures abort setup. A failed initial refresh only
    /// leaves that spa stale; its update loop retries later.
    pub async fn setup(client: SpaNetClient, config: CoordinatorConfig) -> Result<Self, CoreError> {
        let spas = client.authenticate().await?;
        let mut coordinators = IndexMap::with_capacity(spas.len());
        for summary in spas {
            let coordinator = Coordinator::new(client.clone(), summary, config.clone());
            if let Err(e) = coordinator.refresh().await {
                warn!(spa = coordinator.id(), error = %e, "initial refresh failed");
            }
            coordinators.insert(coordinator.id(), coordinator);
        }
        info!(count = coordinators.len(), "spa integration ready");
        Ok(Self {
            client,
            coordinators,
        })
    }

    pub fn client(&self) -> &SpaNetClient {
        &self.client
    }

    pub fn len(&self) -> usize {
        self.coordinators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinators.is_empty()
    }

    /// Coordinators in discovery order.
    pub fn coordinators(&self) -> impl Iterator<Item = &Coordinator> {
        self.coordinators.values()
    }

    pub fn get(&self, spa_id: u64) -> Result<&Coordinator, CoreError> {
        self.coordinators
            .get(&spa_id)
            .ok_or_else(|| CoreError::UnknownDevice {
                id: spa_id.to_string(),
            })
    }

    /// Look a spa up by id, or by case-insensitive name.
    pub fn find(&self, key: &str) -> Result<&Coordinator, CoreError> {
        let by_id = key
            .parse::<u64>()
            .ok()
            .and_then(|id| self.coordinators.get(&id));
        if let Some(c) = by_id {
            return Ok(c);
        }
        self.coordinators
            .values()
            .find(|c| c.name().eq_ignore_ascii_case(key))
            .ok_or_else(|| CoreError::UnknownDevice { id: key.to_owned() })
    }

    /// Properties of every spa.
    pub fn properties(&self) -> Vec<(&Coordinator, PropertyAdapter)> {
        self.coordinators
            .values()
            .flat_map(|c| spa_properties(c).into_iter().map(move |p| (c, p)))
            .collect()
    }

    pub async fn start_all(&self) {
        for coordinator in self.coordinators.values() {
            coordinator.start().await;
        }
    }

    pub async fn stop_all(&self) {
        for coordinator in self.coordinators.values() {
            coordinator.stop().await;
        }
    }
}
