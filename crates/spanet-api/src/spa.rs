// Per-spa endpoints
//
// Reads (dashboard, pumps, information) and the command endpoints. Every
// call is scoped to the spa the handle was resolved for.

use serde_json::json;
use tracing::debug;

use crate::client::SpaNetClient;
use crate::error::Error;
use crate::models::{Dashboard, InformationResponse, Pump, PumpsResponse, SettingsSummary, SpaSummary};

/// Handle to one spa on the account.
///
/// Cheap to clone. Obtained from [`SpaNetClient::spa`].
#[derive(Clone)]
pub struct Spa {
    client: SpaNetClient,
    summary: SpaSummary,
}

impl Spa {
    pub(crate) fn new(client: SpaNetClient, summary: SpaSummary) -> Self {
        Self { client, summary }
    }

    pub fn id(&self) -> u64 {
        self.summary.id
    }

    pub fn name(&self) -> &str {
        &self.summary.name
    }

    pub fn summary(&self) -> &SpaSummary {
        &self.summary
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Temperatures and status labels.
    ///
    /// `GET /Dashboard/{spa}`
    pub async fn get_dashboard(&self) -> Result<Dashboard, Error> {
        debug!(spa = self.id(), "fetching dashboard");
        self.client.get(&format!("Dashboard/{}", self.id())).await
    }

    /// Pump configuration and state.
    ///
    /// `GET /PumpsAndBlower/Get/{spa}`
    pub async fn get_pumps(&self) -> Result<Vec<Pump>, Error> {
        debug!(spa = self.id(), "fetching pumps");
        let resp: PumpsResponse = self
            .client
            .get(&format!("PumpsAndBlower/Get/{}", self.id()))
            .await?;
        Ok(resp.pump_and_blower.pumps)
    }

    /// Operating settings summary.
    ///
    /// `GET /Information/{spa}`
    pub async fn get_information(&self) -> Result<SettingsSummary, Error> {
        debug!(spa = self.id(), "fetching information");
        let resp: InformationResponse = self
            .client
            .get(&format!("Information/{}", self.id()))
            .await?;
        Ok(resp.information.settings_summary)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Set the target temperature in tenths of a degree.
    ///
    /// `PUT /Dashboard/{spa}`
    pub async fn set_temperature(&self, tenths: i64) -> Result<(), Error> {
        debug!(spa = self.id(), tenths, "setting temperature");
        self.client
            .put(
                &format!("Dashboard/{}", self.id()),
                &json!({ "temperature": tenths }),
            )
            .await
    }

    /// Switch a pump to a mode.
    ///
    /// `PUT /PumpsAndBlower/SetPump/{pump}`
    pub async fn set_pump(&self, pump_api_id: u64, mode_id: u32) -> Result<(), Error> {
        debug!(spa = self.id(), pump_api_id, mode_id, "setting pump mode");
        self.client
            .put(
                &format!("PumpsAndBlower/SetPump/{pump_api_id}"),
                &json!({
                    "deviceId": self.id(),
                    "modeId": mode_id,
                    "pumpVariableSpeed": 0,
                }),
            )
            .await
    }

    /// `PUT /Settings/OperationMode/{spa}`
    pub async fn set_operation_mode(&self, index: usize) -> Result<(), Error> {
        debug!(spa = self.id(), index, "setting operation mode");
        self.client
            .put(
                &format!("Settings/OperationMode/{}", self.id()),
                &json!({ "mode": index }),
            )
            .await
    }

    /// `PUT /Settings/PowerSave/{spa}`
    pub async fn set_power_save(&self, index: usize) -> Result<(), Error> {
        debug!(spa = self.id(), index, "setting power save");
        self.client
            .put(
                &format!("Settings/PowerSave/{}", self.id()),
                &json!({ "mode": index }),
            )
            .await
    }

    /// `PUT /Settings/SetHeatPumpMode/{spa}`
    pub async fn set_heat_pump(&self, index: usize) -> Result<(), Error> {
        debug!(spa = self.id(), index, "setting heat pump mode");
        self.client
            .put(
                &format!("Settings/SetHeatPumpMode/{}", self.id()),
                &json!({ "mode": index }),
            )
            .await
    }

    /// `PUT /Settings/SetElementBoost/{spa}`
    pub async fn set_element_boost(&self, enabled: bool) -> Result<(), Error> {
        debug!(spa = self.id(), enabled, "setting element boost");
        self.client
            .put(
                &format!("Settings/SetElementBoost/{}", self.id()),
                &json!({ "svElementBoost": enabled }),
            )
            .await
    }
}
