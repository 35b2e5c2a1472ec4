// SpaNET API response types
//
// Payload models for the cloud endpoints. Fields use `#[serde(default)]`
// liberally because field presence varies across controller firmware.

use serde::{Deserialize, Serialize};

// ── Authentication ───────────────────────────────────────────────────

/// Token pair returned by the login and refresh endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds. Absent on some API versions.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

// ── Devices ──────────────────────────────────────────────────────────

/// A spa registered on the account, as discovered at login time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaSummary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub mac_address: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<SpaSummary>,
}

// ── Dashboard ────────────────────────────────────────────────────────

/// Live readings from `GET /Dashboard/{spa}`.
///
/// Temperatures are fixed-point tenths of a degree Celsius.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub set_temperature: i64,
    pub current_temperature: i64,
    /// Free-text status labels, e.g. `"Heating"`, `"Sleeping"`.
    #[serde(default)]
    pub status_list: Vec<String>,
}

// ── Pumps ────────────────────────────────────────────────────────────

/// One pump from `GET /PumpsAndBlower/Get/{spa}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pump {
    /// Remote identifier used by the set-pump endpoint.
    pub id: u64,
    pub pump_number: u32,
    #[serde(default)]
    pub can_switch_on: bool,
    #[serde(default)]
    pub has_auto: bool,
    /// Pump can only run under controller scheduling.
    #[serde(default)]
    pub auto_only: bool,
    #[serde(default = "default_speeds")]
    pub speeds: u32,
    /// Current mode as reported by the controller (`"on"`, `"off"`, `"auto"`, ...).
    #[serde(default)]
    pub pump_status: String,
}

fn default_speeds() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PumpsResponse {
    pub pump_and_blower: PumpAndBlower,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PumpAndBlower {
    #[serde(default)]
    pub pumps: Vec<Pump>,
}

// ── Information ──────────────────────────────────────────────────────

/// Settings summary from `GET /Information/{spa}`.
///
/// Mode names are free text whose capitalization and suffixes differ
/// between firmware versions; callers resolve them against known labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSummary {
    #[serde(default)]
    pub operation_mode: Option<String>,
    #[serde(default)]
    pub power_save: Option<String>,
    #[serde(default)]
    pub heat_pump_mode: Option<String>,
    #[serde(default)]
    pub sv_element_boost: Option<bool>,
    #[serde(default)]
    pub firmware_version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InformationResponse {
    pub information: InformationBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InformationBody {
    #[serde(default)]
    pub settings_summary: SettingsSummary,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pump_defaults_to_single_speed() {
        let pump: Pump = serde_json::from_value(json!({
            "id": 31,
            "pumpNumber": 2,
            "canSwitchOn": true,
            "pumpStatus": "off"
        }))
        .unwrap();
        assert_eq!(pump.speeds, 1);
        assert!(!pump.auto_only);
        assert!(!pump.has_auto);
    }

    #[test]
    fn information_tolerates_missing_fields() {
        let info: InformationResponse =
            serde_json::from_value(json!({ "information": {} })).unwrap();
        assert_eq!(info.information.settings_summary, SettingsSummary::default());
    }
}
