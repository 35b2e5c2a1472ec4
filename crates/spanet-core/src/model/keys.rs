// Top-level keys of the cached spa state.

pub const SET_TEMPERATURE: &str = "setTemperature";
pub const WATER_TEMPERATURE: &str = "currentTemperature";
pub const HEATER: &str = "heat";
pub const SLEEPING: &str = "sleep";
pub const SANITISE: &str = "sanitise";
pub const STATUS_LIST: &str = "statusList";
pub const STATUS_LABELS: &str = "statusLabels";
pub const PUMPS: &str = "pumps";
pub const OPERATION_MODE: &str = "operationMode";
pub const POWER_SAVE: &str = "powerSave";
pub const HEAT_PUMP: &str = "heatPump";
pub const ELEMENT_BOOST: &str = "elementBoost";
pub const FIRMWARE_VERSION: &str = "firmwareVersion";
pub const CONNECTION: &str = "connection";

/// Path of one pump's subtree, e.g. `pumps.1`.
pub fn pump(number: u32) -> String {
    format!("{PUMPS}.{number}")
}
