// ── Mode enumerations ──
//
// The API reports settings as free text ("ECONOMY MODE", "low") but accepts
// them back as indices into fixed tables. Incoming text is matched against
// the table by case-insensitive prefix.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::keys;

/// Index 0 of some tables; readable but never sent back to the spa.
pub const PLACEHOLDER_LABEL: &str = "Unknown";

pub const OPERATION_MODES: &[&str] = &[PLACEHOLDER_LABEL, "Normal", "Economy", "Away", "Weekend"];
pub const POWER_SAVE_MODES: &[&str] = &[PLACEHOLDER_LABEL, "Off", "Low", "High"];
pub const HEAT_PUMP_MODES: &[&str] = &["Auto", "Heat", "Cool", "Off"];

/// First option whose lowercase form prefixes the lowercase raw value.
pub fn resolve_label(options: &[&'static str], raw: &str) -> Option<&'static str> {
    let raw = raw.to_lowercase();
    options
        .iter()
        .copied()
        .find(|opt| raw.starts_with(&opt.to_lowercase()))
}

/// Index of an option, compared case-insensitively.
pub fn label_index(options: &[&str], label: &str) -> Option<usize> {
    options.iter().position(|opt| opt.eq_ignore_ascii_case(label))
}

/// The three index-valued settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ModeSetting {
    OperationMode,
    PowerSave,
    HeatPump,
}

impl ModeSetting {
    pub fn options(self) -> &'static [&'static str] {
        match self {
            Self::OperationMode => OPERATION_MODES,
            Self::PowerSave => POWER_SAVE_MODES,
            Self::HeatPump => HEAT_PUMP_MODES,
        }
    }

    /// Labels a command may select, in table order.
    pub fn settable_options(self) -> impl Iterator<Item = &'static str> {
        self.options()
            .iter()
            .copied()
            .filter(|opt| *opt != PLACEHOLDER_LABEL)
    }

    /// Table index to send for `label`. The placeholder is not settable.
    pub fn command_index(self, label: &str) -> Option<usize> {
        label_index(self.options(), label).filter(|&i| self.options()[i] != PLACEHOLDER_LABEL)
    }

    /// Cache key holding the resolved label.
    pub fn state_key(self) -> &'static str {
        match self {
            Self::OperationMode => keys::OPERATION_MODE,
            Self::PowerSave => keys::POWER_SAVE,
            Self::HeatPump => keys::HEAT_PUMP,
        }
    }
}

/// Pump operating modes accepted by `SetPump`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum PumpMode {
    Off,
    On,
    Auto,
    Low,
    High,
}

impl PumpMode {
    /// Mode id sent to the API.
    pub fn mode_id(self) -> u32 {
        match self {
            Self::Off => 0,
            Self::On => 1,
            Self::Auto => 2,
            Self::Low => 3,
            Self::High => 4,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn prefix_match_ignores_case_and_suffix() {
        assert_eq!(resolve_label(OPERATION_MODES, "ECONOMY MODE"), Some("Economy"));
        assert_eq!(resolve_label(POWER_SAVE_MODES, "low"), Some("Low"));
        assert_eq!(resolve_label(HEAT_PUMP_MODES, "cooling"), Some("Cool"));
    }

    #[test]
    fn economy_mode_resolves_to_economy() {
        assert_eq!(resolve_label(OPERATION_MODES, "economy mode"), Some("Economy"));
    }

    #[test]
    fn unmatched_text_resolves_to_none() {
        assert_eq!(resolve_label(OPERATION_MODES, "xyz"), None);
        assert_eq!(resolve_label(POWER_SAVE_MODES, "xyz"), None);
        assert_eq!(resolve_label(OPERATION_MODES, "Vacation"), None);
        assert_eq!(resolve_label(POWER_SAVE_MODES, ""), None);
    }

    #[test]
    fn first_matching_option_wins() {
        assert_eq!(resolve_label(&["Off", "Offline"], "offline"), Some("Off"));
    }

    #[test]
    fn label_index_is_case_insensitive() {
        assert_eq!(label_index(OPERATION_MODES, "away"), Some(3));
        assert_eq!(label_index(HEAT_PUMP_MODES, "OFF"), Some(3));
        assert_eq!(label_index(POWER_SAVE_MODES, "medium"), None);
    }

    #[test]
    fn placeholder_is_not_settable() {
        let ops: Vec<&str> = ModeSetting::OperationMode.settable_options().collect();
        assert_eq!(ops, vec!["Normal", "Economy", "Away", "Weekend"]);
        assert_eq!(ModeSetting::OperationMode.command_index("unknown"), None);
        assert_eq!(ModeSetting::PowerSave.command_index("Unknown"), None);
        assert_eq!(ModeSetting::PowerSave.command_index("low"), Some(2));
        assert_eq!(ModeSetting::HeatPump.command_index("auto"), Some(0));
    }

    #[test]
    fn pump_modes_parse_and_map_to_ids() {
        assert_eq!(PumpMode::from_str("AUTO").unwrap(), PumpMode::Auto);
        assert!(PumpMode::from_str("turbo").is_err());
        let ids: Vec<u32> = PumpMode::iter().map(PumpMode::mode_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(PumpMode::High.to_string(), "high");
    }
}
