// Domain vocabulary: cache key names and mode enumerations.

pub mod keys;
pub mod modes;

pub use modes::{
    HEAT_PUMP_MODES, ModeSetting, OPERATION_MODES, PLACEHOLDER_LABEL, POWER_SAVE_MODES, PumpMode,
    label_index, resolve_label,
};
