// ── Response merging ──
//
// Folds API responses into the state tree. Each apply is a single atomic
// write, so readers never observe a half-merged dashboard or pump set.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tracing::debug;

use spanet_api::{Dashboard, Pump, SettingsSummary};

use super::state::StateStore;
use crate::model::{ModeSetting, keys, resolve_label};

/// Status-list labels and the flag each one raises.
const STATUS_FLAGS: &[(&str, &str)] = &[
    ("Heating", keys::HEATER),
    ("Sleeping", keys::SLEEPING),
    ("Sanitise", keys::SANITISE),
];

impl StateStore {
    /// Merge a dashboard response.
    ///
    /// Returns `true` when the set of derived status labels differs from
    /// the previous dashboard, which callers treat as a structural change.
    pub(crate) fn apply_dashboard(&self, dash: &Dashboard) -> bool {
        let labels: BTreeSet<&str> = STATUS_FLAGS
            .iter()
            .map(|(label, _)| *label)
            .filter(|label| dash.status_list.iter().any(|s| s.contains(*label)))
            .collect();

        self.update(|root| {
            let Value::Object(map) = root else {
                return false;
            };
            let previous: Option<BTreeSet<String>> =
                map.get(keys::STATUS_LABELS).and_then(Value::as_array).map(|arr| {
                    arr.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_owned)
                        .collect()
                });

            map.insert(keys::SET_TEMPERATURE.into(), json!(dash.set_temperature));
            map.insert(keys::WATER_TEMPERATURE.into(), json!(dash.current_temperature));
            for (label, key) in STATUS_FLAGS {
                map.insert((*key).into(), json!(u8::from(labels.contains(label))));
            }
            map.insert(keys::STATUS_LIST.into(), json!(dash.status_list));
            map.insert(keys::STATUS_LABELS.into(), json!(labels));

            // No previous dashboard: dependents have not been fetched yet and
            // run on their own first tick.
            let changed = previous.is_some_and(|prev| {
                prev.len() != labels.len() || !labels.iter().all(|l| prev.contains(*l))
            });
            if changed {
                debug!(?labels, "dashboard status labels changed");
            }
            changed
        })
    }

    /// Upsert each reported pump under `pumps.<number>`.
    ///
    /// Pumps missing from the response keep their cached entries.
    pub(crate) fn apply_pumps(&self, pumps: &[Pump]) {
        self.update(|root| {
            let Value::Object(map) = root else { return };
            let slot = map
                .entry(keys::PUMPS)
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(all) = slot else { return };
            for pump in pumps {
                let key = pump.pump_number.to_string();
                match all.get_mut(&key) {
                    Some(Value::Object(existing)) => existing.extend(pump_fields(pump)),
                    _ => {
                        all.insert(key, Value::Object(pump_fields(pump)));
                    }
                }
            }
        });
        debug!(count = pumps.len(), "merged pumps");
    }

    /// Merge the settings summary, resolving free-text modes to labels.
    pub(crate) fn apply_information(&self, info: &SettingsSummary) {
        let resolve = |setting: ModeSetting, raw: Option<&String>| -> Value {
            raw.and_then(|r| resolve_label(setting.options(), r))
                .map_or(Value::Null, |label| json!(label))
        };
        let mut fields = Map::new();
        fields.insert(
            keys::OPERATION_MODE.into(),
            resolve(ModeSetting::OperationMode, info.operation_mode.as_ref()),
        );
        fields.insert(
            keys::POWER_SAVE.into(),
            resolve(ModeSetting::PowerSave, info.power_save.as_ref()),
        );
        fields.insert(
            keys::HEAT_PUMP.into(),
            resolve(ModeSetting::HeatPump, info.heat_pump_mode.as_ref()),
        );
        fields.insert(keys::ELEMENT_BOOST.into(), json!(info.sv_element_boost));
        fields.insert(keys::FIRMWARE_VERSION.into(), json!(info.firmware_version));
        self.merge("", fields);
    }

    // ── Connection bookkeeping ───────────────────────────────────────

    pub(crate) fn mark_refreshed(&self, at: DateTime<Utc>) {
        let mut fields = Map::new();
        fields.insert("online".into(), json!(true));
        fields.insert("lastRefresh".into(), json!(at.to_rfc3339()));
        fields.insert("lastError".into(), Value::Null);
        self.merge(keys::CONNECTION, fields);
    }

    pub(crate) fn mark_failed(&self, reason: &str) {
        let mut fields = Map::new();
        fields.insert("online".into(), json!(false));
        fields.insert("lastError".into(), json!(reason));
        self.merge(keys::CONNECTION, fields);
    }
}

fn pump_fields(pump: &Pump) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("apiId".into(), json!(pump.id));
    m.insert("auto".into(), json!(pump.has_auto || pump.auto_only));
    m.insert(
        "hasSwitch".into(),
        json!(pump.can_switch_on && (!pump.auto_only || pump.speeds > 1)),
    );
    m.insert("speeds".into(), json!(pump.speeds));
    m.insert("state".into(), json!(pump.pump_status));
    m
}
