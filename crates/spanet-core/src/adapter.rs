// ── Property adapters ──
//
// Uniform read/write views over a coordinator's cached state: each adapter
// names one spa property, knows where it lives in the state tree, how to
// present the raw value, and which command (if any) changes it.

use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use strum::{Display, IntoEnumIterator};

use crate::coordinator::{Coordinator, MAX_TEMPERATURE, MIN_TEMPERATURE};
use crate::error::CoreError;
use crate::model::{ModeSetting, PumpMode, keys};

/// Kind of property, used as the entity-id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Sensor,
    BinarySensor,
    Climate,
    Switch,
    Select,
}

/// How a cached value is presented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueTransform {
    /// The value as stored.
    Raw,
    /// Integer divided by a constant (tenths of a degree to °C).
    Scaled { divisor: f64 },
    /// Integer flag where `1` means on.
    Flag,
    /// Pump state text: `on` and `auto` count as running.
    PumpSwitch,
    /// Resolved mode label.
    Label,
}

/// Command issued when the property is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Temperature,
    Pump { number: u32 },
    Mode(ModeSetting),
    ElementBoost,
}

/// Bounds for writable numeric properties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumberRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// A presented property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Bool(bool),
    Text(String),
    /// Not yet known (null in the cache).
    Unavailable,
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(true) => f.write_str("on"),
            Self::Bool(false) => f.write_str("off"),
            Self::Text(s) => f.write_str(s),
            Self::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// One readable (and possibly writable) spa property.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyAdapter {
    pub name: String,
    pub entity_id: String,
    pub unique_id: String,
    pub kind: PropertyKind,
    /// Dot-separated state path.
    pub path: String,
    #[serde(skip)]
    pub transform: ValueTransform,
    #[serde(skip)]
    pub write: Option<WriteOp>,
    /// Accepted inputs for select properties.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<NumberRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
}

impl PropertyAdapter {
    fn new(
        coordinator: &Coordinator,
        kind: PropertyKind,
        name: &str,
        path: impl Into<String>,
        transform: ValueTransform,
    ) -> Self {
        let spa = coordinator.name();
        Self {
            name: format!("{spa} {name}"),
            entity_id: format!("{kind}.{}", build_entity_id(&format!("{spa}_{name}"))),
            unique_id: format!("{}_{}", coordinator.id(), build_entity_id(name)),
            kind,
            path: path.into(),
            transform,
            write: None,
            options: Vec::new(),
            range: None,
            unit: None,
        }
    }

    fn writable(mut self, op: WriteOp) -> Self {
        self.write = Some(op);
        self
    }

    fn with_options(mut self, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    fn with_range(mut self, min: f64, max: f64, step: f64) -> Self {
        self.range = Some(NumberRange { min, max, step });
        self
    }

    fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn is_writable(&self) -> bool {
        self.write.is_some()
    }

    /// Read the presented value from the coordinator's cache.
    ///
    /// Fails with `StateKey` if the path has never been populated.
    pub fn read(&self, coordinator: &Coordinator) -> Result<PropertyValue, CoreError> {
        match self.transform {
            ValueTransform::Scaled { divisor } => Ok(coordinator
                .get_state_numeric(&self.path, divisor)?
                .map_or(PropertyValue::Unavailable, PropertyValue::Number)),
            ValueTransform::Flag => Ok(coordinator
                .get_state_numeric(&self.path, 1.0)?
                .map_or(PropertyValue::Unavailable, |v| {
                    PropertyValue::Bool((v - 1.0).abs() < f64::EPSILON)
                })),
            ValueTransform::PumpSwitch => {
                let state = coordinator.get_state_key(&self.path, "state")?;
                Ok(match state.as_str() {
                    Some(s) if s.eq_ignore_ascii_case("on") || s.eq_ignore_ascii_case("auto") => {
                        PropertyValue::Bool(true)
                    }
                    Some(s) if s.eq_ignore_ascii_case("off") => PropertyValue::Bool(false),
                    Some("") | None => PropertyValue::Unavailable,
                    Some(other) => PropertyValue::Text(other.to_owned()),
                })
            }
            ValueTransform::Label | ValueTransform::Raw => {
                Ok(present(coordinator.get_state(&self.path)?))
            }
        }
    }

    /// Parse `input` and issue the property's command.
    pub async fn write(&self, coordinator: &Coordinator, input: &str) -> Result<(), CoreError> {
        let Some(op) = self.write else {
            return Err(CoreError::ValidationFailed {
                message: format!("{} is read-only", self.name),
            });
        };
        let input = input.trim();
        match op {
            WriteOp::Temperature => {
                let celsius = input.parse::<f64>().map_err(|e| CoreError::ValidationFailed {
                    message: format!("invalid temperature '{input}': {e}"),
                })?;
                coordinator.set_temperature(celsius).await
            }
            WriteOp::Pump { number } => {
                let mode = PumpMode::from_str(input).map_err(|_| CoreError::ValidationFailed {
                    message: format!(
                        "invalid pump mode '{input}', expected one of: {}",
                        self.options.join(", ")
                    ),
                })?;
                if !self.options.iter().any(|o| o.eq_ignore_ascii_case(mode.as_ref())) {
                    return Err(CoreError::ValidationFailed {
                        message: format!("pump {number} does not support '{mode}'"),
                    });
                }
                coordinator.set_pump(number, mode).await
            }
            WriteOp::Mode(setting) => coordinator.set_mode(setting, input).await,
            WriteOp::ElementBoost => coordinator.set_element_boost(parse_switch(input)?).await,
        }
    }
}

fn present(value: Value) -> PropertyValue {
    match value {
        Value::Null => PropertyValue::Unavailable,
        Value::Bool(b) => PropertyValue::Bool(b),
        Value::Number(n) => n
            .as_f64()
            .map_or(PropertyValue::Unavailable, PropertyValue::Number),
        Value::String(s) => PropertyValue::Text(s),
        other => PropertyValue::Text(other.to_string()),
    }
}

fn parse_switch(input: &str) -> Result<bool, CoreError> {
    match input.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        _ => Err(CoreError::ValidationFailed {
            message: format!("expected on or off, got '{input}'"),
        }),
    }
}

/// Keep only ASCII alphanumerics and `_`, lowercased.
pub fn build_entity_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Every property the spa exposes, given what the cache knows so far.
///
/// Pump properties are derived from the cached pump set, so call this
/// after the first refresh.
pub fn spa_properties(coordinator: &Coordinator) -> Vec<PropertyAdapter> {
    let c = coordinator;
    let tenths = ValueTransform::Scaled { divisor: 10.0 };
    let mut props = vec![
        PropertyAdapter::new(
            c,
            PropertyKind::Sensor,
            "Water Temperature",
            keys::WATER_TEMPERATURE,
            tenths,
        )
        .with_unit("°C"),
        PropertyAdapter::new(
            c,
            PropertyKind::Climate,
            "Set Temperature",
            keys::SET_TEMPERATURE,
            tenths,
        )
        .with_unit("°C")
        .writable(WriteOp::Temperature)
        .with_range(MIN_TEMPERATURE, MAX_TEMPERATURE, 0.2),
        PropertyAdapter::new(c, PropertyKind::BinarySensor, "Heater", keys::HEATER, ValueTransform::Flag),
        PropertyAdapter::new(
            c,
            PropertyKind::BinarySensor,
            "Sleeping",
            keys::SLEEPING,
            ValueTransform::Flag,
        ),
        PropertyAdapter::new(
            c,
            PropertyKind::BinarySensor,
            "Sanitise",
            keys::SANITISE,
            ValueTransform::Flag,
        ),
        mode_select(c, "Operation Mode", ModeSetting::OperationMode),
        mode_select(c, "Power Save", ModeSetting::PowerSave),
        PropertyAdapter::new(
            c,
            PropertyKind::Switch,
            "Element Boost",
            keys::ELEMENT_BOOST,
            ValueTransform::Raw,
        )
        .writable(WriteOp::ElementBoost),
    ];
    if c.config().enable_heat_pump {
        props.push(mode_select(c, "Heat Pump", ModeSetting::HeatPump));
    }
    props.extend(pump_properties(c));
    props
}

fn mode_select(c: &Coordinator, name: &str, setting: ModeSetting) -> PropertyAdapter {
    PropertyAdapter::new(c, PropertyKind::Select, name, setting.state_key(), ValueTransform::Label)
        .writable(WriteOp::Mode(setting))
        .with_options(setting.settable_options())
}

/// Switch for single-speed pumps, select for multi-speed ones. Pumps
/// without a switch are not controllable and get no property.
fn pump_properties(c: &Coordinator) -> Vec<PropertyAdapter> {
    let Value::Object(pumps) = c.get_state_or(keys::PUMPS, Value::Null) else {
        return Vec::new();
    };
    let mut numbered: Vec<(u32, Value)> = pumps
        .into_iter()
        .filter_map(|(k, v)| k.parse().ok().map(|n| (n, v)))
        .collect();
    numbered.sort_by_key(|(n, _)| *n);

    numbered
        .into_iter()
        .filter(|(_, p)| p.get("hasSwitch").and_then(Value::as_bool) == Some(true))
        .filter_map(|(number, p)| {
            let speeds = p.get("speeds").and_then(Value::as_u64).unwrap_or(1);
            let name = format!("Pump {number}");
            let path = keys::pump(number);
            let op = WriteOp::Pump { number };
            if speeds == 1 {
                Some(
                    PropertyAdapter::new(c, PropertyKind::Switch, &name, path, ValueTransform::PumpSwitch)
                        .writable(op)
                        .with_options([PumpMode::Off, PumpMode::On].map(|m| m.to_string())),
                )
            } else if speeds > 1 {
                let auto = p.get("auto").and_then(Value::as_bool).unwrap_or(false);
                let modes = PumpMode::iter()
                    .filter(|m| *m != PumpMode::On)
                    .filter(|m| auto || *m != PumpMode::Auto)
                    .map(|m| m.to_string());
                Some(
                    PropertyAdapter::new(
                        c,
                        PropertyKind::Select,
                        &name,
                        format!("{path}.state"),
                        ValueTransform::Label,
                    )
                    .writable(op)
                    .with_options(modes),
                )
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;
    use url::Url;

    use spanet_api::{Credentials, SpaNetClient, SpaSummary, TransportConfig};

    use super::*;
    use crate::config::CoordinatorConfig;

    fn coordinator(enable_heat_pump: bool) -> Coordinator {
        let client = SpaNetClient::new(
            TransportConfig::with_base_url(Url::parse("http://127.0.0.1:9/api").unwrap()),
            Credentials::new("owner@example.com", SecretString::from("pw".to_string())),
        )
        .unwrap();
        let summary = SpaSummary {
            id: 7,
            name: "Backyard Spa".into(),
            mac_address: "AA:BB".into(),
        };
        Coordinator::new(
            client,
            summary,
            CoordinatorConfig {
                enable_heat_pump,
                ..CoordinatorConfig::default()
            },
        )
    }

    fn find<'a>(props: &'a [PropertyAdapter], name: &str) -> &'a PropertyAdapter {
        props.iter().find(|p| p.name.ends_with(name)).unwrap()
    }

    #[test]
    fn entity_ids_keep_alphanumerics_and_underscores() {
        assert_eq!(build_entity_id("Backyard Spa_Water Temperature"), "backyardspa_watertemperature");
        assert_eq!(build_entity_id("spa-1 (main)"), "spa1main");
    }

    #[test]
    fn base_properties_and_heat_pump_option() {
        let without = spa_properties(&coordinator(false));
        assert!(without.iter().all(|p| !p.name.ends_with("Heat Pump")));
        let with = spa_properties(&coordinator(true));
        let heat_pump = find(&with, "Heat Pump");
        assert_eq!(heat_pump.kind, PropertyKind::Select);
        assert_eq!(heat_pump.options, vec!["Auto", "Heat", "Cool", "Off"]);

        let water = find(&with, "Water Temperature");
        assert_eq!(water.entity_id, "sensor.backyardspa_watertemperature");
        assert_eq!(water.unique_id, "7_watertemperature");
        assert!(!water.is_writable());

        let set_temp = find(&with, "Set Temperature");
        assert!(set_temp.is_writable());
        assert_eq!(
            set_temp.range,
            Some(NumberRange {
                min: 5.0,
                max: 41.0,
                step: 0.2
            })
        );
    }

    #[test]
    fn reads_scale_flags_and_labels() {
        let c = coordinator(false);
        c.store().set(keys::WATER_TEMPERATURE, 372);
        c.store().set(keys::HEATER, 1);
        c.store().set(keys::SLEEPING, 0);
        c.store().set(keys::OPERATION_MODE, Value::Null);
        c.store().set(keys::POWER_SAVE, "Low");
        let props = spa_properties(&c);

        assert_eq!(find(&props, "Water Temperature").read(&c).unwrap(), PropertyValue::Number(37.2));
        assert_eq!(find(&props, "Heater").read(&c).unwrap(), PropertyValue::Bool(true));
        assert_eq!(find(&props, "Sleeping").read(&c).unwrap(), PropertyValue::Bool(false));
        assert_eq!(find(&props, "Operation Mode").read(&c).unwrap(), PropertyValue::Unavailable);
        assert_eq!(find(&props, "Power Save").read(&c).unwrap(), PropertyValue::Text("Low".into()));
    }

    #[test]
    fn unpopulated_property_is_a_state_key_error() {
        let c = coordinator(false);
        let props = spa_properties(&c);
        // Scaled reads treat absence as unavailable; label reads surface it.
        let set_temp = find(&props, "Set Temperature").read(&c).unwrap();
        assert_eq!(set_temp, PropertyValue::Unavailable);
        assert!(find(&props, "Power Save").read(&c).unwrap_err().is_state_key());
    }

    #[test]
    fn pumps_become_switches_or_selects() {
        let c = coordinator(false);
        c.store().set(
            keys::PUMPS,
            json!({
                "1": { "apiId": 101, "hasSwitch": true, "speeds": 1, "auto": false, "state": "auto" },
                "2": { "apiId": 102, "hasSwitch": true, "speeds": 2, "auto": true, "state": "low" },
                "3": { "apiId": 103, "hasSwitch": false, "speeds": 1, "auto": true, "state": "auto" }
            }),
        );
        let props = spa_properties(&c);

        let p1 = find(&props, "Pump 1");
        assert_eq!(p1.kind, PropertyKind::Switch);
        assert_eq!(p1.entity_id, "switch.backyardspa_pump1");
        assert_eq!(p1.read(&c).unwrap(), PropertyValue::Bool(true));

        let p2 = find(&props, "Pump 2");
        assert_eq!(p2.kind, PropertyKind::Select);
        assert_eq!(p2.options, vec!["off", "auto", "low", "high"]);
        assert_eq!(p2.read(&c).unwrap(), PropertyValue::Text("low".into()));

        assert!(props.iter().all(|p| !p.name.ends_with("Pump 3")));
    }

    #[tokio::test]
    async fn read_only_and_invalid_writes_are_rejected() {
        let c = coordinator(false);
        let props = spa_properties(&c);
        let err = find(&props, "Heater").write(&c, "on").await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));

        let err = find(&props, "Set Temperature").write(&c, "99").await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));

        let err = find(&props, "Operation Mode").write(&c, "Party").await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));

        let mode = find(&props, "Operation Mode");
        assert_eq!(mode.options, vec!["Normal", "Economy", "Away", "Weekend"]);
        let err = mode.write(&c, "unknown").await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
        assert!(!find(&props, "Power Save").options.iter().any(|o| o == "Unknown"));

        let err = find(&props, "Element Boost").write(&c, "maybe").await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
    }
}
