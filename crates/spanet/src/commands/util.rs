//! Shared helpers for command handlers.

use serde::Serialize;
use tabled::Tabled;
use tracing::debug;

use spanet_core::{
    Coordinator, Integration, PropertyAdapter, PropertyKind, PropertyValue, spa_properties,
};

use crate::cli::{OutputFormat, SpaSelector};
use crate::error::CliError;
use crate::output;

/// Spas addressed by `--spa`: the named one, or every spa.
pub fn select<'a>(
    integration: &'a Integration,
    target: &SpaSelector,
) -> Result<Vec<&'a Coordinator>, CliError> {
    match target.spa {
        Some(ref key) => Ok(vec![integration.find(key)?]),
        None if integration.is_empty() => Err(no_spas()),
        None => Ok(integration.coordinators().collect()),
    }
}

/// The spa addressed by `--spa`, defaulting to the first discovered.
pub fn select_one<'a>(
    integration: &'a Integration,
    target: &SpaSelector,
) -> Result<&'a Coordinator, CliError> {
    match target.spa {
        Some(ref key) => Ok(integration.find(key)?),
        None => integration.coordinators().next().ok_or_else(no_spas),
    }
}

fn no_spas() -> CliError {
    CliError::NotFound {
        resource_type: "spa".into(),
        identifier: "(any)".into(),
        list_command: "spas".into(),
    }
}

// ── Property readings ───────────────────────────────────────────────

/// One property value as presented to the user.
#[derive(Debug, Serialize)]
pub struct Reading {
    pub spa_id: u64,
    pub spa: String,
    pub name: String,
    pub entity_id: String,
    pub unique_id: String,
    pub kind: PropertyKind,
    pub value: PropertyValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    pub writable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// Read one property. Paths not yet populated read as unavailable.
pub fn read(coordinator: &Coordinator, property: &PropertyAdapter) -> Reading {
    let value = if coordinator.store().try_get(&property.path).is_some() {
        property.read(coordinator).unwrap_or_else(|e| {
            debug!(entity = %property.entity_id, error = %e, "property unreadable");
            PropertyValue::Unavailable
        })
    } else {
        PropertyValue::Unavailable
    };
    Reading {
        spa_id: coordinator.id(),
        spa: coordinator.name().to_owned(),
        name: property.name.clone(),
        entity_id: property.entity_id.clone(),
        unique_id: property.unique_id.clone(),
        kind: property.kind,
        value,
        unit: property.unit,
        writable: property.is_writable(),
        options: property.options.clone(),
    }
}

/// Read every property of a spa.
pub fn read_all(coordinator: &Coordinator) -> Vec<Reading> {
    spa_properties(coordinator)
        .iter()
        .map(|p| read(coordinator, p))
        .collect()
}

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Property")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Entity")]
    entity_id: String,
}

/// Render readings in the chosen format. Plain emits `entity_id=value`.
pub fn render_readings(format: OutputFormat, readings: &[Reading], color: bool) -> String {
    output::render_list(
        format,
        readings,
        |r| ReadingRow {
            name: r.name.clone(),
            value: output::paint_value(&r.value, color),
            unit: r.unit.unwrap_or_default().to_owned(),
            entity_id: r.entity_id.clone(),
        },
        |r| format!("{}={}", r.entity_id, r.value),
    )
}
