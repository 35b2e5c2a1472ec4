//! `spanet set ...`: issue a command, refresh, and print the result.
//!
//! Commands go through the property catalog so range and option checks
//! match what `status` advertises.

use spanet_core::adapter::WriteOp;
use spanet_core::{Coordinator, Integration, ModeSetting, PropertyAdapter, spa_properties};
use tracing::warn;

use crate::cli::{GlobalOpts, SetArgs, SetCommand};
use crate::error::CliError;
use crate::output;

use super::util;

/// Write operation and raw input for a `set` subcommand.
fn request(command: &SetCommand) -> (WriteOp, String) {
    match command {
        SetCommand::Temperature { celsius } => (WriteOp::Temperature, celsius.to_string()),
        SetCommand::Pump { number, mode } => (WriteOp::Pump { number: *number }, mode.clone()),
        SetCommand::Mode { label } => (WriteOp::Mode(ModeSetting::OperationMode), label.clone()),
        SetCommand::PowerSave { label } => (WriteOp::Mode(ModeSetting::PowerSave), label.clone()),
        SetCommand::HeatPump { label } => (WriteOp::Mode(ModeSetting::HeatPump), label.clone()),
        SetCommand::Boost { state } => (WriteOp::ElementBoost, state.as_str().to_owned()),
    }
}

fn find_property(coordinator: &Coordinator, op: WriteOp) -> Result<PropertyAdapter, CliError> {
    if let Some(property) = spa_properties(coordinator)
        .into_iter()
        .find(|p| p.write == Some(op))
    {
        return Ok(property);
    }
    Err(match op {
        WriteOp::Pump { number } => CliError::NotFound {
            resource_type: "pump".into(),
            identifier: number.to_string(),
            list_command: "status".into(),
        },
        WriteOp::Mode(ModeSetting::HeatPump) => CliError::Validation {
            field: "heat-pump".into(),
            reason: "heat pump control is disabled; set enable_heat_pump = true in the profile"
                .into(),
        },
        other => CliError::Internal(format!("no property accepts {other:?}")),
    })
}

pub async fn handle(
    integration: &Integration,
    args: SetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let coordinator = util::select_one(integration, &args.target)?;
    let (op, input) = request(&args.command);
    let property = find_property(coordinator, op)?;

    property.write(coordinator, &input).await?;

    // The command already scheduled every task; run them now.
    if let Err(e) = coordinator.refresh().await {
        warn!(spa = coordinator.id(), error = %e, "refresh after command failed");
        if !global.quiet {
            eprintln!("warning: command accepted but refresh failed: {e}");
        }
    }

    let reading = util::read(coordinator, &property);
    let out = output::render_single(
        global.format(),
        &reading,
        |r| format!("{}: {}", r.name, r.value),
        |r| r.value.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Switch;

    #[test]
    fn set_commands_map_to_write_ops() {
        assert_eq!(
            request(&SetCommand::Temperature { celsius: 38.5 }),
            (WriteOp::Temperature, "38.5".to_owned())
        );
        assert_eq!(
            request(&SetCommand::Pump {
                number: 2,
                mode: "high".into()
            }),
            (WriteOp::Pump { number: 2 }, "high".to_owned())
        );
        assert_eq!(
            request(&SetCommand::PowerSave {
                label: "Low".into()
            }),
            (WriteOp::Mode(ModeSetting::PowerSave), "Low".to_owned())
        );
        assert_eq!(
            request(&SetCommand::Boost { state: Switch::Off }),
            (WriteOp::ElementBoost, "off".to_owned())
        );
    }
}
