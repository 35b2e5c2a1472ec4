//! `spanet status`: one refresh cycle, then every property.

use spanet_core::Integration;

use crate::cli::{GlobalOpts, SpaSelector};
use crate::error::CliError;
use crate::output;

use super::util;

pub fn handle(
    integration: &Integration,
    target: &SpaSelector,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut readings = Vec::new();
    let mut failures = Vec::new();

    for coordinator in util::select(integration, target)? {
        let status = coordinator.status();
        if status.last_success.is_none() {
            let reason = status
                .last_error
                .unwrap_or_else(|| "no refresh has completed".into());
            if !global.quiet {
                eprintln!("warning: {} could not be refreshed: {reason}", coordinator.name());
            }
            failures.push(reason);
            continue;
        }
        readings.extend(util::read_all(coordinator));
    }

    if readings.is_empty() {
        if let Some(reason) = failures.into_iter().next() {
            return Err(CliError::RefreshFailed { reason });
        }
    }

    let color = output::should_color(global.color);
    let out = util::render_readings(global.format(), &readings, color);
    output::print_output(&out, global.quiet);
    Ok(())
}
