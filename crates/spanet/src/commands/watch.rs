//! `spanet watch`: run the update loop and re-print on change until Ctrl-C.

use chrono::Local;

use spanet_core::{Coordinator, Integration};

use crate::cli::{GlobalOpts, OutputFormat, SpaSelector};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    integration: &Integration,
    target: &SpaSelector,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let coordinator = util::select_one(integration, target)?;
    let store = coordinator.store();
    let mut status_rx = coordinator.subscribe_status();

    print_state(coordinator, global);
    let mut printed_version = store.version();

    coordinator.start().await;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                if let Some(err) = status.last_error {
                    if !global.quiet {
                        eprintln!("warning: refresh failed: {err}");
                    }
                    continue;
                }
                let version = store.version();
                if version != printed_version {
                    printed_version = version;
                    print_state(coordinator, global);
                }
            }
        }
    }

    coordinator.stop().await;
    Ok(())
}

fn print_state(coordinator: &Coordinator, global: &GlobalOpts) {
    let format = global.format();
    let readings = util::read_all(coordinator);
    let color = output::should_color(global.color);
    if format == OutputFormat::Table && !global.quiet {
        println!("{} at {}", coordinator.name(), Local::now().format("%H:%M:%S"));
    }
    let out = util::render_readings(format, &readings, color);
    output::print_output(&out, global.quiet);
}
