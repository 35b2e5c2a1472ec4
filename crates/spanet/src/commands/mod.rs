//! Command dispatch: bridges CLI args -> coordinator calls -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod spas;
pub mod status;
pub mod util;
pub mod watch;

use spanet_core::Integration;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Dispatch an account-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Spas => spas::handle(resolved, global).await,
        Command::Status(target) => {
            let integration = connect(resolved).await?;
            status::handle(&integration, &target, global)
        }
        Command::Watch(target) => {
            let integration = connect(resolved).await?;
            watch::handle(&integration, &target, global).await
        }
        Command::Set(args) => {
            let integration = connect(resolved).await?;
            control::handle(&integration, args, global).await
        }
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "config and completions are handled before dispatch".into(),
        )),
    }
}

/// Log in, discover spas, and run the initial refresh for each.
async fn connect(resolved: &Resolved) -> Result<Integration, CliError> {
    let client = resolved.client.build_client()?;
    let integration = Integration::setup(client, resolved.coordinator.clone()).await?;
    Ok(integration)
}
