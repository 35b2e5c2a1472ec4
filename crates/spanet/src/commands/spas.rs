//! `spanet spas`: list the spas registered on the account.

use tabled::Tabled;

use spanet_core::{CoreError, SpaSummary};

use crate::cli::GlobalOpts;
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct SpaRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "MAC")]
    mac: String,
}

impl From<&SpaSummary> for SpaRow {
    fn from(s: &SpaSummary) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            mac: s.mac_address.clone(),
        }
    }
}

pub async fn handle(resolved: &Resolved, global: &GlobalOpts) -> Result<(), CliError> {
    let client = resolved.client.build_client()?;
    let spas = client.authenticate().await.map_err(CoreError::from)?;

    let out = output::render_list(global.format(), &spas, |s| SpaRow::from(s), |s| s.id.to_string());
    output::print_output(&out, global.quiet);
    Ok(())
}
