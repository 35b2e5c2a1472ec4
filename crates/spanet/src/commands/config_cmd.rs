//! Config subcommand handlers.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use dialoguer::{Confirm, Input, Select};
use secrecy::{ExposeSecret, SecretString};

use spanet_config::{Config, Defaults, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

const MASK: &str = "****";

/// Copy of the config with stored secrets masked.
fn redacted(cfg: &Config) -> Config {
    let profiles: BTreeMap<String, Profile> = cfg
        .profiles
        .iter()
        .map(|(name, p)| {
            let mut p = p.clone();
            if p.password.is_some() {
                p.password = Some(MASK.into());
            }
            (name.clone(), p)
        })
        .collect();
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: Defaults {
            output: cfg.defaults.output.clone(),
            color: cfg.defaults.color.clone(),
            timeout: cfg.defaults.timeout,
        },
        profiles,
    }
}

fn format_config_text(cfg: &Config) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", config::config_path().display());
    match toml::to_string_pretty(cfg) {
        Ok(body) => out.push_str(&body),
        Err(e) => {
            let _ = writeln!(out, "# could not render config: {e}");
        }
    }
    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_password() -> Result<SecretString, CliError> {
    let pass = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if pass.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(SecretString::from(pass))
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts, mut cfg: Config) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => {
            eprintln!("SpaNET CLI configuration");
            eprintln!("   Config path: {}\n", config::config_path().display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default(config::active_profile_name(global, &cfg))
                .interact_text()
                .map_err(prompt_err)?;

            let email: String = Input::new()
                .with_prompt("Account email")
                .interact_text()
                .map_err(prompt_err)?;
            if email.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "email".into(),
                    reason: "email cannot be empty".into(),
                });
            }

            let password = prompt_password()?;
            let choices = &[
                "Store in system keyring (recommended)",
                "Save to config file (plaintext)",
            ];
            let selection = Select::new()
                .with_prompt("Where to store the password?")
                .items(choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;
            let plaintext = if selection == 0 {
                config::store_password(&profile_name, &password)?;
                eprintln!("   ✓ Password stored in system keyring");
                None
            } else {
                Some(password.expose_secret().to_owned())
            };

            let enable_heat_pump = Confirm::new()
                .with_prompt("Does this spa have a heat pump?")
                .default(false)
                .interact()
                .map_err(prompt_err)?;

            let previous = cfg.profiles.remove(&profile_name).unwrap_or_default();
            let profile = Profile {
                email: email.trim().to_owned(),
                password: plaintext,
                enable_heat_pump,
                ..previous
            };
            cfg.profiles.insert(profile_name.clone(), profile);
            if cfg.profiles.len() == 1 {
                cfg.default_profile = Some(profile_name.clone());
            }

            let path = config::save_config(&cfg)?;
            eprintln!("\n✓ Profile '{profile_name}' saved to {}", path.display());
            eprintln!("  Try: spanet spas");
            Ok(())
        }

        ConfigCommand::Show => {
            let safe = redacted(&cfg);
            let out = output::render_single(global.format(), &safe, format_config_text, |c| {
                c.active_profile_name().to_owned()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let profile_name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", "),
                });
            }
            let password = prompt_password()?;
            config::store_password(&profile_name, &password)?;
            if !global.quiet {
                eprintln!("✓ Password for '{profile_name}' stored in system keyring");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_plaintext_passwords() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                email: "owner@example.com".into(),
                password: Some("hunter2".into()),
                password_env: Some("HOME_SPA_PASSWORD".into()),
                ..Profile::default()
            },
        );
        let text = format_config_text(&redacted(&cfg));
        assert!(!text.contains("hunter2"));
        assert!(text.contains(MASK));
        assert!(text.contains("HOME_SPA_PASSWORD"));
        assert!(text.contains("owner@example.com"));
    }
}
