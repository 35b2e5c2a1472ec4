//! CLI-side profile resolution: layers global flags over the shared
//! `spanet-config` profiles and produces core runtime config.

use clap::ValueEnum;
use secrecy::SecretString;

use spanet_config::{Config, Profile};
use spanet_core::{ClientConfig, CoordinatorConfig};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

pub use spanet_config::{config_path, load_config_or_default, save_config, store_password};

/// Runtime configuration for one invocation.
#[derive(Debug)]
pub struct Resolved {
    pub profile_name: String,
    pub client: ClientConfig,
    pub coordinator: CoordinatorConfig,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.active_profile_name().to_owned())
}

/// Fill `--output` from `defaults.output` when it was not given.
pub fn apply_output_default(global: &mut GlobalOpts, config: &Config) {
    if global.output.is_none() {
        global.output = OutputFormat::from_str(&config.defaults.output, true).ok();
    }
}

/// Build client and coordinator config from the profile plus flag overrides.
///
/// With no matching profile, `--email` and `SPANET_PASSWORD` alone are enough.
pub fn resolve(global: &GlobalOpts, config: &Config) -> Result<Resolved, CliError> {
    let profile_name = active_profile_name(global, config);

    let mut profile = match config.profiles.get(&profile_name) {
        Some(p) => p.clone(),
        None if global.email.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(config),
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(ref email) = global.email {
        profile.email.clone_from(email);
    }
    if let Some(ref url) = global.api_url {
        profile.api_url = Some(url.clone());
    }
    profile.timeout = Some(
        global
            .timeout
            .or(profile.timeout)
            .unwrap_or(config.defaults.timeout),
    );

    let client = match global.password {
        Some(ref pw) => {
            spanet_config::client_config_with_password(&profile, SecretString::from(pw.clone()))?
        }
        None => spanet_config::profile_to_client_config(&profile, &profile_name)?,
    };
    let coordinator = spanet_config::profile_to_coordinator_config(&profile);

    tracing::debug!(
        profile = %profile_name,
        api = %client.base_url,
        timeout = ?client.timeout,
        "resolved connection settings"
    );

    Ok(Resolved {
        profile_name,
        client,
        coordinator,
    })
}

fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        return "(none)".into();
    }
    config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["spanet"];
        argv.extend_from_slice(args);
        argv.push("spas");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with_home() -> Config {
        let mut config = Config::default();
        config.profiles.insert(
            "default".into(),
            Profile {
                email: "owner@example.com".into(),
                password: Some("from-file".into()),
                timeout: Some(20),
                enable_heat_pump: true,
                ..Profile::default()
            },
        );
        config
    }

    #[test]
    fn flags_override_profile() {
        let opts = global(&[
            "--email",
            "other@example.com",
            "--api-url",
            "http://localhost:9000/api",
            "--timeout",
            "3",
        ]);
        let resolved = resolve(&opts, &config_with_home()).unwrap();
        assert_eq!(resolved.client.email, "other@example.com");
        assert_eq!(resolved.client.base_url.as_str(), "http://localhost:9000/api");
        assert_eq!(resolved.client.timeout, Duration::from_secs(3));
        assert!(resolved.coordinator.enable_heat_pump);
    }

    #[test]
    fn password_flag_wins() {
        let opts = global(&["--password", "from-flag"]);
        let resolved = resolve(&opts, &config_with_home()).unwrap();
        assert_eq!(resolved.client.password.expose_secret(), "from-flag");
    }

    #[test]
    fn flags_alone_are_enough_without_profile() {
        let opts = global(&["--email", "owner@example.com", "--password", "pw"]);
        let resolved = resolve(&opts, &Config::default()).unwrap();
        assert_eq!(resolved.profile_name, "default");
        assert_eq!(resolved.client.timeout, Duration::from_secs(30));
        assert!(!resolved.coordinator.enable_heat_pump);
    }

    #[test]
    fn missing_profile_without_flags_is_no_config() {
        let opts = global(&[]);
        assert!(matches!(
            resolve(&opts, &Config::default()),
            Err(CliError::NoConfig { .. })
        ));
    }

    #[test]
    fn unknown_named_profile_lists_available() {
        let opts = global(&["--profile", "beach"]);
        let err = resolve(&opts, &config_with_home()).unwrap_err();
        assert!(matches!(
            err,
            CliError::ProfileNotFound { ref available, .. } if available == "default"
        ));
    }

    #[test]
    fn output_default_comes_from_config() {
        let mut opts = global(&[]);
        let mut config = Config::default();
        config.defaults.output = "yaml".into();
        apply_output_default(&mut opts, &config);
        assert_eq!(opts.format(), OutputFormat::Yaml);

        let mut explicit = global(&["-o", "json"]);
        apply_output_default(&mut explicit, &config);
        assert_eq!(explicit.format(), OutputFormat::Json);
    }
}
