//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, StoreBackend};
use crate::error::{CorralError, CorralResult};
use crate::model::Quantity;
use crate::ui::{self, UiContext};
use std::path::PathBuf;

const VALID_KEYS: [&str; 18] = [
    "general.log_format",
    "general.audit_log",
    "general.namespace",
    "store.backend",
    "store.state_dir",
    "store.timeout_ms",
    "store.max_attempts",
    "store.initial_backoff_ms",
    "store.max_backoff_ms",
    "store.conflict_retries",
    "server.listen",
    "cache.stale_days",
    "cache.check_app_exists",
    "cache.sweep_interval_hours",
    "cache.default_size",
    "cache.storage_class",
    "cache.recreate_on_mismatch",
    "cache.sweep_concurrency",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> CorralResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => println!("{}", toml::to_string_pretty(config)?),
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            let mut updated = config.clone();
            if let Err(e) = set_value(&mut updated, &key, &value) {
                if matches!(e, CorralError::User(_)) {
                    print_valid_keys();
                }
                return Err(e);
            }
            manager.save(&updated).await?;
            ui::step_ok(&UiContext::detect(), &format!("Set {} = {}", key, value));
        }
    }

    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> CorralResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

/// Apply `key = value` to `config`, validating the value for the key
fn set_value(config: &mut Config, key: &str, value: &str) -> CorralResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => {
            if value != "text" && value != "json" {
                return Err(CorralError::invalid(format!(
                    "log_format must be text or json, got {}",
                    value
                )));
            }
            config.general.log_format = value.to_string()
        }
        ["general", "audit_log"] => config.general.audit_log = parse_bool(value)?,
        ["general", "namespace"] => config.general.namespace = value.to_string(),

        ["store", "backend"] => config.store.backend = parse_backend(value)?,
        ["store", "state_dir"] => config.store.state_dir = optional(value).map(PathBuf::from),
        ["store", "timeout_ms"] => config.store.timeout_ms = parse_number(value)?,
        ["store", "max_attempts"] => config.store.max_attempts = parse_number(value)?,
        ["store", "initial_backoff_ms"] => config.store.initial_backoff_ms = parse_number(value)?,
        ["store", "max_backoff_ms"] => config.store.max_backoff_ms = parse_number(value)?,
        ["store", "conflict_retries"] => config.store.conflict_retries = parse_number(value)?,

        ["server", "listen"] => config.server.listen = value.to_string(),

        ["cache", "stale_days"] => config.cache.stale_days = parse_number(value)?,
        ["cache", "check_app_exists"] => config.cache.check_app_exists = parse_bool(value)?,
        ["cache", "sweep_interval_hours"] => {
            config.cache.sweep_interval_hours = parse_number(value)?
        }
        ["cache", "default_size"] => {
            value.parse::<Quantity>()?;
            config.cache.default_size = value.to_string()
        }
        ["cache", "storage_class"] => config.cache.storage_class = optional(value).map(String::from),
        ["cache", "recreate_on_mismatch"] => config.cache.recreate_on_mismatch = parse_bool(value)?,
        ["cache", "sweep_concurrency"] => {
            let n: usize = parse_number(value)?;
            if n == 0 {
                return Err(CorralError::invalid("sweep_concurrency must be at least 1"));
            }
            config.cache.sweep_concurrency = n
        }

        _ => return Err(CorralError::User(format!("Unknown config key: {}", key))),
    }

    Ok(())
}

/// Empty string clears an optional setting
fn optional(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn parse_bool(value: &str) -> CorralResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(CorralError::invalid(format!(
            "invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> CorralResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CorralError::invalid(format!("invalid number: {}", value)))
}

fn parse_backend(value: &str) -> CorralResult<StoreBackend> {
    match value {
        "file" => Ok(StoreBackend::File),
        "memory" => Ok(StoreBackend::Memory),
        _ => Err(CorralError::invalid(format!(
            "store backend must be file or memory, got {}",
            value
        ))),
    }
}

fn print_valid_keys() {
    eprintln!("Valid keys:");
    for key in VALID_KEYS {
        eprintln!("  {}", key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_value_updates_nested_keys() {
        let mut config = Config::default();
        set_value(&mut config, "cache.stale_days", "7").unwrap();
        set_value(&mut config, "store.backend", "memory").unwrap();
        set_value(&mut config, "cache.storage_class", "fast").unwrap();

        assert_eq!(config.cache.stale_days, 7);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.cache.storage_class.as_deref(), Some("fast"));

        set_value(&mut config, "cache.storage_class", "").unwrap();
        assert!(config.cache.storage_class.is_none());
    }

    #[test]
    fn set_value_rejects_bad_values() {
        let mut config = Config::default();
        assert!(set_value(&mut config, "cache.stale_days", "-1").is_err());
        assert!(set_value(&mut config, "cache.default_size", "big").is_err());
        assert!(set_value(&mut config, "general.log_format", "xml").is_err());
        assert!(set_value(&mut config, "cache.sweep_concurrency", "0").is_err());
    }

    #[test]
    fn set_value_unknown_key() {
        let mut config = Config::default();
        let err = set_value(&mut config, "vm.name", "x").unwrap_err();
        assert!(matches!(err, CorralError::User(_)));
    }

    #[test]
    fn parse_bool_values() {
        assert!(parse_bool("yes").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }
}
