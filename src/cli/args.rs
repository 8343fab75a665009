//! CLI argument definitions using clap derive

use crate::config::StoreBackend;
use crate::model::AccessMode;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Corral - application platform control plane
///
/// Binds service instances to applications, stages build cache volumes and
/// sweeps caches nobody uses anymore.
#[derive(Parser, Debug)]
#[command(name = "corral")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CORRAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Namespace to operate in (default: general.namespace)
    #[arg(short, long, global = true, env = "CORRAL_NAMESPACE")]
    pub namespace: Option<String>,

    /// Resource store backend (default: store.backend)
    #[arg(long, global = true, value_enum)]
    pub store: Option<StoreBackend>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the REST API server
    Serve(ServeArgs),

    /// Manage applications
    App(AppArgs),

    /// Manage service instances and their bindings
    Service(ServiceArgs),

    /// Manage build cache volumes
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to listen on (default: server.listen)
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Disable the periodic stale cache sweep
    #[arg(long)]
    pub no_sweep: bool,
}

/// Arguments for the app command
#[derive(Parser, Debug)]
pub struct AppArgs {
    #[command(subcommand)]
    pub action: AppAction,
}

/// Access mode as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AccessModeArg {
    /// ReadWriteOnce
    Rwo,
    /// ReadOnlyMany
    Rox,
    /// ReadWriteMany
    Rwx,
    /// ReadWriteOncePod
    Rwop,
}

impl From<AccessModeArg> for AccessMode {
    fn from(arg: AccessModeArg) -> Self {
        match arg {
            AccessModeArg::Rwo => AccessMode::ReadWriteOnce,
            AccessModeArg::Rox => AccessMode::ReadOnlyMany,
            AccessModeArg::Rwx => AccessMode::ReadWriteMany,
            AccessModeArg::Rwop => AccessMode::ReadWriteOncePod,
        }
    }
}

/// App subcommands
#[derive(Subcommand, Debug)]
pub enum AppAction {
    /// Create an application
    Create {
        /// Application name
        name: String,

        /// Build cache size, e.g. 2Gi (default: cache.default_size)
        #[arg(long)]
        cache_size: Option<String>,

        /// Build cache access modes (comma-separated)
        #[arg(long, value_enum, value_delimiter = ',')]
        cache_access_mode: Vec<AccessModeArg>,

        /// Provision the build cache as a raw block device
        #[arg(long)]
        cache_block: bool,

        /// Build cache storage class (default: cache.storage_class)
        #[arg(long)]
        cache_storage_class: Option<String>,
    },

    /// Show an application, its bindings and cache volume
    Show {
        name: String,

        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List applications
    List {
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete an application (its cache is left to `cache cleanup`)
    Delete { name: String },

    /// Stage an application: provision or reconcile its build cache
    Stage {
        name: String,

        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

/// Arguments for the service command
#[derive(Parser, Debug)]
pub struct ServiceArgs {
    #[command(subcommand)]
    pub action: ServiceAction,
}

/// Service subcommands
#[derive(Subcommand, Debug)]
pub enum ServiceAction {
    /// Create a service instance from a catalog entry
    Create {
        /// Service instance name
        name: String,

        /// Catalog service to instantiate
        #[arg(long, default_value = "custom")]
        catalog: String,

        /// Values exposed to bound applications (KEY=VALUE)
        #[arg(long = "value", value_parser = parse_key_value)]
        values: Vec<(String, String)>,
    },

    /// Show a service instance and the applications bound to it
    Show {
        name: String,

        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List service instances
    List {
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Bind services to an application: APP SERVICE...
    ///
    /// The older SERVICE APP order is accepted for a single service.
    Bind {
        /// Application followed by one or more services
        #[arg(required = true, num_args = 2..)]
        names: Vec<String>,

        /// Do not redeploy the application
        #[arg(long)]
        no_restart: bool,
    },

    /// Unbind a service from an application
    Unbind {
        /// Service name
        service: String,

        /// Application name
        app: String,

        /// Do not redeploy the application
        #[arg(long)]
        no_restart: bool,
    },

    /// Change service values and redeploy bound applications
    Update {
        name: String,

        /// Values to set (KEY=VALUE)
        #[arg(short, long, value_parser = parse_key_value)]
        set: Vec<(String, String)>,

        /// Keys to remove
        #[arg(short, long)]
        unset: Vec<String>,

        /// Do not redeploy bound applications
        #[arg(long)]
        no_restart: bool,
    },

    /// Delete a service instance
    Delete {
        name: String,

        /// Unbind from all applications first
        #[arg(long)]
        unbind: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., cache.stale_days)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cache volumes in every namespace
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete stale and orphaned cache volumes
    Cleanup {
        /// Caches idle longer than N days are stale (default: cache.stale_days)
        #[arg(long)]
        stale_days: Option<String>,

        /// Also delete caches whose application still exists
        #[arg(long)]
        include_live_apps: bool,

        /// Show what would be removed
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

/// Parse a value in KEY=VALUE format
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE format: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_value_valid() {
        let (k, v) = parse_key_value("FOO=bar").unwrap();
        assert_eq!(k, "FOO");
        assert_eq!(v, "bar");
    }

    #[test]
    fn parse_key_value_with_equals() {
        let (k, v) = parse_key_value("url=postgres://h/db?x=1").unwrap();
        assert_eq!(k, "url");
        assert_eq!(v, "postgres://h/db?x=1");
    }

    #[test]
    fn parse_key_value_invalid() {
        assert!(parse_key_value("FOO").is_err());
    }

    #[test]
    fn cli_parses_batch_bind() {
        let cli = Cli::parse_from(["corral", "service", "bind", "web", "db", "cache"]);
        match cli.command {
            Commands::Service(ServiceArgs {
                action: ServiceAction::Bind { names, no_restart },
            }) => {
                assert_eq!(names, vec!["web", "db", "cache"]);
                assert!(!no_restart);
            }
            _ => panic!("expected Service Bind command"),
        }
    }

    #[test]
    fn cli_bind_needs_two_names() {
        assert!(Cli::try_parse_from(["corral", "service", "bind", "web"]).is_err());
    }

    #[test]
    fn cli_parses_service_update() {
        let cli = Cli::parse_from([
            "corral", "service", "update", "db", "--set", "user=admin", "--unset", "port",
            "--no-restart",
        ]);
        match cli.command {
            Commands::Service(ServiceArgs {
                action:
                    ServiceAction::Update {
                        name,
                        set,
                        unset,
                        no_restart,
                    },
            }) => {
                assert_eq!(name, "db");
                assert_eq!(set, vec![("user".to_string(), "admin".to_string())]);
                assert_eq!(unset, vec!["port"]);
                assert!(no_restart);
            }
            _ => panic!("expected Service Update command"),
        }
    }

    #[test]
    fn cli_parses_app_create_cache_flags() {
        let cli = Cli::parse_from([
            "corral",
            "app",
            "create",
            "web",
            "--cache-size",
            "2Gi",
            "--cache-access-mode",
            "rwo,rwx",
        ]);
        match cli.command {
            Commands::App(AppArgs {
                action:
                    AppAction::Create {
                        name,
                        cache_size,
                        cache_access_mode,
                        cache_block,
                        ..
                    },
            }) => {
                assert_eq!(name, "web");
                assert_eq!(cache_size.as_deref(), Some("2Gi"));
                assert_eq!(
                    cache_access_mode,
                    vec![AccessModeArg::Rwo, AccessModeArg::Rwx]
                );
                assert!(!cache_block);
            }
            _ => panic!("expected App Create command"),
        }
    }

    #[test]
    fn cli_parses_cache_cleanup() {
        let cli = Cli::parse_from(["corral", "cache", "cleanup", "--stale-days", "7", "--dry-run"]);
        match cli.command {
            Commands::Cache(CacheArgs {
                action:
                    CacheAction::Cleanup {
                        stale_days,
                        include_live_apps,
                        dry_run,
                        ..
                    },
            }) => {
                assert_eq!(stale_days.as_deref(), Some("7"));
                assert!(!include_live_apps);
                assert!(dry_run);
            }
            _ => panic!("expected Cache Cleanup command"),
        }
    }

    #[test]
    fn cli_global_namespace_and_store() {
        let cli = Cli::parse_from(["corral", "app", "list", "-n", "team", "--store", "memory"]);
        assert_eq!(cli.namespace.as_deref(), Some("team"));
        assert_eq!(cli.store, Some(StoreBackend::Memory));
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["corral", "app", "list"]);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::parse_from(["corral", "-v", "app", "list"]);
        assert_eq!(cli.verbose, 1);

        let cli = Cli::parse_from(["corral", "-vv", "app", "list"]);
        assert_eq!(cli.verbose, 2);
    }
}
