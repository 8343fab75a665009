//! Serve command - run the REST API and the periodic cache sweep

use crate::api::{self, ApiState};
use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::control::ControlPlane;
use crate::error::CorralResult;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Execute the serve command
pub async fn execute(args: ServeArgs, plane: ControlPlane, config: &Config) -> CorralResult<()> {
    let plane = Arc::new(plane);
    let listen = args.listen.unwrap_or_else(|| config.server.listen.clone());

    let sweep = match sweep_interval(config, args.no_sweep) {
        Some(interval) => {
            info!(
                "Sweeping stale caches every {}h (older than {} days)",
                config.cache.sweep_interval_hours, plane.cleanup_defaults.stale_days
            );
            Some(
                plane
                    .collector
                    .clone()
                    .spawn_periodic(plane.cleanup_defaults, interval),
            )
        }
        None => None,
    };

    eprintln!(
        "Serving on http://{} ({} store)",
        listen,
        plane.store.backend_name()
    );
    let result = api::serve(&listen, ApiState::new(plane), shutdown_signal()).await;

    if let Some(handle) = sweep {
        handle.abort();
    }
    result
}

fn sweep_interval(config: &Config, disabled: bool) -> Option<Duration> {
    let hours = config.cache.sweep_interval_hours;
    if disabled || hours == 0 {
        return None;
    }
    Some(Duration::from_secs(u64::from(hours) * 3600))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_disabled_by_default() {
        assert_eq!(sweep_interval(&Config::default(), false), None);
    }

    #[test]
    fn sweep_interval_in_hours() {
        let mut config = Config::default();
        config.cache.sweep_interval_hours = 6;
        assert_eq!(
            sweep_interval(&config, false),
            Some(Duration::from_secs(6 * 3600))
        );
        assert_eq!(sweep_interval(&config, true), None);
    }
}
