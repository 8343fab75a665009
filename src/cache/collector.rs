//! Stale cache collector
//!
//! Lists every cache volume and removes those idle for longer than
//! `staleDays`. With `checkAppExists`, a volume is only removed once its
//! application is gone as well.

use crate::audit::{events, AuditLog};
use crate::config::CacheConfig;
use crate::error::{CorralError, CorralResult};
use crate::model::volume::labels;
use crate::model::{Application, CacheVolume, LabelSelector, ObjectRef};
use crate::store::{Api, ResourceStore};
use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Whether something last active at `last_activity` is stale at `now`
pub fn is_stale(now: DateTime<Utc>, last_activity: DateTime<Utc>, stale_days: u32) -> bool {
    now - last_activity > Duration::days(i64::from(stale_days))
}

/// Validated sweep settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupOptions {
    pub stale_days: u32,
    pub check_app_exists: bool,
    pub dry_run: bool,
}

impl CleanupOptions {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            stale_days: config.stale_days,
            check_app_exists: config.check_app_exists,
            dry_run: false,
        }
    }
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            stale_days: 30,
            check_app_exists: true,
            dry_run: false,
        }
    }
}

/// Sweep settings as a caller sent them; any field may be missing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CleanupParams {
    /// Integer number of days, as a JSON number or a decimal string
    pub stale_days: Option<serde_json::Value>,
    pub check_app_exists: Option<bool>,
    pub dry_run: Option<bool>,
}

impl CleanupParams {
    /// Validate and fill missing fields from `defaults`
    pub fn resolve(&self, defaults: &CleanupOptions) -> CorralResult<CleanupOptions> {
        let stale_days = match &self.stale_days {
            None | Some(serde_json::Value::Null) => defaults.stale_days,
            Some(value) => parse_stale_days(value)?,
        };
        Ok(CleanupOptions {
            stale_days,
            check_app_exists: self.check_app_exists.unwrap_or(defaults.check_app_exists),
            dry_run: self.dry_run.unwrap_or(defaults.dry_run),
        })
    }
}

fn parse_stale_days(value: &serde_json::Value) -> CorralResult<u32> {
    let invalid = || CorralError::invalid(format!("invalid staleDays: {}", value));

    let days = match value {
        serde_json::Value::Number(n) => n.as_i64().ok_or_else(invalid)?,
        serde_json::Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    u32::try_from(days).map_err(|_| invalid())
}

/// A volume selected for removal
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleCache {
    pub name: String,
    pub namespace: String,
    pub app: Option<String>,
    pub size: String,
    pub last_activity: DateTime<Utc>,
    pub age_days: i64,
}

impl StaleCache {
    fn new(volume: &CacheVolume, now: DateTime<Utc>) -> Self {
        let last_activity = volume.last_activity();
        Self {
            name: volume.meta.name.clone(),
            namespace: volume.meta.namespace.clone(),
            app: volume.owner().map(|o| o.name),
            size: volume.spec.size.to_string(),
            last_activity,
            age_days: (now - last_activity).num_days(),
        }
    }

    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.namespace, &self.name)
    }
}

/// A volume the sweep could not handle
#[derive(Debug, Clone, Serialize)]
pub struct CleanupError {
    pub volume: String,
    pub reason: String,
}

impl CleanupError {
    fn new(volume: &str, error: &CorralError) -> Self {
        Self {
            volume: volume.to_string(),
            reason: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub dry_run: bool,
    pub stale_caches: Vec<StaleCache>,
    pub deleted: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<CleanupError>,
}

impl CleanupReport {
    pub fn stale_names(&self) -> Vec<&str> {
        self.stale_caches.iter().map(|c| c.name.as_str()).collect()
    }
}

pub struct StaleCacheCollector {
    volumes: Api<CacheVolume>,
    apps: Api<Application>,
    concurrency: usize,
    audit: AuditLog,
}

impl StaleCacheCollector {
    pub fn new(store: Arc<dyn ResourceStore>, concurrency: usize) -> Self {
        Self {
            volumes: Api::new(store.clone()),
            apps: Api::new(store),
            concurrency: concurrency.max(1),
            audit: AuditLog::disabled(),
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    /// Validate caller-supplied settings, then sweep
    pub async fn cleanup_with(
        &self,
        params: &CleanupParams,
        defaults: &CleanupOptions,
    ) -> CorralResult<CleanupReport> {
        let options = params.resolve(defaults)?;
        self.cleanup(options).await
    }

    /// Find stale cache volumes and, unless `dry_run`, delete them.
    ///
    /// A failing listing fails the sweep. Lookup and deletion failures for a
    /// single volume are collected in the report.
    pub async fn cleanup(&self, options: CleanupOptions) -> CorralResult<CleanupReport> {
        let now = Utc::now();
        let selector = LabelSelector::label(labels::CACHE, "true");
        let volumes = self.volumes.list(None, &selector).await?;
        debug!("Found {} cache volumes", volumes.len());

        let mut stale_caches = Vec::new();
        let mut errors = Vec::new();
        for volume in &volumes {
            if !is_stale(now, volume.last_activity(), options.stale_days) {
                continue;
            }

            if options.check_app_exists {
                if let Some(owner) = volume.owner() {
                    match self.apps.exists(&owner).await {
                        Ok(true) => continue,
                        Ok(false) => {}
                        Err(e) => {
                            warn!("Skipping {}: checking {} failed: {}", volume.meta.name, owner, e);
                            errors.push(CleanupError::new(&volume.meta.name, &e));
                            continue;
                        }
                    }
                }
            }

            stale_caches.push(StaleCache::new(volume, now));
        }

        let mut deleted = Vec::new();
        if !options.dry_run {
            let keys: Vec<ObjectRef> = stale_caches.iter().map(StaleCache::object_ref).collect();
            let volumes = self.volumes.clone();
            let deletions = keys.into_iter().map(move |key| {
                let volumes = volumes.clone();
                async move { volumes.delete(&key).await }
            });
            let results: Vec<CorralResult<()>> = stream::iter(deletions)
                .buffered(self.concurrency)
                .collect()
                .await;

            for (cache, result) in stale_caches.iter().zip(results) {
                match result {
                    Ok(()) => {
                        self.audit
                            .log(
                                events::CACHE_DELETED,
                                &serde_json::json!({
                                    "volume": cache.object_ref().to_string(),
                                    "ageDays": cache.age_days,
                                }),
                            )
                            .await;
                        deleted.push(cache.name.clone());
                    }
                    Err(CorralError::NotFound { .. }) => {
                        debug!("Cache volume {} already removed", cache.name);
                    }
                    Err(e) => {
                        let failure = CorralError::DeletionFailed {
                            volume: cache.name.clone(),
                            reason: e.to_string(),
                        };
                        warn!("{}", failure);
                        errors.push(CleanupError::new(&cache.name, &failure));
                    }
                }
            }
        }

        info!(
            "Cache cleanup: {} stale, {} deleted, {} errors{}",
            stale_caches.len(),
            deleted.len(),
            errors.len(),
            if options.dry_run { " (dry run)" } else { "" }
        );

        Ok(CleanupReport {
            dry_run: options.dry_run,
            stale_caches,
            deleted,
            errors,
        })
    }

    /// Sweep every `interval` until the task is aborted
    pub fn spawn_periodic(
        self: Arc<Self>,
        options: CleanupOptions,
        interval: std::time::Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.cleanup(options).await {
                    warn!("Periodic cache cleanup failed: {}", e);
                }
            }
        })
    }
}
