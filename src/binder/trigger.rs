//! Deployment trigger
//!
//! Issues at most one redeploy instruction per logical operation. Callers
//! invoke [`DeploymentTrigger::trigger`] once after their commit, never per
//! configuration change.

use crate::error::CorralResult;
use crate::model::{Application, ObjectRef};
use crate::store::{Api, ResourceStore};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Platform component that rolls an application's workload
#[async_trait]
pub trait ReleaseManager: Send + Sync {
    /// Ask the platform to redeploy `app`; returns without waiting for readiness
    async fn redeploy(&self, app: &ObjectRef) -> CorralResult<()>;
}

/// Release manager that records a restart request on the application.
///
/// Bumps `status.restart_generation`, which the workload controller
/// watches the way it would a restart annotation on the pod template.
/// Each call stamps its own request id, so a write that is re-read after
/// an ambiguous store failure is not applied twice.
pub struct WorkloadRestarter {
    apps: Api<Application>,
    conflict_retries: u32,
}

impl WorkloadRestarter {
    pub fn new(store: Arc<dyn ResourceStore>, conflict_retries: u32) -> Self {
        Self {
            apps: Api::new(store),
            conflict_retries,
        }
    }
}

#[async_trait]
impl ReleaseManager for WorkloadRestarter {
    async fn redeploy(&self, app: &ObjectRef) -> CorralResult<()> {
        let request = Uuid::new_v4().to_string();
        let updated = self
            .apps
            .modify(app, self.conflict_retries, |a| {
                if a.status.restart_request.as_deref() == Some(request.as_str()) {
                    return Ok(false);
                }
                a.status.restart_generation += 1;
                a.status.restart_request = Some(request.clone());
                a.status.restarted_at = Some(Utc::now());
                Ok(true)
            })
            .await?;
        debug!(
            "Restart of {} requested (generation {})",
            app, updated.status.restart_generation
        );
        Ok(())
    }
}

/// What a trigger call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOutcome {
    Redeployed,
    /// Caller asked for no restart; the change waits for the next deploy
    Suppressed,
}

/// Single entry point for redeploy signals
#[derive(Clone)]
pub struct DeploymentTrigger {
    release_manager: Arc<dyn ReleaseManager>,
}

impl DeploymentTrigger {
    pub fn new(release_manager: Arc<dyn ReleaseManager>) -> Self {
        Self { release_manager }
    }

    /// Trigger backed by the default [`WorkloadRestarter`]
    pub fn restarting(store: Arc<dyn ResourceStore>, conflict_retries: u32) -> Self {
        Self::new(Arc::new(WorkloadRestarter::new(store, conflict_retries)))
    }

    pub async fn trigger(&self, app: &ObjectRef, restart: bool) -> CorralResult<TriggerOutcome> {
        if !restart {
            debug!("Redeploy of {} suppressed", app);
            return Ok(TriggerOutcome::Suppressed);
        }

        self.release_manager.redeploy(app).await?;
        info!("Redeploy of {} triggered", app);
        Ok(TriggerOutcome::Redeployed)
    }
}
