//! Binding services to applications
//!
//! A bind runs in three phases:
//! 1. Resolve and validate: the application and every service must exist.
//!    Nothing is written when any lookup fails.
//! 2. Commit: every derived configuration is merged into the application's
//!    bound set in one versioned write, re-read and re-merged on conflict.
//! 3. Follow-up: the configurations are labelled as bound and one redeploy
//!    is triggered.
//!
//! A failure in phase 3 leaves the bound set committed. It is reported as
//! retryable, and re-running the same request converges: the merge adds
//! nothing, labels are re-applied and the redeploy is sent once.

use crate::audit::{events, AuditLog};
use crate::binder::resolver::{ConfigurationResolver, LabelResolver};
use crate::binder::trigger::{DeploymentTrigger, TriggerOutcome};
use crate::error::{CorralError, CorralResult};
use crate::model::{Application, BoundConfiguration, Configuration, ObjectRef, ServiceInstance};
use crate::store::{Api, ResourceStore};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a successful bind
#[derive(Debug, Clone, Serialize)]
pub struct BindReport {
    pub app: ObjectRef,
    /// Configurations of the requested services, in request order
    pub configurations: Vec<String>,
    /// How many of them were not bound before
    pub added: usize,
    pub outcome: TriggerOutcome,
}

/// Result of a successful unbind
#[derive(Debug, Clone, Serialize)]
pub struct UnbindReport {
    pub app: ObjectRef,
    pub service: String,
    pub removed: Vec<String>,
    pub outcome: TriggerOutcome,
}

/// Attaches service configurations to applications
pub struct Binder {
    apps: Api<Application>,
    services: Api<ServiceInstance>,
    configurations: Api<Configuration>,
    resolver: Arc<dyn ConfigurationResolver>,
    trigger: DeploymentTrigger,
    audit: AuditLog,
    conflict_retries: u32,
}

impl Binder {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        trigger: DeploymentTrigger,
        conflict_retries: u32,
    ) -> Self {
        Self {
            apps: Api::new(store.clone()),
            services: Api::new(store.clone()),
            configurations: Api::new(store.clone()),
            resolver: Arc::new(LabelResolver::new(store)),
            trigger,
            audit: AuditLog::disabled(),
            conflict_retries,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ConfigurationResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    /// Bind every service in `service_names` to `app` with at most one redeploy
    pub async fn batch_bind(
        &self,
        app: &ObjectRef,
        service_names: &[String],
        restart: bool,
    ) -> CorralResult<BindReport> {
        validate_service_names(service_names)?;

        self.apps.get(app).await?;
        let mut services = Vec::with_capacity(service_names.len());
        for name in service_names {
            let key = ObjectRef::new(&app.namespace, name);
            services.push(self.services.get(&key).await?);
        }

        let bindings = self.derive(&services).await?;
        let added = self.commit(app, &bindings).await?;
        self.label_bound(app, &bindings).await?;
        let outcome = self.trigger.trigger(app, restart).await?;

        let configurations: Vec<String> = bindings.into_iter().map(|b| b.name).collect();
        info!(
            "Bound {} to {} ({} configurations, {} new)",
            service_names.join(", "),
            app,
            configurations.len(),
            added
        );
        self.audit
            .log(
                events::SERVICES_BOUND,
                &serde_json::json!({
                    "app": app.to_string(),
                    "services": service_names,
                    "configurations": configurations,
                    "restart": restart,
                }),
            )
            .await;

        Ok(BindReport {
            app: app.clone(),
            configurations,
            added,
            outcome,
        })
    }

    /// Bind a single service; same result as a one-element batch
    pub async fn bind_service(
        &self,
        app: &ObjectRef,
        service: &str,
        restart: bool,
    ) -> CorralResult<BindReport> {
        self.batch_bind(app, &[service.to_string()], restart).await
    }

    /// Remove every configuration of `service` from `app`, redeploying once
    pub async fn unbind(
        &self,
        app: &ObjectRef,
        service: &str,
        restart: bool,
    ) -> CorralResult<UnbindReport> {
        let current = self.apps.get(app).await?;
        if !current.is_bound_to_service(service) {
            return Err(CorralError::invalid(format!(
                "service {} is not bound to application {}",
                service, app.name
            )));
        }

        let mut removed = Vec::new();
        self.apps
            .modify(app, self.conflict_retries, |a| {
                removed = a.remove_service(service);
                Ok(!removed.is_empty())
            })
            .await?;

        for name in &removed {
            let key = ObjectRef::new(&app.namespace, name);
            match self
                .configurations
                .modify(&key, self.conflict_retries, |c| Ok(c.mark_unbound(&app.name)))
                .await
            {
                Ok(_) => {}
                Err(CorralError::NotFound { .. }) => {
                    debug!("Configuration {} already gone, skipping label", key)
                }
                Err(e) => return Err(e),
            }
        }

        let outcome = self.trigger.trigger(app, restart).await?;

        info!("Unbound {} from {}", service, app);
        self.audit
            .log(
                events::SERVICE_UNBOUND,
                &serde_json::json!({
                    "app": app.to_string(),
                    "service": service,
                    "configurations": removed,
                }),
            )
            .await;

        Ok(UnbindReport {
            app: app.clone(),
            service: service.to_string(),
            removed,
            outcome,
        })
    }

    async fn derive(&self, services: &[ServiceInstance]) -> CorralResult<Vec<BoundConfiguration>> {
        let mut bindings = Vec::new();
        for service in services {
            let names = self.resolver.configurations_for(service).await?;
            if names.is_empty() {
                debug!("Service {} exposes no configurations", service.meta.name);
            }
            bindings.extend(
                names
                    .into_iter()
                    .map(|name| BoundConfiguration::new(name, &service.meta.name)),
            );
        }
        Ok(bindings)
    }

    /// Merge `bindings` into the bound set in one write; returns how many were new
    async fn commit(&self, app: &ObjectRef, bindings: &[BoundConfiguration]) -> CorralResult<usize> {
        let mut added = 0;
        self.apps
            .modify(app, self.conflict_retries, |a| {
                added = a.merge_bindings(bindings);
                Ok(added > 0)
            })
            .await?;
        Ok(added)
    }

    async fn label_bound(&self, app: &ObjectRef, bindings: &[BoundConfiguration]) -> CorralResult<()> {
        for binding in bindings {
            let key = ObjectRef::new(&app.namespace, &binding.name);
            match self
                .configurations
                .modify(&key, self.conflict_retries, |c| Ok(c.mark_bound(&app.name)))
                .await
            {
                Ok(_) => {}
                Err(CorralError::NotFound { .. }) => {
                    debug!("Configuration {} deleted before labelling, skipping", key)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Reject empty requests and repeated names before any store access
fn validate_service_names(service_names: &[String]) -> CorralResult<()> {
    if service_names.is_empty() {
        return Err(CorralError::invalid("service_names must not be empty"));
    }

    let mut seen = HashSet::new();
    for name in service_names {
        if name.trim().is_empty() {
            return Err(CorralError::invalid("service name must not be empty"));
        }
        if !seen.insert(name.as_str()) {
            return Err(CorralError::invalid(format!(
                "service {} requested more than once",
                name
            )));
        }
    }
    Ok(())
}
