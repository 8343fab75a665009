//! Service instance lifecycle
//!
//! Each service instance exposes one derived configuration,
//! `<release>-creds`, holding its values. Updating the service replaces that
//! configuration's contents and redeploys the applications bound to it.

use crate::audit::{events, AuditLog};
use crate::binder::{Binder, DeploymentTrigger, TriggerOutcome};
use crate::error::{CorralError, CorralResult};
use crate::model::configuration::labels;
use crate::model::{Application, Configuration, LabelSelector, ObjectRef, ServiceInstance};
use crate::names;
use crate::store::{Api, ResourceStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// A service with what it exposes and who uses it
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDetails {
    pub service: ServiceInstance,
    pub configurations: Vec<String>,
    pub bound_apps: Vec<String>,
}

/// Change to a service's values
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceUpdate {
    pub set: BTreeMap<String, String>,
    pub unset: Vec<String>,
    /// Redeploy bound applications; `None` means yes
    pub restart: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub service: String,
    pub bound_apps: Vec<String>,
    pub redeployed: Vec<String>,
}

pub struct ServiceManager {
    services: Api<ServiceInstance>,
    configurations: Api<Configuration>,
    apps: Api<Application>,
    binder: Arc<Binder>,
    trigger: DeploymentTrigger,
    audit: AuditLog,
    conflict_retries: u32,
}

impl ServiceManager {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        binder: Arc<Binder>,
        trigger: DeploymentTrigger,
        conflict_retries: u32,
    ) -> Self {
        Self {
            services: Api::new(store.clone()),
            configurations: Api::new(store.clone()),
            apps: Api::new(store),
            binder,
            trigger,
            audit: AuditLog::disabled(),
            conflict_retries,
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    /// Create a service instance and its credentials configuration
    pub async fn create(
        &self,
        namespace: &str,
        name: &str,
        catalog_service: &str,
        values: BTreeMap<String, String>,
    ) -> CorralResult<ServiceInstance> {
        names::validate("namespace", namespace)?;
        names::validate("service", name)?;

        let service = self
            .services
            .create(&ServiceInstance::new(namespace, name, catalog_service).with_values(values))
            .await?;

        let creds = Configuration::derived(
            namespace,
            service.credentials_configuration_name(),
            name,
            service.spec.values.clone(),
        );
        self.configurations.create(&creds).await?;

        info!("Created service {}/{} from {}", namespace, name, catalog_service);
        self.audit
            .log(
                events::SERVICE_CREATED,
                &serde_json::json!({
                    "service": service.meta.object_ref().to_string(),
                    "catalog": catalog_service,
                }),
            )
            .await;
        Ok(service)
    }

    pub async fn show(&self, namespace: &str, name: &str) -> CorralResult<ServiceDetails> {
        let service = self.services.get(&ObjectRef::new(namespace, name)).await?;
        let apps = self.apps.list(Some(namespace), &LabelSelector::everything()).await?;
        self.details(service, &apps).await
    }

    pub async fn list(&self, namespace: &str) -> CorralResult<Vec<ServiceDetails>> {
        let apps = self.apps.list(Some(namespace), &LabelSelector::everything()).await?;
        let services = self
            .services
            .list(Some(namespace), &LabelSelector::everything())
            .await?;

        let mut details = Vec::with_capacity(services.len());
        for service in services {
            details.push(self.details(service, &apps).await?);
        }
        Ok(details)
    }

    /// Applications in `namespace` with a configuration of `service` bound
    pub async fn bound_applications(&self, namespace: &str, service: &str) -> CorralResult<Vec<String>> {
        let apps = self.apps.list(Some(namespace), &LabelSelector::everything()).await?;
        Ok(bound_to(&apps, service))
    }

    /// Apply `update` to the service values and replace its configuration.
    ///
    /// Each bound application is redeployed once unless `restart` is
    /// `Some(false)`.
    pub async fn update(
        &self,
        namespace: &str,
        name: &str,
        update: &ServiceUpdate,
    ) -> CorralResult<UpdateReport> {
        let key = ObjectRef::new(namespace, name);
        let service = self
            .services
            .modify(&key, self.conflict_retries, |s| {
                for k in &update.unset {
                    s.spec.values.remove(k);
                }
                for (k, v) in &update.set {
                    s.spec.values.insert(k.clone(), v.clone());
                }
                Ok(true)
            })
            .await?;

        let creds_key = ObjectRef::new(namespace, service.credentials_configuration_name());
        let values = service.spec.values.clone();
        if self.configurations.exists(&creds_key).await? {
            self.configurations
                .modify(&creds_key, self.conflict_retries, |c| {
                    c.data = values.clone();
                    Ok(true)
                })
                .await?;
        } else {
            self.configurations
                .create(&Configuration::derived(namespace, &creds_key.name, name, values))
                .await?;
        }

        let restart = update.restart.unwrap_or(true);
        let bound_apps = self.bound_applications(namespace, name).await?;
        let mut redeployed = Vec::new();
        for app in &bound_apps {
            let outcome = self
                .trigger
                .trigger(&ObjectRef::new(namespace, app), restart)
                .await?;
            if outcome == TriggerOutcome::Redeployed {
                redeployed.push(app.clone());
            }
        }

        info!(
            "Updated service {} ({} bound applications, {} redeployed)",
            key,
            bound_apps.len(),
            redeployed.len()
        );
        self.audit
            .log(
                events::SERVICE_UPDATED,
                &serde_json::json!({
                    "service": key.to_string(),
                    "set": update.set.keys().collect::<Vec<_>>(),
                    "unset": update.unset,
                    "restart": restart,
                }),
            )
            .await;

        Ok(UpdateReport {
            service: name.to_string(),
            bound_apps,
            redeployed,
        })
    }

    /// Delete a service, its configurations and, with `unbind`, its bindings
    pub async fn delete(&self, namespace: &str, name: &str, unbind: bool) -> CorralResult<()> {
        let key = ObjectRef::new(namespace, name);
        let service = self.services.get(&key).await?;

        let bound_apps = self.bound_applications(namespace, name).await?;
        if !bound_apps.is_empty() {
            if !unbind {
                return Err(CorralError::ServiceBound {
                    service: name.to_string(),
                    apps: bound_apps,
                });
            }
            for app in &bound_apps {
                self.binder
                    .unbind(&ObjectRef::new(namespace, app), name, true)
                    .await?;
            }
        }

        for config in self.configurations_of(&service).await? {
            self.configurations.delete(&config.meta.object_ref()).await?;
        }
        self.services.delete(&key).await?;

        info!("Deleted service {}", key);
        self.audit
            .log(
                events::SERVICE_DELETED,
                &serde_json::json!({
                    "service": key.to_string(),
                    "unbound": bound_apps,
                }),
            )
            .await;
        Ok(())
    }

    async fn configurations_of(&self, service: &ServiceInstance) -> CorralResult<Vec<Configuration>> {
        let selector = LabelSelector::label(labels::SERVICE, &service.meta.name);
        self.configurations
            .list(Some(&service.meta.namespace), &selector)
            .await
    }

    async fn details(
        &self,
        service: ServiceInstance,
        apps: &[Application],
    ) -> CorralResult<ServiceDetails> {
        let configurations = self
            .configurations_of(&service)
            .await?
            .into_iter()
            .map(|c| c.meta.name)
            .collect();
        let bound_apps = bound_to(apps, &service.meta.name);
        Ok(ServiceDetails {
            service,
            configurations,
            bound_apps,
        })
    }
}

fn bound_to(apps: &[Application], service: &str) -> Vec<String> {
    apps.iter()
        .filter(|a| a.is_bound_to_service(service))
        .map(|a| a.meta.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct Fixture {
        manager: ServiceManager,
        binder: Arc<Binder>,
        apps: Api<Application>,
        configurations: Api<Configuration>,
    }

    async fn fixture(app_names: &[&str]) -> Fixture {
        let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
        let apps = Api::<Application>::new(store.clone());
        for name in app_names {
            apps.create(&Application::new("ns", *name)).await.unwrap();
        }

        let trigger = DeploymentTrigger::restarting(store.clone(), 3);
        let binder = Arc::new(Binder::new(store.clone(), trigger.clone(), 3));
        Fixture {
            manager: ServiceManager::new(store.clone(), binder.clone(), trigger, 3),
            binder,
            apps,
            configurations: Api::new(store),
        }
    }

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn generation(f: &Fixture, app: &str) -> u64 {
        f.apps
            .get(&ObjectRef::new("ns", app))
            .await
            .unwrap()
            .status
            .restart_generation
    }

    #[tokio::test]
    async fn create_derives_credentials_configuration() {
        let f = fixture(&[]).await;
        f.manager
            .create("ns", "db", "postgres", values(&[("user", "admin")]))
            .await
            .unwrap();

        let creds = f
            .configurations
            .get(&ObjectRef::new("ns", "xs-db-creds"))
            .await
            .unwrap();
        assert_eq!(creds.origin(), Some("db"));
        assert_eq!(creds.data.get("user"), Some(&"admin".to_string()));

        let details = f.manager.show("ns", "db").await.unwrap();
        assert_eq!(details.configurations, vec!["xs-db-creds"]);
        assert!(details.bound_apps.is_empty());
    }

    #[tokio::test]
    async fn update_replaces_configuration_and_restarts_each_app_once() {
        let f = fixture(&["web", "worker"]).await;
        f.manager
            .create("ns", "db", "postgres", values(&[("user", "admin"), ("pass", "x")]))
            .await
            .unwrap();
        for app in ["web", "worker"] {
            f.binder
                .bind_service(&ObjectRef::new("ns", app), "db", false)
                .await
                .unwrap();
        }

        let update = ServiceUpdate {
            set: values(&[("pass", "y")]),
            unset: vec!["user".to_string()],
            restart: None,
        };
        let report = f.manager.update("ns", "db", &update).await.unwrap();
        assert_eq!(report.redeployed, vec!["web", "worker"]);

        let creds = f
            .configurations
            .get(&ObjectRef::new("ns", "xs-db-creds"))
            .await
            .unwrap();
        assert_eq!(creds.data, values(&[("pass", "y")]));
        assert_eq!(generation(&f, "web").await, 1);
        assert_eq!(generation(&f, "worker").await, 1);
    }

    #[tokio::test]
    async fn update_with_restart_false_keeps_workloads() {
        let f = fixture(&["web"]).await;
        f.manager
            .create("ns", "db", "postgres", BTreeMap::new())
            .await
            .unwrap();
        f.binder
            .bind_service(&ObjectRef::new("ns", "web"), "db", false)
            .await
            .unwrap();

        let update = ServiceUpdate {
            set: values(&[("k", "v")]),
            restart: Some(false),
            ..Default::default()
        };
        let report = f.manager.update("ns", "db", &update).await.unwrap();
        assert!(report.redeployed.is_empty());
        assert_eq!(report.bound_apps, vec!["web"]);
        assert_eq!(generation(&f, "web").await, 0);
    }

    #[tokio::test]
    async fn update_missing_service_is_not_found() {
        let f = fixture(&[]).await;
        let err = f
            .manager
            .update("ns", "nope", &ServiceUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CorralError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_is_refused_while_bound() {
        let f = fixture(&["web"]).await;
        f.manager
            .create("ns", "db", "postgres", BTreeMap::new())
            .await
            .unwrap();
        f.binder
            .bind_service(&ObjectRef::new("ns", "web"), "db", true)
            .await
            .unwrap();

        let err = f.manager.delete("ns", "db", false).await.unwrap_err();
        assert!(matches!(err, CorralError::ServiceBound { ref apps, .. } if apps == &["web"]));
        assert!(f.manager.show("ns", "db").await.is_ok());
    }

    #[tokio::test]
    async fn delete_with_unbind_cleans_up() {
        let f = fixture(&["web"]).await;
        f.manager
            .create("ns", "db", "postgres", BTreeMap::new())
            .await
            .unwrap();
        f.binder
            .bind_service(&ObjectRef::new("ns", "web"), "db", true)
            .await
            .unwrap();

        f.manager.delete("ns", "db", true).await.unwrap();

        let web = f.apps.get(&ObjectRef::new("ns", "web")).await.unwrap();
        assert!(web.spec.bound_configurations.is_empty());
        assert!(!f
            .configurations
            .exists(&ObjectRef::new("ns", "xs-db-creds"))
            .await
            .unwrap());
        assert!(matches!(
            f.manager.show("ns", "db").await.unwrap_err(),
            CorralError::NotFound { .. }
        ));
    }
}
