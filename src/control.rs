//! Wiring of the control plane components over one store

use crate::audit::AuditLog;
use crate::binder::{Binder, DeploymentTrigger};
use crate::cache::{CleanupOptions, StaleCacheCollector, VolumeDefaults, VolumeReconciler};
use crate::config::Config;
use crate::error::{CorralError, CorralResult};
use crate::model::configuration::labels;
use crate::model::{
    Application, CacheVolume, CacheVolumeSpec, Configuration, LabelSelector, ObjectRef,
};
use crate::names;
use crate::services::ServiceManager;
use crate::store::{Api, ResourceStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// An application with its cache volume as last provisioned
#[derive(Debug, Clone, Serialize)]
pub struct AppDetails {
    pub application: Application,
    pub cache_volume: Option<CacheVolume>,
}

/// Every component, sharing one store, one trigger and one audit log
pub struct ControlPlane {
    pub store: Arc<dyn ResourceStore>,
    pub apps: Api<Application>,
    pub volumes: Api<CacheVolume>,
    pub binder: Arc<Binder>,
    pub services: ServiceManager,
    pub reconciler: VolumeReconciler,
    pub collector: Arc<StaleCacheCollector>,
    pub cleanup_defaults: CleanupOptions,
    pub audit: AuditLog,
    configurations: Api<Configuration>,
    conflict_retries: u32,
}

impl ControlPlane {
    pub fn new(store: Arc<dyn ResourceStore>, config: &Config) -> CorralResult<Self> {
        Self::with_audit(store, config, AuditLog::new(config))
    }

    pub fn with_audit(
        store: Arc<dyn ResourceStore>,
        config: &Config,
        audit: AuditLog,
    ) -> CorralResult<Self> {
        let retries = config.store.conflict_retries;
        let trigger = DeploymentTrigger::restarting(store.clone(), retries);

        let binder = Arc::new(
            Binder::new(store.clone(), trigger.clone(), retries).with_audit(audit.clone()),
        );
        let services = ServiceManager::new(store.clone(), binder.clone(), trigger, retries)
            .with_audit(audit.clone());
        let reconciler = VolumeReconciler::new(
            store.clone(),
            VolumeDefaults::from_config(&config.cache)?,
            config.cache.recreate_on_mismatch,
        )
        .with_conflict_retries(retries)
        .with_audit(audit.clone());
        let collector = Arc::new(
            StaleCacheCollector::new(store.clone(), config.cache.sweep_concurrency)
                .with_audit(audit.clone()),
        );

        Ok(Self {
            apps: Api::new(store.clone()),
            volumes: Api::new(store.clone()),
            configurations: Api::new(store.clone()),
            conflict_retries: retries,
            store,
            binder,
            services,
            reconciler,
            collector,
            cleanup_defaults: CleanupOptions::from_config(&config.cache),
            audit,
        })
    }

    pub async fn create_app(
        &self,
        app: &ObjectRef,
        cache_volume: Option<CacheVolumeSpec>,
    ) -> CorralResult<Application> {
        names::validate("namespace", &app.namespace)?;
        names::validate("application", &app.name)?;
        let mut application = Application::new(&app.namespace, &app.name);
        application.spec.cache_volume = cache_volume;
        let created = self.apps.create(&application).await?;
        info!("Created application {}", app);
        Ok(created)
    }

    pub async fn app_details(&self, app: &ObjectRef) -> CorralResult<AppDetails> {
        let application = self.apps.get(app).await?;
        let volume = ObjectRef::new(
            &app.namespace,
            names::cache_volume_name(&app.namespace, &app.name),
        );
        Ok(AppDetails {
            application,
            cache_volume: self.volumes.get_opt(&volume).await?,
        })
    }

    pub async fn list_apps(&self, namespace: &str) -> CorralResult<Vec<Application>> {
        self.apps
            .list(Some(namespace), &LabelSelector::everything())
            .await
    }

    /// Delete an application and clear its bound markers. Its cache volume
    /// stays until a cleanup sweep finds it orphaned.
    pub async fn delete_app(&self, app: &ObjectRef) -> CorralResult<()> {
        self.apps.delete(app).await?;
        info!("Deleted application {}", app);

        let marked = self
            .configurations
            .list(
                Some(&app.namespace),
                &LabelSelector::label(labels::bound(&app.name), "true"),
            )
            .await?;
        for configuration in marked {
            let key = configuration.meta.object_ref();
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
        Ok(())
    }
}
