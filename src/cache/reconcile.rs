//! Volume reconciler, run when an application is staged

use crate::audit::{events, AuditLog};
use crate::cache::spec::{provision_spec, Match, Reconcilable, VolumeDefaults};
use crate::error::CorralResult;
use crate::model::{Application, CacheVolume, CacheVolumeSpec, ObjectRef};
use crate::names;
use crate::store::{Api, ResourceStore};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What reconciling a cache volume did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum ReconcileOutcome {
    /// No volume existed; one was created
    Created,
    /// The live volume matches
    Kept,
    /// The live volume did not match and was replaced
    Recreated { reason: String },
    /// The live volume does not match and was left alone
    Mismatch { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub volume: ObjectRef,
    pub desired: CacheVolumeSpec,
    #[serde(flatten)]
    pub outcome: ReconcileOutcome,
}

/// Keeps each application's cache volume in line with its requested spec
pub struct VolumeReconciler {
    apps: Api<Application>,
    volumes: Api<CacheVolume>,
    defaults: VolumeDefaults,
    recreate_on_mismatch: bool,
    conflict_retries: u32,
    audit: AuditLog,
}

impl VolumeReconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        defaults: VolumeDefaults,
        recreate_on_mismatch: bool,
    ) -> Self {
        Self {
            apps: Api::new(store.clone()),
            volumes: Api::new(store),
            defaults,
            recreate_on_mismatch,
            conflict_retries: 5,
            audit: AuditLog::disabled(),
        }
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    /// Bring the cache volume of `app` in line with the app's desired spec.
    ///
    /// A volume that is not yet bound is reported and never deleted.
    pub async fn reconcile(&self, app: &ObjectRef) -> CorralResult<ReconcileReport> {
        let application = self.apps.get(app).await?;
        let desired =
            CacheVolume::apply_defaults(application.spec.cache_volume.as_ref(), &self.defaults);
        let key = ObjectRef::new(
            &app.namespace,
            names::cache_volume_name(&app.namespace, &app.name),
        );

        let outcome = match self.volumes.get_opt(&key).await? {
            None => {
                self.create(app, &desired).await?;
                info!("Created cache volume {}", key);
                ReconcileOutcome::Created
            }
            Some(live) => match live.matches(&desired) {
                Match::Matches => {
                    self.touch(&key).await?;
                    debug!("Cache volume {} matches", key);
                    ReconcileOutcome::Kept
                }
                Match::Mismatch(reason) if reason.is_recreatable() && self.recreate_on_mismatch => {
                    self.volumes.delete(&key).await?;
                    self.create(app, &desired).await?;
                    info!("Recreated cache volume {}: {}", key, reason);
                    self.audit
                        .log(
                            events::CACHE_RECREATED,
                            &serde_json::json!({
                                "volume": key.to_string(),
                                "reason": reason.to_string(),
                            }),
                        )
                        .await;
                    ReconcileOutcome::Recreated {
                        reason: reason.to_string(),
                    }
                }
                Match::Mismatch(reason) => {
                    warn!("Cache volume {} does not match: {}", key, reason);
                    ReconcileOutcome::Mismatch {
                        reason: reason.to_string(),
                    }
                }
            },
        };

        Ok(ReconcileReport {
            volume: key,
            desired,
            outcome,
        })
    }

    async fn create(&self, app: &ObjectRef, desired: &CacheVolumeSpec) -> CorralResult<CacheVolume> {
        let volume = CacheVolume::new(app, provision_spec(desired)?);
        self.volumes.create(&volume).await
    }

    /// Record that a build is about to use the volume
    async fn touch(&self, key: &ObjectRef) -> CorralResult<()> {
        self.volumes
            .modify(key, self.conflict_retries, |v| {
                v.status.last_used = Some(Utc::now());
                Ok(true)
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CorralError;
    use crate::model::{AccessMode, Quantity, VolumePhase};
    use crate::store::MemoryStore;

    async fn setup(store: Arc<dyn ResourceStore>, spec: Option<CacheVolumeSpec>) -> Api<CacheVolume> {
        let mut app = Application::new("ns", "web");
        app.spec.cache_volume = spec;
        Api::<Application>::new(store.clone())
            .create(&app)
            .await
            .unwrap();
        Api::new(store)
    }

    fn sized(size: &str) -> CacheVolumeSpec {
        CacheVolumeSpec {
            size: Some(size.parse().unwrap()),
            ..Default::default()
        }
    }

    fn web() -> ObjectRef {
        ObjectRef::new("ns", "web")
    }

    fn volume_key() -> ObjectRef {
        ObjectRef::new("ns", "cache-ns-web")
    }

    #[tokio::test]
    async fn creates_missing_volume_with_defaults() {
        let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
        let volumes = setup(store.clone(), None).await;
        let reconciler = VolumeReconciler::new(store, VolumeDefaults::default(), true);

        let report = reconciler.reconcile(&web()).await.unwrap();
        assert_eq!(report.outcome, ReconcileOutcome::Created);

        let volume = volumes.get(&volume_key()).await.unwrap();
        assert_eq!(volume.spec.size, "1Gi".parse::<Quantity>().unwrap());
        assert_eq!(volume.spec.access_modes, vec![AccessMode::ReadWriteOnce]);
        assert_eq!(volume.status.phase, VolumePhase::Bound);
        assert_eq!(volume.owner(), Some(web()));
    }

    #[tokio::test]
    async fn keeps_matching_volume_and_records_use() {
        let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
        let volumes = setup(store.clone(), None).await;
        let reconciler = VolumeReconciler::new(store, VolumeDefaults::default(), true);

        reconciler.reconcile(&web()).await.unwrap();
        let report = reconciler.reconcile(&web()).await.unwrap();
        assert_eq!(report.outcome, ReconcileOutcome::Kept);
        assert!(volumes
            .get(&volume_key())
            .await
            .unwrap()
            .status
            .last_used
            .is_some());
    }

    #[tokio::test]
    async fn recreates_on_size_change() {
        let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
        let volumes = setup(store.clone(), Some(sized("1Gi"))).await;
        let reconciler = VolumeReconciler::new(store.clone(), VolumeDefaults::default(), true);
        reconciler.reconcile(&web()).await.unwrap();

        Api::<Application>::new(store)
            .modify(&web(), 3, |a| {
                a.spec.cache_volume = Some(sized("2Gi"));
                Ok(true)
            })
            .await
            .unwrap();

        let report = reconciler.reconcile(&web()).await.unwrap();
        match report.outcome {
            ReconcileOutcome::Recreated { reason } => assert!(reason.contains("size")),
            other => panic!("expected Recreated, got {other:?}"),
        }
        let volume = volumes.get(&volume_key()).await.unwrap();
        assert_eq!(volume.spec.size, "2Gi".parse::<Quantity>().unwrap());
    }

    #[tokio::test]
    async fn reports_mismatch_when_recreate_disabled() {
        let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
        let volumes = setup(store.clone(), Some(sized("1Gi"))).await;
        VolumeReconciler::new(store.clone(), VolumeDefaults::default(), true)
            .reconcile(&web())
            .await
            .unwrap();

        Api::<Application>::new(store.clone())
            .modify(&web(), 3, |a| {
                a.spec.cache_volume = Some(sized("2Gi"));
                Ok(true)
            })
            .await
            .unwrap();

        let report = VolumeReconciler::new(store, VolumeDefaults::default(), false)
            .reconcile(&web())
            .await
            .unwrap();
        assert!(matches!(report.outcome, ReconcileOutcome::Mismatch { .. }));
        let volume = volumes.get(&volume_key()).await.unwrap();
        assert_eq!(volume.spec.size, "1Gi".parse::<Quantity>().unwrap());
    }

    #[tokio::test]
    async fn pending_volume_is_reported_not_deleted() {
        let memory = Arc::new(MemoryStore::without_provisioner());
        let store: Arc<dyn ResourceStore> = memory.clone();
        let volumes = setup(store.clone(), None).await;
        let reconciler = VolumeReconciler::new(store, VolumeDefaults::default(), true);

        assert_eq!(
            reconciler.reconcile(&web()).await.unwrap().outcome,
            ReconcileOutcome::Created
        );
        let created = volumes.get(&volume_key()).await.unwrap();

        let report = reconciler.reconcile(&web()).await.unwrap();
        assert_eq!(
            report.outcome,
            ReconcileOutcome::Mismatch {
                reason: "volume is pending, not bound".to_string()
            }
        );
        let still = volumes.get(&volume_key()).await.unwrap();
        assert_eq!(still.meta.version, created.meta.version);
    }

    #[tokio::test]
    async fn missing_application_is_not_found() {
        let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
        let reconciler = VolumeReconciler::new(store, VolumeDefaults::default(), true);

        let err = reconciler.reconcile(&web()).await.unwrap_err();
        assert!(matches!(err, CorralError::NotFound { .. }));
    }
}
