//! In-memory resource store
//!
//! Used by tests and by `--store memory`. Supports scripted faults so
//! callers can exercise conflict and outage handling deterministically.

use crate::error::{CorralError, CorralResult};
use crate::model::{Kind, LabelSelector, ObjectRef};
use crate::store::client::{ResourceStore, StoredObject};
use crate::store::provision_on_create;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

type Key = (Kind, String, String);

fn key(kind: Kind, r: &ObjectRef) -> Key {
    (kind, r.namespace.clone(), r.name.clone())
}

/// Store operation, for fault targeting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Get,
    List,
    Create,
    Update,
    Delete,
}

/// A scripted failure: the next `times` matching calls fail with `Unavailable`
#[derive(Debug, Clone)]
pub struct Fault {
    op: Op,
    kind: Option<Kind>,
    name: Option<String>,
    times: usize,
}

impl Fault {
    pub fn unavailable(op: Op) -> Self {
        Self {
            op,
            kind: None,
            name: None,
            times: 1,
        }
    }

    pub fn kind(mut self, kind: Kind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn times(mut self, times: usize) -> Self {
        self.times = times;
        self
    }

    fn matches(&self, op: Op, kind: Kind, name: Option<&str>) -> bool {
        self.times > 0
            && self.op == op
            && self.kind.is_none_or(|k| k == kind)
            && match (&self.name, name) {
                (Some(want), Some(got)) => want == got,
                (Some(_), None) => false,
                (None, _) => true,
            }
    }
}

/// Simulated write by another client, applied just before a pending update
pub type Interceptor = Box<dyn FnOnce(&mut StoredObject) + Send>;

#[derive(Default)]
struct Inner {
    objects: BTreeMap<Key, StoredObject>,
    faults: Vec<Fault>,
    interceptors: Vec<(Kind, Interceptor)>,
}

/// Process-local resource store
pub struct MemoryStore {
    inner: Mutex<Inner>,
    calls: AtomicUsize,
    provision: bool,
}

impl MemoryStore {
    /// Create an empty store that provisions volumes on creation
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            calls: AtomicUsize::new(0),
            provision: true,
        }
    }

    /// Create an empty store that leaves new volumes pending
    pub fn without_provisioner() -> Self {
        Self {
            provision: false,
            ..Self::new()
        }
    }

    /// Number of store calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Script a failure
    pub fn inject(&self, fault: Fault) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults.push(fault);
        }
    }

    /// Apply `write` to the stored copy right before the next update of
    /// `kind`, as if another client had written in between
    pub fn intercept_next_update(&self, kind: Kind, write: Interceptor) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.interceptors.push((kind, write));
        }
    }

    fn lock(&self) -> CorralResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| CorralError::Internal("memory store lock poisoned".to_string()))
    }

    fn begin(&self, op: Op, kind: Kind, name: Option<&str>) -> CorralResult<MutexGuard<'_, Inner>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock()?;
        if let Some(fault) = inner
            .faults
            .iter_mut()
            .find(|f| f.matches(op, kind, name))
        {
            fault.times -= 1;
            return Err(CorralError::Unavailable(format!(
                "injected {:?} failure for {}",
                op, kind
            )));
        }
        Ok(inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, kind: Kind, r: &ObjectRef) -> CorralResult<Option<StoredObject>> {
        let inner = self.begin(Op::Get, kind, Some(&r.name))?;
        Ok(inner.objects.get(&key(kind, r)).cloned())
    }

    async fn list(
        &self,
        kind: Kind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> CorralResult<Vec<StoredObject>> {
        let inner = self.begin(Op::List, kind, None)?;
        Ok(inner
            .objects
            .iter()
            .filter(|((k, ns, _), obj)| {
                *k == kind
                    && namespace.is_none_or(|want| want == ns)
                    && selector.matches(&obj.meta.labels)
            })
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn create(&self, kind: Kind, mut object: StoredObject) -> CorralResult<StoredObject> {
        let mut inner = self.begin(Op::Create, kind, Some(&object.meta.name))?;
        let k = key(kind, &object.object_ref());
        if inner.objects.contains_key(&k) {
            return Err(CorralError::AlreadyExists {
                kind: kind.to_string(),
                name: object.meta.name,
            });
        }
        object.meta.version = 1;
        if self.provision {
            provision_on_create(kind, &mut object)?;
        }
        debug!("Created {} {}", kind, object.object_ref());
        inner.objects.insert(k, object.clone());
        Ok(object)
    }

    async fn update(&self, kind: Kind, mut object: StoredObject) -> CorralResult<StoredObject> {
        let mut inner = self.begin(Op::Update, kind, Some(&object.meta.name))?;
        let k = key(kind, &object.object_ref());

        if let Some(pos) = inner.interceptors.iter().position(|(ik, _)| *ik == kind) {
            let (_, write) = inner.interceptors.remove(pos);
            if let Some(current) = inner.objects.get_mut(&k) {
                write(current);
                current.meta.version += 1;
            }
        }

        let current = inner
            .objects
            .get(&k)
            .ok_or_else(|| CorralError::not_found(kind.as_str(), &object.meta.name))?;
        if current.meta.version != object.meta.version {
            return Err(CorralError::conflict(kind.as_str(), &object.meta.name));
        }

        object.meta.version = current.meta.version + 1;
        object.meta.created_at = current.meta.created_at;
        inner.objects.insert(k, object.clone());
        Ok(object)
    }

    async fn delete(&self, kind: Kind, r: &ObjectRef) -> CorralResult<()> {
        let mut inner = self.begin(Op::Delete, kind, Some(&r.name))?;
        inner
            .objects
            .remove(&key(kind, r))
            .map(|_| ())
            .ok_or_else(|| CorralError::not_found(kind.as_str(), &r.name))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectMeta;
    use serde_json::json;

    fn object(name: &str) -> StoredObject {
        StoredObject {
            meta: ObjectMeta::new("ns", name),
            body: json!({"meta": {"namespace": "ns", "name": name}}),
        }
    }

    #[tokio::test]
    async fn create_assigns_version_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let created = store.create(Kind::Service, object("db")).await.unwrap();
        assert_eq!(created.meta.version, 1);

        let err = store.create(Kind::Service, object("db")).await.unwrap_err();
        assert!(matches!(err, CorralError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let store = MemoryStore::new();
        let created = store.create(Kind::Service, object("db")).await.unwrap();

        let updated = store.update(Kind::Service, created.clone()).await.unwrap();
        assert_eq!(updated.meta.version, 2);

        let err = store.update(Kind::Service, created).await.unwrap_err();
        assert!(matches!(err, CorralError::Conflict { .. }));
    }

    #[tokio::test]
    async fn kinds_are_separate() {
        let store = MemoryStore::new();
        store.create(Kind::Service, object("x")).await.unwrap();
        store.create(Kind::Configuration, object("x")).await.unwrap();

        let services = store
            .list(Kind::Service, None, &LabelSelector::everything())
            .await
            .unwrap();
        assert_eq!(services.len(), 1);
    }

    #[tokio::test]
    async fn injected_fault_fires_once() {
        let store = MemoryStore::new();
        store.create(Kind::Service, object("db")).await.unwrap();
        store.inject(Fault::unavailable(Op::Get).kind(Kind::Service));

        let r = ObjectRef::new("ns", "db");
        assert!(store.get(Kind::Service, &r).await.is_err());
        assert!(store.get(Kind::Service, &r).await.unwrap().is_some());
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test]
    async fn interceptor_causes_conflict() {
        let store = MemoryStore::new();
        let created = store.create(Kind::Service, object("db")).await.unwrap();
        store.intercept_next_update(
            Kind::Service,
            Box::new(|obj: &mut StoredObject| {
                obj.body["touched"] = json!(true);
            }),
        );

        let err = store.update(Kind::Service, created).await.unwrap_err();
        assert!(matches!(err, CorralError::Conflict { .. }));

        let current = store
            .get(Kind::Service, &ObjectRef::new("ns", "db"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.body["touched"], json!(true));
        assert_eq!(current.meta.version, 2);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .delete(Kind::Volume, &ObjectRef::new("ns", "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, CorralError::NotFound { .. }));
    }
}
