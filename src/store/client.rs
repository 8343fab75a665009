//! Resource store abstraction
//!
//! Provides a trait for declarative resource access that can be implemented
//! by different backends (in-memory, local files, a cluster API).

use crate::error::CorralResult;
use crate::model::{Kind, LabelSelector, ObjectMeta, ObjectRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A resource as the store holds it: metadata plus the serialized body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub meta: ObjectMeta,
    pub body: serde_json::Value,
}

impl StoredObject {
    pub fn object_ref(&self) -> ObjectRef {
        self.meta.object_ref()
    }
}

/// Abstract resource store interface
///
/// Writes are versioned: `update` only succeeds when the object's
/// `meta.version` equals the stored version, otherwise it fails with
/// `Conflict` and the caller is expected to re-read and re-apply.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch one object, `None` if absent
    async fn get(&self, kind: Kind, key: &ObjectRef) -> CorralResult<Option<StoredObject>>;

    /// List objects of a kind, optionally within one namespace, ordered by
    /// namespace then name
    async fn list(
        &self,
        kind: Kind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> CorralResult<Vec<StoredObject>>;

    /// Create an object; fails with `AlreadyExists` if the name is taken
    async fn create(&self, kind: Kind, object: StoredObject) -> CorralResult<StoredObject>;

    /// Replace an object at the version it was read at
    async fn update(&self, kind: Kind, object: StoredObject) -> CorralResult<StoredObject>;

    /// Delete an object; fails with `NotFound` if absent
    async fn delete(&self, kind: Kind, key: &ObjectRef) -> CorralResult<()>;

    /// Get the human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}
