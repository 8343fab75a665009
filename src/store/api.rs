//! Typed access to stored resources

use crate::error::{CorralError, CorralResult};
use crate::model::{LabelSelector, ObjectRef, Resource};
use crate::store::client::{ResourceStore, StoredObject};
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed handle for one resource kind
pub struct Api<T> {
    store: Arc<dyn ResourceStore>,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Clone for Api<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _kind: PhantomData,
        }
    }
}

impl<T: Resource> Api<T> {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            _kind: PhantomData,
        }
    }

    fn decode(object: StoredObject) -> CorralResult<T> {
        let mut resource: T = serde_json::from_value(object.body)?;
        *resource.meta_mut() = object.meta;
        Ok(resource)
    }

    fn encode(resource: &T) -> CorralResult<StoredObject> {
        Ok(StoredObject {
            meta: resource.meta().clone(),
            body: serde_json::to_value(resource)?,
        })
    }

    /// Fetch a resource, `None` if it does not exist
    pub async fn get_opt(&self, key: &ObjectRef) -> CorralResult<Option<T>> {
        self.store
            .get(T::KIND, key)
            .await?
            .map(Self::decode)
            .transpose()
    }

    /// Fetch a resource, failing with `NotFound` naming it
    pub async fn get(&self, key: &ObjectRef) -> CorralResult<T> {
        self.get_opt(key)
            .await?
            .ok_or_else(|| CorralError::not_found(T::KIND.as_str(), &key.name))
    }

    pub async fn exists(&self, key: &ObjectRef) -> CorralResult<bool> {
        Ok(self.store.get(T::KIND, key).await?.is_some())
    }

    pub async fn list(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> CorralResult<Vec<T>> {
        self.store
            .list(T::KIND, namespace, selector)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    pub async fn create(&self, resource: &T) -> CorralResult<T> {
        let stored = self.store.create(T::KIND, Self::encode(resource)?).await?;
        Self::decode(stored)
    }

    /// Write back a resource read earlier; `Conflict` if it changed since
    pub async fn update(&self, resource: &T) -> CorralResult<T> {
        let stored = self.store.update(T::KIND, Self::encode(resource)?).await?;
        Self::decode(stored)
    }

    pub async fn delete(&self, key: &ObjectRef) -> CorralResult<()> {
        self.store.delete(T::KIND, key).await
    }

    /// Read-modify-write with re-read on conflict.
    ///
    /// `mutate` is applied to a fresh copy on every attempt and returns
    /// `false` when nothing needs writing. Gives up with the last `Conflict`
    /// after `retries` re-reads.
    pub async fn modify<F>(&self, key: &ObjectRef, retries: u32, mut mutate: F) -> CorralResult<T>
    where
        F: FnMut(&mut T) -> CorralResult<bool> + Send,
    {
        let mut attempt = 0;
        loop {
            let mut resource = self.get(key).await?;
            if !mutate(&mut resource)? {
                return Ok(resource);
            }
            match self.update(&resource).await {
                Err(CorralError::Conflict { .. }) if attempt < retries => {
                    attempt += 1;
                    tracing::debug!(
                        "Conflict writing {} {}, re-reading (attempt {})",
                        T::KIND,
                        key,
                        attempt
                    );
                }
                result => return result,
            }
        }
    }
}
