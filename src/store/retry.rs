//! Timeout and backoff around store access
//!
//! Transient failures (`Unavailable`, `Timeout`) are retried with
//! exponential backoff. Everything else, including `Conflict`, goes straight
//! back to the caller.

use crate::config::StoreConfig;
use crate::error::{CorralError, CorralResult};
use crate::model::{Kind, LabelSelector, ObjectRef};
use crate::store::client::{ResourceStore, StoredObject};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How store calls are bounded and retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `call` under the timeout, retrying transient failures
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> CorralResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CorralResult<T>>,
    {
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(CorralError::Timeout {
                    operation: operation.to_string(),
                    after: self.timeout,
                }),
            };

            match result {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    debug!(
                        "Store {} failed ({}), retrying in {:?} (attempt {}/{})",
                        operation, e, delay, attempt, self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    warn!("Store {} failed after {} attempts: {}", operation, attempt, e);
                    return Err(e);
                }
                other => return other,
            }
        }
    }
}

/// Store decorator applying a [`RetryPolicy`] to every call
pub struct RetryingStore {
    inner: Arc<dyn ResourceStore>,
    policy: RetryPolicy,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn ResourceStore>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ResourceStore for RetryingStore {
    async fn get(&self, kind: Kind, key: &ObjectRef) -> CorralResult<Option<StoredObject>> {
        self.policy
            .run(&format!("get {} {}", kind, key), || self.inner.get(kind, key))
            .await
    }

    async fn list(
        &self,
        kind: Kind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> CorralResult<Vec<StoredObject>> {
        self.policy
            .run(&format!("list {}", kind), || {
                self.inner.list(kind, namespace, selector)
            })
            .await
    }

    async fn create(&self, kind: Kind, object: StoredObject) -> CorralResult<StoredObject> {
        let operation = format!("create {} {}", kind, object.object_ref());
        self.policy
            .run(&operation, || self.inner.create(kind, object.clone()))
            .await
    }

    async fn update(&self, kind: Kind, object: StoredObject) -> CorralResult<StoredObject> {
        let operation = format!("update {} {}", kind, object.object_ref());
        self.policy
            .run(&operation, || self.inner.update(kind, object.clone()))
            .await
    }

    async fn delete(&self, kind: Kind, key: &ObjectRef) -> CorralResult<()> {
        self.policy
            .run(&format!("delete {} {}", kind, key), || {
                self.inner.delete(kind, key)
            })
            .await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}
