//! Mapping from service instances to the configurations they expose

use crate::error::CorralResult;
use crate::model::configuration::labels;
use crate::model::{Configuration, LabelSelector, ServiceInstance};
use crate::store::{Api, ResourceStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves the configuration objects a service instance exposes
#[async_trait]
pub trait ConfigurationResolver: Send + Sync {
    /// Configuration names exposed by `service`, in a stable order
    async fn configurations_for(&self, service: &ServiceInstance) -> CorralResult<Vec<String>>;
}

/// Finds configurations labelled with their originating service
pub struct LabelResolver {
    configurations: Api<Configuration>,
}

impl LabelResolver {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            configurations: Api::new(store),
        }
    }
}

#[async_trait]
impl ConfigurationResolver for LabelResolver {
    async fn configurations_for(&self, service: &ServiceInstance) -> CorralResult<Vec<String>> {
        let selector = LabelSelector::label(labels::SERVICE, &service.meta.name);
        let mut names: Vec<String> = self
            .configurations
            .list(Some(&service.meta.namespace), &selector)
            .await?
            .into_iter()
            .map(|c| c.meta.name)
            .collect();
        names.sort();
        Ok(names)
    }
}
