//! Configuration objects derived from service instances

use crate::model::{Kind, ObjectMeta, Resource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label keys used on configuration objects
pub mod labels {
    /// Service instance the configuration was derived from
    pub const SERVICE: &str = "corral.io/service";
    /// Prefix of the per-application bound marker (`bound.corral.io/<app>`)
    pub const BOUND_PREFIX: &str = "bound.corral.io/";

    /// Bound marker key for an application
    pub fn bound(app: &str) -> String {
        format!("{}{}", BOUND_PREFIX, app)
    }
}

/// A named key/value bundle bindable to applications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Configuration {
    /// Create a configuration derived from `service`
    pub fn derived(
        namespace: impl Into<String>,
        name: impl Into<String>,
        service: &str,
        data: BTreeMap<String, String>,
    ) -> Self {
        Self {
            meta: ObjectMeta::new(namespace, name).with_label(labels::SERVICE, service),
            data,
        }
    }

    /// Service this configuration was derived from, if any
    pub fn origin(&self) -> Option<&str> {
        self.meta.labels.get(labels::SERVICE).map(String::as_str)
    }

    /// Applications this configuration is marked as bound to
    pub fn bound_apps(&self) -> Vec<&str> {
        self.meta
            .labels
            .keys()
            .filter_map(|k| k.strip_prefix(labels::BOUND_PREFIX))
            .collect()
    }

    /// Mark as bound to `app`, returning whether the labels changed
    pub fn mark_bound(&mut self, app: &str) -> bool {
        self.meta
            .labels
            .insert(labels::bound(app), "true".to_string())
            .is_none()
    }

    /// Clear the bound marker for `app`, returning whether the labels changed
    pub fn mark_unbound(&mut self, app: &str) -> bool {
        self.meta.labels.remove(&labels::bound(app)).is_some()
    }
}

impl Resource for Configuration {
    const KIND: Kind = Kind::Configuration;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}
