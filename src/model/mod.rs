//! Declarative resources managed through the resource store
//!
//! Every resource carries [`ObjectMeta`]: a namespaced name, a store-assigned
//! version used for optimistic concurrency, a creation timestamp and labels.

pub mod application;
pub mod configuration;
pub mod quantity;
pub mod service;
pub mod volume;

pub use application::{Application, ApplicationSpec, ApplicationStatus, BoundConfiguration};
pub use configuration::Configuration;
pub use quantity::Quantity;
pub use service::ServiceInstance;
pub use volume::{AccessMode, CacheVolume, CacheVolumeSpec, VolumeMode, VolumePhase, VolumeSpec};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Resource kinds known to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Application,
    Service,
    Configuration,
    Volume,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Application => "application",
            Kind::Service => "service",
            Kind::Configuration => "configuration",
            Kind::Volume => "volume",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespaced identity of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub namespace: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Metadata common to all stored resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
    /// Store-assigned version, bumped on every write (0 = never stored)
    #[serde(default)]
    pub version: u64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version: 0,
            created_at: Utc::now(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.namespace, &self.name)
    }
}

/// A typed resource that can be stored
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: Kind;

    fn meta(&self) -> &ObjectMeta;

    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn object_ref(&self) -> ObjectRef {
        self.meta().object_ref()
    }
}

/// Label equality selector, all pairs must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    pairs: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn label(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::default().and(key, value)
    }

    pub fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.pairs
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_all_pairs() {
        let meta = ObjectMeta::new("ns", "c1")
            .with_label("corral.io/service", "s1")
            .with_label("bound.corral.io/web", "true");

        assert!(LabelSelector::everything().matches(&meta.labels));
        assert!(LabelSelector::label("corral.io/service", "s1").matches(&meta.labels));
        assert!(!LabelSelector::label("corral.io/service", "s1")
            .and("bound.corral.io/api", "true")
            .matches(&meta.labels));
    }

    #[test]
    fn object_ref_display() {
        assert_eq!(ObjectRef::new("workspace", "web").to_string(), "workspace/web");
    }
}
