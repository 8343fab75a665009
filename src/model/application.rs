//! Application resource

use crate::model::volume::CacheVolumeSpec;
use crate::model::{Kind, ObjectMeta, Resource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configuration mounted by an application, with the service it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundConfiguration {
    pub name: String,
    pub service: String,
}

impl BoundConfiguration {
    pub fn new(name: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service: service.into(),
        }
    }
}

/// Desired state of an application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSpec {
    /// Bound configurations in bind order, names unique
    pub bound_configurations: Vec<BoundConfiguration>,

    /// Requested build cache volume, defaults applied at staging
    pub cache_volume: Option<CacheVolumeSpec>,
}

/// Observed state of an application workload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationStatus {
    /// Incremented once per redeploy instruction
    pub restart_generation: u64,

    pub restarted_at: Option<DateTime<Utc>>,

    /// Identifies the request behind the latest generation bump
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_request: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub spec: ApplicationSpec,
    #[serde(default)]
    pub status: ApplicationStatus,
}

impl Application {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(namespace, name),
            spec: ApplicationSpec::default(),
            status: ApplicationStatus::default(),
        }
    }

    pub fn with_cache_volume(mut self, spec: CacheVolumeSpec) -> Self {
        self.spec.cache_volume = Some(spec);
        self
    }

    /// Names of the bound configurations, in bind order
    pub fn bound_names(&self) -> Vec<&str> {
        self.spec
            .bound_configurations
            .iter()
            .map(|b| b.name.as_str())
            .collect()
    }

    pub fn is_bound(&self, configuration: &str) -> bool {
        self.spec
            .bound_configurations
            .iter()
            .any(|b| b.name == configuration)
    }

    /// Whether any configuration of the given service is bound
    pub fn is_bound_to_service(&self, service: &str) -> bool {
        self.spec
            .bound_configurations
            .iter()
            .any(|b| b.service == service)
    }

    /// Union the given bindings into the bound set, keeping existing order.
    ///
    /// Returns the number of newly added configurations.
    pub fn merge_bindings(&mut self, bindings: &[BoundConfiguration]) -> usize {
        let mut added = 0;
        for binding in bindings {
            if !self.is_bound(&binding.name) {
                self.spec.bound_configurations.push(binding.clone());
                added += 1;
            }
        }
        added
    }

    /// Remove every configuration that came from `service`, returning their names
    pub fn remove_service(&mut self, service: &str) -> Vec<String> {
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .spec
            .bound_configurations
            .drain(..)
            .partition(|b| b.service == service);
        self.spec.bound_configurations = kept;
        removed.into_iter().map(|b| b.name).collect()
    }
}

impl Resource for Application {
    const KIND: Kind = Kind::Application;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}
