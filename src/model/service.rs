//! Service instance resource

use crate::model::{Kind, ObjectMeta, Resource};
use crate::names;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Desired state of a service instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    /// Catalog entry this instance was created from
    pub catalog_service: String,

    /// Release managed on behalf of this instance
    pub release: String,

    /// Release values, also exposed through the derived configuration
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub spec: ServiceSpec,
}

impl ServiceInstance {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        catalog_service: impl Into<String>,
    ) -> Self {
        let meta = ObjectMeta::new(namespace, name);
        let release = names::service_release_name(&meta.name);
        Self {
            meta,
            spec: ServiceSpec {
                catalog_service: catalog_service.into(),
                release,
                values: BTreeMap::new(),
            },
        }
    }

    pub fn with_values(mut self, values: BTreeMap<String, String>) -> Self {
        self.spec.values = values;
        self
    }

    /// Name of the configuration generated from this instance's release
    pub fn credentials_configuration_name(&self) -> String {
        format!("{}-creds", self.spec.release)
    }
}

impl Resource for ServiceInstance {
    const KIND: Kind = Kind::Service;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}
