//! Build cache volume resource
//!
//! Each application owns at most one cache volume, named from its namespace
//! and application name. The volume outlives the application: removing
//! orphans is the stale cache collector's job.

use crate::model::quantity::Quantity;
use crate::model::{Kind, ObjectMeta, ObjectRef, Resource};
use crate::names;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Volume label keys used to track cache ownership
pub mod labels {
    /// Marks volume as a build cache
    pub const CACHE: &str = "corral.io/cache";
    /// Owning application name
    pub const APP_NAME: &str = "corral.io/app-name";
    /// Owning application namespace
    pub const APP_NAMESPACE: &str = "corral.io/app-namespace";
}

/// How a volume may be mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessMode {
    ReadWriteOnce,
    ReadOnlyMany,
    ReadWriteMany,
    ReadWriteOncePod,
}

impl AccessMode {
    pub fn short(&self) -> &'static str {
        match self {
            Self::ReadWriteOnce => "RWO",
            Self::ReadOnlyMany => "ROX",
            Self::ReadWriteMany => "RWX",
            Self::ReadWriteOncePod => "RWOP",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// Whether the volume is presented as a filesystem or a raw block device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeMode {
    Filesystem,
    Block,
}

impl fmt::Display for VolumeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filesystem => write!(f, "Filesystem"),
            Self::Block => write!(f, "Block"),
        }
    }
}

/// Provisioning phase of a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumePhase {
    /// Requested but not yet provisioned
    Pending,
    /// Provisioned and usable
    Bound,
    /// Backing storage is gone
    Lost,
}

impl fmt::Display for VolumePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Bound => write!(f, "bound"),
            Self::Lost => write!(f, "lost"),
        }
    }
}

/// Cache volume request as an application states it; every field optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheVolumeSpec {
    pub size: Option<Quantity>,
    pub access_modes: Vec<AccessMode>,
    pub volume_mode: Option<VolumeMode>,
    pub storage_class_name: Option<String>,
}

/// Spec of a provisioned volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    pub size: Quantity,
    pub access_modes: Vec<AccessMode>,
    pub volume_mode: VolumeMode,
    #[serde(default)]
    pub storage_class_name: Option<String>,
}

impl VolumeSpec {
    /// The request that would recreate this exact volume
    pub fn as_request(&self) -> CacheVolumeSpec {
        CacheVolumeSpec {
            size: Some(self.size.clone()),
            access_modes: self.access_modes.clone(),
            volume_mode: Some(self.volume_mode),
            storage_class_name: self.storage_class_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStatus {
    pub phase: VolumePhase,
    /// Last time a build mounted the volume, when the platform tracks it
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl Default for VolumeStatus {
    fn default() -> Self {
        Self {
            phase: VolumePhase::Pending,
            last_used: None,
        }
    }
}

/// A per-application build cache volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheVolume {
    pub meta: ObjectMeta,
    pub spec: VolumeSpec,
    #[serde(default)]
    pub status: VolumeStatus,
}

impl CacheVolume {
    /// Create a new, not yet provisioned, cache volume for `app`
    pub fn new(app: &ObjectRef, spec: VolumeSpec) -> Self {
        let meta = ObjectMeta::new(
            &app.namespace,
            names::cache_volume_name(&app.namespace, &app.name),
        )
        .with_label(labels::CACHE, "true")
        .with_label(labels::APP_NAME, &app.name)
        .with_label(labels::APP_NAMESPACE, &app.namespace);

        Self {
            meta,
            spec,
            status: VolumeStatus::default(),
        }
    }

    /// Application owning this volume, if the ownership labels are intact
    pub fn owner(&self) -> Option<ObjectRef> {
        let name = self.meta.labels.get(labels::APP_NAME)?;
        let namespace = self
            .meta
            .labels
            .get(labels::APP_NAMESPACE)
            .unwrap_or(&self.meta.namespace);
        Some(ObjectRef::new(namespace, name))
    }

    /// Most recent evidence of use: last mount if tracked, else creation
    pub fn last_activity(&self) -> DateTime<Utc> {
        match self.status.last_used {
            Some(used) if used > self.meta.created_at => used,
            _ => self.meta.created_at,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.status.phase == VolumePhase::Bound
    }
}

impl Resource for CacheVolume {
    const KIND: Kind = Kind::Volume;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}
