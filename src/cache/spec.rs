//! Desired-versus-live comparison for cache volumes
//!
//! Size is compared by byte value and access modes as sets. A volume that is
//! not yet bound never matches.

use crate::config::CacheConfig;
use crate::error::{CorralError, CorralResult};
use crate::model::{
    AccessMode, CacheVolume, CacheVolumeSpec, Quantity, VolumeMode, VolumePhase, VolumeSpec,
};
use std::collections::BTreeSet;
use std::fmt;

/// A live resource that can be checked against a desired spec
pub trait Reconcilable {
    /// Desired state as requested, possibly partial
    type Spec: Clone + PartialEq;
    /// Policy filling the unset parts of a request
    type Defaults;

    /// Complete a possibly absent request; applying twice changes nothing
    fn apply_defaults(spec: Option<&Self::Spec>, defaults: &Self::Defaults) -> Self::Spec;

    /// Compare the live resource with a defaulted desired spec
    fn matches(&self, desired: &Self::Spec) -> Match;
}

/// Outcome of comparing a live resource with its desired spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    Matches,
    Mismatch(MismatchReason),
}

impl Match {
    pub fn is_match(&self) -> bool {
        matches!(self, Match::Matches)
    }

    pub fn reason(&self) -> Option<&MismatchReason> {
        match self {
            Match::Matches => None,
            Match::Mismatch(reason) => Some(reason),
        }
    }
}

/// Why a live volume does not satisfy the desired spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReason {
    NotBound {
        phase: VolumePhase,
    },
    Size {
        live: Quantity,
        desired: Option<Quantity>,
    },
    AccessModes {
        live: Vec<AccessMode>,
        desired: Vec<AccessMode>,
    },
    VolumeMode {
        live: VolumeMode,
        desired: Option<VolumeMode>,
    },
    StorageClass {
        live: Option<String>,
        desired: Option<String>,
    },
}

impl MismatchReason {
    /// Whether recreating the volume could resolve the mismatch
    pub fn is_recreatable(&self) -> bool {
        !matches!(self, MismatchReason::NotBound { .. })
    }
}

fn or_unset<T: fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<unset>".to_string())
}

fn join_modes(modes: &[AccessMode]) -> String {
    if modes.is_empty() {
        return "<none>".to_string();
    }
    modes
        .iter()
        .map(AccessMode::short)
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotBound { phase } => write!(f, "volume is {}, not bound", phase),
            Self::Size { live, desired } => write!(
                f,
                "size mismatch: live {}, desired {}",
                live,
                or_unset(desired)
            ),
            Self::AccessModes { live, desired } => write!(
                f,
                "access modes mismatch: live {}, desired {}",
                join_modes(live),
                join_modes(desired)
            ),
            Self::VolumeMode { live, desired } => write!(
                f,
                "volume mode mismatch: live {}, desired {}",
                live,
                or_unset(desired)
            ),
            Self::StorageClass { live, desired } => write!(
                f,
                "storage class mismatch: live {}, desired {}",
                or_unset(live),
                or_unset(desired)
            ),
        }
    }
}

/// Cache volume defaults from `[cache]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeDefaults {
    pub size: Quantity,
    pub storage_class: Option<String>,
}

impl VolumeDefaults {
    pub fn from_config(config: &CacheConfig) -> CorralResult<Self> {
        let size: Quantity = config.default_size.parse().map_err(|_| {
            CorralError::invalid(format!(
                "invalid cache.default_size: {}",
                config.default_size
            ))
        })?;
        Ok(Self {
            size,
            storage_class: config.storage_class.clone(),
        })
    }
}

impl Default for VolumeDefaults {
    fn default() -> Self {
        Self {
            size: Quantity::gibibytes(1),
            storage_class: None,
        }
    }
}

impl Reconcilable for CacheVolume {
    type Spec = CacheVolumeSpec;
    type Defaults = VolumeDefaults;

    fn apply_defaults(spec: Option<&CacheVolumeSpec>, defaults: &VolumeDefaults) -> CacheVolumeSpec {
        let mut spec = spec.cloned().unwrap_or_default();
        if spec.size.is_none() {
            spec.size = Some(defaults.size.clone());
        }
        if spec.access_modes.is_empty() {
            spec.access_modes = vec![AccessMode::ReadWriteOnce];
        }
        if spec.volume_mode.is_none() {
            spec.volume_mode = Some(VolumeMode::Filesystem);
        }
        if spec.storage_class_name.is_none() {
            spec.storage_class_name = defaults.storage_class.clone();
        }
        spec
    }

    fn matches(&self, desired: &CacheVolumeSpec) -> Match {
        if self.status.phase != VolumePhase::Bound {
            return Match::Mismatch(MismatchReason::NotBound {
                phase: self.status.phase,
            });
        }

        let live = &self.spec;
        if desired.size.as_ref() != Some(&live.size) {
            return Match::Mismatch(MismatchReason::Size {
                live: live.size.clone(),
                desired: desired.size.clone(),
            });
        }

        let live_modes: BTreeSet<_> = live.access_modes.iter().collect();
        let desired_modes: BTreeSet<_> = desired.access_modes.iter().collect();
        if live_modes != desired_modes {
            return Match::Mismatch(MismatchReason::AccessModes {
                live: live.access_modes.clone(),
                desired: desired.access_modes.clone(),
            });
        }

        if desired.volume_mode != Some(live.volume_mode) {
            return Match::Mismatch(MismatchReason::VolumeMode {
                live: live.volume_mode,
                desired: desired.volume_mode,
            });
        }

        // An unset desired class only matches a volume that has none either
        if desired.storage_class_name != live.storage_class_name {
            return Match::Mismatch(MismatchReason::StorageClass {
                live: live.storage_class_name.clone(),
                desired: desired.storage_class_name.clone(),
            });
        }

        Match::Matches
    }
}

/// Turn a defaulted request into the spec a new volume is created with
pub fn provision_spec(desired: &CacheVolumeSpec) -> CorralResult<VolumeSpec> {
    let size = desired
        .size
        .clone()
        .ok_or_else(|| CorralError::invalid("cache volume size is not set"))?;
    let volume_mode = desired
        .volume_mode
        .ok_or_else(|| CorralError::invalid("cache volume mode is not set"))?;
    if desired.access_modes.is_empty() {
        return Err(CorralError::invalid("cache volume access modes are not set"));
    }

    Ok(VolumeSpec {
        size,
        access_modes: desired.access_modes.clone(),
        volume_mode,
        storage_class_name: desired.storage_class_name.clone(),
    })
}
