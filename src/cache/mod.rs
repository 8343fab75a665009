//! Build cache volumes
//!
//! Every application owns one cache volume, reused across builds to speed up
//! rebuilds.
//!
//! | Part | When it runs |
//! |------|--------------|
//! | [`VolumeReconciler`] | staging, before the build mounts the volume |
//! | [`StaleCacheCollector`] | on demand or as a periodic sweep |

pub mod collector;
pub mod reconcile;
pub mod spec;

pub use collector::{
    is_stale, CleanupError, CleanupOptions, CleanupParams, CleanupReport, StaleCache,
    StaleCacheCollector,
};
pub use reconcile::{ReconcileOutcome, ReconcileReport, VolumeReconciler};
pub use spec::{provision_spec, Match, MismatchReason, Reconcilable, VolumeDefaults};
