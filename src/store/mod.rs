//! Resource store client
//!
//! Provides typed, versioned access to the declarative resources the
//! control plane manages:
//! - `MemoryStore`: process-local, for tests and throwaway use
//! - `FileStore`: one JSON file per object under the state directory
//!
//! Both local backends stand in for the platform's volume provisioner:
//! a cache volume is bound as soon as it is created.

mod api;
mod client;
mod factory;
mod file;
pub mod memory;
mod retry;

pub use api::Api;
pub use client::{ResourceStore, StoredObject};
pub use factory::create_store;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use retry::{RetryPolicy, RetryingStore};

use crate::error::CorralResult;
use crate::model::{CacheVolume, Kind, VolumePhase};

/// Emulate synchronous provisioning for newly created volumes
pub(crate) fn provision_on_create(kind: Kind, object: &mut StoredObject) -> CorralResult<()> {
    if kind != Kind::Volume {
        return Ok(());
    }
    let mut volume: CacheVolume = serde_json::from_value(object.body.clone())?;
    if volume.status.phase == VolumePhase::Pending {
        volume.status.phase = VolumePhase::Bound;
        object.body = serde_json::to_value(&volume)?;
    }
    Ok(())
}
