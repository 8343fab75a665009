//! Corral - application platform control plane
//!
//! Binds service instances to applications, keeps each application's build
//! cache volume in line with its requested spec, and sweeps caches that
//! nobody uses anymore.

pub mod api;
pub mod audit;
pub mod binder;
pub mod cache;
pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod model;
pub mod names;
pub mod services;
pub mod store;
pub mod ui;

pub use control::ControlPlane;
pub use error::{CorralError, CorralResult};
