//! Configuration binder and deployment trigger
//!
//! Binding attaches the configuration objects a service instance exposes to
//! an application. Whatever the number of services in a request, the
//! application is redeployed at most once.

mod batch;
mod resolver;
mod trigger;

pub use batch::{BindReport, Binder, UnbindReport};
pub use resolver::{ConfigurationResolver, LabelResolver};
pub use trigger::{DeploymentTrigger, ReleaseManager, TriggerOutcome, WorkloadRestarter};
