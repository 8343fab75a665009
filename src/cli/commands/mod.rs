//! CLI command implementations

pub mod app;
pub mod cache;
pub mod config;
pub mod serve;
pub mod service;

pub use app::execute as app;
pub use cache::execute as cache;
pub use config::execute as config;
pub use serve::execute as serve;
pub use service::execute as service;

use crate::error::CorralResult;
use serde::Serialize;

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> CorralResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
