//! Terminal output for the CLI
//!
//! Uses `cliclack` log lines when attached to an interactive terminal and
//! falls back to bracketed plain markers (`[OK]`, `[WARN]`) in pipes and CI,
//! so scripted callers get stable output.

mod context;
mod output;

pub use context::UiContext;
pub use output::{
    key_value, remark, section, step_error_detail, step_ok, step_ok_detail, step_warn,
    step_warn_hint, Table,
};
