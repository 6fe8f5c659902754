//! Operator tooling for Tiergate.
//!
//! The `tiergate` binary wires a SQLite store, the tier policy file and the
//! module manifest directories into an [`App`], then runs one [`Command`]
//! against it. Everything except argument parsing and log setup lives here
//! so it can be exercised from tests.

mod app;
mod commands;
mod config;

pub use app::App;
pub use commands::{parse_limit_override, run, Command, TierCommand};
pub use config::{CliConfig, ModuleDir, DEFAULT_CONFIG_FILE};
