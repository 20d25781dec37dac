//! Configuration loading, CLI overrides and validation.

mod cli;
mod defaults;
mod endpoint;
mod loader;
mod types;
mod validate;

pub use cli::{CliOverrides, apply_overrides};
pub use endpoint::parse_host_port;
pub use loader::{ConfigError, load_config};
pub use types::*;
pub use validate::validate_config;
