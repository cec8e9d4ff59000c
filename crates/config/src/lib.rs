//! Configuration loading and env substitution.
//!
//! Config files: `ghostbridge.toml`, `ghostbridge.yaml`, or `ghostbridge.json`
//! Searched in `./` then `~/.config/ghostbridge/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, load_config},
    schema::{BridgeConfig, IntentOptions, UpgradeConfig},
};
