//! Configuration loading, validation, and env substitution.
//!
//! Config files: `toolbay.toml`, `toolbay.yaml`, or `toolbay.json`
//! Searched in `./` then `~/.config/toolbay/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, data_dir, discover_and_load, find_config_file, load_config},
    schema::{ContentConfig, GeometryConfig, ServerConfig, ToolbayConfig, ToolsConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
