//! Shared types, error definitions, and utilities used across all toolbay crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result, ToolbayError},
    types::{AssetRootKind, Connection, InstanceId, Tool},
};
