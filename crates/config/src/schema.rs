/// Config schema types (content scheme, geometry timing, tool locations, loopback server).
use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolbayConfig {
    pub content: ContentConfig,
    pub geometry: GeometryConfig,
    pub tools: ToolsConfig,
    pub server: ServerConfig,
    /// Where persistent host state (consent records) is written. Defaults to
    /// the platform data directory.
    pub data_dir: Option<PathBuf>,
}

/// Virtual content scheme settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Private URL scheme surfaces load tool assets from.
    pub scheme: String,
    /// Document served when a request names no path.
    pub default_document: String,
    /// Subdirectory of a tool's root holding its built UI. Tool manifests
    /// may override it.
    pub asset_dir: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            scheme: "toolscheme".into(),
            default_document: "index.html".into(),
            asset_dir: "dist".into(),
        }
    }
}

/// Geometry round-trip timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Coalescing window for resize/move bursts. Defaults to one 60Hz frame.
    pub frame_interval_ms: u64,
    /// How long to wait for the layout owner before falling back to the
    /// full content rectangle.
    pub response_timeout_ms: u64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            response_timeout_ms: 300,
        }
    }
}

impl GeometryConfig {
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Where installed tools are discovered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Development checkouts, each a single tool root.
    pub local_paths: Vec<PathBuf>,
    /// Directory of package-manager installs, one tool per subdirectory.
    pub packages_dir: Option<PathBuf>,
    /// Directory of registry installs, one tool per subdirectory.
    pub registry_dir: Option<PathBuf>,
}

/// Loopback HTTP front end for platforms that cannot register a custom scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on. `0` picks a free port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 0,
        }
    }
}
