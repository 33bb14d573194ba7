//! Filesystem tool catalog.
//!
//! Tools are discovered once, at host startup, from three kinds of location:
//! development checkouts listed by path, a package-manager install directory
//! and a registry install directory. Each tool root carries a `tool.json`
//! manifest. The install kind is recorded on the [`Tool`] as an
//! [`AssetRootKind`] so nothing downstream has to guess it again.

use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};

use {
    async_trait::async_trait,
    serde::Deserialize,
    toolbay_common::{AssetRootKind, Tool},
    toolbay_config::ToolsConfig,
    toolbay_service_traits::{ServiceResult, ToolCatalog},
    tracing::{debug, info, warn},
};

use crate::error::{Context, Error, Result};

/// Manifest file expected at the root of every tool.
pub const MANIFEST_FILE: &str = "tool.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolManifest {
    id: String,
    name: Option<String>,
    #[serde(default = "default_version")]
    version: String,
    /// Overrides the configured asset directory.
    assets: Option<String>,
    /// Requested content-security-policy relaxations.
    #[serde(default)]
    csp: BTreeMap<String, Vec<String>>,
}

fn default_version() -> String {
    "0.0.0".into()
}

/// Parse the manifest in `root` into a [`Tool`].
pub fn load_tool(root: &Path, kind: AssetRootKind, default_asset_dir: &str) -> Result<Tool> {
    let manifest_path = root.join(MANIFEST_FILE);
    let raw = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("read {}", manifest_path.display()))?;
    let manifest: ToolManifest = serde_json::from_str(&raw)
        .map_err(|e| Error::invalid_manifest(&manifest_path, e.to_string()))?;

    if !is_valid_tool_id(&manifest.id) {
        return Err(Error::invalid_manifest(
            &manifest_path,
            format!("'{}' is not a valid tool id", manifest.id),
        ));
    }
    let asset_dir = manifest
        .assets
        .unwrap_or_else(|| default_asset_dir.to_string());
    if asset_dir.split(['/', '\\']).any(|seg| seg == "..") || Path::new(&asset_dir).is_absolute() {
        return Err(Error::invalid_manifest(
            &manifest_path,
            "assets must stay inside the tool root",
        ));
    }

    Ok(Tool {
        name: manifest.name.unwrap_or_else(|| manifest.id.clone()),
        id: manifest.id,
        version: manifest.version,
        asset_root: kind,
        asset_dir,
        policy_exceptions: manifest.csp,
    })
}

/// Tool ids end up as URL hosts, so keep them to a conservative alphabet.
fn is_valid_tool_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'-' | b'_' | b'.'))
        && !id.starts_with('.')
}

/// Catalog of tools discovered on disk.
#[derive(Debug, Clone, Default)]
pub struct FsToolCatalog {
    tools: Vec<Tool>,
}

impl FsToolCatalog {
    /// Build a catalog from an explicit tool list.
    pub fn from_tools(tools: Vec<Tool>) -> Self {
        Self { tools }
    }

    /// Scan the configured locations. Broken manifests are skipped with a
    /// warning; when two locations provide the same id the first one wins,
    /// in the order local paths, packages, registry.
    pub fn load(config: &ToolsConfig, default_asset_dir: &str) -> Self {
        let mut candidates: Vec<(PathBuf, AssetRootKind)> = config
            .local_paths
            .iter()
            .map(|p| (p.clone(), AssetRootKind::Local(p.clone())))
            .collect();
        if let Some(dir) = &config.packages_dir {
            candidates.extend(subdirs(dir).map(|p| (p.clone(), AssetRootKind::Packaged(p))));
        }
        if let Some(dir) = &config.registry_dir {
            candidates.extend(subdirs(dir).map(|p| (p.clone(), AssetRootKind::Registry(p))));
        }

        let mut seen = HashSet::new();
        let mut tools = Vec::new();
        for (root, kind) in candidates {
            if !root.join(MANIFEST_FILE).is_file() {
                debug!(root = %root.display(), "no tool manifest, skipping");
                continue;
            }
            match load_tool(&root, kind, default_asset_dir) {
                Ok(tool) if seen.insert(tool.id.clone()) => tools.push(tool),
                Ok(tool) => {
                    warn!(tool_id = %tool.id, root = %root.display(), "duplicate tool id, ignoring");
                },
                Err(e) => warn!(root = %root.display(), error = %e, "failed to load tool"),
            }
        }

        info!(count = tools.len(), "tool catalog loaded");
        Self { tools }
    }

    #[must_use]
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }
}

fn subdirs(dir: &Path) -> impl Iterator<Item = PathBuf> {
    let mut entries: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read tool directory");
            Vec::new()
        },
    };
    entries.sort();
    entries.into_iter()
}

#[async_trait]
impl ToolCatalog for FsToolCatalog {
    async fn get_all_tools(&self) -> ServiceResult<Vec<Tool>> {
        Ok(self.tools.clone())
    }

    async fn get_tool(&self, id: &str) -> ServiceResult<Option<Tool>> {
        Ok(self.tools.iter().find(|t| t.id == id).cloned())
    }
}
