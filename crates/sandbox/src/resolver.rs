//! Maps `(tool id, relative path)` to a file inside that tool's asset subtree.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    toolbay_common::Tool,
    toolbay_service_traits::ToolCatalog,
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    paths::{is_strict_descendant, normalize_lexical},
};

/// Confine `relative` to `base`, purely lexically.
///
/// Backslashes are treated as separators. Returns `None` when the joined,
/// normalized path is not strictly below the normalized base: `..` escapes,
/// absolute inputs and NUL bytes all end up here. Callers must hand in an
/// already percent-decoded path; this never decodes again.
#[must_use]
pub fn confine(base: &Path, relative: &str) -> Option<PathBuf> {
    if relative.contains('\0') {
        return None;
    }
    let relative = relative.replace('\\', "/");
    let base = normalize_lexical(base);
    let joined = normalize_lexical(&base.join(relative));
    is_strict_descendant(&joined, &base).then_some(joined)
}

pub struct ContentAddressResolver {
    catalog: Arc<dyn ToolCatalog>,
    default_document: String,
}

impl ContentAddressResolver {
    pub fn new(catalog: Arc<dyn ToolCatalog>, default_document: impl Into<String>) -> Self {
        Self {
            catalog,
            default_document: default_document.into(),
        }
    }

    /// Look a tool up by id. Unknown tools are `NotFound`.
    pub async fn lookup(&self, tool_id: &str) -> Result<Tool> {
        match self.catalog.get_tool(tool_id).await {
            Ok(Some(tool)) => Ok(tool),
            Ok(None) => Err(Error::NotFound),
            Err(e) => {
                warn!(tool_id, error = %e, "tool catalog lookup failed");
                Err(Error::Failed)
            },
        }
    }

    /// Resolve a path for a tool known only by id.
    pub async fn resolve(&self, tool_id: &str, relative: &str) -> Result<PathBuf> {
        let tool = self.lookup(tool_id).await?;
        self.resolve_for(&tool, relative).await
    }

    /// Resolve `relative` inside `tool`'s asset subtree to an existing file.
    ///
    /// An empty path means the default document. Besides the lexical check
    /// the file must exist, and its canonical location must still be inside
    /// the canonical subtree so a symlink cannot lead out of it.
    pub async fn resolve_for(&self, tool: &Tool, relative: &str) -> Result<PathBuf> {
        let relative = if relative.is_empty() {
            self.default_document.as_str()
        } else {
            relative
        };

        let base = tool.content_base();
        let Some(candidate) = confine(&base, relative) else {
            warn!(tool_id = %tool.id, "rejected content path outside the asset root");
            return Err(Error::NotFound);
        };

        let canonical_base = tokio::fs::canonicalize(&base)
            .await
            .map_err(|_| Error::NotFound)?;
        let canonical = match tokio::fs::canonicalize(&candidate).await {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Error::NotFound),
            Err(e) => {
                debug!(tool_id = %tool.id, error = %e, "content path not resolvable");
                return Err(Error::NotFound);
            },
        };
        if !is_strict_descendant(&canonical, &canonical_base) {
            warn!(tool_id = %tool.id, "content path escapes the asset root through a link");
            return Err(Error::NotFound);
        }

        match tokio::fs::metadata(&canonical).await {
            Ok(meta) if meta.is_file() => Ok(canonical),
            Ok(_) => Err(Error::NotFound),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound),
            Err(e) => {
                warn!(tool_id = %tool.id, error = %e, "content metadata read failed");
                Err(Error::Failed)
            },
        }
    }
}
