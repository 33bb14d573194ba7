//! Lexical path helpers shared by content resolution and access grants.

use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without touching the filesystem.
///
/// `..` never climbs above the root, so `/a/../../b` becomes `/b`.
#[must_use]
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {},
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            },
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Make `path` absolute against the current directory and normalize it.
pub fn absolute_normalized(path: &Path) -> std::io::Result<PathBuf> {
    Ok(normalize_lexical(&std::path::absolute(path)?))
}

/// Whether `path` lies strictly below `base`, compared component-wise.
#[must_use]
pub fn is_strict_descendant(path: &Path, base: &Path) -> bool {
    path != base && path.starts_with(base)
}

/// Resolve symlinks in an absolute, normalized `path` whose tail may not
/// exist yet.
///
/// The longest existing prefix is canonicalized and the missing components
/// are appended unchanged. A dangling link anywhere along the way is an
/// error, since writing through it would create its target.
pub async fn resolve_links(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        match tokio::fs::canonicalize(existing).await {
            Ok(resolved) => {
                return Ok(missing.iter().rev().fold(resolved, |acc, part| acc.join(part)));
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if tokio::fs::symlink_metadata(existing).await.is_ok() {
                    return Err(e);
                }
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(e);
                };
                missing.push(name);
                existing = parent;
            },
            Err(e) => return Err(e),
        }
    }
}
