//! Filesystem capability grants.
//!
//! A tool can only touch a path on disk after the user picked it (or one of
//! its ancestors) in a host-owned file or folder dialog. There is no API
//! through which a tool can name a path and have it granted: the only public
//! way to add a grant is [`FileAccessCapabilityStore::select_and_grant`],
//! which runs the platform picker and grants exactly what came back.

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
};

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tokio::sync::RwLock,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use toolbay_metrics::{access as access_metrics, counter};

use crate::{
    error::{Error, Result},
    paths::{absolute_normalized, resolve_links},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickKind {
    File,
    Folder,
}

/// What the tool asked the user to pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickRequest {
    pub kind: PickKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub multiple: bool,
}

/// Host-owned file/folder dialog.
#[async_trait]
pub trait FilePicker: Send + Sync {
    /// Show the dialog. `None` means the user cancelled.
    async fn pick(&self, request: &PickRequest) -> Option<Vec<PathBuf>>;
}

/// Per-tool sets of granted path prefixes.
#[derive(Debug, Default)]
pub struct FileAccessCapabilityStore {
    grants: RwLock<HashMap<String, BTreeSet<PathBuf>>>,
}

impl FileAccessCapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant. Crate-private: callers outside go through
    /// [`select_and_grant`](Self::select_and_grant).
    pub(crate) async fn grant(&self, tool_id: &str, path: &Path) -> Result<PathBuf> {
        let normalized = absolute_normalized(path)?;
        let added = self
            .grants
            .write()
            .await
            .entry(tool_id.to_string())
            .or_default()
            .insert(normalized.clone());
        if added {
            info!(tool_id, path = %normalized.display(), "filesystem access granted");
            #[cfg(feature = "metrics")]
            counter!(access_metrics::GRANTS_TOTAL).increment(1);
        }
        Ok(normalized)
    }

    /// Ask the user to pick files or a folder and grant whatever they chose.
    ///
    /// Returns the granted (normalized) paths; empty when the user cancelled.
    pub async fn select_and_grant(
        &self,
        tool_id: &str,
        picker: &dyn FilePicker,
        request: &PickRequest,
    ) -> Result<Vec<PathBuf>> {
        let Some(mut picked) = picker.pick(request).await else {
            debug!(tool_id, "selection cancelled");
            return Ok(Vec::new());
        };
        if !request.multiple {
            picked.truncate(1);
        }
        let mut granted = Vec::with_capacity(picked.len());
        for path in picked {
            granted.push(self.grant(tool_id, &path).await?);
        }
        Ok(granted)
    }

    /// Whether `target` is a granted path or lies below one.
    pub async fn can_access(&self, tool_id: &str, target: &Path) -> bool {
        let Ok(target) = absolute_normalized(target) else {
            return false;
        };
        self.covers(tool_id, &target).await
    }

    async fn covers(&self, tool_id: &str, target: &Path) -> bool {
        let grants = self.grants.read().await;
        grants
            .get(tool_id)
            .is_some_and(|set| set.iter().any(|granted| target.starts_with(granted)))
    }

    /// Like [`covers`](Self::covers), with symlinks resolved on both sides.
    async fn covers_resolved(&self, tool_id: &str, resolved: &Path) -> bool {
        let granted = self.grants_for(tool_id).await;
        for path in granted {
            if let Ok(base) = resolve_links(&path).await
                && resolved.starts_with(&base)
            {
                return true;
            }
        }
        false
    }

    /// Check access and hand back the link-resolved target for the caller to
    /// operate on, or `AccessDenied` with remediation guidance.
    ///
    /// The target must be covered both as written and after symlinks are
    /// resolved, so a link inside a granted folder cannot reach outside it.
    pub async fn validate_access(&self, tool_id: &str, target: &Path) -> Result<PathBuf> {
        let normalized = absolute_normalized(target).map_err(|_| Error::access_denied(target))?;
        if self.covers(tool_id, &normalized).await {
            match resolve_links(&normalized).await {
                Ok(resolved) if self.covers_resolved(tool_id, &resolved).await => {
                    return Ok(resolved);
                },
                Ok(resolved) => {
                    warn!(
                        tool_id,
                        path = %normalized.display(),
                        resolved = %resolved.display(),
                        "filesystem access escapes its grant through a link"
                    );
                },
                Err(e) => {
                    warn!(
                        tool_id,
                        path = %normalized.display(),
                        error = %e,
                        "filesystem path not resolvable"
                    );
                },
            }
        }
        warn!(tool_id, path = %normalized.display(), "filesystem access denied");
        #[cfg(feature = "metrics")]
        counter!(access_metrics::DENIED_TOTAL).increment(1);
        Err(Error::access_denied(&normalized))
    }

    /// Drop every grant held by `tool_id`. Returns how many were removed.
    pub async fn revoke_all(&self, tool_id: &str) -> usize {
        let removed = self
            .grants
            .write()
            .await
            .remove(tool_id)
            .map_or(0, |set| set.len());
        if removed > 0 {
            info!(tool_id, removed, "filesystem grants revoked");
        }
        removed
    }

    /// Current grants for `tool_id`, sorted.
    pub async fn grants_for(&self, tool_id: &str) -> Vec<PathBuf> {
        self.grants
            .read()
            .await
            .get(tool_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPicker(Option<Vec<PathBuf>>);

    #[async_trait]
    impl FilePicker for FixedPicker {
        async fn pick(&self, _request: &PickRequest) -> Option<Vec<PathBuf>> {
            self.0.clone()
        }
    }

    fn folder_request(multiple: bool) -> PickRequest {
        PickRequest {
            kind: PickKind::Folder,
            title: None,
            multiple,
        }
    }

    #[tokio::test]
    async fn nothing_is_accessible_before_a_grant() {
        let store = FileAccessCapabilityStore::new();
        assert!(!store.can_access("t1", Path::new("/home/u/notes.txt")).await);
        assert!(!store.can_access("t1", Path::new("/")).await);
    }

    #[tokio::test]
    async fn grant_covers_itself_and_descendants_only() {
        let store = FileAccessCapabilityStore::new();
        store.grant("t1", Path::new("/home/u/project")).await.unwrap();

        assert!(store.can_access("t1", Path::new("/home/u/project")).await);
        assert!(store.can_access("t1", Path::new("/home/u/project/src/main.rs")).await);
        assert!(!store.can_access("t1", Path::new("/home/u/project-old/a.txt")).await);
        assert!(!store.can_access("t1", Path::new("/home/u/other")).await);
        assert!(!store.can_access("t1", Path::new("/home/u")).await);
        assert!(!store.can_access("t1", Path::new("/home/u/project/../secrets")).await);
        assert!(!store.can_access("t2", Path::new("/home/u/project/a")).await);
    }

    #[tokio::test]
    async fn granting_twice_is_idempotent() {
        let store = FileAccessCapabilityStore::new();
        store.grant("t1", Path::new("/data/x")).await.unwrap();
        store.grant("t1", Path::new("/data/./x")).await.unwrap();
        assert_eq!(store.grants_for("t1").await, [PathBuf::from("/data/x")]);
    }

    #[tokio::test]
    async fn validate_access_explains_how_to_recover() {
        let store = FileAccessCapabilityStore::new();
        let err = store
            .validate_access("t1", Path::new("/etc/passwd"))
            .await
            .unwrap_err();
        let Error::AccessDenied { path, remediation } = &err else {
            panic!("expected AccessDenied, got {err:?}");
        };
        assert_eq!(path, Path::new("/etc/passwd"));
        assert!(remediation.contains("selectFile"));
    }

    #[tokio::test]
    async fn validate_access_allows_new_files_in_a_granted_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileAccessCapabilityStore::new();
        store.grant("t1", tmp.path()).await.unwrap();

        let target = tmp.path().join("sub/new.txt");
        let resolved = store.validate_access("t1", &target).await.unwrap();
        let base = std::fs::canonicalize(tmp.path()).unwrap();
        assert_eq!(resolved, base.join("sub/new.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn links_out_of_a_granted_folder_are_denied() {
        let granted = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
        std::fs::write(granted.path().join("ok.txt"), "ok").unwrap();
        std::os::unix::fs::symlink(outside.path(), granted.path().join("escape")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("missing.txt"),
            granted.path().join("dangling"),
        )
        .unwrap();

        let store = FileAccessCapabilityStore::new();
        store.grant("t1", granted.path()).await.unwrap();

        assert!(store.validate_access("t1", &granted.path().join("ok.txt")).await.is_ok());
        for name in ["escape/secret.txt", "escape/new.txt", "dangling"] {
            let err = store
                .validate_access("t1", &granted.path().join(name))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::AccessDenied { .. }), "{name}: {err:?}");
        }
    }

    #[tokio::test]
    async fn select_and_grant_grants_only_what_was_picked() {
        let store = FileAccessCapabilityStore::new();
        let picker = FixedPicker(Some(vec![
            PathBuf::from("/data/a"),
            PathBuf::from("/data/b"),
        ]));

        let granted = store
            .select_and_grant("t1", &picker, &folder_request(false))
            .await
            .unwrap();
        assert_eq!(granted, [PathBuf::from("/data/a")]);
        assert!(!store.can_access("t1", Path::new("/data/b")).await);

        store
            .select_and_grant("t1", &picker, &folder_request(true))
            .await
            .unwrap();
        assert!(store.can_access("t1", Path::new("/data/b/c")).await);
    }

    #[tokio::test]
    async fn cancelled_selection_grants_nothing() {
        let store = FileAccessCapabilityStore::new();
        let granted = store
            .select_and_grant("t1", &FixedPicker(None), &folder_request(true))
            .await
            .unwrap();
        assert!(granted.is_empty());
        assert!(store.grants_for("t1").await.is_empty());
    }

    #[tokio::test]
    async fn revoke_all_drops_every_grant() {
        let store = FileAccessCapabilityStore::new();
        store.grant("t1", Path::new("/data/a")).await.unwrap();
        store.grant("t1", Path::new("/data/b")).await.unwrap();
        assert_eq!(store.revoke_all("t1").await, 2);
        assert!(!store.can_access("t1", Path::new("/data/a")).await);
        assert_eq!(store.revoke_all("t1").await, 0);
    }
}
