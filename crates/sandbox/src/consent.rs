//! Persisted consent records.
//!
//! Stores `tool id → consent` at `<data_dir>/consent.json` so a user's
//! decision survives restarts until they revoke it.

use std::{collections::BTreeMap, path::PathBuf};

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tokio::sync::RwLock,
    toolbay_service_traits::{ServiceError, ServiceResult, SettingsService},
    tracing::{debug, info, warn},
};

use crate::error::Result;

pub const CONSENT_FILE: &str = "consent.json";

/// One persisted decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub granted: bool,
    /// Unix seconds of the last change.
    pub updated_at: i64,
}

/// File-backed [`SettingsService`].
#[derive(Debug)]
pub struct JsonConsentStore {
    path: PathBuf,
    records: RwLock<BTreeMap<String, ConsentRecord>>,
}

impl JsonConsentStore {
    /// Open (or lazily create) the store in `data_dir`.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_path(data_dir.into().join(CONSENT_FILE)).await
    }

    /// Open a store at a specific file path.
    pub async fn with_path(path: PathBuf) -> Result<Self> {
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(records) => records,
                Err(e) => {
                    // A corrupt file must not silently grant anything.
                    warn!(path = %path.display(), error = %e, "consent file unreadable, starting empty");
                    BTreeMap::new()
                },
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "consent file not found");
                BTreeMap::new()
            },
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// All stored decisions, by tool id.
    pub async fn records(&self) -> BTreeMap<String, ConsentRecord> {
        self.records.read().await.clone()
    }

    async fn set(&self, tool_id: &str, granted: bool) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(
            tool_id.to_string(),
            ConsentRecord {
                granted,
                updated_at: chrono::Utc::now().timestamp(),
            },
        );
        let data = serde_json::to_string_pretty(&*records)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        info!(tool_id, granted, "consent updated");
        Ok(())
    }
}

#[async_trait]
impl SettingsService for JsonConsentStore {
    async fn has_consent(&self, tool_id: &str) -> bool {
        self.records
            .read()
            .await
            .get(tool_id)
            .is_some_and(|r| r.granted)
    }

    async fn grant_consent(&self, tool_id: &str) -> ServiceResult {
        self.set(tool_id, true).await.map_err(ServiceError::message)
    }

    async fn revoke_consent(&self, tool_id: &str) -> ServiceResult {
        self.set(tool_id, false).await.map_err(ServiceError::message)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consent_defaults_to_false() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonConsentStore::open(tmp.path()).await.unwrap();
        assert!(!store.has_consent("t1").await);
    }

    #[tokio::test]
    async fn consent_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonConsentStore::open(tmp.path().join("nested")).await.unwrap();
        store.grant_consent("t1").await.unwrap();
        store.grant_consent("t2").await.unwrap();
        store.revoke_consent("t2").await.unwrap();

        let reopened = JsonConsentStore::open(tmp.path().join("nested")).await.unwrap();
        assert!(reopened.has_consent("t1").await);
        assert!(!reopened.has_consent("t2").await);
        assert_eq!(reopened.records().await.len(), 2);
    }

    #[tokio::test]
    async fn corrupt_file_grants_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONSENT_FILE), "{not json").unwrap();
        let store = JsonConsentStore::open(tmp.path()).await.unwrap();
        assert!(!store.has_consent("t1").await);
    }
}
