//! Collaborator interfaces the sandbox core consumes.
//!
//! Consent storage, connection storage and the tool catalog are owned by
//! other subsystems. Each trait has a `Noop` implementation so the host can
//! run standalone before those subsystems are wired in.

use {
    async_trait::async_trait,
    toolbay_common::{Connection, Tool},
    tracing::warn,
};

/// Error type returned by service methods.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{message}")]
    Message { message: String },
}

impl ServiceError {
    #[must_use]
    pub fn message(message: impl std::fmt::Display) -> Self {
        Self::Message {
            message: message.to_string(),
        }
    }
}

impl From<String> for ServiceError {
    fn from(value: String) -> Self {
        Self::message(value)
    }
}

impl From<&str> for ServiceError {
    fn from(value: &str) -> Self {
        Self::message(value)
    }
}

pub type ServiceResult<T = ()> = Result<T, ServiceError>;

// ── Settings (consent) ──────────────────────────────────────────────────────

/// User consent for a tool's declared policy relaxations.
///
/// Mutations only ever happen synchronously with an explicit user action.
#[async_trait]
pub trait SettingsService: Send + Sync {
    async fn has_consent(&self, tool_id: &str) -> bool;
    async fn grant_consent(&self, tool_id: &str) -> ServiceResult;
    async fn revoke_consent(&self, tool_id: &str) -> ServiceResult;
}

pub struct NoopSettingsService;

#[async_trait]
impl SettingsService for NoopSettingsService {
    async fn has_consent(&self, _tool_id: &str) -> bool {
        false
    }

    async fn grant_consent(&self, tool_id: &str) -> ServiceResult {
        warn!(tool_id, "consent grant ignored: settings service not configured");
        Err("settings service not configured".into())
    }

    async fn revoke_consent(&self, _tool_id: &str) -> ServiceResult {
        Ok(())
    }
}

// ── Connections ─────────────────────────────────────────────────────────────

#[async_trait]
pub trait ConnectionService: Send + Sync {
    async fn get_connection_by_id(&self, id: &str) -> ServiceResult<Option<Connection>>;
}

pub struct NoopConnectionService;

#[async_trait]
impl ConnectionService for NoopConnectionService {
    async fn get_connection_by_id(&self, _id: &str) -> ServiceResult<Option<Connection>> {
        Ok(None)
    }
}

// ── Tool catalog ────────────────────────────────────────────────────────────

#[async_trait]
pub trait ToolCatalog: Send + Sync {
    async fn get_all_tools(&self) -> ServiceResult<Vec<Tool>>;

    async fn get_tool(&self, id: &str) -> ServiceResult<Option<Tool>> {
        Ok(self.get_all_tools().await?.into_iter().find(|t| t.id == id))
    }
}

pub struct NoopToolCatalog;

#[async_trait]
impl ToolCatalog for NoopToolCatalog {
    async fn get_all_tools(&self) -> ServiceResult<Vec<Tool>> {
        Ok(Vec::new())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        std::{collections::BTreeMap, path::PathBuf},
        toolbay_common::AssetRootKind,
    };

    struct TwoTools;

    #[async_trait]
    impl ToolCatalog for TwoTools {
        async fn get_all_tools(&self) -> ServiceResult<Vec<Tool>> {
            Ok(["t1", "t2"]
                .into_iter()
                .map(|id| Tool {
                    id: id.into(),
                    name: id.to_uppercase(),
                    version: "1.0.0".into(),
                    asset_root: AssetRootKind::Local(PathBuf::from("/tools").join(id)),
                    asset_dir: "dist".into(),
                    policy_exceptions: BTreeMap::new(),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn get_tool_defaults_to_scanning_all_tools() {
        let catalog = TwoTools;
        assert_eq!(catalog.get_tool("t2").await.unwrap().unwrap().name, "T2");
        assert!(catalog.get_tool("t3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn noop_services_deny_by_default() {
        let settings = NoopSettingsService;
        assert!(!settings.has_consent("t1").await);
        assert!(settings.grant_consent("t1").await.is_err());
        assert!(
            NoopConnectionService
                .get_connection_by_id("c1")
                .await
                .unwrap()
                .is_none()
        );
        assert!(NoopToolCatalog.get_all_tools().await.unwrap().is_empty());
    }
}
