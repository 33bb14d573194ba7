//! The only host operations a tool surface can reach.
//!
//! Requests arrive as JSON `{"op": "...", ...}`. Unknown operations are
//! rejected before any deserialization of their arguments, and every file
//! operation is checked against the tool's capability grants.

use std::{path::PathBuf, sync::Arc};

use {
    serde::{Deserialize, Serialize},
    toolbay_common::InstanceId,
    toolbay_sandbox::{FileAccessCapabilityStore, FilePicker, PickKind, PickRequest},
    toolbay_service_traits::ConnectionService,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use toolbay_metrics::{bridge as bridge_metrics, counter, histogram, labels};

use crate::{
    error::{Error, Result},
    lifecycle::context_payload,
    registry::SurfaceRegistry,
    surface::ContextPayload,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BridgeOperation {
    GetContext,
    SelectFile,
    SelectFolder,
    ReadFile,
    WriteFile,
    ListDirectory,
}

impl BridgeOperation {
    pub const ALL: &'static [Self] = &[
        Self::GetContext,
        Self::SelectFile,
        Self::SelectFolder,
        Self::ReadFile,
        Self::WriteFile,
        Self::ListDirectory,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::GetContext => "getContext",
            Self::SelectFile => "selectFile",
            Self::SelectFolder => "selectFolder",
            Self::ReadFile => "readFile",
            Self::WriteFile => "writeFile",
            Self::ListDirectory => "listDirectory",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeRequest {
    GetContext,
    SelectFile {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        multiple: bool,
    },
    SelectFolder {
        #[serde(default)]
        title: Option<String>,
    },
    ReadFile {
        path: PathBuf,
    },
    WriteFile {
        path: PathBuf,
        contents: String,
    },
    ListDirectory {
        path: PathBuf,
    },
}

impl BridgeRequest {
    #[must_use]
    pub fn operation(&self) -> BridgeOperation {
        match self {
            Self::GetContext => BridgeOperation::GetContext,
            Self::SelectFile { .. } => BridgeOperation::SelectFile,
            Self::SelectFolder { .. } => BridgeOperation::SelectFolder,
            Self::ReadFile { .. } => BridgeOperation::ReadFile,
            Self::WriteFile { .. } => BridgeOperation::WriteFile,
            Self::ListDirectory { .. } => BridgeOperation::ListDirectory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub is_dir: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeResponse {
    Context {
        context: ContextPayload,
    },
    /// Paths the user picked; empty when the dialog was cancelled.
    Selection {
        paths: Vec<PathBuf>,
    },
    FileContents {
        contents: String,
    },
    Written {
        bytes: usize,
    },
    Directory {
        entries: Vec<DirectoryEntry>,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remediation: Option<String>,
    },
}

impl BridgeResponse {
    fn from_error(error: &Error) -> Self {
        let remediation = match error {
            Error::Sandbox(toolbay_sandbox::Error::AccessDenied { remediation, .. }) => {
                Some((*remediation).to_string())
            },
            _ => None,
        };
        Self::Error {
            message: error.to_string(),
            remediation,
        }
    }
}

/// Answers bridge calls from tool surfaces on behalf of the host.
pub struct HostBridge {
    registry: Arc<SurfaceRegistry>,
    grants: Arc<FileAccessCapabilityStore>,
    picker: Arc<dyn FilePicker>,
    connections: Arc<dyn ConnectionService>,
}

impl HostBridge {
    pub fn new(
        registry: Arc<SurfaceRegistry>,
        grants: Arc<FileAccessCapabilityStore>,
        picker: Arc<dyn FilePicker>,
        connections: Arc<dyn ConnectionService>,
    ) -> Self {
        Self {
            registry,
            grants,
            picker,
            connections,
        }
    }

    /// Handle a raw JSON request and always produce a JSON response.
    pub async fn handle_json(&self, instance_id: &InstanceId, request: &str) -> String {
        let response = match parse_request(request) {
            Ok(request) => self.handle(instance_id, request).await,
            Err(e) => Err(e),
        };
        let response = response.unwrap_or_else(|e| {
            debug!(instance_id = %instance_id, error = %e, "bridge request failed");
            BridgeResponse::from_error(&e)
        });
        serde_json::to_string(&response).unwrap_or_else(|e| {
            warn!(error = %e, "failed to serialize bridge response");
            r#"{"kind":"error","message":"internal error"}"#.to_string()
        })
    }

    pub async fn handle(
        &self,
        instance_id: &InstanceId,
        request: BridgeRequest,
    ) -> Result<BridgeResponse> {
        #[cfg(feature = "metrics")]
        let (operation, start) = (request.operation().name(), std::time::Instant::now());

        let result = self.dispatch(instance_id, request).await;

        #[cfg(feature = "metrics")]
        {
            let status = if result.is_ok() { "ok" } else { "error" };
            counter!(
                bridge_metrics::CALLS_TOTAL,
                labels::OPERATION => operation,
                labels::STATUS => status
            )
            .increment(1);
            histogram!(bridge_metrics::CALL_DURATION_SECONDS, labels::OPERATION => operation)
                .record(start.elapsed().as_secs_f64());
        }
        result
    }

    async fn dispatch(
        &self,
        instance_id: &InstanceId,
        request: BridgeRequest,
    ) -> Result<BridgeResponse> {
        let tool = self
            .registry
            .tool_of(instance_id)
            .await
            .ok_or_else(|| Error::UnknownInstance(instance_id.clone()))?;
        let tool_id = tool.id.as_str();
        debug!(instance_id = %instance_id, tool_id, op = request.operation().name(), "bridge call");

        match request {
            BridgeRequest::GetContext => {
                let connection = self
                    .registry
                    .connection(instance_id)
                    .await
                    .ok_or_else(|| Error::UnknownInstance(instance_id.clone()))?;
                let context = context_payload(self.connections.as_ref(), &tool, &connection).await;
                Ok(BridgeResponse::Context { context })
            },
            BridgeRequest::SelectFile { title, multiple } => {
                self.select(tool_id, PickKind::File, title, multiple).await
            },
            BridgeRequest::SelectFolder { title } => {
                self.select(tool_id, PickKind::Folder, title, false).await
            },
            BridgeRequest::ReadFile { path } => {
                let path = self.checked(tool_id, &path).await?;
                let contents = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| io_failure(tool_id, "readFile", &e))?;
                Ok(BridgeResponse::FileContents { contents })
            },
            BridgeRequest::WriteFile { path, contents } => {
                let path = self.checked(tool_id, &path).await?;
                let bytes = contents.len();
                tokio::fs::write(&path, contents)
                    .await
                    .map_err(|e| io_failure(tool_id, "writeFile", &e))?;
                Ok(BridgeResponse::Written { bytes })
            },
            BridgeRequest::ListDirectory { path } => {
                let path = self.checked(tool_id, &path).await?;
                let entries = list_directory(&path)
                    .await
                    .map_err(|e| io_failure(tool_id, "listDirectory", &e))?;
                Ok(BridgeResponse::Directory { entries })
            },
        }
    }

    async fn select(
        &self,
        tool_id: &str,
        kind: PickKind,
        title: Option<String>,
        multiple: bool,
    ) -> Result<BridgeResponse> {
        let request = PickRequest {
            kind,
            title,
            multiple,
        };
        let paths = self
            .grants
            .select_and_grant(tool_id, self.picker.as_ref(), &request)
            .await?;
        Ok(BridgeResponse::Selection { paths })
    }

    async fn checked(&self, tool_id: &str, path: &std::path::Path) -> Result<PathBuf> {
        // Relative paths would resolve against the host's working directory.
        if !path.is_absolute() {
            return Err(toolbay_sandbox::Error::access_denied(path).into());
        }
        Ok(self.grants.validate_access(tool_id, path).await?)
    }
}

fn parse_request(raw: &str) -> Result<BridgeRequest> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let op = value.get("op").and_then(|v| v.as_str()).unwrap_or_default();
    if BridgeOperation::from_name(op).is_none() {
        return Err(Error::UnsupportedOperation(op.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

fn io_failure(tool_id: &str, op: &str, error: &std::io::Error) -> Error {
    warn!(tool_id, op, error = %error, "bridge file operation failed");
    toolbay_sandbox::Error::Failed.into()
}

async fn list_directory(path: &std::path::Path) -> std::io::Result<Vec<DirectoryEntry>> {
    let mut dir = tokio::fs::read_dir(path).await?;
    let mut entries = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        entries.push(DirectoryEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: entry.file_type().await?.is_dir(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
