//! The platform seam: isolated surfaces and the messages the host sends them.

use std::sync::Arc;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    toolbay_common::InstanceId,
};

use crate::{bridge::BridgeOperation, error::Result, geometry::Bounds};

/// How the platform should build a new surface.
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    pub instance_id: InstanceId,
    pub tool_id: String,
    /// The only host operations the surface may reach. Nothing else from
    /// the host is exposed to tool code.
    pub bridge: &'static [BridgeOperation],
}

/// One isolated rendering/script context.
///
/// Calls happen on the host coordinator; implementations forward them to
/// the platform's webview or child process.
pub trait Surface: Send + Sync {
    fn navigate(&self, url: &str) -> Result<()>;
    fn post_message(&self, message: &HostMessage) -> Result<()>;
    /// Hidden surfaces keep running; whether the platform throttles them is
    /// up to the implementation.
    fn set_visible(&self, visible: bool);
    fn set_bounds(&self, bounds: Bounds);
    /// Tear down the underlying rendering context. Called exactly once.
    fn destroy(&self);
}

#[async_trait]
pub trait SurfaceFactory: Send + Sync {
    async fn create(&self, config: SurfaceConfig) -> Result<Arc<dyn Surface>>;
}

/// Connection context pushed into a surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextPayload {
    pub tool_id: String,
    pub tool_name: String,
    pub version: String,
    pub connection_url: Option<String>,
    pub connection_id: String,
    pub secondary_connection_url: Option<String>,
    pub secondary_connection_id: Option<String>,
}

/// Host → surface messages, serialized as `{"type": …, "payload": …}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum HostMessage {
    Context(ContextPayload),
    ConnectionUpdated { id: String },
    /// Sent when geometry fell back to the full window so the tool
    /// re-measures its viewport.
    ViewportResized { width: u32, height: u32 },
}
