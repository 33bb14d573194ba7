use toolbay_common::InstanceId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The instance was never launched or has already been closed.
    #[error("unknown instance: {0}")]
    UnknownInstance(InstanceId),

    /// The instance is still being created.
    #[error("instance is still launching: {0}")]
    Launching(InstanceId),

    #[error("instance {instance} does not belong to tool {tool_id}")]
    InstanceToolMismatch {
        instance: InstanceId,
        tool_id: String,
    },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("unsupported bridge operation: {0}")]
    UnsupportedOperation(String),

    /// The platform failed to create or drive a surface.
    #[error("surface error: {0}")]
    Surface(String),

    #[error(transparent)]
    Sandbox(#[from] toolbay_sandbox::Error),

    #[error(transparent)]
    Service(#[from] toolbay_service_traits::ServiceError),

    #[error(transparent)]
    Common(#[from] toolbay_common::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn surface(message: impl std::fmt::Display) -> Self {
        Self::Surface(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
