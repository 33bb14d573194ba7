//! Surface orchestration for tool instances.
//!
//! Every running tool instance lives in its own isolated surface (an
//! embedded webview or a separate process, supplied by the platform through
//! [`SurfaceFactory`]). This crate decides which surface is in front, keeps
//! its bounds in sync with the host window, feeds it connection context, and
//! answers the narrow set of bridge calls a surface may make.

pub mod bridge;
pub mod error;
pub mod geometry;
pub mod host;
pub mod lifecycle;
pub mod registry;
pub mod surface;

pub use {
    bridge::{BridgeOperation, BridgeRequest, BridgeResponse, HostBridge},
    error::{Error, Result},
    geometry::{
        Bounds, GeometrySynchronizer, GeometryTrigger, HostWindow, RawBounds, SyncOutcome,
        clamp_bounds,
    },
    host::{Collaborators, Platform, ToolHost},
    lifecycle::{CloseOutcome, LaunchOutcome, SurfaceLifecycleController},
    registry::{ConnectionContext, SurfaceRegistry, SurfaceState},
    surface::{ContextPayload, HostMessage, Surface, SurfaceConfig, SurfaceFactory},
};
