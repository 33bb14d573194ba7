//! Launch, switch, update and close tool surfaces.
//!
//! Per instance: `UNCREATED → LAUNCHING → {ACTIVE | HIDDEN} → CLOSED`. At
//! most one surface is ACTIVE. The registry lock guards each transition but
//! is never held across an await on a collaborator (the factory, the
//! connection service, the grant store).

use std::sync::Arc;

use {
    toolbay_common::{InstanceId, Tool},
    toolbay_sandbox::{FileAccessCapabilityStore, VirtualContentServer},
    toolbay_service_traits::ConnectionService,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use toolbay_metrics::{counter, gauge, surfaces as surface_metrics};

use crate::{
    bridge::BridgeOperation,
    error::{Error, Result},
    geometry::{GeometrySynchronizer, GeometryTrigger},
    registry::{ConnectionContext, Entry, RegistryState, SurfaceRegistry, SurfaceState},
    surface::{ContextPayload, HostMessage, Surface, SurfaceConfig, SurfaceFactory},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// A new surface was created and brought to the front.
    Launched,
    /// The instance already had a surface; it was brought to the front.
    Switched,
    /// Another launch of the same instance is still in flight.
    AlreadyLaunching,
    /// `close` arrived while the surface was being created; it was torn
    /// down as soon as it existed.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    /// The instance is still launching. The launch will tear it down.
    Deferred,
    Unknown,
}

pub struct SurfaceLifecycleController {
    registry: Arc<SurfaceRegistry>,
    factory: Arc<dyn SurfaceFactory>,
    connections: Arc<dyn ConnectionService>,
    content: Arc<VirtualContentServer>,
    grants: Arc<FileAccessCapabilityStore>,
    geometry: Arc<GeometrySynchronizer>,
}

impl SurfaceLifecycleController {
    pub fn new(
        registry: Arc<SurfaceRegistry>,
        factory: Arc<dyn SurfaceFactory>,
        connections: Arc<dyn ConnectionService>,
        content: Arc<VirtualContentServer>,
        grants: Arc<FileAccessCapabilityStore>,
        geometry: Arc<GeometrySynchronizer>,
    ) -> Self {
        Self {
            registry,
            factory,
            connections,
            content,
            grants,
            geometry,
        }
    }

    pub fn registry(&self) -> &Arc<SurfaceRegistry> {
        &self.registry
    }

    /// Launch `tool` as `instance_id`, or bring it to the front if it is
    /// already running.
    pub async fn launch(
        &self,
        instance_id: &InstanceId,
        tool: &Tool,
        primary_connection_id: &str,
        secondary_connection_id: Option<&str>,
    ) -> Result<LaunchOutcome> {
        let connection = ConnectionContext {
            primary_id: primary_connection_id.to_string(),
            secondary_id: secondary_connection_id.map(str::to_string),
        };

        {
            let mut state = self.registry.lock().await;
            if let Some(entry) = state.entries.get(instance_id) {
                if entry.state == SurfaceState::Launching {
                    debug!(instance_id = %instance_id, "launch already in flight");
                    return Ok(LaunchOutcome::AlreadyLaunching);
                }
                drop(state);
                self.switch_to(instance_id).await?;
                return Ok(LaunchOutcome::Switched);
            }
            if !instance_id.belongs_to(&tool.id) {
                return Err(Error::InstanceToolMismatch {
                    instance: instance_id.clone(),
                    tool_id: tool.id.clone(),
                });
            }
            state.entries.insert(instance_id.clone(), Entry {
                tool: tool.clone(),
                state: SurfaceState::Launching,
                surface: None,
                connection: connection.clone(),
                close_requested: false,
            });
        }

        info!(instance_id = %instance_id, tool_id = %tool.id, "launching tool");
        let surface = match self.create_surface(instance_id, tool, &connection).await {
            Ok(surface) => surface,
            Err(e) => {
                self.registry.lock().await.entries.remove(instance_id);
                warn!(instance_id = %instance_id, error = %e, "tool launch failed");
                return Err(e);
            },
        };

        // Attach and activate under one lock so a racing `close` sees either
        // a launching entry (and defers) or an active one.
        let cancelled = {
            let mut state = self.registry.lock().await;
            match state.entries.get_mut(instance_id) {
                Some(entry) if !entry.close_requested => {
                    entry.surface = Some(Arc::clone(&surface));
                    activate(&mut state, instance_id)?;
                    None
                },
                _ => {
                    state.entries.remove(instance_id);
                    surface.destroy();
                    Some(last_instance_of(&state, &tool.id))
                },
            }
        };
        if let Some(last) = cancelled {
            info!(instance_id = %instance_id, "launch cancelled by close");
            if last {
                self.grants.revoke_all(&tool.id).await;
            }
            return Ok(LaunchOutcome::Cancelled);
        }

        #[cfg(feature = "metrics")]
        counter!(surface_metrics::LAUNCHES_TOTAL).increment(1);
        debug!(instance_id = %instance_id, "surface active");
        self.geometry.schedule(GeometryTrigger::SurfaceSwitch);
        self.record_resident().await;
        Ok(LaunchOutcome::Launched)
    }

    async fn create_surface(
        &self,
        instance_id: &InstanceId,
        tool: &Tool,
        connection: &ConnectionContext,
    ) -> Result<Arc<dyn Surface>> {
        let surface = self
            .factory
            .create(SurfaceConfig {
                instance_id: instance_id.clone(),
                tool_id: tool.id.clone(),
                bridge: BridgeOperation::ALL,
            })
            .await?;
        let context = context_payload(self.connections.as_ref(), tool, connection).await;
        let loaded = surface
            .navigate(&self.content.url_for(&tool.id, ""))
            .and_then(|()| surface.post_message(&HostMessage::Context(context)));
        if let Err(e) = loaded {
            surface.destroy();
            return Err(e);
        }
        Ok(surface)
    }

    /// Bring `instance_id` to the front, hiding whatever was there.
    pub async fn switch_to(&self, instance_id: &InstanceId) -> Result<()> {
        activate(&mut *self.registry.lock().await, instance_id)?;
        debug!(instance_id = %instance_id, "surface active");
        self.geometry.schedule(GeometryTrigger::SurfaceSwitch);
        Ok(())
    }

    /// Destroy the instance's surface and forget it.
    ///
    /// When the last instance of a tool closes, that tool's filesystem grants
    /// are revoked.
    pub async fn close(&self, instance_id: &InstanceId) -> CloseOutcome {
        let (tool_id, last) = {
            let mut state = self.registry.lock().await;
            match state.entries.get_mut(instance_id) {
                None => {
                    debug!(instance_id = %instance_id, "close for unknown instance");
                    return CloseOutcome::Unknown;
                },
                Some(entry) if entry.state == SurfaceState::Launching => {
                    entry.close_requested = true;
                    debug!(instance_id = %instance_id, "close deferred until launch settles");
                    return CloseOutcome::Deferred;
                },
                Some(_) => {},
            }

            if state.active.as_ref() == Some(instance_id) {
                state.active = None;
            }
            let Some(entry) = state.entries.remove(instance_id) else {
                return CloseOutcome::Unknown;
            };
            if let Some(surface) = &entry.surface {
                surface.destroy();
            }
            let last = last_instance_of(&state, &entry.tool.id);
            (entry.tool.id, last)
        };

        info!(instance_id = %instance_id, tool_id = %tool_id, "tool closed");
        #[cfg(feature = "metrics")]
        counter!(surface_metrics::CLOSES_TOTAL).increment(1);
        if last {
            self.grants.revoke_all(&tool_id).await;
        }
        self.record_resident().await;
        CloseOutcome::Closed
    }

    /// Re-point an instance at new connections. The fresh `context` is
    /// delivered before `connection-updated`.
    pub async fn update_connection(
        &self,
        instance_id: &InstanceId,
        primary_connection_id: &str,
        secondary_connection_id: Option<&str>,
    ) -> Result<()> {
        let connection = ConnectionContext {
            primary_id: primary_connection_id.to_string(),
            secondary_id: secondary_connection_id.map(str::to_string),
        };
        let (tool, surface) = {
            let mut state = self.registry.lock().await;
            let entry = state
                .entries
                .get_mut(instance_id)
                .ok_or_else(|| Error::UnknownInstance(instance_id.clone()))?;
            let Some(surface) = entry.surface.clone() else {
                return Err(Error::Launching(instance_id.clone()));
            };
            entry.connection = connection.clone();
            (entry.tool.clone(), surface)
        };

        let context = context_payload(self.connections.as_ref(), &tool, &connection).await;
        surface.post_message(&HostMessage::Context(context))?;
        surface.post_message(&HostMessage::ConnectionUpdated {
            id: connection.primary_id,
        })?;
        debug!(instance_id = %instance_id, "connection updated");
        Ok(())
    }

    /// Close every instance.
    pub async fn shutdown(&self) {
        let ids = self.registry.instances().await;
        info!(count = ids.len(), "closing all tool surfaces");
        for id in ids {
            self.close(&id).await;
        }
    }

    pub async fn state(&self, instance_id: &InstanceId) -> Option<SurfaceState> {
        self.registry.state(instance_id).await
    }

    pub async fn active_instance(&self) -> Option<InstanceId> {
        self.registry.active_instance().await
    }

    pub async fn instances(&self) -> Vec<InstanceId> {
        self.registry.instances().await
    }

    pub async fn connection(&self, instance_id: &InstanceId) -> Option<ConnectionContext> {
        self.registry.connection(instance_id).await
    }

    async fn record_resident(&self) {
        #[cfg(feature = "metrics")]
        {
            let resident = self
                .registry
                .lock()
                .await
                .entries
                .values()
                .filter(|e| e.surface.is_some())
                .count();
            gauge!(surface_metrics::RESIDENT).set(resident as f64);
        }
    }
}

/// Make `instance_id` the active surface, hiding the previous one.
fn activate(state: &mut RegistryState, instance_id: &InstanceId) -> Result<()> {
    let target = match state.entries.get(instance_id) {
        None => return Err(Error::UnknownInstance(instance_id.clone())),
        Some(Entry {
            surface: Some(surface),
            ..
        }) => Arc::clone(surface),
        Some(_) => return Err(Error::Launching(instance_id.clone())),
    };

    if let Some(previous) = state.active.take()
        && previous != *instance_id
        && let Some(entry) = state.entries.get_mut(&previous)
    {
        entry.state = SurfaceState::Hidden;
        if let Some(surface) = &entry.surface {
            surface.set_visible(false);
        }
        debug!(instance_id = %previous, "surface hidden");
    }

    state.active = Some(instance_id.clone());
    if let Some(entry) = state.entries.get_mut(instance_id) {
        entry.state = SurfaceState::Active;
    }
    target.set_visible(true);
    Ok(())
}

fn last_instance_of(state: &RegistryState, tool_id: &str) -> bool {
    !state.entries.values().any(|e| e.tool.id == tool_id)
}

/// Build the `context` message for `tool`, resolving connection URLs fresh.
pub(crate) async fn context_payload(
    connections: &dyn ConnectionService,
    tool: &Tool,
    connection: &ConnectionContext,
) -> ContextPayload {
    let primary_url = connection_url(connections, &connection.primary_id).await;
    let secondary_url = match &connection.secondary_id {
        Some(id) => connection_url(connections, id).await,
        None => None,
    };
    ContextPayload {
        tool_id: tool.id.clone(),
        tool_name: tool.name.clone(),
        version: tool.version.clone(),
        connection_url: primary_url,
        connection_id: connection.primary_id.clone(),
        secondary_connection_url: secondary_url,
        secondary_connection_id: connection.secondary_id.clone(),
    }
}

async fn connection_url(connections: &dyn ConnectionService, id: &str) -> Option<String> {
    match connections.get_connection_by_id(id).await {
        Ok(Some(connection)) => Some(connection.url),
        Ok(None) => {
            warn!(connection_id = id, "connection not found");
            None
        },
        Err(e) => {
            warn!(connection_id = id, error = %e, "connection lookup failed");
            None
        },
    }
}
