//! Owned registry of live surfaces and the single active slot.

use std::{collections::HashMap, sync::Arc};

use {
    serde::{Deserialize, Serialize},
    tokio::sync::{Mutex, MutexGuard},
    toolbay_common::{InstanceId, Tool},
};

use crate::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceState {
    Launching,
    Active,
    Hidden,
}

/// Connection ids routed into an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionContext {
    pub primary_id: String,
    pub secondary_id: Option<String>,
}

pub(crate) struct Entry {
    pub tool: Tool,
    pub state: SurfaceState,
    /// `None` while launching.
    pub surface: Option<Arc<dyn Surface>>,
    pub connection: ConnectionContext,
    /// Set when `close` arrives mid-launch; the launch honours it once the
    /// surface exists.
    pub close_requested: bool,
}

#[derive(Default)]
pub(crate) struct RegistryState {
    pub entries: HashMap<InstanceId, Entry>,
    pub active: Option<InstanceId>,
}

/// All surfaces of the host window.
#[derive(Default)]
pub struct SurfaceRegistry {
    inner: Mutex<RegistryState>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.lock().await
    }

    /// The foreground surface, if any.
    pub async fn active_surface(&self) -> Option<(InstanceId, Arc<dyn Surface>)> {
        let state = self.inner.lock().await;
        let id = state.active.clone()?;
        let surface = state.entries.get(&id)?.surface.clone()?;
        Some((id, surface))
    }

    pub async fn active_instance(&self) -> Option<InstanceId> {
        self.inner.lock().await.active.clone()
    }

    pub async fn state(&self, id: &InstanceId) -> Option<SurfaceState> {
        self.inner.lock().await.entries.get(id).map(|e| e.state)
    }

    pub async fn connection(&self, id: &InstanceId) -> Option<ConnectionContext> {
        self.inner
            .lock()
            .await
            .entries
            .get(id)
            .map(|e| e.connection.clone())
    }

    /// The tool an instance runs, if it is live.
    pub async fn tool_of(&self, id: &InstanceId) -> Option<Tool> {
        self.inner
            .lock()
            .await
            .entries
            .get(id)
            .map(|e| e.tool.clone())
    }

    /// All live instance ids, sorted.
    pub async fn instances(&self) -> Vec<InstanceId> {
        let mut ids: Vec<_> = self.inner.lock().await.entries.keys().cloned().collect();
        ids.sort();
        ids
    }
}
