//! Composition root: wires the sandbox, lifecycle, geometry and bridge
//! together once at startup.

use std::sync::Arc;

use {
    toolbay_common::{InstanceId, Tool},
    toolbay_config::ToolbayConfig,
    toolbay_sandbox::{FileAccessCapabilityStore, FilePicker, VirtualContentServer},
    toolbay_service_traits::{ConnectionService, SettingsService, ToolCatalog},
    tracing::info,
};

use crate::{
    bridge::HostBridge,
    error::{Error, Result},
    geometry::{GeometrySynchronizer, GeometryTrigger, HostWindow},
    lifecycle::{LaunchOutcome, SurfaceLifecycleController},
    registry::SurfaceRegistry,
    surface::SurfaceFactory,
};

/// Services owned by other subsystems.
pub struct Collaborators {
    pub settings: Arc<dyn SettingsService>,
    pub connections: Arc<dyn ConnectionService>,
    pub catalog: Arc<dyn ToolCatalog>,
}

/// What the embedding platform supplies.
pub struct Platform {
    pub factory: Arc<dyn SurfaceFactory>,
    pub window: Arc<dyn HostWindow>,
    pub picker: Arc<dyn FilePicker>,
}

pub struct ToolHost {
    settings: Arc<dyn SettingsService>,
    catalog: Arc<dyn ToolCatalog>,
    content: Arc<VirtualContentServer>,
    grants: Arc<FileAccessCapabilityStore>,
    geometry: Arc<GeometrySynchronizer>,
    lifecycle: SurfaceLifecycleController,
    bridge: HostBridge,
}

impl ToolHost {
    pub fn new(config: &ToolbayConfig, collaborators: Collaborators, platform: Platform) -> Self {
        let Collaborators {
            settings,
            connections,
            catalog,
        } = collaborators;

        let content = Arc::new(VirtualContentServer::new(
            &config.content,
            Arc::clone(&catalog),
            Arc::clone(&settings),
        ));
        let grants = Arc::new(FileAccessCapabilityStore::new());
        let registry = Arc::new(SurfaceRegistry::new());
        let geometry = Arc::new(GeometrySynchronizer::new(
            Arc::clone(&registry),
            platform.window,
            &config.geometry,
        ));
        let lifecycle = SurfaceLifecycleController::new(
            Arc::clone(&registry),
            platform.factory,
            Arc::clone(&connections),
            Arc::clone(&content),
            Arc::clone(&grants),
            Arc::clone(&geometry),
        );
        let bridge = HostBridge::new(registry, Arc::clone(&grants), platform.picker, connections);

        Self {
            settings,
            catalog,
            content,
            grants,
            geometry,
            lifecycle,
            bridge,
        }
    }

    pub fn content(&self) -> &Arc<VirtualContentServer> {
        &self.content
    }

    pub fn lifecycle(&self) -> &SurfaceLifecycleController {
        &self.lifecycle
    }

    pub fn bridge(&self) -> &HostBridge {
        &self.bridge
    }

    pub fn grants(&self) -> &Arc<FileAccessCapabilityStore> {
        &self.grants
    }

    pub fn geometry(&self) -> &Arc<GeometrySynchronizer> {
        &self.geometry
    }

    async fn tool(&self, tool_id: &str) -> Result<Tool> {
        self.catalog
            .get_tool(tool_id)
            .await?
            .ok_or_else(|| Error::UnknownTool(tool_id.to_string()))
    }

    /// Start a fresh instance of `tool_id`.
    pub async fn launch_tool(
        &self,
        tool_id: &str,
        primary_connection_id: &str,
        secondary_connection_id: Option<&str>,
    ) -> Result<(InstanceId, LaunchOutcome)> {
        let tool = self.tool(tool_id).await?;
        let instance_id = InstanceId::generate(&tool.id)?;
        let outcome = self
            .lifecycle
            .launch(
                &instance_id,
                &tool,
                primary_connection_id,
                secondary_connection_id,
            )
            .await?;
        Ok((instance_id, outcome))
    }

    /// Launch (or re-focus) a specific instance id.
    pub async fn launch_instance(
        &self,
        instance_id: &InstanceId,
        primary_connection_id: &str,
        secondary_connection_id: Option<&str>,
    ) -> Result<LaunchOutcome> {
        let tool = match self.catalog.get_tool(instance_id.as_str()).await? {
            Some(tool) => tool,
            None => self.tool(instance_id.base_tool_id()).await?,
        };
        self.lifecycle
            .launch(
                instance_id,
                &tool,
                primary_connection_id,
                secondary_connection_id,
            )
            .await
    }

    pub async fn has_consent(&self, tool_id: &str) -> bool {
        self.settings.has_consent(tool_id).await
    }

    /// Record the user's consent. Takes effect on the tool's next document
    /// load, since policies are composed per load.
    pub async fn grant_consent(&self, tool_id: &str) -> Result<()> {
        self.settings.grant_consent(tool_id).await?;
        info!(tool_id, "consent granted");
        Ok(())
    }

    pub async fn revoke_consent(&self, tool_id: &str) -> Result<()> {
        self.settings.revoke_consent(tool_id).await?;
        info!(tool_id, "consent revoked");
        Ok(())
    }

    /// Close every instance of `tool_id` and drop its grants and consent,
    /// as when the tool is uninstalled.
    pub async fn forget_tool(&self, tool_id: &str) -> Result<()> {
        let registry = self.lifecycle.registry();
        for id in self.lifecycle.instances().await {
            if registry.tool_of(&id).await.is_some_and(|t| t.id == tool_id) {
                self.lifecycle.close(&id).await;
            }
        }
        self.grants.revoke_all(tool_id).await;
        self.settings.revoke_consent(tool_id).await?;
        info!(tool_id, "tool forgotten");
        Ok(())
    }

    /// Feed a host window event into geometry synchronization.
    pub fn on_window_event(&self, trigger: GeometryTrigger) {
        self.geometry.schedule(trigger);
    }

    pub async fn on_bounds_response(
        &self,
        request_id: u64,
        payload: Option<&serde_json::Value>,
    ) -> bool {
        self.geometry.on_bounds_response(request_id, payload).await
    }

    pub async fn shutdown(&self) {
        self.lifecycle.shutdown().await;
    }
}
