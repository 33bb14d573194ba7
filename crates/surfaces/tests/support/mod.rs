//! Recording fakes for the platform seams.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use {
    async_trait::async_trait,
    tokio::sync::{Notify, RwLock},
    toolbay_common::{AssetRootKind, Connection, InstanceId, Tool},
    toolbay_config::ToolbayConfig,
    toolbay_sandbox::{FilePicker, FsToolCatalog, PickRequest},
    toolbay_service_traits::{ConnectionService, ServiceResult, SettingsService},
    toolbay_surfaces::{
        Bounds, Collaborators, HostMessage, HostWindow, Platform, Surface, SurfaceConfig,
        SurfaceFactory, ToolHost,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Navigate(String),
    Message(HostMessage),
    Visible(bool),
    Bounds(Bounds),
    Destroyed,
}

#[derive(Default)]
pub struct RecordingSurface {
    events: Mutex<Vec<Event>>,
    fail_navigation: bool,
}

impl RecordingSurface {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn messages(&self) -> Vec<HostMessage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn is_destroyed(&self) -> bool {
        self.events().contains(&Event::Destroyed)
    }

    pub fn last_visibility(&self) -> Option<bool> {
        self.events().into_iter().rev().find_map(|e| match e {
            Event::Visible(v) => Some(v),
            _ => None,
        })
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Surface for RecordingSurface {
    fn navigate(&self, url: &str) -> toolbay_surfaces::Result<()> {
        self.push(Event::Navigate(url.to_string()));
        if self.fail_navigation {
            return Err(toolbay_surfaces::Error::surface("navigation refused"));
        }
        Ok(())
    }

    fn post_message(&self, message: &HostMessage) -> toolbay_surfaces::Result<()> {
        self.push(Event::Message(message.clone()));
        Ok(())
    }

    fn set_visible(&self, visible: bool) {
        self.push(Event::Visible(visible));
    }

    fn set_bounds(&self, bounds: Bounds) {
        self.push(Event::Bounds(bounds));
    }

    fn destroy(&self) {
        self.push(Event::Destroyed);
    }
}

/// Creates recording surfaces. When gated, each creation waits for
/// [`RecordingFactory::release`].
#[derive(Default)]
pub struct RecordingFactory {
    surfaces: Mutex<HashMap<InstanceId, Arc<RecordingSurface>>>,
    configs: Mutex<Vec<SurfaceConfig>>,
    created: AtomicUsize,
    gated: AtomicBool,
    gate: Notify,
    fail_navigation: AtomicBool,
}

impl RecordingFactory {
    pub fn gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Surfaces created from now on fail to navigate.
    pub fn fail_navigation(&self) {
        self.fail_navigation.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn surface(&self, id: &InstanceId) -> Arc<RecordingSurface> {
        Arc::clone(self.surfaces.lock().unwrap().get(id).expect("surface created"))
    }

    pub fn configs(&self) -> Vec<SurfaceConfig> {
        self.configs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SurfaceFactory for RecordingFactory {
    async fn create(&self, config: SurfaceConfig) -> toolbay_surfaces::Result<Arc<dyn Surface>> {
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        let surface = Arc::new(RecordingSurface {
            fail_navigation: self.fail_navigation.load(Ordering::SeqCst),
            ..Default::default()
        });
        self.surfaces
            .lock()
            .unwrap()
            .insert(config.instance_id.clone(), Arc::clone(&surface));
        self.configs.lock().unwrap().push(config);
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(surface)
    }
}

pub struct FakeWindow {
    size: (u32, u32),
    requests: Mutex<Vec<u64>>,
}

impl FakeWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<u64> {
        self.requests.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.requests.lock().unwrap().clear();
    }
}

impl HostWindow for FakeWindow {
    fn content_size(&self) -> (u32, u32) {
        self.size
    }

    fn request_bounds(&self, request_id: u64) {
        self.requests.lock().unwrap().push(request_id);
    }
}

pub struct FixedPicker(pub Mutex<Option<Vec<PathBuf>>>);

impl FixedPicker {
    pub fn cancelled() -> Self {
        Self(Mutex::new(None))
    }

    pub fn set(&self, paths: Vec<PathBuf>) {
        *self.0.lock().unwrap() = Some(paths);
    }
}

#[async_trait]
impl FilePicker for FixedPicker {
    async fn pick(&self, _request: &PickRequest) -> Option<Vec<PathBuf>> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct MapConnections(pub HashMap<String, String>);

#[async_trait]
impl ConnectionService for MapConnections {
    async fn get_connection_by_id(&self, id: &str) -> ServiceResult<Option<Connection>> {
        Ok(self.0.get(id).map(|url| Connection {
            id: id.to_string(),
            url: url.clone(),
        }))
    }
}

#[derive(Default)]
pub struct MemorySettings(RwLock<HashMap<String, bool>>);

#[async_trait]
impl SettingsService for MemorySettings {
    async fn has_consent(&self, tool_id: &str) -> bool {
        self.0.read().await.get(tool_id).copied().unwrap_or(false)
    }

    async fn grant_consent(&self, tool_id: &str) -> ServiceResult {
        self.0.write().await.insert(tool_id.to_string(), true);
        Ok(())
    }

    async fn revoke_consent(&self, tool_id: &str) -> ServiceResult {
        self.0.write().await.insert(tool_id.to_string(), false);
        Ok(())
    }
}

pub fn tool(id: &str) -> Tool {
    Tool {
        id: id.to_string(),
        name: id.to_uppercase(),
        version: "1.0.0".into(),
        asset_root: AssetRootKind::Local(PathBuf::from("/opt/tools").join(id)),
        asset_dir: "dist".into(),
        policy_exceptions: BTreeMap::new(),
    }
}

pub fn instance(id: &str) -> InstanceId {
    InstanceId::new(id).unwrap()
}

pub struct Harness {
    pub host: ToolHost,
    pub factory: Arc<RecordingFactory>,
    pub window: Arc<FakeWindow>,
    pub picker: Arc<FixedPicker>,
    pub settings: Arc<MemorySettings>,
}

pub fn harness() -> Harness {
    let connections = MapConnections(HashMap::from([
        ("c1".to_string(), "postgres://one".to_string()),
        ("c2".to_string(), "postgres://two".to_string()),
    ]));
    let factory = Arc::new(RecordingFactory::default());
    let window = Arc::new(FakeWindow::new(1000, 800));
    let picker = Arc::new(FixedPicker::cancelled());
    let settings = Arc::new(MemorySettings::default());
    let host = ToolHost::new(
        &ToolbayConfig::default(),
        Collaborators {
            settings: Arc::clone(&settings) as Arc<dyn SettingsService>,
            connections: Arc::new(connections),
            catalog: Arc::new(FsToolCatalog::from_tools(vec![
                tool("t1"),
                tool("t2"),
                tool("viewer-2-pro"),
            ])),
        },
        Platform {
            factory: Arc::clone(&factory) as Arc<dyn SurfaceFactory>,
            window: Arc::clone(&window) as Arc<dyn HostWindow>,
            picker: Arc::clone(&picker) as Arc<dyn FilePicker>,
        },
    );
    Harness {
        host,
        factory,
        window,
        picker,
        settings,
    }
}
