//! Factory functions for test data.
//!
//! A procedural pickup truck in two levels of detail, a replacement wheel
//! set, an in-memory asset source and ready-made sessions. Geometry is laid
//! out so the tire tops sit 0.3 in below the body panel: the default 0.25 in
//! clearance holds at rest and one 0.25 in step down collides.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use glam::Vec3;
use tokio::sync::watch;

use shared::DEFAULT_PAINT_COLOR;

use crate::assets::AssetSource;
use crate::config::{AssetSettings, Settings};
use crate::error::LoadError;
use crate::export::glb::build_glb;
use crate::scene::material::{Color, Material};
use crate::scene::mesh::cuboid;
use crate::scene::{Node, NodeId, SceneGraph};
use crate::session::Session;
use crate::state::ConfigurationState;
use crate::storage::{MemoryStore, ObjectStore};

pub const LOW_DETAIL_URL: &str = "/models/RC/Truck.glb";
pub const HIGH_DETAIL_URL: &str = "/models/RC/High/Truck.glb";
/// Node present only in the high-detail truck
pub const HIGH_DETAIL_MARKER: &str = "Body_Trim";
pub const WHEEL_PART: &str = "Wheel_2";
pub const BUMPER_PART: &str = "Bumper_2";

/// Bottom of the body panel, in meters
pub const BODY_BOTTOM: f32 = 1.0;
/// Gap between tire tops and the body panel at rest (0.3 in)
pub const TIRE_GAP: f32 = 0.3 / 39.37;

const TIRE_CORNERS: [(&str, f32, f32); 4] = [
    ("FL", 0.7, 1.3),
    ("FR", -0.7, 1.3),
    ("RL", 0.7, -1.3),
    ("RR", -0.7, -1.3),
];

fn paint() -> Material {
    Color::from_hex(DEFAULT_PAINT_COLOR)
        .map(|c| Material::named("Paint", c))
        .unwrap_or_default()
}

fn rubber() -> Material {
    let mut m = Material::named("Rubber", Color::new(0.02, 0.02, 0.02));
    m.roughness = 0.9;
    m
}

fn chrome() -> Material {
    let mut m = Material::named("Chrome", Color::new(0.8, 0.8, 0.8));
    m.metallic = 1.0;
    m.roughness = 0.2;
    m
}

fn tire(width: f32, x: f32, z: f32) -> Arc<crate::scene::mesh::Geometry> {
    let top = BODY_BOTTOM - TIRE_GAP;
    Arc::new(cuboid(width, 0.6, 0.6, Vec3::new(x, top - 0.3, z)))
}

// ── Scenes ──────────────────────────────────────────────────────

/// The truck model. `high_detail` adds `Body_Trim` under the body.
pub fn truck_graph(high_detail: bool) -> (SceneGraph, NodeId) {
    let mut g = SceneGraph::new();
    let root = g.add(Node::group("Truck"), None);

    let body = g.add(Node::group("TruckBody"), Some(root));
    g.add(
        Node::mesh(
            "Body_Panel",
            Arc::new(cuboid(2.0, 0.2, 4.0, Vec3::new(0.0, BODY_BOTTOM + 0.1, 0.0))),
            paint(),
        ),
        Some(body),
    );
    g.add(
        Node::mesh(
            "Body_Cab",
            Arc::new(cuboid(1.8, 0.8, 1.6, Vec3::new(0.0, BODY_BOTTOM + 0.6, -0.5))),
            paint(),
        ),
        Some(body),
    );
    if high_detail {
        g.add(
            Node::mesh(
                HIGH_DETAIL_MARKER,
                Arc::new(cuboid(2.02, 0.05, 4.02, Vec3::new(0.0, BODY_BOTTOM + 0.225, 0.0))),
                paint(),
            ),
            Some(body),
        );
    }

    let wheels = g.add(Node::group("Wheels_&_Tires"), Some(root));
    for (corner, x, z) in TIRE_CORNERS {
        g.add(
            Node::mesh(format!("Wheels_&_Tires_{corner}"), tire(0.3, x, z), rubber()),
            Some(wheels),
        );
    }

    g.add(
        Node::mesh(
            "Bumper_Front",
            Arc::new(cuboid(2.0, 0.3, 0.2, Vec3::new(0.0, 0.8, 2.1))),
            chrome(),
        ),
        Some(root),
    );

    (g, root)
}

/// The replacement wheel set: same tire tops, wider tread.
pub fn wheel_part_graph() -> (SceneGraph, NodeId) {
    let mut g = SceneGraph::new();
    let root = g.add(Node::group(WHEEL_PART), None);
    for (corner, x, z) in TIRE_CORNERS {
        g.add(Node::mesh(format!("Rim_{corner}"), tire(0.36, x, z), chrome()), Some(root));
    }
    (g, root)
}

pub fn bumper_part_graph() -> (SceneGraph, NodeId) {
    let mut g = SceneGraph::new();
    let root = g.add(Node::group(BUMPER_PART), None);
    g.add(
        Node::mesh(
            "Steel_Bumper",
            Arc::new(cuboid(2.1, 0.35, 0.3, Vec3::new(0.0, 0.8, 2.15))),
            rubber(),
        ),
        Some(root),
    );
    (g, root)
}

fn to_glb((graph, root): (SceneGraph, NodeId)) -> Vec<u8> {
    build_glb(&graph, root).unwrap_or_default()
}

pub fn truck_glb(high_detail: bool) -> Vec<u8> {
    to_glb(truck_graph(high_detail))
}

pub fn wheel_part_glb() -> Vec<u8> {
    to_glb(wheel_part_graph())
}

pub fn bumper_part_glb() -> Vec<u8> {
    to_glb(bumper_part_graph())
}

/// Factory-default state with the low-detail truck in the world.
pub fn loaded_state() -> ConfigurationState {
    let mut state = ConfigurationState::new(DEFAULT_PAINT_COLOR);
    let (graph, root) = truck_graph(false);
    let world_root = state.world_root();
    let handle = state.world.graft(&graph, root, Some(world_root));
    state.set_scene_handle(handle, false);
    state
}

// ── Asset source ────────────────────────────────────────────────

/// Serves assets from memory by URL; unknown URLs are "not found".
#[derive(Debug, Default, Clone)]
pub struct MemoryAssetSource {
    assets: HashMap<String, Vec<u8>>,
    fetches: Arc<AtomicUsize>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.assets.insert(url.to_string(), bytes);
        self
    }

    /// Shared counter of `fetch` calls
    pub fn fetch_counter(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }
}

#[async_trait]
impl AssetSource for MemoryAssetSource {
    async fn fetch(
        &self,
        url: &str,
        progress: Option<&watch::Sender<f32>>,
    ) -> Result<Vec<u8>, LoadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let bytes = self
            .assets
            .get(url)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(url.to_string()))?;
        if let Some(tx) = progress {
            tx.send_replace(50.0);
            tx.send_replace(100.0);
        }
        Ok(bytes)
    }
}

/// Both truck variants plus the wheel and bumper parts at their default URLs
pub fn truck_source() -> MemoryAssetSource {
    let urls = AssetSettings::default();
    MemoryAssetSource::new()
        .with(LOW_DETAIL_URL, truck_glb(false))
        .with(HIGH_DETAIL_URL, truck_glb(true))
        .with(&urls.part_url(WHEEL_PART), wheel_part_glb())
        .with(&urls.part_url(BUMPER_PART), bumper_part_glb())
}

// ── Sessions ────────────────────────────────────────────────────

/// Session over `truck_source()` and the given store, model not yet loaded
pub fn session_with_store(store: Arc<dyn ObjectStore>) -> Session {
    Session::new(Settings::default(), Arc::new(truck_source()), store)
}

/// Session with the low-detail truck loaded and an in-memory store
pub async fn loaded_session() -> (Session, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let mut session = session_with_store(store.clone());
    if let Err(e) = session.load_model().await {
        tracing::error!("Fixture truck failed to load: {}", e);
    }
    (session, store)
}
