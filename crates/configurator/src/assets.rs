//! Scene asset loading
//!
//! Loads the low-detail base model first, then swaps in the high-detail
//! model in the background without losing part replacements or hidden
//! originals.

use std::sync::Arc;

use async_trait::async_trait;
use glam::Vec3;
use reqwest::StatusCode;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::AssetSettings;
use crate::error::LoadError;
use crate::scene::import::import_glb;
use crate::scene::material::{Color, Material};
use crate::scene::mesh::plane;
use crate::scene::{Node, NodeId, SceneGraph, Transform};
use crate::state::{ConfigurationState, HiddenNode};

/// Name of the shadow catcher placed under the loaded model
pub const SHADOW_PLANE: &str = "ShadowPlane";

/// Shadow plane extent relative to the model footprint
const SHADOW_SCALE: f32 = 1.5;

/// Upper bound on the buffer reserved from a server-supplied `Content-Length`
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Where asset bytes come from
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch the whole asset. When `progress` is given, percentages in
    /// `0..=100` are published as bytes arrive.
    async fn fetch(
        &self,
        url: &str,
        progress: Option<&watch::Sender<f32>>,
    ) -> Result<Vec<u8>, LoadError>;
}

// ── HTTP ─────────────────────────────────────────────────────

/// Fetches assets over HTTP(S)
#[derive(Debug, Clone, Default)]
pub struct HttpAssetSource {
    client: reqwest::Client,
}

impl HttpAssetSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch(
        &self,
        url: &str,
        progress: Option<&watch::Sender<f32>>,
    ) -> Result<Vec<u8>, LoadError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LoadError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(LoadError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length().filter(|t| *t > 0);
        let mut body = Vec::with_capacity(initial_capacity(total));
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if let (Some(tx), Some(total)) = (progress, total) {
                tx.send_replace((body.len() as f32 / total as f32 * 100.0).min(100.0));
            }
        }
        if let Some(tx) = progress {
            tx.send_replace(100.0);
        }

        tracing::debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }
}

fn initial_capacity(content_length: Option<u64>) -> usize {
    content_length.unwrap_or(0).min(MAX_PREALLOC) as usize
}

// ── Manager ──────────────────────────────────────────────────

/// An imported standalone graph and its root
pub type Imported = Result<(SceneGraph, NodeId), LoadError>;

type Upgrade = JoinHandle<Imported>;

/// Low-detail fetch handed out by `begin_load`. Runs without touching the
/// configuration state, so callers can await it outside their own locks.
pub struct BaseFetch {
    source: Arc<dyn AssetSource>,
    url: String,
    progress: Arc<watch::Sender<f32>>,
}

impl BaseFetch {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download and import the base model.
    pub async fn run(self) -> Imported {
        let bytes = self.source.fetch(&self.url, Some(&*self.progress)).await?;
        tokio::task::spawn_blocking(move || import_glb(&bytes))
            .await
            .map_err(|e| LoadError::Aborted(e.to_string()))?
    }
}

/// Owns asset loading for one configuration session
pub struct SceneAssetManager {
    source: Arc<dyn AssetSource>,
    urls: AssetSettings,
    progress: Arc<watch::Sender<f32>>,
    upgrade: Option<Upgrade>,
}

impl SceneAssetManager {
    pub fn new(source: Arc<dyn AssetSource>, urls: AssetSettings) -> Self {
        let (progress, _) = watch::channel(0.0);
        Self {
            source,
            urls,
            progress: Arc::new(progress),
            upgrade: None,
        }
    }

    pub fn source(&self) -> Arc<dyn AssetSource> {
        self.source.clone()
    }

    pub fn settings(&self) -> &AssetSettings {
        &self.urls
    }

    /// Progress of the low-detail load, `0..=100`
    pub fn subscribe(&self) -> watch::Receiver<f32> {
        self.progress.subscribe()
    }

    /// Load the low-detail model into the world and start the high-detail
    /// fetch in the background.
    pub async fn load(&mut self, state: &mut ConfigurationState) -> Result<NodeId, LoadError> {
        let fetch = self.begin_load(state);
        let imported = fetch.run().await;
        self.finish_load(state, imported)
    }

    /// Mark the state loading and hand out the base model fetch. The current
    /// model stays visible until `finish_load`.
    pub fn begin_load(&mut self, state: &mut ConfigurationState) -> BaseFetch {
        self.cancel_upgrade();
        state.is_loading = true;
        state.load_progress = 0.0;
        self.progress.send_replace(0.0);

        let url = self.urls.resolve(&self.urls.low_detail_url);
        tracing::info!("Loading base model: {}", url);
        BaseFetch {
            source: self.source.clone(),
            url,
            progress: self.progress.clone(),
        }
    }

    /// Install a fetched base model in place of the current one.
    ///
    /// On failure the previous model is unloaded as well: the scene handle is
    /// empty and the loading flags are cleared.
    pub fn finish_load(
        &mut self,
        state: &mut ConfigurationState,
        imported: Imported,
    ) -> Result<NodeId, LoadError> {
        self.unload(state);
        state.is_loading = false;

        let (graph, root) = match imported {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Base model load failed: {}", e);
                state.load_progress = 0.0;
                self.progress.send_replace(0.0);
                return Err(e);
            }
        };

        let world_root = state.world_root();
        let Some(handle) = state.world.graft(&graph, root, Some(world_root)) else {
            state.load_progress = 0.0;
            self.progress.send_replace(0.0);
            return Err(LoadError::Parse("asset root missing".into()));
        };
        place_shadow_plane(state, handle);
        state.set_scene_handle(Some(handle), false);

        state.load_progress = 100.0;
        self.progress.send_replace(100.0);
        tracing::info!("Base model ready ({} nodes)", graph.len());

        self.spawn_upgrade();
        Ok(handle)
    }

    fn spawn_upgrade(&mut self) {
        let source = self.source.clone();
        let url = self.urls.resolve(&self.urls.high_detail_url);
        self.upgrade = Some(tokio::spawn(async move {
            let bytes = source.fetch(&url, None).await?;
            tokio::task::spawn_blocking(move || import_glb(&bytes))
                .await
                .map_err(|e| LoadError::Aborted(e.to_string()))?
        }));
    }

    /// Drop the current model, its replacements and the shadow plane.
    fn unload(&mut self, state: &mut ConfigurationState) {
        if let Some(old) = state.scene_handle() {
            state.world.remove_subtree(old);
        }
        for r in state.take_replaced_all() {
            state.world.remove_subtree(r.id);
        }
        state.replace_hidden(Vec::new());
        if let Some(shadow) = state.world.find_by_name(state.world_root(), SHADOW_PLANE) {
            state.world.remove_subtree(shadow);
        }
        state.set_scene_handle(None, false);
    }

    /// True once the background high-detail load has finished (either way).
    pub fn upgrade_ready(&self) -> bool {
        self.upgrade.as_ref().is_some_and(|h| h.is_finished())
    }

    pub fn upgrade_pending(&self) -> bool {
        self.upgrade.is_some()
    }

    pub fn cancel_upgrade(&mut self) {
        if let Some(h) = self.upgrade.take() {
            h.abort();
        }
    }

    /// Wait for the high-detail model and swap it in.
    ///
    /// Returns `Ok(true)` if the swap happened. Hidden originals are matched
    /// in the new model by name and kind; replacement subtrees are
    /// re-parented onto the new root. A failed upgrade leaves the
    /// low-detail model in place.
    pub async fn finish_upgrade(
        &mut self,
        state: &mut ConfigurationState,
    ) -> Result<bool, LoadError> {
        let Some(task) = self.upgrade.take() else {
            return Ok(false);
        };
        let joined = task
            .await
            .map_err(|e| LoadError::Aborted(e.to_string()))
            .and_then(|r| r);
        let (graph, root) = match joined {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("High-detail model unavailable, keeping low detail: {}", e);
                return Err(e);
            }
        };

        let Some(old_root) = state.scene_handle() else {
            return Ok(false);
        };
        if state.is_high_detail() {
            return Ok(false);
        }

        let new_root = state
            .world
            .graft(&graph, root, None)
            .ok_or_else(|| LoadError::Parse("asset root missing".into()))?;
        if let Some(old) = state.world.get(old_root).map(|n| n.transform) {
            if let Some(n) = state.world.get_mut(new_root) {
                n.transform = old;
            }
        }

        let remapped = remap_hidden(state, new_root);

        let replaced: Vec<NodeId> = state.replaced_nodes().iter().map(|r| r.id).collect();
        for id in replaced {
            state.world.attach(id, new_root);
        }

        let world_root = state.world_root();
        state.world.attach(new_root, world_root);
        state.world.remove_subtree(old_root);
        state.replace_hidden(remapped);
        state.set_scene_handle(Some(new_root), true);

        tracing::info!("Swapped in high-detail model");
        Ok(true)
    }
}

impl Drop for SceneAssetManager {
    fn drop(&mut self) {
        self.cancel_upgrade();
    }
}

/// Hide the counterparts of the current hidden entries inside `new_root`.
fn remap_hidden(state: &mut ConfigurationState, new_root: NodeId) -> Vec<HiddenNode> {
    let candidates = state.world.descendants(new_root);
    let mut taken: Vec<NodeId> = Vec::new();
    let mut out = Vec::new();

    for entry in state.hidden_original_nodes().to_vec() {
        let found = candidates.iter().copied().find(|id| {
            !taken.contains(id)
                && state
                    .world
                    .get(*id)
                    .is_some_and(|n| n.name == entry.name && n.tag() == entry.tag)
        });
        match found {
            Some(id) => {
                state.world.set_visible(id, false);
                taken.push(id);
                out.push(HiddenNode { id, ..entry });
            }
            None => {
                tracing::warn!(
                    "Hidden node '{}' has no counterpart in the high-detail model",
                    entry.name
                );
            }
        }
    }
    out
}

/// Shadow catcher sized to the model footprint, at the model's lowest point.
fn place_shadow_plane(state: &mut ConfigurationState, model: NodeId) {
    let Some((min, max)) = state.world.world_bounds(model) else {
        return;
    };
    let size = max - min;
    let center = (min + max) * 0.5;
    let mut material = Material::named("Shadow", Color::new(0.0, 0.0, 0.0));
    material.opacity = 0.3;

    let world_root = state.world_root();
    state.world.add(
        Node::ground_plane(
            SHADOW_PLANE,
            Arc::new(plane(size.x * SHADOW_SCALE, size.z * SHADOW_SCALE)),
            material,
        )
        .with_transform(Transform::from_translation(Vec3::new(center.x, min.y, center.z))),
        Some(world_root),
    );
}
