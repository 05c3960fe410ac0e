//! Export and publish pipeline
//!
//! `snapshot` freezes the live configuration into an export-only graph and
//! its content hash; `publish_snapshot` checks the store, serializes both
//! formats off the async runtime and uploads them. The split lets a caller
//! release the live state while the network round-trips are in flight.

pub mod glb;
pub mod hash;
pub mod usdz;

use std::sync::Arc;

use shared::PublishedArtifact;

use crate::config::StorageSettings;
use crate::error::{ExportError, PublishError};
use crate::scene::material::Side;
use crate::scene::{NodeId, NodeKind, SceneGraph};
use crate::state::ConfigurationState;
use crate::storage::{ObjectStore, PutOptions, GLB_CONTENT_TYPE, USDZ_CONTENT_TYPE};

pub use hash::{compute_config_hash, hash_configuration};

/// What besides the vehicle goes into an export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub include_lights: bool,
    pub include_environment: bool,
}

/// Storage folders for the two artifact kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub glb_folder: String,
    pub usdz_folder: String,
}

impl ArtifactLayout {
    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self {
            glb_folder: settings.glb_folder.clone(),
            usdz_folder: settings.usdz_folder.clone(),
        }
    }

    pub fn glb_key(&self, hash: &str) -> String {
        format!("{}/{}.glb", self.glb_folder, hash)
    }

    pub fn usdz_key(&self, hash: &str) -> String {
        format!("{}/{}.usdz", self.usdz_folder, hash)
    }
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::from_settings(&StorageSettings::default())
    }
}

/// Export-only clone of the scene plus the hash it publishes under
#[derive(Debug, Clone)]
pub struct ExportSnapshot {
    pub content_hash: String,
    pub scene: SceneGraph,
    pub root: NodeId,
}

/// Outcome of a publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub artifact: PublishedArtifact,
    /// The artifacts already existed; nothing was serialized or uploaded
    pub reused: bool,
}

/// Clone the world for export: lights and ground planes dropped (unless
/// requested), hidden originals marked invisible by name and kind.
pub fn build_export_scene(
    state: &ConfigurationState,
    options: ExportOptions,
) -> Result<(SceneGraph, NodeId), ExportError> {
    if state.scene_handle().is_none() {
        return Err(ExportError::NoScene);
    }
    let (mut scene, root) = state
        .world
        .extract(state.world_root())
        .ok_or(ExportError::NoScene)?;

    let drop: Vec<NodeId> = scene
        .descendants(root)
        .into_iter()
        .filter(|id| match scene.get(*id).map(|n| &n.kind) {
            Some(NodeKind::Light(_)) => !options.include_lights,
            Some(NodeKind::GroundPlane(_)) => !options.include_environment,
            _ => false,
        })
        .collect();
    for id in drop {
        scene.remove_subtree(id);
    }

    let hidden = state.hidden_original_nodes();
    let to_hide: Vec<NodeId> = scene
        .descendants(root)
        .into_iter()
        .filter(|id| {
            scene.get(*id).is_some_and(|n| {
                hidden
                    .iter()
                    .any(|h| h.name == n.name && h.tag == n.tag())
            })
        })
        .collect();
    for id in to_hide {
        scene.set_visible(id, false);
    }

    Ok((scene, root))
}

/// Copy of `scene` with every material forced single-sided.
pub fn single_sided(scene: &SceneGraph, root: NodeId) -> Option<(SceneGraph, NodeId)> {
    let (mut copy, root) = scene.extract(root)?;
    for id in copy.descendants(root) {
        if let Some(node) = copy.get_mut(id) {
            match &mut node.kind {
                NodeKind::Mesh(m) | NodeKind::GroundPlane(m) => m.material.side = Side::Front,
                _ => {}
            }
        }
    }
    Some((copy, root))
}

/// Serialize a snapshot into `(glb, usdz)`. Either both succeed or neither
/// is returned.
pub fn serialize(scene: &SceneGraph, root: NodeId) -> Result<(Vec<u8>, Vec<u8>), ExportError> {
    let glb = glb::build_glb(scene, root)?;
    let (flat, flat_root) = single_sided(scene, root).ok_or(ExportError::NoScene)?;
    let usdz = usdz::build_usdz(&flat, flat_root)?;
    Ok((glb, usdz))
}

/// Converts configurations into published, content-addressed artifacts
#[derive(Clone)]
pub struct ExportPipeline {
    store: Arc<dyn ObjectStore>,
    layout: ArtifactLayout,
    options: ExportOptions,
}

impl ExportPipeline {
    pub fn new(store: Arc<dyn ObjectStore>, layout: ArtifactLayout) -> Self {
        Self {
            store,
            layout,
            options: ExportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Canonical locations for a hash, whether or not they exist yet
    pub fn artifact_for(&self, content_hash: &str) -> PublishedArtifact {
        PublishedArtifact {
            content_hash: content_hash.to_string(),
            glb_location: self.store.public_url(&self.layout.glb_key(content_hash)),
            usdz_location: self.store.public_url(&self.layout.usdz_key(content_hash)),
        }
    }

    /// Freeze the current configuration for export.
    pub fn snapshot(&self, state: &ConfigurationState) -> Result<ExportSnapshot, ExportError> {
        let (scene, root) = build_export_scene(state, self.options)?;
        Ok(ExportSnapshot {
            content_hash: compute_config_hash(state),
            scene,
            root,
        })
    }

    /// Check, serialize and upload a snapshot.
    ///
    /// An existing USDZ short-circuits everything (the GLB is uploaded first,
    /// so it is co-resident). Only a definite "not found" counts as absent.
    pub async fn publish_snapshot(&self, snapshot: ExportSnapshot) -> Result<Publication, PublishError> {
        let hash = snapshot.content_hash.clone();
        let glb_key = self.layout.glb_key(&hash);
        let usdz_key = self.layout.usdz_key(&hash);
        let artifact = self.artifact_for(&hash);

        if self.store.exists(&usdz_key).await? {
            tracing::info!("Configuration {} already published", hash);
            return Ok(Publication {
                artifact,
                reused: true,
            });
        }

        tracing::info!("Exporting configuration {}", hash);
        let (glb_bytes, usdz_bytes) =
            tokio::task::spawn_blocking(move || serialize(&snapshot.scene, snapshot.root))
                .await
                .map_err(|e| ExportError::Task(e.to_string()))??;
        tracing::debug!(
            "Serialized {} ({} bytes GLB, {} bytes USDZ)",
            hash,
            glb_bytes.len(),
            usdz_bytes.len()
        );

        self.store
            .put(&glb_key, glb_bytes, &PutOptions::artifact(GLB_CONTENT_TYPE))
            .await?;
        self.store
            .put(&usdz_key, usdz_bytes, &PutOptions::artifact(USDZ_CONTENT_TYPE))
            .await?;

        tracing::info!("Published {}", hash);
        Ok(Publication {
            artifact,
            reused: false,
        })
    }

    /// Snapshot and publish in one step.
    pub async fn publish(&self, state: &ConfigurationState) -> Result<Publication, PublishError> {
        let snapshot = self.snapshot(state)?;
        self.publish_snapshot(snapshot).await
    }
}
