//! Headless configurator session
//!
//! Owns one `ConfigurationState` and the engines that act on it. All
//! mutations go through `&mut self`, so at most one runs at a time.

use std::sync::Arc;

use tokio::sync::watch;

use shared::{environment_preset, ConfigurationSummary, EnvironmentPreset, PublishResult};

use crate::ar_links;
use crate::assets::{AssetSource, BaseFetch, HttpAssetSource, Imported, SceneAssetManager};
use crate::color::ColorManager;
use crate::config::Settings;
use crate::error::{ColorError, ExportError, LoadError, PartError, PublishError};
use crate::export::{compute_config_hash, ArtifactLayout, ExportPipeline, ExportSnapshot, Publication};
use crate::height::HeightAdjustmentEngine;
use crate::parts::PartReplacementEngine;
use crate::scene::NodeId;
use crate::state::{ConfigurationState, ENVIRONMENT_GROUND};
use crate::storage::{self, ObjectStore};

pub struct Session {
    settings: Settings,
    state: ConfigurationState,
    assets: SceneAssetManager,
    parts: PartReplacementEngine,
    height: HeightAdjustmentEngine,
    color: ColorManager,
    pipeline: ExportPipeline,
}

impl Session {
    pub fn new(settings: Settings, source: Arc<dyn AssetSource>, store: Arc<dyn ObjectStore>) -> Self {
        let state = ConfigurationState::new(&settings.vehicle.default_color);
        let assets = SceneAssetManager::new(source.clone(), settings.assets.clone());
        let parts = PartReplacementEngine::new(source, settings.assets.clone());
        let height = HeightAdjustmentEngine::new(&settings.vehicle);
        let color = ColorManager::new(settings.vehicle.body_node.clone());
        let pipeline = ExportPipeline::new(store, ArtifactLayout::from_settings(&settings.storage));
        Self {
            settings,
            state,
            assets,
            parts,
            height,
            color,
            pipeline,
        }
    }

    /// HTTP asset source and the store the settings describe
    pub async fn from_settings(settings: Settings) -> Self {
        let store = storage::from_settings(&settings.storage).await;
        Self::new(settings, Arc::new(HttpAssetSource::new()), store)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> &ConfigurationState {
        &self.state
    }

    /// Low-detail load progress, `0..=100`
    pub fn subscribe_progress(&self) -> watch::Receiver<f32> {
        self.assets.subscribe()
    }

    // ── Loading ──────────────────────────────────────────────

    /// Load the base model and paint it with the current color.
    pub async fn load_model(&mut self) -> Result<NodeId, LoadError> {
        let fetch = self.begin_load();
        let imported = fetch.run().await;
        self.finish_load(imported)
    }

    /// Start a base model load; run the returned fetch, then `finish_load`.
    pub fn begin_load(&mut self) -> BaseFetch {
        self.assets.begin_load(&mut self.state)
    }

    pub fn finish_load(&mut self, imported: Imported) -> Result<NodeId, LoadError> {
        let handle = self.assets.finish_load(&mut self.state, imported)?;
        self.after_model_change();
        Ok(handle)
    }

    pub fn upgrade_ready(&self) -> bool {
        self.assets.upgrade_ready()
    }

    /// A high-detail load is still in flight or not yet swapped in
    pub fn upgrade_pending(&self) -> bool {
        self.assets.upgrade_pending()
    }

    /// Wait for the background high-detail model and swap it in.
    pub async fn finish_upgrade(&mut self) -> Result<bool, LoadError> {
        let swapped = self.assets.finish_upgrade(&mut self.state).await?;
        if swapped {
            self.height.reapply(&mut self.state);
            self.after_model_change();
        }
        Ok(swapped)
    }

    /// Swap in the high-detail model if its load has already finished.
    pub async fn poll_upgrade(&mut self) -> Result<bool, LoadError> {
        if !self.assets.upgrade_ready() {
            return Ok(false);
        }
        self.finish_upgrade().await
    }

    fn after_model_change(&mut self) {
        let color = self.state.paint_color.clone();
        if let Err(e) = self.color.apply_color(&mut self.state, &color) {
            tracing::warn!("Stored paint color not applied: {}", e);
        }
    }

    // ── Configuration ────────────────────────────────────────

    pub async fn replace_part(&mut self, category: &str, part_id: &str) -> Result<NodeId, PartError> {
        self.parts.replace_part(&mut self.state, category, part_id).await
    }

    pub fn reset_part(&mut self, category: &str) -> Result<(), PartError> {
        self.parts.reset_part(&mut self.state, category)
    }

    pub fn apply_color(&mut self, hex: &str) -> Result<usize, ColorError> {
        self.color.apply_color(&mut self.state, hex)
    }

    /// Restore shipped materials, then paint the factory default.
    pub fn reset_color(&mut self) -> Result<usize, ColorError> {
        self.color.reset_color(&mut self.state);
        let default = self.settings.vehicle.default_color.clone();
        self.color.apply_color(&mut self.state, &default)
    }

    pub fn adjust_height(&mut self, delta: f32) -> bool {
        self.height.adjust(&mut self.state, delta)
    }

    pub fn raise(&mut self) -> bool {
        self.adjust_height(self.settings.vehicle.height_step)
    }

    pub fn lower(&mut self) -> bool {
        self.adjust_height(-self.settings.vehicle.height_step)
    }

    pub fn reset_height(&mut self) {
        self.height.reset(&mut self.state);
    }

    /// Switch the lighting preset; the backdrop follows the preset's ground flag.
    pub fn set_environment(&mut self, id: &str) -> Option<&'static EnvironmentPreset> {
        let preset = environment_preset(id)?;
        self.state.selected_environment = preset.id.to_string();
        let world_root = self.state.world_root();
        if let Some(ground) = self.state.world.find_by_name(world_root, ENVIRONMENT_GROUND) {
            self.state.world.set_visible(ground, preset.ground);
        }
        tracing::debug!("Environment set to {}", preset.id);
        Some(preset)
    }

    /// Record a selection without touching the scene.
    pub fn update_selection(&mut self, part: &str, value: &str) {
        self.state.select_part(part, value);
    }

    pub fn content_hash(&self) -> String {
        compute_config_hash(&self.state)
    }

    pub fn summary(&self) -> ConfigurationSummary {
        self.state.summary(self.content_hash())
    }

    // ── Publishing ───────────────────────────────────────────

    pub fn pipeline(&self) -> ExportPipeline {
        self.pipeline.clone()
    }

    pub fn is_publishing(&self) -> bool {
        self.state.is_exporting
    }

    /// Start a publish: take a snapshot and mark the session busy.
    ///
    /// Returns `Ok(None)` while another publish is in flight. On error the
    /// busy flag is left clear.
    pub fn begin_publish(&mut self) -> Result<Option<ExportSnapshot>, ExportError> {
        if self.state.is_exporting {
            tracing::warn!("Publish already in progress; request ignored");
            return Ok(None);
        }
        let snapshot = self.pipeline.snapshot(&self.state)?;
        self.state.is_exporting = true;
        Ok(Some(snapshot))
    }

    /// Clear the busy flag and turn a publication into links.
    pub fn finish_publish(
        &mut self,
        result: Result<Publication, PublishError>,
    ) -> Result<PublishResult, PublishError> {
        self.state.is_exporting = false;
        match result {
            Ok(publication) => Ok(to_result(publication)),
            Err(e) => {
                tracing::error!("Publish failed: {}", e);
                Err(e)
            }
        }
    }

    /// Publish the current configuration. `Ok(None)` if one is in flight.
    pub async fn publish(&mut self) -> Result<Option<PublishResult>, PublishError> {
        let Some(snapshot) = self.begin_publish()? else {
            return Ok(None);
        };
        let result = self.pipeline.publish_snapshot(snapshot).await;
        self.finish_publish(result).map(Some)
    }
}

fn to_result(publication: Publication) -> PublishResult {
    let artifact = publication.artifact;
    let links = ar_links::generate(
        Some(&artifact.glb_location),
        Some(&artifact.usdz_location),
        &artifact.content_hash,
    );
    PublishResult {
        artifact,
        reused: publication.reused,
        links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn test_load_applies_current_color() {
        let (mut session, _) = fixtures::loaded_session().await;
        session.apply_color("#00ff00").unwrap();
        assert!(session.finish_upgrade().await.unwrap());

        let state = session.state();
        let handle = state.scene_handle().unwrap();
        let trim = state.world.find_by_name(handle, fixtures::HIGH_DETAIL_MARKER).unwrap();
        let m = &state.world.get(trim).unwrap().mesh_data().unwrap().material;
        assert_eq!(m.color.to_hex(), "#00ff00");
    }

    #[tokio::test]
    async fn test_commands_apply_during_base_fetch() {
        let mut session = fixtures::session_with_store(Arc::new(crate::storage::MemoryStore::new()));
        let fetch = session.begin_load();
        assert!(session.state().is_loading);
        session.apply_color("#0000ff").unwrap();

        let imported = fetch.run().await;
        let handle = session.finish_load(imported).unwrap();
        let body = session
            .state()
            .world
            .find_by_name(handle, &session.settings().vehicle.body_node)
            .unwrap();
        let painted = session
            .state()
            .world
            .descendants(body)
            .into_iter()
            .filter_map(|id| session.state().world.get(id)?.mesh_data().map(|m| m.material.color.to_hex()))
            .collect::<Vec<_>>();
        assert!(!painted.is_empty());
        assert!(painted.iter().all(|c| c == "#0000ff"), "{painted:?}");
    }

    #[tokio::test]
    async fn test_reset_color_paints_default() {
        let (mut session, _) = fixtures::loaded_session().await;
        session.apply_color("#00ff00").unwrap();
        session.reset_color().unwrap();
        assert_eq!(session.state().paint_color, shared::DEFAULT_PAINT_COLOR);
    }

    #[tokio::test]
    async fn test_environment_toggles_backdrop() {
        let (mut session, _) = fixtures::loaded_session().await;
        let ground = {
            let s = session.state();
            s.world.find_by_name(s.world_root(), ENVIRONMENT_GROUND).unwrap()
        };
        assert!(session.set_environment("sunset").is_some());
        assert!(session.state().world.get(ground).unwrap().visible);
        assert_eq!(session.state().selected_environment, "sunset");

        assert!(session.set_environment("neutral").is_some());
        assert!(!session.state().world.get(ground).unwrap().visible);

        assert!(session.set_environment("moon").is_none());
        assert_eq!(session.state().selected_environment, "neutral");
    }

    #[tokio::test]
    async fn test_busy_guard() {
        let (mut session, store) = fixtures::loaded_session().await;
        let snapshot = session.begin_publish().unwrap().unwrap();
        assert!(session.is_publishing());
        assert!(session.begin_publish().unwrap().is_none());
        assert!(session.publish().await.unwrap().is_none());
        assert_eq!(store.put_count(), 0);

        let result = session.pipeline().publish_snapshot(snapshot).await;
        let published = session.finish_publish(result).unwrap();
        assert!(!session.is_publishing());
        assert_eq!(store.put_count(), 2);
        assert_eq!(published.links.config_hash, published.artifact.content_hash);
    }

    #[tokio::test]
    async fn test_failed_publish_clears_busy_flag() {
        let store = Arc::new(crate::storage::MemoryStore::failing_lookups());
        let mut session = fixtures::session_with_store(store);
        session.load_model().await.unwrap();
        assert!(session.publish().await.is_err());
        assert!(!session.is_publishing());
    }

    #[tokio::test]
    async fn test_publish_without_model() {
        let mut session = fixtures::session_with_store(Arc::new(crate::storage::MemoryStore::new()));
        assert!(matches!(
            session.publish().await,
            Err(PublishError::Export(ExportError::NoScene))
        ));
        assert!(!session.is_publishing());
    }
}
