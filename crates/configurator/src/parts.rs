//! Part replacement
//!
//! Swaps a category's original sub-assembly for a part asset and restores
//! it again. Originals are only hidden, never removed; replacements are
//! removed from the graph and the bookkeeping together.

use std::sync::Arc;

use crate::assets::AssetSource;
use crate::config::AssetSettings;
use crate::error::PartError;
use crate::scene::import::import_glb;
use crate::scene::NodeId;
use crate::state::{name_matches, normalize_key, ConfigurationState, HiddenNode, ReplacedNode};

pub struct PartReplacementEngine {
    source: Arc<dyn AssetSource>,
    urls: AssetSettings,
}

impl PartReplacementEngine {
    pub fn new(source: Arc<dyn AssetSource>, urls: AssetSettings) -> Self {
        Self { source, urls }
    }

    /// Original nodes of the active model whose normalized name contains
    /// `key`. The model root and replacement subtrees are never matched.
    pub fn matching_originals(state: &ConfigurationState, key: &str) -> Vec<NodeId> {
        let Some(handle) = state.scene_handle() else {
            return Vec::new();
        };
        state
            .world
            .descendants(handle)
            .into_iter()
            .filter(|id| *id != handle && !state.is_replacement(*id))
            .filter(|id| {
                state
                    .world
                    .get(*id)
                    .is_some_and(|n| name_matches(&n.name, key))
            })
            .collect()
    }

    /// Load `part_id` and make it the active representation of `category`.
    ///
    /// Nothing in the scene changes until the part asset has been fetched
    /// and parsed; a failure leaves the state as it was.
    pub async fn replace_part(
        &self,
        state: &mut ConfigurationState,
        category: &str,
        part_id: &str,
    ) -> Result<NodeId, PartError> {
        let key = normalize_key(category);
        let part_id = part_id.trim();
        if key.is_empty() || part_id.is_empty() {
            return Err(PartError::InvalidRequest);
        }
        let handle = state.scene_handle().ok_or(PartError::NoScene)?;

        let matches = Self::matching_originals(state, &key);
        if matches.is_empty() {
            return Err(PartError::NoMatch(category.to_string()));
        }

        state.is_loading = true;
        let url = self.urls.resolve(&self.urls.part_url(part_id));
        tracing::info!("Loading part {} for '{}': {}", part_id, key, url);
        let loaded = match self.source.fetch(&url, None).await {
            Ok(bytes) => import_glb(&bytes),
            Err(e) => Err(e),
        };
        state.is_loading = false;
        let (graph, root) = loaded.map_err(|e| {
            tracing::error!("Part {} failed to load: {}", part_id, e);
            e
        })?;

        // One replacement per category
        for old in state.take_replaced(&key) {
            state.world.remove_subtree(old.id);
        }

        for id in &matches {
            let Some(node) = state.world.get(*id) else {
                continue;
            };
            let entry = HiddenNode {
                id: *id,
                category: key.clone(),
                name: node.name.clone(),
                tag: node.tag(),
            };
            state.world.set_visible(*id, false);
            state.add_hidden(entry);
        }

        let body = state.world.get(handle).map(|n| n.transform);
        let new_root = state
            .world
            .graft(&graph, root, Some(handle))
            .ok_or(PartError::InvalidRequest)?;
        if let Some(node) = state.world.get_mut(new_root) {
            node.name = key.clone();
            node.visible = true;
            if let Some(body) = body {
                node.transform.translation = body.translation;
                node.transform.rotation = body.rotation;
            }
        }

        state.add_replaced(ReplacedNode {
            id: new_root,
            category: key.clone(),
            key: format!("{key}:{part_id}"),
        });
        state.select_part(&key, part_id);

        tracing::info!("Replaced '{}' with {} ({} originals hidden)", key, part_id, matches.len());
        Ok(new_root)
    }

    /// Restore the originals of `category`. Succeeds when nothing matches.
    pub fn reset_part(&self, state: &mut ConfigurationState, category: &str) -> Result<(), PartError> {
        let key = normalize_key(category);
        if key.is_empty() {
            return Err(PartError::InvalidRequest);
        }

        for old in state.take_replaced(&key) {
            state.world.remove_subtree(old.id);
        }

        let restored = state.take_hidden(|h| h.category == key || name_matches(&h.name, &key));
        for h in &restored {
            state.world.set_visible(h.id, true);
        }
        for id in Self::matching_originals(state, &key) {
            state.world.set_visible(id, true);
        }

        state.clear_part(&key);
        tracing::debug!("Reset '{}' ({} originals restored)", key, restored.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::SceneAssetManager;
    use crate::fixtures::{self, MemoryAssetSource};
    use crate::scene::NodeKind;

    async fn loaded(source: MemoryAssetSource) -> (ConfigurationState, PartReplacementEngine) {
        let source: Arc<dyn AssetSource> = Arc::new(source);
        let mut state = ConfigurationState::new("#e20407");
        let mut assets = SceneAssetManager::new(source.clone(), AssetSettings::default());
        assets.load(&mut state).await.unwrap();
        assets.cancel_upgrade();
        (state, PartReplacementEngine::new(source, AssetSettings::default()))
    }

    #[tokio::test]
    async fn test_replace_hides_originals_and_inserts_part() {
        let (mut state, parts) = loaded(fixtures::truck_source()).await;
        let handle = state.scene_handle().unwrap();
        let originals = PartReplacementEngine::matching_originals(&state, "wheels_&_tires");
        assert!(!originals.is_empty());

        let id = parts
            .replace_part(&mut state, "Wheels & Tires", "Wheel_2")
            .await
            .unwrap();

        let node = state.world.get(id).unwrap();
        assert_eq!(node.name, "wheels_&_tires");
        assert_eq!(node.parent(), Some(handle));
        assert!(originals.iter().all(|o| !state.world.get(*o).unwrap().visible));
        assert_eq!(state.hidden_original_nodes().len(), originals.len());
        assert_eq!(state.replaced_nodes().len(), 1);
        assert_eq!(state.selected_parts["wheels_&_tires"], "Wheel_2");
        assert!(state
            .world
            .descendants(id)
            .iter()
            .any(|d| matches!(state.world.get(*d).unwrap().kind, NodeKind::Mesh(_))));
    }

    #[tokio::test]
    async fn test_second_replace_swaps_out_first() {
        let (mut state, parts) = loaded(fixtures::truck_source()).await;
        let first = parts.replace_part(&mut state, "Wheels & Tires", "Wheel_2").await.unwrap();
        let second = parts.replace_part(&mut state, "wheels & tires", "Wheel_2").await.unwrap();
        assert!(!state.world.contains(first));
        assert!(state.world.contains(second));
        assert_eq!(state.replaced_nodes().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_state_unchanged() {
        let source = MemoryAssetSource::new()
            .with(fixtures::LOW_DETAIL_URL, fixtures::truck_glb(false));
        let (mut state, parts) = loaded(source).await;
        let before = state.world.len();

        let err = parts
            .replace_part(&mut state, "Wheels & Tires", "Missing")
            .await
            .unwrap_err();
        assert!(matches!(err, PartError::Load(_)));
        assert_eq!(state.world.len(), before);
        assert!(state.hidden_original_nodes().is_empty());
        assert!(state.replaced_nodes().is_empty());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_no_match_does_not_fetch() {
        let source = fixtures::truck_source();
        let fetches = source.fetch_counter();
        let (mut state, parts) = loaded(source).await;
        let before = fetches.load(std::sync::atomic::Ordering::SeqCst);

        let err = parts.replace_part(&mut state, "Roof Rack", "Wheel_2").await.unwrap_err();
        assert!(matches!(err, PartError::NoMatch(_)));
        assert_eq!(fetches.load(std::sync::atomic::Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_replace_without_scene() {
        let mut state = ConfigurationState::new("#e20407");
        let parts = PartReplacementEngine::new(
            Arc::new(fixtures::truck_source()),
            AssetSettings::default(),
        );
        let err = parts.replace_part(&mut state, "Bumper", "X").await.unwrap_err();
        assert!(matches!(err, PartError::NoScene));
        let err = parts.replace_part(&mut state, "  ", "X").await.unwrap_err();
        assert!(matches!(err, PartError::InvalidRequest));
    }

    #[tokio::test]
    async fn test_reset_restores_and_is_idempotent() {
        let (mut state, parts) = loaded(fixtures::truck_source()).await;
        let originals = PartReplacementEngine::matching_originals(&state, "wheels_&_tires");
        parts.replace_part(&mut state, "Wheels & Tires", "Wheel_2").await.unwrap();

        parts.reset_part(&mut state, "WHEELS &  TIRES").unwrap();
        assert!(state.replaced_nodes().is_empty());
        assert!(state.hidden_original_nodes().is_empty());
        assert!(originals.iter().all(|o| state.world.get(*o).unwrap().visible));
        assert_eq!(state.selected_parts["wheels_&_tires"], "default");

        let len = state.world.len();
        parts.reset_part(&mut state, "Wheels & Tires").unwrap();
        assert_eq!(state.world.len(), len);
        assert!(state.replaced_nodes().is_empty());
    }
}
