//! Integration tests for configuration mutations through the `Session` API.
//!
//! Tests end-to-end: load truck -> mutate -> inspect state and content hash.

use configurator::export::hash_configuration;
use configurator::config::Settings;
use configurator::fixtures::{self, MemoryAssetSource, HIGH_DETAIL_MARKER, WHEEL_PART};
use configurator::storage::MemoryStore;
use configurator::{LoadError, PartError, Session};
use std::sync::Arc;

const WHEELS: &str = "Wheels & Tires";

fn body_y(session: &Session) -> f32 {
    let state = session.state();
    let handle = state.scene_handle().unwrap();
    let body = state.world.find_by_name(handle, "TruckBody").unwrap();
    state.world.get(body).unwrap().transform.translation.y
}

#[tokio::test]
async fn test_replace_then_reset_restores_hash() {
    let (mut session, _) = fixtures::loaded_session().await;
    let h0 = session.content_hash();

    session.replace_part(WHEELS, WHEEL_PART).await.unwrap();
    let h1 = session.content_hash();
    assert_ne!(h0, h1);
    assert!(!session.state().hidden_original_nodes().is_empty());

    session.reset_part(WHEELS).unwrap();
    assert_eq!(session.content_hash(), h0);
    assert!(session.state().replaced_nodes().is_empty());
    assert!(session.state().hidden_original_nodes().is_empty());
}

#[tokio::test]
async fn test_category_spelling_is_normalized() {
    let (mut a, _) = fixtures::loaded_session().await;
    let (mut b, _) = fixtures::loaded_session().await;
    a.replace_part("Wheels & Tires", WHEEL_PART).await.unwrap();
    b.replace_part("  wheels   &  TIRES ", WHEEL_PART).await.unwrap();
    assert_eq!(a.content_hash(), b.content_hash());
    assert_eq!(
        a.state().hidden_keys().len(),
        b.state().hidden_keys().len()
    );
}

#[tokio::test]
async fn test_reset_part_is_idempotent() {
    let (mut session, _) = fixtures::loaded_session().await;
    let h0 = session.content_hash();
    session.reset_part(WHEELS).unwrap();
    session.reset_part(WHEELS).unwrap();
    assert_eq!(session.content_hash(), h0);
}

#[tokio::test]
async fn test_unmatched_category_fails_without_change() {
    let (mut session, _) = fixtures::loaded_session().await;
    let h0 = session.content_hash();
    let err = session.replace_part("Roof Rack", "Rack_1").await.unwrap_err();
    assert!(matches!(err, PartError::NoMatch(_)));
    assert_eq!(session.content_hash(), h0);
}

#[tokio::test]
async fn test_color_round_trip() {
    let (mut session, _) = fixtures::loaded_session().await;
    let h0 = session.content_hash();
    session.apply_color("#123456").unwrap();
    assert_eq!(session.state().paint_color, "#123456");
    assert_ne!(session.content_hash(), h0);

    session.reset_color().unwrap();
    assert_eq!(session.content_hash(), h0);
}

#[test]
fn test_hash_ignores_list_order_but_not_color() {
    let a = hash_configuration("#e20407", &["b", "a"], &["y", "x"]);
    let b = hash_configuration("#e20407", &["a", "b"], &["x", "y"]);
    assert_eq!(a, b);
    let c = hash_configuration("#e20408", &["a", "b"], &["x", "y"]);
    assert_ne!(a, c);
}

#[tokio::test]
async fn test_height_collision_is_monotonic() {
    let (mut session, _) = fixtures::loaded_session().await;
    assert!(!session.lower());
    assert!(session.state().is_colliding);
    assert_eq!(body_y(&session), 0.0);

    for _ in 0..3 {
        assert!(!session.raise());
        assert!(session.state().is_colliding);
    }
    assert_eq!(session.state().height_offset, 0.0);

    assert!(session.lower());
    assert!(!session.state().is_colliding);
    assert!(body_y(&session) < 0.0);
}

#[tokio::test]
async fn test_raise_and_reset_height() {
    let (mut session, _) = fixtures::loaded_session().await;
    assert!(session.raise());
    assert!(session.raise());
    assert!((session.state().height_offset - 0.5).abs() < 1e-6);
    assert!((body_y(&session) - 0.5 / 39.37).abs() < 1e-6);

    session.reset_height();
    assert_eq!(body_y(&session), 0.0);
    assert_eq!(session.state().height_offset, 0.0);
}

#[tokio::test]
async fn test_lod_upgrade_preserves_configuration() {
    let (mut session, _) = fixtures::loaded_session().await;
    session.replace_part(WHEELS, WHEEL_PART).await.unwrap();
    session.apply_color("#0000ff").unwrap();
    assert!(session.raise());

    let hash = session.content_hash();
    let mut hidden = session.state().hidden_keys();
    hidden.sort();
    let y = body_y(&session);

    assert!(session.finish_upgrade().await.unwrap());
    let state = session.state();
    assert!(state.is_high_detail());
    let handle = state.scene_handle().unwrap();
    assert!(state.world.find_by_name(handle, HIGH_DETAIL_MARKER).is_some());

    assert_eq!(session.content_hash(), hash);
    let mut after = state.hidden_keys();
    after.sort();
    assert_eq!(after, hidden);
    assert_eq!(state.replaced_nodes().len(), 1);
    let replacement = state.replaced_nodes()[0].id;
    assert!(state.world.is_within(replacement, handle));
    assert!((body_y(&session) - y).abs() < 1e-6);

    // No second swap, no regression to low detail.
    assert!(!session.finish_upgrade().await.unwrap());
    assert!(session.state().is_high_detail());
}

#[tokio::test]
async fn test_load_failure_clears_flags() {
    let mut session = Session::new(
        Settings::default(),
        Arc::new(MemoryAssetSource::new()),
        Arc::new(MemoryStore::new()),
    );
    let err = session.load_model().await.unwrap_err();
    assert!(matches!(err, LoadError::NotFound(_)));
    let state = session.state();
    assert!(state.scene_handle().is_none());
    assert!(!state.is_loading);
    assert!(!session.upgrade_ready());
}
