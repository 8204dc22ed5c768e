//! Integration tests for SettingsManager with change events
//!
//! These tests verify that the SettingsManager correctly:
//! - Emits change events on mutations
//! - Supports multiple subscribers
//! - Handles concurrent access from multiple threads
//! - Leaves the state untouched when an assignment is rejected

use angel_damage_numbers::models::SettingsError;
use angel_damage_numbers::{SettingChange, SettingKey, SettingValue, SettingsManager, SettingsState};
use std::sync::Arc;
use tokio::time::{Duration, timeout};

#[tokio::test]
async fn test_change_events_emitted() {
    let settings = Arc::new(SettingsManager::new());
    let mut rx = settings.subscribe();

    settings
        .set(SettingKey::FontSize, SettingValue::Int(30))
        .unwrap();

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");

    assert_eq!(
        event,
        SettingChange::ValueChanged {
            key: SettingKey::FontSize,
            value: SettingValue::Int(30)
        }
    );
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let settings = SettingsManager::new();
    let mut rx1 = settings.subscribe();
    let mut rx2 = settings.subscribe();

    settings.reset_to_defaults();

    for rx in [&mut rx1, &mut rx2] {
        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("Channel closed");
        assert_eq!(event, SettingChange::Reset);
    }
}

#[tokio::test]
async fn test_replace_emits_loaded() {
    let settings = SettingsManager::new();
    let mut rx = settings.subscribe();

    let mut state = SettingsState::default();
    state.enable_outline = false;
    settings.replace(state);

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");
    assert_eq!(event, SettingChange::Loaded);
    assert!(!settings.read(|s| s.enable_outline));
}

#[test]
fn test_same_value_emits_nothing() {
    let settings = SettingsManager::new();
    let current = settings.get(SettingKey::MarkerDuration);

    let changes = settings.set(SettingKey::MarkerDuration, current).unwrap();
    assert!(changes.is_empty());
}

#[test]
fn test_rejected_assignment_leaves_state() {
    let settings = SettingsManager::new();
    let before = settings.snapshot();

    let result = settings.set_from_text(SettingKey::OutlineColor, "not a colour");

    assert!(matches!(result, Err(SettingsError::InvalidValue { .. })));
    assert_eq!(settings.snapshot(), before);
}

#[test]
fn test_concurrent_updates() {
    let settings = SettingsManager::new();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let settings = settings.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    settings.update(|s| s.max_damage_for_scale += 1);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(settings.read(|s| s.max_damage_for_scale), 100 + 8 * 50);
}
