//! Integration tests for ConfigStore and the configuration document
//!
//! These tests verify:
//! - Saving and loading preserve every value
//! - Missing sections and malformed values fall back to what the state held
//! - Legacy documents are still readable
//! - Unrecognised documents are never overwritten

use angel_damage_numbers::config::{ConfigStore, LoadOutcome};
use angel_damage_numbers::models::Vec3;
use angel_damage_numbers::{Color, SettingKey, SettingsState};
use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;

fn create_test_store() -> (ConfigStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (ConfigStore::in_mod_data_dir(&data_dir), temp_dir)
}

fn write_document(store: &ConfigStore, contents: &str) {
    fs::create_dir_all(store.config_dir()).unwrap();
    fs::write(store.path(), contents).unwrap();
}

#[test]
fn test_round_trip_preserves_values() {
    let (store, _temp_dir) = create_test_store();

    let mut state = SettingsState::default();
    state.normal_damage_color = Color::from_hex("#1A2B3C").unwrap();
    state.text_offset = Vec3::new(1.5, 0.0, 0.0);
    state.font_name = "Noto Sans: Bold".to_string();
    state.kill_marker = "✕".to_string();
    state.enable_debug_logging = true;
    state.max_damage_for_scale = 250;
    store.save(&state).unwrap();

    let mut loaded = SettingsState::default();
    let outcome = store.load(&mut loaded).unwrap();

    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            fields: SettingKey::ALL.len()
        }
    );
    assert_eq!(loaded, state);

    let contents = fs::read_to_string(store.path()).unwrap();
    assert!(contents.contains("#1A2B3C"));
    assert!(contents.contains("1.5,0,0"));
}

#[test]
fn test_every_value_has_a_comment() {
    let (store, _temp_dir) = create_test_store();
    store.create_default().unwrap();

    let contents = fs::read_to_string(store.path()).unwrap();
    for key in SettingKey::ALL {
        assert!(
            contents.contains(&format!("# {}", key.description())),
            "missing comment for {}",
            key.path()
        );
    }
}

#[test]
fn test_missing_section_keeps_defaults() {
    let (store, _temp_dir) = create_test_store();
    write_document(
        &store,
        "AngelDamageNumbersConfig:\n  ModMetaData: \"3.0.0\"\n  DamageNumbers:\n    FontSize: 26\n",
    );

    let mut state = SettingsState::default();
    let outcome = store.load(&mut state).unwrap();

    assert_eq!(outcome, LoadOutcome::Loaded { fields: 1 });
    assert_eq!(state.font_size, 26);
    assert_eq!(state.max_scale, SettingsState::default().max_scale);
    assert_eq!(state.player_damage_only, SettingsState::default().player_damage_only);
}

#[test]
fn test_malformed_values_are_skipped() {
    let (store, _temp_dir) = create_test_store();
    write_document(
        &store,
        "\
AngelDamageNumbersConfig:
  ModMetaData: \"3.0.0\"
  DamageNumbers:
    FontSize: huge
    TextOffset: \"1,2\"
  Colors:
    NormalDamageColor: \"#GG0000\"
    KillDamageColor: \"#00FF00\"
",
    );

    let mut state = SettingsState::default();
    store.load(&mut state).unwrap();

    let defaults = SettingsState::default();
    assert_eq!(state.font_size, defaults.font_size);
    assert_eq!(state.text_offset, defaults.text_offset);
    assert_eq!(state.normal_damage_color, defaults.normal_damage_color);
    assert_eq!(state.kill_damage_color, Color::rgb(0, 255, 0));
}

#[test]
fn test_legacy_root_is_readable() {
    let (store, _temp_dir) = create_test_store();
    write_document(
        &store,
        "FloatingDamageNumbersConfig:\n  Version: \"1.0.0\"\n  CrosshairMarkers:\n    EnableCrosshairMarkers: false\n",
    );

    let mut state = SettingsState::default();
    store.load(&mut state).unwrap();

    assert!(!state.enable_crosshair_markers);
}

#[test]
fn test_garbage_document_is_never_overwritten() {
    let (store, _temp_dir) = create_test_store();
    let garbage = "AngelDamageNumbersConfig: [unclosed\n";
    write_document(&store, garbage);

    let mut state = SettingsState::default();
    assert_eq!(store.load(&mut state).unwrap(), LoadOutcome::Unrecognized);
    assert_eq!(state, SettingsState::default());

    assert!(store.save(&state).is_err());
    assert_eq!(fs::read_to_string(store.path()).unwrap(), garbage);
}
