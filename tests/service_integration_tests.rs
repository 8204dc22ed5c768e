//! Integration tests for ConfigurationService and ModSession
//!
//! These tests verify:
//! - Backend selection follows capability detection
//! - A panel that fails to bind falls back to the document backend
//! - Host UI edits are debounced into a single save
//! - Shutdown persists pending edits and releases the façade

use angel_damage_numbers::config::{BackendPreference, ConfigStore, RuntimeOptions};
use angel_damage_numbers::services::capability::REQUIRED_TYPES;
use angel_damage_numbers::services::{
    BackendKind, HostSettingsPanel, LoadedModule, StaticModuleProbe,
};
use angel_damage_numbers::{Color, ModSession, SettingKey, SettingsState};
use camino::Utf8PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::time::Duration;

/// Records what the service asks of the host panel.
#[derive(Default)]
struct FakePanel {
    fail_bind: bool,
    binds: AtomicUsize,
    seeded: Mutex<Option<SettingsState>>,
    color: Option<Color>,
}

impl HostSettingsPanel for FakePanel {
    fn bind(&self, settings: &SettingsState) -> anyhow::Result<()> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        if self.fail_bind {
            anyhow::bail!("panel rejected registration");
        }
        *self.seeded.lock().unwrap() = Some(settings.clone());
        Ok(())
    }

    fn current_color(&self, _key: SettingKey) -> Option<Color> {
        self.color
    }

    fn description(&self) -> String {
        "Angel's Enhanced Damage Numbers".to_string()
    }
}

fn gears_probe() -> Box<StaticModuleProbe> {
    Box::new(StaticModuleProbe::new(vec![
        LoadedModule::new("GearsAPI", Some("1.4.2"), "/mods/GearsAPI").with_types(REQUIRED_TYPES),
    ]))
}

fn create_test_options() -> (RuntimeOptions, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let options = RuntimeOptions {
        mod_data_dir: Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap(),
        save_debounce_secs: 10,
        tick_interval_ms: 250,
        backend: BackendPreference::Auto,
        ..RuntimeOptions::default()
    };
    (options, temp_dir)
}

#[tokio::test]
async fn test_host_ui_selected_when_gears_present() {
    let (options, _temp_dir) = create_test_options();
    let panel = Arc::new(FakePanel::default());

    let session = ModSession::start(&options, gears_probe(), Some(panel.clone()));
    let facade = session.facade();

    assert_eq!(facade.backend_kind(), BackendKind::HostUi);
    assert_eq!(panel.binds.load(Ordering::SeqCst), 1);
    // Panel is seeded from the document
    assert_eq!(
        panel.seeded.lock().unwrap().clone(),
        Some(SettingsState::default())
    );

    session.shutdown().await;
}

#[tokio::test]
async fn test_document_selected_without_gears() {
    let (options, _temp_dir) = create_test_options();
    let panel = Arc::new(FakePanel::default());

    let session = ModSession::start(
        &options,
        Box::new(StaticModuleProbe::new(Vec::new())),
        Some(panel.clone()),
    );

    assert_eq!(session.facade().backend_kind(), BackendKind::Document);
    assert_eq!(panel.binds.load(Ordering::SeqCst), 0);

    session.shutdown().await;
}

#[tokio::test]
async fn test_bind_failure_falls_back_to_document() {
    let (options, _temp_dir) = create_test_options();
    let panel = Arc::new(FakePanel {
        fail_bind: true,
        ..FakePanel::default()
    });

    let session = ModSession::start(&options, gears_probe(), Some(panel.clone()));

    assert_eq!(session.facade().backend_kind(), BackendKind::Document);
    assert_eq!(panel.binds.load(Ordering::SeqCst), 1);
    assert!(session.facade().configuration_info().contains("YAML"));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_edits_saves_once() {
    let (options, _temp_dir) = create_test_options();
    let panel = Arc::new(FakePanel::default());

    let mut session = ModSession::start(&options, gears_probe(), Some(panel));
    session.spawn_saver();
    let facade = session.facade();

    for size in 21..31 {
        facade.apply_change("FontSize", &size.to_string()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    // Last edit was 1s ago; the quiet period is 10s
    tokio::time::sleep(Duration::from_secs(8)).await;
    assert_eq!(session.metrics().saves_written.load(Ordering::Relaxed), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(session.metrics().saves_written.load(Ordering::Relaxed), 1);
    assert_eq!(session.metrics().saves_scheduled.load(Ordering::Relaxed), 10);

    let store = ConfigStore::in_mod_data_dir(&options.mod_data_dir);
    assert_eq!(store.peek().unwrap().font_size, 30);

    session.shutdown().await;
}

#[tokio::test]
async fn test_explicit_save_cancels_pending() {
    let (options, _temp_dir) = create_test_options();
    let panel = Arc::new(FakePanel::default());
    let session = ModSession::start(&options, gears_probe(), Some(panel));
    let facade = session.facade();

    facade.apply_change("DamageNumbers/TextLifetime", "2.5").unwrap();
    assert!(facade.save_configuration());

    let written = session.metrics().saves_written.load(Ordering::Relaxed);
    session.shutdown().await;

    let store = ConfigStore::in_mod_data_dir(&options.mod_data_dir);
    assert_eq!(store.peek().unwrap().text_lifetime, 2.5);
    assert_eq!(written, 1);
}

#[tokio::test]
async fn test_color_change_from_panel_is_saved_on_shutdown() {
    let (options, _temp_dir) = create_test_options();
    let panel = Arc::new(FakePanel {
        color: Some(Color::rgb(0, 128, 255)),
        ..FakePanel::default()
    });
    let session = ModSession::start(&options, gears_probe(), Some(panel));

    session
        .facade()
        .apply_color_change(SettingKey::HeadshotMarkerColor)
        .unwrap();
    session.shutdown().await;

    let store = ConfigStore::in_mod_data_dir(&options.mod_data_dir);
    assert_eq!(
        store.peek().unwrap().headshot_marker_color,
        Color::rgb(0, 128, 255)
    );
}

#[tokio::test]
async fn test_shutdown_releases_facade() {
    let (options, _temp_dir) = create_test_options();
    let session = ModSession::start(
        &options,
        Box::new(StaticModuleProbe::new(Vec::new())),
        None,
    );
    assert!(session.service().current().is_some());

    let facade = session.facade();
    facade.reset_to_defaults();
    session.shutdown().await;

    // Only the session's handle was released; this one still reads settings
    assert_eq!(facade.read(|s| s.font_size), SettingsState::default().font_size);
}
