//! Backend selection and the settings façade.
//!
//! Two backends feed the same [`SettingsState`](crate::models::SettingsState):
//! - [`DocumentBackend`]: values come from the YAML document and are saved on demand
//! - [`HostUiBackend`]: values are seeded from the document into the host
//!   settings panel, and every edit schedules a debounced save
//!
//! Callers only ever talk to [`ConfigFacade`], so nothing outside this module
//! branches on which backend is active.

use crate::config::{BackendPreference, ConfigStore, LoadOutcome, MigrationResult, VersionMigrator};
use crate::metrics::ConfigMetrics;
use crate::models::{Color, SettingKey, SettingValue, SettingsError, SettingsState};
use crate::services::capability::CapabilityDetector;
use crate::services::saver::SettingsSaver;
use crate::state::SettingsManager;
use anyhow::{Context, Result};
use std::sync::{Arc, PoisonError, RwLock};

pub const HOST_UI_INFO: &str =
    "Configuration: Gears in-game UI (Options > Mods > Angel's Enhanced Damage Numbers)";
pub const DOCUMENT_INFO: &str =
    "Configuration: YAML file (edit AngelDamageNumbersConfig.yaml in the mod folder)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Document,
    HostUi,
}

/// The host's in-game settings panel, provided by the settings plugin.
#[cfg_attr(test, mockall::automock)]
pub trait HostSettingsPanel: Send + Sync {
    /// Register the mod's settings with the panel, initialised from `settings`.
    fn bind(&self, settings: &SettingsState) -> Result<()>;

    /// The colour currently selected in the panel for `key`.
    fn current_color(&self, key: SettingKey) -> Option<Color>;

    /// Text shown next to the mod in the panel.
    fn description(&self) -> String;
}

/// Shared collaborators handed to every backend.
#[derive(Clone)]
pub struct BackendContext {
    pub settings: SettingsManager,
    pub store: Arc<ConfigStore>,
    pub migrator: Arc<VersionMigrator>,
    pub saver: Arc<SettingsSaver>,
    pub metrics: Arc<ConfigMetrics>,
}

impl BackendContext {
    /// Migrate the document if it is out of date, then load it into the live settings.
    ///
    /// Errors are logged; the session carries on with whatever could be loaded.
    pub fn load_document(&self) -> MigrationResult {
        let migration = self.migrate();

        let mut state = self.settings.snapshot();
        let loaded = self.store.load(&mut state);
        if self.accept_load(&migration, state, loaded) {
            self.rewrite_migrated();
        }

        migration
    }

    /// [`load_document`](Self::load_document) with the document I/O run as a
    /// cooperative task. Migration still completes before the load starts.
    pub async fn load_document_async(&self) -> MigrationResult {
        let migration = self.migrate();

        let mut state = self.settings.snapshot();
        let loaded = self.store.load_async(&mut state).await;
        if self.accept_load(&migration, state, loaded) {
            let snapshot = self.settings.snapshot();
            if let Err(e) = self.store.save_async(&snapshot).await {
                tracing::error!("Failed to rewrite migrated configuration: {:#}", e);
            }
        }

        migration
    }

    fn migrate(&self) -> MigrationResult {
        let migration = self.migrator.migrate_if_needed(self.store.path());
        if migration.was_migration_needed {
            self.metrics.record_migration(migration.migration_successful);
        }
        if let Some(message) = &migration.error_message {
            tracing::warn!(
                "Continuing with the configuration as found ({}): {}",
                migration.start_version,
                message
            );
        }
        migration
    }

    /// Install a loaded state.
    ///
    /// # Returns
    /// `true` when the document was just migrated and should be rewritten with comments
    fn accept_load(
        &self,
        migration: &MigrationResult,
        state: SettingsState,
        loaded: Result<LoadOutcome>,
    ) -> bool {
        match loaded {
            Ok(outcome) => {
                tracing::debug!("Configuration load outcome: {:?}", outcome);
                self.settings.replace(state);
                migration.was_migration_needed
                    && migration.migration_successful
                    && matches!(outcome, LoadOutcome::Loaded { .. })
            }
            Err(e) => {
                tracing::error!("Failed to load configuration: {:#}", e);
                false
            }
        }
    }

    // Migration steps drop comments; put the annotated layout back
    fn rewrite_migrated(&self) {
        let snapshot = self.settings.snapshot();
        if let Err(e) = self.store.save(&snapshot) {
            tracing::error!("Failed to rewrite migrated configuration: {:#}", e);
        }
    }
}

/// What a backend adds on top of the shared document load.
pub trait SettingsBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Connect the backend once the settings are loaded.
    fn attach(&self, ctx: &BackendContext) -> Result<()>;

    /// React to a setting that has just changed in the live state.
    fn on_change(&self, ctx: &BackendContext, key: SettingKey);

    fn describe(&self) -> String;

    fn current_color(&self, key: SettingKey) -> Option<Color>;
}

/// Settings live in the YAML document; saving is explicit.
#[derive(Debug, Default)]
pub struct DocumentBackend;

impl SettingsBackend for DocumentBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn attach(&self, _ctx: &BackendContext) -> Result<()> {
        Ok(())
    }

    fn on_change(&self, _ctx: &BackendContext, _key: SettingKey) {}

    fn describe(&self) -> String {
        DOCUMENT_INFO.to_string()
    }

    fn current_color(&self, _key: SettingKey) -> Option<Color> {
        None
    }
}

/// Settings are edited in the host panel and saved after each burst of edits.
pub struct HostUiBackend {
    panel: Arc<dyn HostSettingsPanel>,
}

impl HostUiBackend {
    pub fn new(panel: Arc<dyn HostSettingsPanel>) -> Self {
        Self { panel }
    }
}

impl SettingsBackend for HostUiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::HostUi
    }

    /// Seed the panel from the loaded document.
    ///
    /// The panel may echo every seeded value back as a change; saves are
    /// suppressed until binding is over.
    fn attach(&self, ctx: &BackendContext) -> Result<()> {
        let snapshot = ctx.settings.snapshot();

        ctx.saver.suppress(true);
        let bound = self.panel.bind(&snapshot);
        ctx.saver.suppress(false);
        bound.context("Failed to register settings with the Gears panel")?;

        tracing::info!("Gears settings registered: {}", self.panel.description());
        Ok(())
    }

    fn on_change(&self, ctx: &BackendContext, key: SettingKey) {
        tracing::debug!("Gears setting changed: {}", key.path());
        ctx.saver.schedule();
    }

    fn describe(&self) -> String {
        HOST_UI_INFO.to_string()
    }

    fn current_color(&self, key: SettingKey) -> Option<Color> {
        self.panel.current_color(key)
    }
}

/// The one settings surface the rest of the mod uses.
pub struct ConfigFacade {
    backend: Box<dyn SettingsBackend>,
    ctx: BackendContext,
}

impl ConfigFacade {
    pub fn new(backend: Box<dyn SettingsBackend>, ctx: BackendContext) -> Self {
        Self { backend, ctx }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn settings(&self) -> &SettingsManager {
        &self.ctx.settings
    }

    /// Reload the settings from the document, migrating it first if needed.
    pub fn load_configuration(&self) -> MigrationResult {
        self.ctx.load_document()
    }

    /// [`load_configuration`](Self::load_configuration) as a cooperative task.
    pub async fn load_configuration_async(&self) -> MigrationResult {
        self.ctx.load_document_async().await
    }

    /// Write the current settings to the document now.
    ///
    /// # Returns
    /// `true` if the document was written
    pub fn save_configuration(&self) -> bool {
        self.ctx.saver.flush_now().is_ok()
    }

    pub fn reset_to_defaults(&self) {
        self.ctx.settings.reset_to_defaults();
    }

    /// Clamp out-of-range settings, returning the ones that changed.
    pub fn validate_settings(&self) -> Vec<SettingKey> {
        self.ctx.settings.validate()
    }

    pub fn settings_summary(&self) -> String {
        self.ctx.settings.read(SettingsState::summary)
    }

    pub fn configuration_info(&self) -> String {
        self.backend.describe()
    }

    pub fn get(&self, key: SettingKey) -> SettingValue {
        self.ctx.settings.get(key)
    }

    /// Typed read access, e.g. `facade.read(|s| s.font_size)`.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SettingsState) -> R,
    {
        self.ctx.settings.read(f)
    }

    /// Assign a setting and let the backend react if the value changed.
    pub fn set(&self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError> {
        let changes = self.ctx.settings.set(key, value)?;
        self.after_change(key, !changes.is_empty());
        Ok(())
    }

    /// Handle a "settings changed" notification carrying the setting name and its new text.
    pub fn apply_change(&self, name: &str, text: &str) -> Result<(), SettingsError> {
        let key =
            SettingKey::from_name(name).ok_or_else(|| SettingsError::UnknownSetting(name.to_string()))?;
        let changes = self.ctx.settings.set_from_text(key, text)?;
        self.after_change(key, !changes.is_empty());
        Ok(())
    }

    /// Pull the colour currently selected in the host panel for `key`.
    ///
    /// Does nothing when the backend has no panel or the panel has no colour.
    pub fn apply_color_change(&self, key: SettingKey) -> Result<(), SettingsError> {
        match self.backend.current_color(key) {
            Some(color) => self.set(key, SettingValue::Color(color)),
            None => {
                tracing::debug!("No panel colour available for {}", key.path());
                Ok(())
            }
        }
    }

    /// Write the current settings, whether or not a save is pending.
    ///
    /// Skipped when the store is protecting a document it could not read.
    pub fn shutdown(&self) {
        if self.ctx.store.is_write_protected() {
            tracing::info!("Configuration left untouched at shutdown (unrecognized document)");
            return;
        }
        tracing::info!("Flushing settings at shutdown");
        let _ = self.ctx.saver.flush_now();
    }

    fn after_change(&self, key: SettingKey, changed: bool) {
        if !changed {
            return;
        }
        self.ctx.metrics.record_settings_change();
        self.backend.on_change(&self.ctx, key);
    }
}

/// Chooses the backend once capabilities are known and hands out the façade.
pub struct ConfigurationService {
    detector: Arc<CapabilityDetector>,
    ctx: BackendContext,
    panel: Option<Arc<dyn HostSettingsPanel>>,
    preference: BackendPreference,
    current: RwLock<Option<Arc<ConfigFacade>>>,
}

impl ConfigurationService {
    /// # Arguments
    /// * `detector` - Capability detector for the host settings plugin
    /// * `ctx` - Collaborators shared by both backends
    /// * `panel` - Host settings panel, when the host provides one
    /// * `preference` - Backend forced by runtime options, or `Auto`
    pub fn new(
        detector: Arc<CapabilityDetector>,
        ctx: BackendContext,
        panel: Option<Arc<dyn HostSettingsPanel>>,
        preference: BackendPreference,
    ) -> Self {
        Self {
            detector,
            ctx,
            panel,
            preference,
            current: RwLock::new(None),
        }
    }

    /// The active façade, if one has been built.
    pub fn current(&self) -> Option<Arc<ConfigFacade>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pick a backend, load the settings and make the façade current.
    ///
    /// Order is fixed: capability detection and backend selection, then
    /// migration and load of the document, then attaching the backend.
    pub fn refresh_configuration_service(&self) -> Arc<ConfigFacade> {
        let wants_host_ui = self.wants_host_ui();
        self.ctx.load_document();
        self.install(self.attach_backend(wants_host_ui))
    }

    /// [`refresh_configuration_service`](Self::refresh_configuration_service)
    /// with the document load run as a cooperative task.
    pub async fn refresh_configuration_service_async(&self) -> Arc<ConfigFacade> {
        let wants_host_ui = self.wants_host_ui();
        self.ctx.load_document_async().await;
        self.install(self.attach_backend(wants_host_ui))
    }

    /// Drop the façade, forget the detection result and reset the settings.
    ///
    /// Nothing is written; call [`ConfigFacade::shutdown`] first to persist.
    pub fn cleanup_statics(&self) {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.detector.clear_cache();
        self.ctx.settings.reset_to_defaults();
        tracing::debug!("Configuration service cleaned up");
    }

    pub fn detector(&self) -> &CapabilityDetector {
        &self.detector
    }

    fn wants_host_ui(&self) -> bool {
        match self.preference {
            BackendPreference::Document => false,
            BackendPreference::HostUi => true,
            BackendPreference::Auto => self.detector.detect_availability(),
        }
    }

    fn install(&self, facade: ConfigFacade) -> Arc<ConfigFacade> {
        let facade = Arc::new(facade);
        tracing::info!("{}", facade.configuration_info());

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&facade));
        facade
    }

    fn attach_backend(&self, wants_host_ui: bool) -> ConfigFacade {
        if wants_host_ui {
            match &self.panel {
                Some(panel) => {
                    let backend = HostUiBackend::new(Arc::clone(panel));
                    match backend.attach(&self.ctx) {
                        Ok(()) => {
                            tracing::info!("Using Gears for configuration");
                            return ConfigFacade::new(Box::new(backend), self.ctx.clone());
                        }
                        Err(e) => tracing::warn!(
                            "Gears setup failed, falling back to YAML configuration: {:#}",
                            e
                        ),
                    }
                }
                None => tracing::warn!(
                    "Gears is available but no settings panel was provided, using YAML configuration"
                ),
            }
        }

        ConfigFacade::new(Box::new(DocumentBackend), self.ctx.clone())
    }
}
