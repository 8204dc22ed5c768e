// Mod session lifecycle
//
// Wires the configuration core together at mod initialisation and tears it
// down at shutdown. Replaces the process-wide singletons the host would
// otherwise need with one owned value.

use crate::config::{ConfigStore, RuntimeOptions, VersionMigrator};
use crate::metrics::ConfigMetrics;
use crate::services::capability::{CapabilityDetector, ModuleProbe};
use crate::services::configuration::{
    BackendContext, ConfigFacade, ConfigurationService, HostSettingsPanel,
};
use crate::services::saver::{DocumentSaveTarget, SettingsSaver};
use crate::state::SettingsManager;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Everything the configuration core owns for the lifetime of the mod.
pub struct ModSession {
    service: ConfigurationService,
    facade: Arc<ConfigFacade>,
    saver: Arc<SettingsSaver>,
    metrics: Arc<ConfigMetrics>,
    options: RuntimeOptions,
    saver_task: Option<(watch::Sender<bool>, JoinHandle<()>)>,
}

impl ModSession {
    /// Build the configuration core and load the settings.
    ///
    /// # Arguments
    /// * `options` - Runtime options (mod data folder, save pacing, backend)
    /// * `probe` - Source of loaded modules for capability detection
    /// * `panel` - Host settings panel, when running inside the host
    pub fn start(
        options: &RuntimeOptions,
        probe: Box<dyn ModuleProbe>,
        panel: Option<Arc<dyn HostSettingsPanel>>,
    ) -> Self {
        let wiring = Wiring::new(options, probe, panel);
        let facade = wiring.service.refresh_configuration_service();
        wiring.finish(facade, options)
    }

    /// [`start`](Self::start) with the document load run as a cooperative
    /// task on the current tokio runtime.
    pub async fn start_async(
        options: &RuntimeOptions,
        probe: Box<dyn ModuleProbe>,
        panel: Option<Arc<dyn HostSettingsPanel>>,
    ) -> Self {
        let wiring = Wiring::new(options, probe, panel);
        let facade = wiring.service.refresh_configuration_service_async().await;
        wiring.finish(facade, options)
    }

    pub fn facade(&self) -> Arc<ConfigFacade> {
        Arc::clone(&self.facade)
    }

    pub fn service(&self) -> &ConfigurationService {
        &self.service
    }

    pub fn metrics(&self) -> &ConfigMetrics {
        &self.metrics
    }

    /// Start the background task that writes debounced saves.
    ///
    /// Must be called from within a tokio runtime. Calling it twice is a no-op.
    pub fn spawn_saver(&mut self) {
        if self.saver_task.is_some() {
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(
            Arc::clone(&self.saver).run(self.options.tick_interval(), shutdown_rx),
        );
        self.saver_task = Some((shutdown_tx, handle));
    }

    /// Flush pending changes, stop the saver task and release everything.
    pub async fn shutdown(mut self) {
        tracing::info!("Shutting down configuration core");
        self.facade.shutdown();

        if let Some((shutdown_tx, handle)) = self.saver_task.take() {
            let _ = shutdown_tx.send(true);
            if let Err(e) = handle.await {
                tracing::error!("Save scheduler task failed: {}", e);
            }
        }

        self.metrics.log_summary();
        self.service.cleanup_statics();
    }
}

/// Collaborators built before the first load.
struct Wiring {
    service: ConfigurationService,
    saver: Arc<SettingsSaver>,
    metrics: Arc<ConfigMetrics>,
}

impl Wiring {
    fn new(
        options: &RuntimeOptions,
        probe: Box<dyn ModuleProbe>,
        panel: Option<Arc<dyn HostSettingsPanel>>,
    ) -> Self {
        tracing::info!("Starting configuration core (mod data: {})", options.mod_data_dir);

        let metrics = Arc::new(ConfigMetrics::new());
        let settings = SettingsManager::new();
        let store = Arc::new(ConfigStore::in_mod_data_dir(&options.mod_data_dir));
        let target = Arc::new(DocumentSaveTarget::new(Arc::clone(&store), settings.clone()));
        let saver = Arc::new(
            SettingsSaver::new(target, Arc::clone(&metrics)).with_quiet_period(options.save_debounce()),
        );

        let ctx = BackendContext {
            settings,
            store,
            migrator: Arc::new(VersionMigrator::new()),
            saver: Arc::clone(&saver),
            metrics: Arc::clone(&metrics),
        };

        let detector = Arc::new(CapabilityDetector::new(probe));
        tracing::info!("Gears: {}", detector.info());

        Self {
            service: ConfigurationService::new(detector, ctx, panel, options.backend),
            saver,
            metrics,
        }
    }

    fn finish(self, facade: Arc<ConfigFacade>, options: &RuntimeOptions) -> ModSession {
        let adjusted = facade.validate_settings();
        if !adjusted.is_empty() {
            tracing::warn!("Adjusted {} out-of-range settings", adjusted.len());
        }

        ModSession {
            service: self.service,
            facade,
            saver: self.saver,
            metrics: self.metrics,
            options: options.clone(),
            saver_task: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendPreference;
    use crate::services::capability::StaticModuleProbe;
    use crate::services::configuration::BackendKind;
    use camino::Utf8PathBuf;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn create_test_options() -> (RuntimeOptions, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let options = RuntimeOptions {
            mod_data_dir: Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap(),
            save_debounce_secs: 1,
            tick_interval_ms: 10,
            backend: BackendPreference::Auto,
            ..RuntimeOptions::default()
        };
        (options, temp_dir)
    }

    #[tokio::test]
    async fn test_session_creates_document_and_shuts_down() {
        let (options, _temp_dir) = create_test_options();
        let mut session = ModSession::start(
            &options,
            Box::new(StaticModuleProbe::new(Vec::new())),
            None,
        );
        session.spawn_saver();

        let facade = session.facade();
        assert_eq!(facade.backend_kind(), BackendKind::Document);

        let store = ConfigStore::in_mod_data_dir(&options.mod_data_dir);
        assert!(store.exists());

        session.shutdown().await;
    }

    #[test]
    fn test_shutdown_flushes_pending_save() {
        let (options, _temp_dir) = create_test_options();
        let session = ModSession::start(
            &options,
            Box::new(StaticModuleProbe::new(Vec::new())),
            None,
        );

        session
            .facade()
            .set(crate::models::SettingKey::FontSize, crate::models::SettingValue::Int(44))
            .unwrap();
        session.saver.schedule();
        let metrics = Arc::clone(&session.metrics);

        // No saver task to stop
        tokio_test::block_on(session.shutdown());

        assert_eq!(metrics.saves_written.load(Ordering::Relaxed), 1);
        let store = ConfigStore::in_mod_data_dir(&options.mod_data_dir);
        assert_eq!(store.peek().unwrap().font_size, 44);
    }

    #[tokio::test]
    async fn test_document_edit_survives_shutdown() {
        let (options, _temp_dir) = create_test_options();
        let mut session = ModSession::start_async(
            &options,
            Box::new(StaticModuleProbe::new(Vec::new())),
            None,
        )
        .await;
        session.spawn_saver();

        session
            .facade()
            .set(crate::models::SettingKey::FontSize, crate::models::SettingValue::Int(44))
            .unwrap();
        assert!(!session.saver.is_pending());

        session.shutdown().await;

        let store = ConfigStore::in_mod_data_dir(&options.mod_data_dir);
        assert_eq!(store.peek().unwrap().font_size, 44);
    }
}
