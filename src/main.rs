//! adn-config - command-line front end for the damage numbers configuration core.
//!
//! # Overview
//!
//! Runs the same startup the mod performs inside the host, without the host:
//! - Runtime options (`adn-runtime.yaml`, `ADN_*` environment variables)
//! - Logging (daily rotating file + optional console output)
//! - Capability detection from module manifests in the mod data folder
//! - Document migration, loading and validation
//!
//! Any `Name=Value` arguments are applied as setting changes and saved.
//!
//! # Usage
//!
//! ```text
//! adn-config                          # migrate/create the document and print a summary
//! adn-config FontSize=28 KillMarker=+ # change settings and save
//! ```

use anyhow::{Context, Result};
use angel_damage_numbers::config::ConfigStore;
use angel_damage_numbers::services::ManifestModuleProbe;
use angel_damage_numbers::{APP_NAME, ModSession, RuntimeOptions, VERSION};

fn main() -> Result<()> {
    let options = RuntimeOptions::load()?;

    // The document's own debug flag counts before any backend is chosen
    let document_debug = ConfigStore::in_mod_data_dir(&options.mod_data_dir)
        .peek()
        .is_some_and(|s| s.enable_debug_logging);

    let _guard = angel_damage_numbers::logging::setup_logging_with_console(
        &options.log_dir,
        "angel-damage-numbers",
        options.debug_logging || document_debug,
        options.console_logging,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let changes: Vec<(String, String)> = std::env::args()
        .skip(1)
        .map(|arg| {
            arg.split_once('=')
                .map(|(name, value)| (name.trim().to_string(), value.to_string()))
                .with_context(|| format!("Expected Name=Value, got: {}", arg))
        })
        .collect::<Result<_>>()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let probe = Box::new(ManifestModuleProbe::new(options.mod_data_dir.clone()));
        let mut session = ModSession::start_async(&options, probe, None).await;
        session.spawn_saver();

        let facade = session.facade();
        let mut failed = 0;
        for (name, value) in &changes {
            match facade.apply_change(name, value) {
                Ok(()) => tracing::info!("Set {} = {}", name, value),
                Err(e) => {
                    tracing::error!("{}", e);
                    failed += 1;
                }
            }
        }

        if !changes.is_empty() && failed < changes.len() && !facade.save_configuration() {
            tracing::error!("Settings were changed but could not be saved");
        }

        println!("{}", facade.configuration_info());
        println!("{}", facade.settings_summary());

        session.shutdown().await;

        if failed > 0 {
            anyhow::bail!("{} of {} setting changes were rejected", failed, changes.len());
        }
        Ok(())
    })
}
