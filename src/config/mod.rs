pub mod document;
pub mod migration;
pub mod runtime;

use crate::config::document::{LEGACY_ROOT_TAG, ROOT_TAG, document_root, parse_document};
use crate::config::migration::CURRENT_VERSION;
use crate::models::SettingsState;
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};

pub use document::render_document;
pub use migration::{MigrationResult, MigrationRule, VersionMigrator};
pub use runtime::{BackendPreference, RuntimeOptions};

/// Folder under the mod data directory that holds the configuration document.
pub const CONFIG_DIR_NAME: &str = "Angel_DamageNumbers";

/// File name of the configuration document.
pub const CONFIG_FILE_NAME: &str = "AngelDamageNumbersConfig.yaml";

/// Result of [`ConfigStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No document existed; one was written from the current settings.
    CreatedDefault,
    /// The document was read; `fields` values were applied.
    Loaded { fields: usize },
    /// The document could not be understood and was left alone.
    Unrecognized,
}

/// Reads and writes the configuration document.
///
/// All writes of the document go through this type. When a load finds a
/// document it cannot parse, the store becomes write-protected for the rest
/// of the session so the user's file is never overwritten with defaults.
#[derive(Debug)]
pub struct ConfigStore {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
    write_protected: AtomicBool,
}

impl ConfigStore {
    /// Create a store for the document inside `config_dir`.
    ///
    /// Nothing is touched on disk until the first save.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Self {
        let config_dir = config_dir.as_ref().to_path_buf();
        Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
            write_protected: AtomicBool::new(false),
        }
    }

    /// Create a store for `<mod_data_dir>/Angel_DamageNumbers/AngelDamageNumbersConfig.yaml`.
    pub fn in_mod_data_dir<P: AsRef<Utf8Path>>(mod_data_dir: P) -> Self {
        Self::new(mod_data_dir.as_ref().join(CONFIG_DIR_NAME))
    }

    pub fn path(&self) -> &Utf8Path {
        &self.config_path
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn exists(&self) -> bool {
        self.config_path.is_file()
    }

    pub fn is_write_protected(&self) -> bool {
        self.write_protected.load(Ordering::Relaxed)
    }

    /// Populate `state` from the document.
    ///
    /// A missing document is created from `state` as it stands. Fields that
    /// are absent or malformed keep their current value in `state`.
    ///
    /// # Returns
    /// What the load found; see [`LoadOutcome`].
    pub fn load(&self, state: &mut SettingsState) -> Result<LoadOutcome> {
        if !self.exists() {
            tracing::info!(
                "Config file not found at {}, creating one with default values",
                self.config_path
            );
            self.save(state)?;
            return Ok(LoadOutcome::CreatedDefault);
        }

        let contents = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        Ok(self.apply_contents(&contents, state))
    }

    /// [`load`](Self::load) on the tokio runtime.
    ///
    /// Reading, creating the directory and writing the default document each
    /// yield to other tasks (such as the save scheduler) in between.
    pub async fn load_async(&self, state: &mut SettingsState) -> Result<LoadOutcome> {
        let exists = tokio::fs::metadata(&self.config_path)
            .await
            .is_ok_and(|meta| meta.is_file());
        if !exists {
            tracing::info!(
                "Config file not found at {}, creating one with default values",
                self.config_path
            );
            self.save_async(state).await?;
            return Ok(LoadOutcome::CreatedDefault);
        }

        let contents = tokio::fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;
        tokio::task::yield_now().await;

        Ok(self.apply_contents(&contents, state))
    }

    fn apply_contents(&self, contents: &str, state: &mut SettingsState) -> LoadOutcome {
        let doc = match parse_document(contents) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!("Failed to parse config {}: {}", self.config_path, e);
                self.protect();
                return LoadOutcome::Unrecognized;
            }
        };

        let children = match document_root(&doc) {
            Some((tag, children)) if tag == ROOT_TAG || tag == LEGACY_ROOT_TAG => children,
            Some((tag, _)) => {
                tracing::error!("Unknown root tag {} in {}", tag, self.config_path);
                self.protect();
                return LoadOutcome::Unrecognized;
            }
            None => {
                tracing::error!("Config {} has no root section", self.config_path);
                self.protect();
                return LoadOutcome::Unrecognized;
            }
        };

        let fields = document::read_settings(children, state);
        tracing::info!("Loaded config from {} ({} values)", self.config_path, fields);
        LoadOutcome::Loaded { fields }
    }

    /// Read the document without side effects.
    ///
    /// Used before logging is configured, so nothing is logged, created or
    /// protected. Returns `None` when there is no readable document.
    pub fn peek(&self) -> Option<SettingsState> {
        let contents = fs::read_to_string(&self.config_path).ok()?;
        let doc = parse_document(&contents).ok()?;
        let (tag, children) = document_root(&doc)?;
        if tag != ROOT_TAG && tag != LEGACY_ROOT_TAG {
            return None;
        }

        let mut state = SettingsState::default();
        document::read_settings(children, &mut state);
        Some(state)
    }

    /// Write the entire document for `state`, with a comment above every value.
    ///
    /// # Arguments
    /// * `state` - The settings to persist
    pub fn save(&self, state: &SettingsState) -> Result<()> {
        if self.is_write_protected() {
            bail!(
                "Refusing to overwrite unrecognized config: {}",
                self.config_path
            );
        }

        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir).with_context(|| {
                format!("Failed to create config directory: {}", self.config_dir)
            })?;
        }

        let contents = render_document(state, CURRENT_VERSION);
        fs::write(&self.config_path, contents)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::debug!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// [`save`](Self::save) on the tokio runtime, yielding between the
    /// directory creation and the write.
    pub async fn save_async(&self, state: &SettingsState) -> Result<()> {
        if self.is_write_protected() {
            bail!(
                "Refusing to overwrite unrecognized config: {}",
                self.config_path
            );
        }

        tokio::fs::create_dir_all(&self.config_dir)
            .await
            .with_context(|| format!("Failed to create config directory: {}", self.config_dir))?;
        tokio::task::yield_now().await;

        let contents = render_document(state, CURRENT_VERSION);
        tokio::fs::write(&self.config_path, contents)
            .await
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::debug!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Write a document holding only compiled defaults.
    pub fn create_default(&self) -> Result<()> {
        self.save(&SettingsState::default())?;
        tracing::info!("Created default config at {}", self.config_path);
        Ok(())
    }

    fn protect(&self) {
        tracing::warn!(
            "Leaving {} untouched for this session; using defaults",
            self.config_path
        );
        self.write_protected.store(true, Ordering::Relaxed);
    }
}
