use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Optional runtime options file, looked up in the working directory.
pub const RUNTIME_OPTIONS_FILE: &str = "adn-runtime.yaml";

/// Prefix for environment overrides, e.g. `ADN_MOD_DATA_DIR`.
pub const ENV_PREFIX: &str = "ADN";

/// Which configuration backend to use at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackendPreference {
    /// Host settings UI when the plugin is detected, otherwise the document.
    #[default]
    Auto,
    /// Always use the configuration document.
    Document,
    /// Use the host settings UI; still falls back to the document if wiring fails.
    HostUi,
}

/// Process-level options for the configuration core.
///
/// These are not mod settings: they say where the mod data lives, how logging
/// is set up and how the save scheduler is paced. Values come from compiled
/// defaults, then `adn-runtime.yaml`, then `ADN_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeOptions {
    pub mod_data_dir: Utf8PathBuf,
    pub log_dir: Utf8PathBuf,
    pub save_debounce_secs: u64,
    pub tick_interval_ms: u64,
    pub debug_logging: bool,
    pub console_logging: bool,
    pub backend: BackendPreference,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            mod_data_dir: Utf8PathBuf::from("Mods"),
            log_dir: Utf8PathBuf::from("logs"),
            save_debounce_secs: 10,
            tick_interval_ms: 250,
            debug_logging: false,
            console_logging: true,
            backend: BackendPreference::Auto,
        }
    }
}

impl RuntimeOptions {
    /// Load options using `adn-runtime.yaml` in the working directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Utf8Path::new(RUNTIME_OPTIONS_FILE))
    }

    /// Load options, layering `path` (if it exists) and the environment over the defaults.
    ///
    /// # Arguments
    /// * `path` - Options file; a missing file is not an error
    pub fn load_from(path: &Utf8Path) -> Result<Self> {
        let defaults = Self::default();

        let options = config::Config::builder()
            .set_default("mod_data_dir", defaults.mod_data_dir.as_str())?
            .set_default("log_dir", defaults.log_dir.as_str())?
            .set_default("save_debounce_secs", defaults.save_debounce_secs as i64)?
            .set_default("tick_interval_ms", defaults.tick_interval_ms as i64)?
            .set_default("debug_logging", defaults.debug_logging)?
            .set_default("console_logging", defaults.console_logging)?
            .set_default("backend", "auto")?
            .add_source(config::File::from(path.as_std_path()).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read runtime options: {}", path))?;

        let options: RuntimeOptions = options
            .try_deserialize()
            .with_context(|| format!("Failed to parse runtime options: {}", path))?;

        tracing::debug!("Runtime options: {:?}", options);
        Ok(options)
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_secs(self.save_debounce_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();

        let options = RuntimeOptions::load_from(&dir.join("missing.yaml")).unwrap();

        assert_eq!(options.save_debounce_secs, 10);
        assert_eq!(options.backend, BackendPreference::Auto);
        assert_eq!(options.save_debounce(), Duration::from_secs(10));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let path = dir.join("adn-runtime.yaml");
        fs::write(
            &path,
            "mod_data_dir: /games/mods\nsave_debounce_secs: 3\nbackend: host-ui\n",
        )
        .unwrap();

        let options = RuntimeOptions::load_from(&path).unwrap();

        assert_eq!(options.mod_data_dir, Utf8PathBuf::from("/games/mods"));
        assert_eq!(options.save_debounce_secs, 3);
        assert_eq!(options.backend, BackendPreference::HostUi);
        assert_eq!(options.log_dir, Utf8PathBuf::from("logs"));
    }

    #[test]
    fn test_tick_interval_is_never_zero() {
        let options = RuntimeOptions {
            tick_interval_ms: 0,
            ..RuntimeOptions::default()
        };
        assert_eq!(options.tick_interval(), Duration::from_millis(1));
    }
}
