//! Detection of the optional host settings plugin (Gears).
//!
//! The plugin is usable only when one of its modules is loaded and every
//! settings interface the mod binds to can be resolved from those modules.
//! Module discovery sits behind [`ModuleProbe`] so the decision itself,
//! [`evaluate_modules`], is a pure function over a list of modules.
//!
//! # Examples
//!
//! ```ignore
//! use angel_damage_numbers::services::capability::{CapabilityDetector, StaticModuleProbe};
//!
//! let detector = CapabilityDetector::new(Box::new(StaticModuleProbe::default()));
//! assert!(!detector.detect_availability());
//! assert_eq!(detector.version_info(), "Not installed");
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::fs;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Module names under which the plugin can be loaded.
pub const PLUGIN_MODULE_NAMES: [&str; 2] = ["GearsAPI", "Gears"];

/// Module preferred for version and location reporting.
pub const PRIMARY_MODULE_NAME: &str = "GearsAPI";

/// Interfaces that must all resolve, by simple name, for the plugin to be used.
pub const REQUIRED_TYPES: [&str; 6] = [
    "IGearsModApi",
    "IGearsMod",
    "IModGlobalSettings",
    "ISwitchGlobalSetting",
    "ISliderGlobalSetting",
    "IColorSelectorGlobalSetting",
];

pub const NOT_INSTALLED: &str = "Not installed";
pub const UNKNOWN_VERSION: &str = "unknown";

/// Name of the manifest each module folder carries.
pub const MODULE_MANIFEST: &str = "module.yaml";

#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Invalid module {name}: {reason}")]
    CorruptModule { name: String, reason: String },

    #[error("Failed to load types from {module}: {reason}")]
    TypeLoad { module: String, reason: String },

    #[error("Failed to list modules: {0}")]
    Io(#[from] std::io::Error),
}

/// A module loaded into the host process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoadedModule {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub location: Utf8PathBuf,
    /// Fully qualified names of the types the module exports.
    #[serde(default)]
    pub types: Vec<String>,
}

impl LoadedModule {
    pub fn new(name: &str, version: Option<&str>, location: impl Into<Utf8PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            version: version.map(str::to_string),
            location: location.into(),
            types: Vec::new(),
        }
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Whether the module exports a type with this full or simple name.
    pub fn exports(&self, name: &str) -> bool {
        self.types
            .iter()
            .any(|full| full == name || simple_type_name(full) == name)
    }

    fn is_plugin(&self) -> bool {
        PLUGIN_MODULE_NAMES.contains(&self.name.as_str())
    }
}

/// `GearsAPI.Settings.Global.ISwitchGlobalSetting` -> `ISwitchGlobalSetting`
pub fn simple_type_name(full: &str) -> &str {
    full.rsplit(['.', ':', '+']).next().unwrap_or(full)
}

/// Source of the modules loaded in the host process.
#[cfg_attr(test, mockall::automock)]
pub trait ModuleProbe: Send + Sync {
    fn loaded_modules(&self) -> Result<Vec<LoadedModule>, CapabilityError>;
}

/// A fixed module list.
#[derive(Debug, Clone, Default)]
pub struct StaticModuleProbe {
    modules: Vec<LoadedModule>,
}

impl StaticModuleProbe {
    pub fn new(modules: Vec<LoadedModule>) -> Self {
        Self { modules }
    }
}

impl ModuleProbe for StaticModuleProbe {
    fn loaded_modules(&self) -> Result<Vec<LoadedModule>, CapabilityError> {
        Ok(self.modules.clone())
    }
}

/// Reads `<mods_dir>/<module>/module.yaml` manifests.
///
/// A module's location defaults to its folder. A mods directory that does not
/// exist means no modules are loaded; an unreadable manifest is an error.
#[derive(Debug, Clone)]
pub struct ManifestModuleProbe {
    mods_dir: Utf8PathBuf,
}

impl ManifestModuleProbe {
    pub fn new(mods_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            mods_dir: mods_dir.into(),
        }
    }

    fn is_plugin_folder(folder: &Utf8Path) -> bool {
        folder
            .file_name()
            .is_some_and(|name| PLUGIN_MODULE_NAMES.contains(&name))
    }

    fn read_manifest(folder: &Utf8Path) -> Result<LoadedModule, CapabilityError> {
        let manifest = folder.join(MODULE_MANIFEST);
        let contents = fs::read_to_string(&manifest)?;

        let mut module: LoadedModule =
            serde_yaml_ng::from_str(&contents).map_err(|e| CapabilityError::CorruptModule {
                name: folder.file_name().unwrap_or(folder.as_str()).to_string(),
                reason: e.to_string(),
            })?;

        if module.location.as_str().is_empty() {
            module.location = folder.to_path_buf();
        }
        Ok(module)
    }
}

impl ModuleProbe for ManifestModuleProbe {
    fn loaded_modules(&self) -> Result<Vec<LoadedModule>, CapabilityError> {
        if !self.mods_dir.is_dir() {
            tracing::debug!("Mods directory {} does not exist", self.mods_dir);
            return Ok(Vec::new());
        }

        let mut modules = Vec::new();
        for entry in fs::read_dir(&self.mods_dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {}: {}", self.mods_dir, e);
                    continue;
                }
            };
            let folder = match Utf8PathBuf::try_from(entry.path()) {
                Ok(folder) => folder,
                Err(e) => {
                    tracing::warn!("Skipping module folder with a non UTF-8 name: {}", e);
                    continue;
                }
            };
            if !folder.join(MODULE_MANIFEST).is_file() {
                continue;
            }

            // Only a broken plugin module decides the verdict
            match Self::read_manifest(&folder) {
                Ok(module) => modules.push(module),
                Err(e) if Self::is_plugin_folder(&folder) => return Err(e),
                Err(e) => tracing::warn!("Skipping module {}: {}", folder, e),
            }
        }

        modules.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(modules)
    }
}

/// Result of capability detection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapabilityVerdict {
    pub available: bool,
    pub plugin_version: Option<String>,
    pub module_name: Option<String>,
    pub module_location: Option<Utf8PathBuf>,
    pub missing_types: Vec<String>,
    /// Probe failure that forced the verdict to "unavailable".
    pub error: Option<String>,
}

impl CapabilityVerdict {
    fn probe_failed(error: &CapabilityError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn is_installed(&self) -> bool {
        self.module_name.is_some()
    }
}

/// Decide whether the plugin is usable from the loaded modules.
///
/// Every name in [`REQUIRED_TYPES`] must be exported by some plugin module.
pub fn evaluate_modules(modules: &[LoadedModule]) -> CapabilityVerdict {
    let plugins: Vec<&LoadedModule> = modules.iter().filter(|m| m.is_plugin()).collect();

    let Some(primary) = plugins
        .iter()
        .find(|m| m.name == PRIMARY_MODULE_NAME)
        .or_else(|| plugins.first())
    else {
        return CapabilityVerdict::default();
    };

    let missing_types: Vec<String> = REQUIRED_TYPES
        .iter()
        .filter(|required| !plugins.iter().any(|m| m.exports(required)))
        .map(|required| required.to_string())
        .collect();

    CapabilityVerdict {
        available: missing_types.is_empty(),
        plugin_version: primary.version.clone(),
        module_name: Some(primary.name.clone()),
        module_location: Some(primary.location.clone()),
        missing_types,
        error: None,
    }
}

#[derive(Debug, Clone)]
struct Detection {
    verdict: CapabilityVerdict,
    plugins: Vec<LoadedModule>,
}

/// Caches the plugin verdict for the life of the process.
///
/// The probe runs on the first query; the result does not change until
/// [`clear_cache`](Self::clear_cache) is called.
pub struct CapabilityDetector {
    probe: Box<dyn ModuleProbe>,
    cache: Mutex<Option<Detection>>,
}

impl CapabilityDetector {
    pub fn new(probe: Box<dyn ModuleProbe>) -> Self {
        Self {
            probe,
            cache: Mutex::new(None),
        }
    }

    /// Whether the host settings plugin is present and usable. Never fails.
    pub fn detect_availability(&self) -> bool {
        self.verdict().available
    }

    /// The cached verdict, probing first if needed.
    pub fn verdict(&self) -> CapabilityVerdict {
        self.with_detection(|detection| detection.verdict.clone())
    }

    /// Forget the cached verdict so the next query probes again.
    pub fn clear_cache(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::debug!("Gears detection cache cleared");
    }

    /// Version of the plugin module, `"Not installed"` or `"unknown"`.
    pub fn version_info(&self) -> String {
        let verdict = self.verdict();
        if !verdict.is_installed() {
            return NOT_INSTALLED.to_string();
        }
        verdict
            .plugin_version
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
    }

    /// Whether a plugin module exports the named type (full or simple name).
    pub fn is_feature_available(&self, name: &str) -> bool {
        let found =
            self.with_detection(|detection| detection.plugins.iter().any(|m| m.exports(name)));
        tracing::debug!("Gears feature '{}' availability: {}", name, found);
        found
    }

    /// One-line description of the detected plugin module.
    pub fn info(&self) -> String {
        let verdict = self.verdict();
        match (&verdict.module_name, &verdict.module_location) {
            (Some(name), Some(location)) => format!(
                "{} {} loaded from {}",
                name,
                verdict.plugin_version.as_deref().unwrap_or(UNKNOWN_VERSION),
                location
            ),
            _ => "Gears not detected".to_string(),
        }
    }

    /// Whether the detected plugin version is one this build can work with.
    ///
    /// Any usable plugin is accepted; an unknown version is accepted with a warning.
    pub fn validate_compatibility(&self) -> bool {
        if !self.detect_availability() {
            return false;
        }

        let version = self.version_info();
        if version == UNKNOWN_VERSION {
            tracing::warn!("Unable to determine Gears version - compatibility uncertain");
        } else {
            tracing::debug!("Gears version {} appears compatible", version);
        }
        true
    }

    fn with_detection<R>(&self, f: impl FnOnce(&Detection) -> R) -> R {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let detection = cache.get_or_insert_with(|| self.detect());
        f(detection)
    }

    fn detect(&self) -> Detection {
        let modules = match self.probe.loaded_modules() {
            Ok(modules) => modules,
            Err(e) => {
                tracing::error!("Error detecting Gears: {}. Using YAML configuration.", e);
                return Detection {
                    verdict: CapabilityVerdict::probe_failed(&e),
                    plugins: Vec::new(),
                };
            }
        };

        let plugins: Vec<LoadedModule> = modules.into_iter().filter(|m| m.is_plugin()).collect();
        for module in &plugins {
            tracing::debug!("Found Gears module: {} at {}", module.name, module.location);
        }

        let verdict = evaluate_modules(&plugins);
        if verdict.available {
            tracing::info!("Gears detected and validated. Using Gears for in-game configuration.");
        } else if verdict.is_installed() {
            tracing::info!(
                "Gears found but required types missing ({}). Using YAML configuration.",
                verdict.missing_types.join(", ")
            );
        } else {
            tracing::debug!("Gears not detected. Using YAML configuration.");
        }

        Detection { verdict, plugins }
    }
}
