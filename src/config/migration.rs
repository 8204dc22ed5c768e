//! Schema migration for the configuration document.
//!
//! Documents are upgraded one chain step at a time. Each step re-reads the
//! document from disk, applies one [`MigrationRule`] and writes it back, so a
//! rule only has to understand the shape of its immediate predecessor. A
//! timestamped backup is taken before the first step and restored if any step
//! fails.

use crate::config::document::{
    LEGACY_ROOT_TAG, LEGACY_VERSION_MARKER, ROOT_TAG, VERSION_MARKER, document_root,
    parse_document, scalar_text,
};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde_yaml_ng::{Mapping, Value};
use std::fmt;
use std::fs;
use thiserror::Error;

/// Every schema version, oldest first. New versions are appended.
pub const VERSION_CHAIN: [&str; 3] = ["1.0.0", "2.0.0", "3.0.0"];

/// Schema version written by this build.
pub const CURRENT_VERSION: &str = VERSION_CHAIN[VERSION_CHAIN.len() - 1];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("Unknown configuration format: {0}")]
    UnknownFormat(String),

    #[error("No migration rule defined for step: {0}")]
    MissingRule(String),

    #[error("Invalid migration path: {from} -> {to}")]
    InvalidPath { from: String, to: String },
}

/// Key of the rule that upgrades `from` to `to`, e.g. `1.0.0->2.0.0`.
pub fn step_key(from: &str, to: &str) -> String {
    format!("{}->{}", from, to)
}

/// Normalise a version string to three components (`3.0` becomes `3.0.0`).
///
/// Text that is not a dotted number is returned trimmed but otherwise unchanged.
pub fn normalize_version(text: &str) -> String {
    let text = text.trim();
    let parts: Vec<&str> = text.split('.').collect();

    let numeric = parts
        .iter()
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    if !numeric || parts.len() >= 3 {
        return text.to_string();
    }

    let mut normalized = parts.join(".");
    for _ in parts.len()..3 {
        normalized.push_str(".0");
    }
    normalized
}

/// Detected schema version of a stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentVersion {
    Known(String),
    /// Unrecognised root tag, or the document could not be parsed.
    Unknown,
}

impl DocumentVersion {
    pub fn as_known(&self) -> Option<&str> {
        match self {
            DocumentVersion::Known(version) => Some(version),
            DocumentVersion::Unknown => None,
        }
    }
}

impl fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentVersion::Known(version) => f.write_str(version),
            DocumentVersion::Unknown => f.write_str("Unknown"),
        }
    }
}

/// A rename of a tag: the document root, or the version marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagChange {
    pub from: String,
    pub to: String,
}

impl TagChange {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// The transform that upgrades a document from one chain version to the next.
///
/// Parts are applied in field order: root rename, version marker, new
/// sections, setting renames, setting removals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MigrationRule {
    pub from_version: String,
    pub to_version: String,
    pub description: String,
    pub root_tag_change: Option<TagChange>,
    pub version_tag_change: Option<TagChange>,
    pub new_sections: Vec<String>,
    /// `Section/OldName` -> `NewName`, within the same section.
    pub renamed_settings: IndexMap<String, String>,
    /// `Section/Name`
    pub removed_settings: Vec<String>,
}

impl MigrationRule {
    pub fn new(
        from_version: impl Into<String>,
        to_version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            from_version: from_version.into(),
            to_version: to_version.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_root_rename(mut self, from: &str, to: &str) -> Self {
        self.root_tag_change = Some(TagChange::new(from, to));
        self
    }

    pub fn with_version_marker(mut self, from: &str, to: &str) -> Self {
        self.version_tag_change = Some(TagChange::new(from, to));
        self
    }

    pub fn with_new_section(mut self, section: &str) -> Self {
        self.new_sections.push(section.to_string());
        self
    }

    pub fn with_rename(mut self, path: &str, new_name: &str) -> Self {
        self.renamed_settings
            .insert(path.to_string(), new_name.to_string());
        self
    }

    pub fn with_removal(mut self, path: &str) -> Self {
        self.removed_settings.push(path.to_string());
        self
    }

    pub fn key(&self) -> String {
        step_key(&self.from_version, &self.to_version)
    }
}

/// Rules shipped with this build.
pub fn default_rules() -> Vec<MigrationRule> {
    vec![
        MigrationRule::new(
            "1.0.0",
            "2.0.0",
            "Add TextStyling section and rename root tag",
        )
        .with_root_rename(LEGACY_ROOT_TAG, ROOT_TAG)
        .with_new_section("TextStyling"),
        MigrationRule::new("2.0.0", "3.0.0", "Add ModMetaData version tag")
            .with_version_marker(LEGACY_VERSION_MARKER, VERSION_MARKER),
    ]
}

/// Outcome of one [`VersionMigrator::migrate_if_needed`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationResult {
    pub was_migration_needed: bool,
    pub migration_successful: bool,
    pub start_version: String,
    pub end_version: String,
    pub migration_path: Vec<String>,
    pub backup_path: Option<Utf8PathBuf>,
    pub error_message: Option<String>,
}

impl MigrationResult {
    fn new(target: &str) -> Self {
        Self {
            was_migration_needed: false,
            migration_successful: false,
            start_version: DocumentVersion::Unknown.to_string(),
            end_version: target.to_string(),
            migration_path: Vec::new(),
            backup_path: None,
            error_message: None,
        }
    }
}

/// A document loaded for transformation: its root tag and the mapping below it.
struct WorkingDocument {
    tag: String,
    children: Mapping,
}

impl WorkingDocument {
    fn load(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration: {}", path))?;
        let doc = parse_document(&text)
            .with_context(|| format!("Failed to parse configuration: {}", path))?;

        let (tag, children) = document_root(&doc)
            .ok_or_else(|| MigrationError::UnknownFormat(path.to_string()))?;

        Ok(Self {
            tag: tag.to_string(),
            children: children.clone(),
        })
    }

    fn save(self, path: &Utf8Path) -> Result<()> {
        let mut root = Mapping::new();
        root.insert(Value::String(self.tag), Value::Mapping(self.children));

        let yaml = serde_yaml_ng::to_string(&Value::Mapping(root))
            .context("Failed to serialize migrated configuration")?;
        fs::write(path, yaml)
            .with_context(|| format!("Failed to write migrated configuration: {}", path))?;
        Ok(())
    }

    fn rename_root(&mut self, change: &TagChange) {
        if self.tag == change.from {
            tracing::debug!("Changed root tag: {} -> {}", change.from, change.to);
            self.tag = change.to.clone();
        }
    }

    /// Drop the old marker and put the new one first, set to `version`.
    fn replace_marker(&mut self, change: &TagChange, version: &str) {
        let mut rebuilt = Mapping::with_capacity(self.children.len() + 1);
        rebuilt.insert(
            Value::String(change.to.clone()),
            Value::String(version.to_string()),
        );

        for (key, value) in std::mem::take(&mut self.children) {
            let is_marker = key
                .as_str()
                .is_some_and(|k| k == change.from || k == change.to);
            if !is_marker {
                rebuilt.insert(key, value);
            }
        }

        self.children = rebuilt;
        tracing::debug!(
            "Updated version tag: {} -> {} = {}",
            change.from,
            change.to,
            version
        );
    }

    fn add_section(&mut self, section: &str) {
        if self.children.contains_key(section) {
            return;
        }
        self.children
            .insert(Value::String(section.to_string()), Value::Mapping(Mapping::new()));
        tracing::debug!("Added new section: {}", section);
    }

    fn section_mut(&mut self, section: &str) -> Option<&mut Mapping> {
        let node = self.children.get_mut(section)?;
        if node.is_null() {
            *node = Value::Mapping(Mapping::new());
        }
        node.as_mapping_mut()
    }

    fn rename_setting(&mut self, path: &str, new_name: &str) {
        let Some((section, old_name)) = path.split_once('/') else {
            tracing::warn!("Ignoring malformed rename path: {}", path);
            return;
        };
        let Some(fields) = self.section_mut(section) else {
            return;
        };
        if !fields.contains_key(old_name) || fields.contains_key(new_name) {
            return;
        }

        let renamed: Mapping = std::mem::take(fields)
            .into_iter()
            .map(|(key, value)| {
                if key.as_str() == Some(old_name) {
                    (Value::String(new_name.to_string()), value)
                } else {
                    (key, value)
                }
            })
            .collect();
        *fields = renamed;
        tracing::debug!("Renamed setting: {} -> {}/{}", path, section, new_name);
    }

    fn remove_setting(&mut self, path: &str) {
        let Some((section, name)) = path.split_once('/') else {
            tracing::warn!("Ignoring malformed removal path: {}", path);
            return;
        };
        let Some(fields) = self.section_mut(section) else {
            return;
        };
        if fields.shift_remove(name).is_some() {
            tracing::debug!("Removed setting: {}", path);
        }
    }

    fn apply(&mut self, rule: &MigrationRule) {
        if let Some(change) = &rule.root_tag_change {
            self.rename_root(change);
        }
        if let Some(change) = &rule.version_tag_change {
            self.replace_marker(change, &rule.to_version);
        }
        for section in &rule.new_sections {
            self.add_section(section);
        }
        for (path, new_name) in &rule.renamed_settings {
            self.rename_setting(path, new_name);
        }
        for path in &rule.removed_settings {
            self.remove_setting(path);
        }
    }
}

/// Upgrades stored configuration documents to the current schema version.
///
/// Rules are keyed by their step (`from->to`). The shipped rule set covers
/// every adjacent pair of [`VERSION_CHAIN`]; see [`Self::chain_is_complete`].
#[derive(Debug, Clone)]
pub struct VersionMigrator {
    chain: Vec<String>,
    rules: IndexMap<String, MigrationRule>,
}

impl VersionMigrator {
    /// Create a migrator with the shipped version chain and rules.
    pub fn new() -> Self {
        let mut migrator = Self {
            chain: VERSION_CHAIN.iter().map(|v| v.to_string()).collect(),
            rules: IndexMap::new(),
        };
        for rule in default_rules() {
            migrator.register_rule(rule);
        }
        migrator
    }

    /// The version documents are migrated to: the last chain entry.
    pub fn target_version(&self) -> &str {
        self.chain.last().map(String::as_str).unwrap_or(CURRENT_VERSION)
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// Append a version to the chain. Its rule must be registered separately.
    pub fn extend_chain(&mut self, version: &str) {
        let version = normalize_version(version);
        if !self.chain.contains(&version) {
            self.chain.push(version);
        }
    }

    /// Add or replace the rule for a step.
    pub fn register_rule(&mut self, rule: MigrationRule) {
        let key = rule.key();
        tracing::debug!("Registered migration rule: {}", key);
        self.rules.insert(key, rule);
    }

    /// Remove the rule for a step, returning it if it was registered.
    pub fn remove_rule(&mut self, from: &str, to: &str) -> Option<MigrationRule> {
        self.rules.shift_remove(&step_key(from, to))
    }

    pub fn rule(&self, from: &str, to: &str) -> Option<&MigrationRule> {
        self.rules.get(&step_key(from, to))
    }

    /// Whether every adjacent pair in the chain has a rule.
    pub fn chain_is_complete(&self) -> bool {
        self.chain
            .windows(2)
            .all(|pair| self.rules.contains_key(&step_key(&pair[0], &pair[1])))
    }

    /// Work out which schema version the document at `path` was written with.
    ///
    /// A legacy root always means `1.0.0`. A current root reports its
    /// `ModMetaData` marker, else its `Version` marker, else `2.0.0` (modern
    /// documents written before markers existed).
    pub fn detect_version(&self, path: &Utf8Path) -> DocumentVersion {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to detect config version: {}: {}", path, e);
                return DocumentVersion::Unknown;
            }
        };

        let doc = match parse_document(&text) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!("Failed to detect config version: {}: {}", path, e);
                return DocumentVersion::Unknown;
            }
        };

        let Some((tag, children)) = document_root(&doc) else {
            tracing::warn!("Unknown config format in {}", path);
            return DocumentVersion::Unknown;
        };

        match tag {
            LEGACY_ROOT_TAG => DocumentVersion::Known(VERSION_CHAIN[0].to_string()),
            ROOT_TAG => {
                let marker = [VERSION_MARKER, LEGACY_VERSION_MARKER]
                    .into_iter()
                    .find_map(|name| children.get(name).and_then(scalar_text));

                match marker {
                    Some(text) => DocumentVersion::Known(normalize_version(&text)),
                    None => DocumentVersion::Known(VERSION_CHAIN[1].to_string()),
                }
            }
            other => {
                tracing::warn!("Unknown config format with root tag: {}", other);
                DocumentVersion::Unknown
            }
        }
    }

    /// Ordered step keys from `from` to `to`.
    ///
    /// Equal versions give an empty path. A version missing from the chain,
    /// or a `from` that is not strictly older than `to`, is an error.
    pub fn migration_path(&self, from: &str, to: &str) -> Result<Vec<String>, MigrationError> {
        if from == to {
            return Ok(Vec::new());
        }

        let position = |version: &str| self.chain.iter().position(|v| v == version);
        match (position(from), position(to)) {
            (Some(start), Some(end)) if start < end => Ok(self.chain[start..=end]
                .windows(2)
                .map(|pair| step_key(&pair[0], &pair[1]))
                .collect()),
            _ => Err(MigrationError::InvalidPath {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    /// Upgrade the document at `path` to the target version if it is older.
    ///
    /// Never panics and never propagates an error: failures are reported in
    /// the returned [`MigrationResult`], and any partially migrated document
    /// is restored from the backup taken before the first step.
    pub fn migrate_if_needed(&self, path: &Utf8Path) -> MigrationResult {
        let target = self.target_version().to_string();
        let mut result = MigrationResult::new(&target);

        if !path.exists() {
            result.migration_successful = true;
            return result;
        }

        let detected = self.detect_version(path);
        result.start_version = detected.to_string();

        let Some(start) = detected.as_known() else {
            let message = MigrationError::UnknownFormat(path.to_string()).to_string();
            tracing::error!("{}; leaving the file untouched", message);
            result.error_message = Some(message);
            return result;
        };

        let steps = match self.migration_path(start, &target) {
            Ok(steps) => steps,
            Err(e) => {
                tracing::error!("{}", e);
                result.error_message = Some(e.to_string());
                return result;
            }
        };

        if steps.is_empty() {
            tracing::debug!("Config is already current version: {}", start);
            result.migration_successful = true;
            return result;
        }

        result.was_migration_needed = true;
        result.migration_path = steps.clone();
        tracing::info!(
            "Config migration needed: {} -> {} (via {})",
            start,
            target,
            steps.join(" -> ")
        );

        let outcome = create_backup(path).and_then(|backup| {
            result.backup_path = Some(backup);
            self.apply_steps(path, &steps)
        });

        match outcome {
            Ok(()) => {
                result.migration_successful = true;
                tracing::info!(
                    "Config migration completed successfully: {} -> {}",
                    result.start_version,
                    target
                );
            }
            Err(e) => {
                let message = format!("Migration failed: {:#}", e);
                tracing::error!("{}", message);
                result.error_message = Some(message);

                if let Some(backup) = &result.backup_path {
                    restore_backup(backup, path);
                }
            }
        }

        result
    }

    fn apply_steps(&self, path: &Utf8Path, steps: &[String]) -> Result<()> {
        for step in steps {
            let rule = self
                .rules
                .get(step)
                .ok_or_else(|| MigrationError::MissingRule(step.clone()))?;

            let mut doc = WorkingDocument::load(path)?;
            tracing::debug!("Applying migration: {}", rule.description);
            doc.apply(rule);
            doc.save(path)?;

            tracing::debug!("Applied migration step: {}", step);
        }
        Ok(())
    }
}

impl Default for VersionMigrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy `path` to `<path>.backup-<yyyyMMdd-HHmmss>`, adding a counter if that name is taken.
fn create_backup(path: &Utf8Path) -> Result<Utf8PathBuf> {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let base = format!("{}.backup-{}", path, timestamp);

    let mut backup = Utf8PathBuf::from(&base);
    let mut counter = 1;
    while backup.exists() {
        backup = Utf8PathBuf::from(format!("{}-{}", base, counter));
        counter += 1;
    }

    fs::copy(path, &backup)
        .with_context(|| format!("Failed to create backup: {}", backup))?;
    tracing::info!("Created configuration backup: {}", backup);
    Ok(backup)
}

fn restore_backup(backup: &Utf8Path, path: &Utf8Path) {
    match fs::copy(backup, path) {
        Ok(_) => tracing::info!("Restored original config from backup: {}", backup),
        Err(e) => tracing::error!("Failed to restore backup {}: {}", backup, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(contents: &str) -> (Utf8PathBuf, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let path = dir.join("AngelDamageNumbersConfig.yaml");
        fs::write(&path, contents).unwrap();
        (path, temp_dir)
    }

    #[test]
    fn test_shipped_chain_is_complete() {
        let migrator = VersionMigrator::new();
        assert!(migrator.chain_is_complete());
        assert_eq!(migrator.target_version(), CURRENT_VERSION);
    }

    #[test]
    fn test_removing_a_rule_breaks_the_chain() {
        let mut migrator = VersionMigrator::new();
        assert!(migrator.remove_rule("1.0.0", "2.0.0").is_some());
        assert!(!migrator.chain_is_complete());
    }

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version("3.0"), "3.0.0");
        assert_eq!(normalize_version(" 2 "), "2.0.0");
        assert_eq!(normalize_version("2.0.0"), "2.0.0");
        assert_eq!(normalize_version("beta"), "beta");
    }

    #[test]
    fn test_migration_path_is_incremental() {
        let migrator = VersionMigrator::new();
        assert_eq!(
            migrator.migration_path("1.0.0", "3.0.0").unwrap(),
            vec!["1.0.0->2.0.0", "2.0.0->3.0.0"]
        );
        assert!(migrator.migration_path("3.0.0", "3.0.0").unwrap().is_empty());
    }

    #[test]
    fn test_migration_path_rejects_downgrades_and_unknown_versions() {
        let migrator = VersionMigrator::new();
        assert!(matches!(
            migrator.migration_path("3.0.0", "1.0.0"),
            Err(MigrationError::InvalidPath { .. })
        ));
        assert!(migrator.migration_path("9.9.9", "3.0.0").is_err());
    }

    #[test]
    fn test_detect_version() {
        let migrator = VersionMigrator::new();

        let (path, _dir) = write_config("FloatingDamageNumbersConfig:\n  Version: 9.0.0\n");
        assert_eq!(migrator.detect_version(&path), DocumentVersion::Known("1.0.0".into()));

        let (path, _dir) = write_config("AngelDamageNumbersConfig:\n  Debug: {}\n");
        assert_eq!(migrator.detect_version(&path), DocumentVersion::Known("2.0.0".into()));

        let (path, _dir) =
            write_config("AngelDamageNumbersConfig:\n  Version: '2.0'\n  ModMetaData: 3.0.0\n");
        assert_eq!(migrator.detect_version(&path), DocumentVersion::Known("3.0.0".into()));

        let (path, _dir) = write_config("SomethingElse:\n  Debug: {}\n");
        assert_eq!(migrator.detect_version(&path), DocumentVersion::Unknown);

        let (path, _dir) = write_config("{ not yaml");
        assert_eq!(migrator.detect_version(&path), DocumentVersion::Unknown);
    }

    #[test]
    fn test_marker_moves_to_front() {
        let (path, _dir) = write_config(
            "AngelDamageNumbersConfig:\n  Debug:\n    EnableDebugLogging: true\n  Version: 2.0.0\n",
        );
        let migrator = VersionMigrator::new();

        let result = migrator.migrate_if_needed(&path);
        assert!(result.migration_successful);
        assert_eq!(result.migration_path, vec!["2.0.0->3.0.0"]);

        let doc = parse_document(&fs::read_to_string(&path).unwrap()).unwrap();
        let (_, children) = document_root(&doc).unwrap();
        let keys: Vec<&str> = children.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["ModMetaData", "Debug"]);
    }

    #[test]
    fn test_renames_and_removals() {
        let (path, _dir) = write_config(
            "AngelDamageNumbersConfig:\n  ModMetaData: 3.0.0\n  Advanced:\n    ScaleByDamage: false\n    Obsolete: 1\n    MaxScale: 3\n",
        );
        let mut migrator = VersionMigrator::new();
        migrator.extend_chain("4.0");
        migrator.register_rule(
            MigrationRule::new("3.0.0", "4.0.0", "Tidy advanced settings")
                .with_version_marker(VERSION_MARKER, VERSION_MARKER)
                .with_rename("Advanced/ScaleByDamage", "ScaleTextByDamage")
                .with_removal("Advanced/Obsolete"),
        );

        let result = migrator.migrate_if_needed(&path);
        assert!(result.migration_successful, "{:?}", result.error_message);
        assert_eq!(result.end_version, "4.0.0");

        let doc = parse_document(&fs::read_to_string(&path).unwrap()).unwrap();
        let (_, children) = document_root(&doc).unwrap();
        assert_eq!(
            children.get(VERSION_MARKER).and_then(scalar_text).as_deref(),
            Some("4.0.0")
        );

        let advanced = children.get("Advanced").and_then(Value::as_mapping).unwrap();
        let keys: Vec<&str> = advanced.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["ScaleTextByDamage", "MaxScale"]);
        assert_eq!(advanced.get("ScaleTextByDamage"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_unknown_document_is_left_untouched() {
        let original = "SomethingElse:\n  Debug: {}\n";
        let (path, dir) = write_config(original);
        let migrator = VersionMigrator::new();

        let result = migrator.migrate_if_needed(&path);

        assert!(!result.migration_successful);
        assert!(!result.was_migration_needed);
        assert_eq!(result.start_version, "Unknown");
        assert!(result.error_message.is_some());
        assert!(result.backup_path.is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_file_needs_no_migration() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let migrator = VersionMigrator::new();

        let result = migrator.migrate_if_needed(&dir.join("missing.yaml"));

        assert!(result.migration_successful);
        assert!(!result.was_migration_needed);
        assert!(result.backup_path.is_none());
    }
}
