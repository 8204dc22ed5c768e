//! Reading and writing the on-disk configuration document.
//!
//! The document is YAML with a single top-level key (the root tag) whose
//! mapping holds the version marker followed by one mapping per section:
//!
//! ```yaml
//! AngelDamageNumbersConfig:
//!   ModMetaData: 3.0.0
//!   Debug:
//!     # Enable debug messages in the log ...
//!     EnableDebugLogging: false
//! ```

use crate::models::{SECTIONS, SettingKey, SettingKind, SettingValue, SettingsState};
use serde_yaml_ng::{Mapping, Value};
use std::fmt::Write as _;
use std::sync::LazyLock;

/// Root tag written by the current schema.
pub const ROOT_TAG: &str = "AngelDamageNumbersConfig";

/// Root tag used by `1.0.0` documents.
pub const LEGACY_ROOT_TAG: &str = "FloatingDamageNumbersConfig";

/// Version marker written by the current schema.
pub const VERSION_MARKER: &str = "ModMetaData";

/// Version marker used by `2.0.0` documents.
pub const LEGACY_VERSION_MARKER: &str = "Version";

static EMPTY_MAPPING: LazyLock<Mapping> = LazyLock::new(Mapping::new);

/// Parse document text into a YAML value tree.
pub fn parse_document(text: &str) -> Result<Value, serde_yaml_ng::Error> {
    serde_yaml_ng::from_str(text)
}

/// The root tag of a parsed document and the mapping under it.
///
/// A root with no children (`FloatingDamageNumbersConfig:` on its own) yields
/// an empty mapping. Returns `None` when the document is not a mapping keyed
/// by a string, or when the root holds a scalar or sequence.
pub fn document_root(doc: &Value) -> Option<(&str, &Mapping)> {
    let (key, children) = doc.as_mapping()?.iter().next()?;
    let tag = key.as_str()?;

    match children {
        Value::Mapping(map) => Some((tag, map)),
        Value::Null => Some((tag, &*EMPTY_MAPPING)),
        _ => None,
    }
}

/// Text of a scalar node. Strings, numbers and booleans qualify.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Apply every recognised field under `children` to `state`.
///
/// Absent or unparsable fields keep whatever `state` already holds.
/// Returns how many fields were applied.
pub fn read_settings(children: &Mapping, state: &mut SettingsState) -> usize {
    let mut applied = 0;

    for key in SettingKey::ALL {
        let Some(section) = children.get(key.section()).and_then(Value::as_mapping) else {
            continue;
        };
        let Some(node) = section.get(key.name()) else {
            continue;
        };

        let Some(text) = scalar_text(node) else {
            tracing::debug!("Ignoring non-scalar value for {}", key.path());
            continue;
        };

        match state.set_from_text(key, &text) {
            Ok(()) => applied += 1,
            Err(e) => tracing::debug!("Keeping current value for {}: {}", key.path(), e),
        }
    }

    applied
}

/// Render the full document for `state`, stamped with `version`.
///
/// Every value is preceded by a comment describing it and its default.
pub fn render_document(state: &SettingsState, version: &str) -> String {
    let mut out = String::new();

    out.push_str("# Angel's Enhanced Damage Numbers configuration\n");
    out.push_str("# Colors use hex codes (#RRGGBB or #RRGGBBAA). Vectors use x,y,z.\n");
    out.push_str("# Changes take effect the next time the mod loads.\n");
    let _ = writeln!(out, "{}:", ROOT_TAG);
    let _ = writeln!(out, "  {}: {}", VERSION_MARKER, quoted(version));

    for section in SECTIONS {
        let _ = writeln!(out, "  {}:", section);
        for key in SettingKey::in_section(section) {
            let _ = writeln!(out, "    # {}", key.description());
            let _ = writeln!(out, "    {}: {}", key.name(), render_value(&state.get(key)));
        }
    }

    out
}

fn render_value(value: &SettingValue) -> String {
    match value.kind() {
        SettingKind::Bool | SettingKind::Int | SettingKind::Float => value.to_string(),
        SettingKind::Text | SettingKind::Vector | SettingKind::Color => {
            quoted(&value.to_string())
        }
    }
}

/// A single-line YAML scalar that reads back as exactly `text`.
fn quoted(text: &str) -> String {
    if text.contains('\n') {
        return format!("{:?}", text);
    }

    match serde_yaml_ng::to_string(text) {
        Ok(yaml) => yaml.trim_end().to_string(),
        Err(_) => format!("{:?}", text),
    }
}
