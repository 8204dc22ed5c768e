//! Data models for the damage-numbers configuration.
//!
//! - [`SettingsState`]: every mod setting with its compiled default
//! - [`SettingKey`]: names, sections and document comments for each setting
//! - [`SettingValue`]: a typed value, used for keyed reads and writes
//! - [`Color`]: RGBA colour with hex and legacy float parsing
//!
//! `SettingsState` is wrapped in `Arc<RwLock<>>` by
//! [`SettingsManager`](crate::state::SettingsManager); components read and
//! mutate it through the manager rather than holding their own copy.

pub mod color;
pub mod settings;

pub use color::Color;
pub use settings::{
    SECTIONS, SettingKey, SettingKind, SettingValue, SettingsError, SettingsState, Vec3,
};
