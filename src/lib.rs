// Angel's Enhanced Damage Numbers - configuration core
//
// This is the library crate holding settings, document migration, capability
// detection and debounced persistence. The binary crate (main.rs) is a small
// command-line front end over the same session.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod session;
pub mod state;

// Re-export commonly used types for convenience
pub use config::{ConfigStore, RuntimeOptions, VersionMigrator};
pub use models::{Color, SettingKey, SettingValue, SettingsState};
pub use services::{CapabilityDetector, ConfigFacade, ConfigurationService, SettingsSaver};
pub use session::ModSession;
pub use state::{SettingChange, SettingsManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
