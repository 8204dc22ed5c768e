//! Services module - the configuration core's moving parts.
//!
//! # Components
//!
//! - [`CapabilityDetector`]: Finds out whether the Gears settings plugin is
//!   loaded and exports every type the in-game settings panel needs. The
//!   result is cached until [`CapabilityDetector::clear_cache`].
//!
//! - [`SettingsSaver`]: Debounces save requests. Each request restarts a quiet
//!   period; one write happens when it elapses, driven by a cooperative tick.
//!
//! - [`ConfigurationService`]: Picks the document or host-UI backend and hands
//!   out the [`ConfigFacade`] the rest of the mod reads settings through.
//!
//! The services take their collaborators as explicit parameters
//! ([`SettingsManager`](crate::state::SettingsManager),
//! [`ConfigStore`](crate::config::ConfigStore), probes and panels), so tests
//! can wire them up with fakes.

pub mod capability;
pub mod configuration;
pub mod saver;

pub use capability::{
    CapabilityDetector, CapabilityError, CapabilityVerdict, LoadedModule, ManifestModuleProbe,
    ModuleProbe, StaticModuleProbe,
};
pub use configuration::{
    BackendContext, BackendKind, ConfigFacade, ConfigurationService, DocumentBackend,
    HostSettingsPanel, HostUiBackend, SettingsBackend,
};
pub use saver::{DocumentSaveTarget, SaveTarget, SettingsSaver};
