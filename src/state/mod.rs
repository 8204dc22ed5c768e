// Settings state management
//
// SettingsManager wraps SettingsState with thread-safe access using
// Arc<RwLock<T>> and emits change events to subscribers.

use crate::models::{SettingKey, SettingValue, SettingsError, SettingsState};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when settings are modified
#[derive(Clone, Debug, PartialEq)]
pub enum SettingChange {
    /// A single setting now holds a new value
    ValueChanged { key: SettingKey, value: SettingValue },

    /// The whole state was replaced by a load or host-UI seeding
    Loaded,

    /// Every setting was put back to its compiled default
    Reset,

    /// Validation clamped one or more settings
    Validated { adjusted: Vec<SettingKey> },
}

/// Thread-safe owner of the live [`SettingsState`].
///
/// This is the handle every configuration component receives instead of
/// reaching for global state:
/// - [`read()`](Self::read) and [`snapshot()`](Self::snapshot) for reading
/// - [`update()`](Self::update) and [`set()`](Self::set) for mutations with
///   automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to changes
///
/// Cloning the manager shares the same state and channel.
pub struct SettingsManager {
    state: Arc<RwLock<SettingsState>>,

    /// Broadcast channel for change events; sending without subscribers is fine
    change_tx: broadcast::Sender<SettingChange>,
}

impl SettingsManager {
    /// Create a manager holding compiled defaults
    ///
    /// # Returns
    /// A new SettingsManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        Self::with_state(SettingsState::default())
    }

    pub fn with_state(state: SettingsState) -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(state)),
            change_tx,
        }
    }

    /// Clone of the current state, safe to use without holding locks.
    pub fn snapshot(&self) -> SettingsState {
        self.read(SettingsState::clone)
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let font_size = settings.read(|s| s.font_size);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SettingsState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Read one setting by key.
    pub fn get(&self, key: SettingKey) -> SettingValue {
        self.read(|state| state.get(key))
    }

    /// Mutate the state and emit a [`SettingChange::ValueChanged`] for every
    /// setting whose value differs afterwards.
    ///
    /// # Returns
    /// The change events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<SettingChange>
    where
        F: FnOnce(&mut SettingsState),
    {
        let changes = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let old_state = state.clone();

            update_fn(&mut state);

            Self::detect_changes(&old_state, &state)
        };

        for change in &changes {
            self.emit(change.clone());
        }

        changes
    }

    /// Assign one setting. Nothing changes if the value has the wrong type.
    pub fn set(&self, key: SettingKey, value: SettingValue) -> Result<Vec<SettingChange>, SettingsError> {
        let mut result = Ok(());
        let changes = self.update(|state| result = state.set(key, value));
        result.map(|()| changes)
    }

    /// Parse `text` for `key` and assign it. Nothing changes if parsing fails.
    pub fn set_from_text(&self, key: SettingKey, text: &str) -> Result<Vec<SettingChange>, SettingsError> {
        let mut result = Ok(());
        let changes = self.update(|state| result = state.set_from_text(key, text));
        result.map(|()| changes)
    }

    /// Swap in a whole new state (after a load) and emit [`SettingChange::Loaded`].
    pub fn replace(&self, new_state: SettingsState) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            *state = new_state;
        }
        self.emit(SettingChange::Loaded);
    }

    /// Put every setting back to its compiled default.
    pub fn reset_to_defaults(&self) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            *state = SettingsState::default();
        }
        tracing::info!("Settings reset to defaults");
        self.emit(SettingChange::Reset);
    }

    /// Clamp out-of-range settings.
    ///
    /// # Returns
    /// The settings that were adjusted
    pub fn validate(&self) -> Vec<SettingKey> {
        let adjusted = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.validate()
        };

        if !adjusted.is_empty() {
            tracing::warn!(
                "Adjusted out-of-range settings: {}",
                adjusted
                    .iter()
                    .map(|key| key.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            self.emit(SettingChange::Validated {
                adjusted: adjusted.clone(),
            });
        }

        adjusted
    }

    /// Subscribe to change events
    ///
    /// Returns a receiver that will get notified of all future changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.change_tx.subscribe()
    }

    /// Shared handle to the underlying lock.
    pub fn state_arc(&self) -> Arc<RwLock<SettingsState>> {
        Arc::clone(&self.state)
    }

    fn detect_changes(old: &SettingsState, new: &SettingsState) -> Vec<SettingChange> {
        if old == new {
            return Vec::new();
        }

        SettingKey::ALL
            .into_iter()
            .filter_map(|key| {
                let value = new.get(key);
                (old.get(key) != value).then_some(SettingChange::ValueChanged { key, value })
            })
            .collect()
    }

    fn emit(&self, change: SettingChange) {
        // Ignore send errors - it's OK if no one is listening
        let _ = self.change_tx.send(change);
    }
}

impl Default for SettingsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SettingsManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            change_tx: self.change_tx.clone(),
        }
    }
}
