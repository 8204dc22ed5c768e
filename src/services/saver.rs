//! Debounced persistence of settings.
//!
//! Bursts of changes (dragging a slider in the host settings UI) call
//! [`SettingsSaver::schedule`] many times; only the last call's quiet period
//! matters and a single write happens once it elapses. The deadline is checked
//! by [`SettingsSaver::tick`], which the cooperative [`SettingsSaver::run`]
//! task drives on an interval.

use crate::config::ConfigStore;
use crate::metrics::ConfigMetrics;
use crate::state::SettingsManager;
use anyhow::Result;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

/// Quiet period used when none is configured.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(10);

/// Where a debounced save ends up.
#[cfg_attr(test, mockall::automock)]
pub trait SaveTarget: Send + Sync {
    fn write(&self) -> Result<()>;
}

/// Writes the live settings to the configuration document.
pub struct DocumentSaveTarget {
    store: Arc<ConfigStore>,
    settings: SettingsManager,
}

impl DocumentSaveTarget {
    pub fn new(store: Arc<ConfigStore>, settings: SettingsManager) -> Self {
        Self { store, settings }
    }
}

impl SaveTarget for DocumentSaveTarget {
    fn write(&self) -> Result<()> {
        let snapshot = self.settings.snapshot();
        self.store.save(&snapshot)
    }
}

#[derive(Debug, Default)]
struct SaverState {
    deadline: Option<Instant>,
    suppressed: bool,
}

/// Coalesces save requests into one write per quiet period.
pub struct SettingsSaver {
    target: Arc<dyn SaveTarget>,
    quiet_period: Duration,
    state: Mutex<SaverState>,
    metrics: Arc<ConfigMetrics>,
}

impl SettingsSaver {
    pub fn new(target: Arc<dyn SaveTarget>, metrics: Arc<ConfigMetrics>) -> Self {
        Self {
            target,
            quiet_period: DEFAULT_QUIET_PERIOD,
            state: Mutex::new(SaverState::default()),
            metrics,
        }
    }

    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Request a save once changes stop arriving. Restarts the quiet period.
    pub fn schedule(&self) {
        self.schedule_at(Instant::now());
    }

    /// [`schedule`](Self::schedule) with an explicit clock reading.
    pub fn schedule_at(&self, now: Instant) {
        let mut state = self.lock();
        if state.suppressed {
            self.metrics.record_save_suppressed();
            tracing::trace!("Save request ignored while suppressed");
            return;
        }

        let coalesced = state.deadline.is_some();
        state.deadline = Some(now + self.quiet_period);
        self.metrics.record_save_scheduled(coalesced);
        tracing::trace!("Save scheduled in {:?} (coalesced: {})", self.quiet_period, coalesced);
    }

    /// Write if the pending deadline has passed.
    ///
    /// # Returns
    /// `true` if a write was attempted
    pub fn tick(&self) -> bool {
        self.tick_at(Instant::now())
    }

    /// [`tick`](Self::tick) with an explicit clock reading.
    pub fn tick_at(&self, now: Instant) -> bool {
        let due = {
            let mut state = self.lock();
            match state.deadline {
                Some(deadline) if now >= deadline => {
                    state.deadline = None;
                    true
                }
                _ => false,
            }
        };

        if due {
            // Failures are already logged and counted
            let _ = self.write();
        }
        due
    }

    /// Cancel any pending deadline and write immediately.
    pub fn flush_now(&self) -> Result<()> {
        self.lock().deadline = None;
        self.write()
    }

    /// While on, [`schedule`](Self::schedule) does nothing. Used while settings are being loaded.
    pub fn suppress(&self, on: bool) {
        self.lock().suppressed = on;
    }

    pub fn is_suppressed(&self) -> bool {
        self.lock().suppressed
    }

    pub fn is_pending(&self) -> bool {
        self.lock().deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.lock().deadline
    }

    /// Tick every `tick_every` until `shutdown` turns true or its sender is dropped.
    pub async fn run(self: Arc<Self>, tick_every: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(tick_every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!("Save scheduler running (tick every {:?})", tick_every);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Save scheduler stopped");
    }

    fn write(&self) -> Result<()> {
        match self.target.write() {
            Ok(()) => {
                self.metrics.record_save_written();
                tracing::debug!("Settings saved");
                Ok(())
            }
            Err(e) => {
                self.metrics.record_save_failure();
                tracing::error!("Failed to save settings: {:#}", e);
                Err(e)
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SaverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn create_test_saver(writes: usize) -> (SettingsSaver, Arc<ConfigMetrics>) {
        let mut target = MockSaveTarget::new();
        target.expect_write().times(writes).returning(|| Ok(()));

        let metrics = Arc::new(ConfigMetrics::new());
        let saver = SettingsSaver::new(Arc::new(target), Arc::clone(&metrics));
        (saver, metrics)
    }

    #[test]
    fn test_burst_of_schedules_writes_once() {
        let (saver, metrics) = create_test_saver(1);
        let start = Instant::now();

        for i in 0..10 {
            saver.schedule_at(start + Duration::from_secs(i));
        }

        // Deadline follows the last request
        assert!(!saver.tick_at(start + Duration::from_secs(18)));
        assert!(saver.tick_at(start + Duration::from_secs(19)));
        assert!(!saver.tick_at(start + Duration::from_secs(60)));

        assert_eq!(metrics.saves_scheduled.load(Ordering::Relaxed), 10);
        assert_eq!(metrics.saves_coalesced.load(Ordering::Relaxed), 9);
        assert_eq!(metrics.saves_written.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_flush_cancels_pending_save() {
        let (saver, _metrics) = create_test_saver(1);
        let start = Instant::now();

        saver.schedule_at(start);
        saver.flush_now().unwrap();

        assert!(!saver.is_pending());
        assert!(!saver.tick_at(start + Duration::from_secs(30)));
    }

    #[test]
    fn test_flush_writes_without_pending_save() {
        let (saver, _metrics) = create_test_saver(1);
        saver.flush_now().unwrap();
    }

    #[test]
    fn test_suppressed_schedule_is_ignored() {
        let (saver, metrics) = create_test_saver(0);
        let start = Instant::now();

        saver.suppress(true);
        saver.schedule_at(start);
        assert!(!saver.is_pending());
        assert!(!saver.tick_at(start + Duration::from_secs(30)));

        saver.suppress(false);
        assert!(!saver.is_suppressed());
        assert_eq!(metrics.saves_suppressed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_write_failure_is_counted() {
        let mut target = MockSaveTarget::new();
        target
            .expect_write()
            .times(1)
            .returning(|| Err(anyhow::anyhow!("disk full")));
        let metrics = Arc::new(ConfigMetrics::new());
        let saver = SettingsSaver::new(Arc::new(target), Arc::clone(&metrics));

        assert!(saver.flush_now().is_err());
        assert_eq!(metrics.save_failures.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_writes_after_quiet_period() {
        let (saver, metrics) = create_test_saver(1);
        let saver = Arc::new(saver.with_quiet_period(Duration::from_secs(10)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(Arc::clone(&saver).run(Duration::from_millis(250), shutdown_rx));

        saver.schedule();
        tokio::time::sleep(Duration::from_secs(5)).await;
        saver.schedule();
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(metrics.saves_written.load(Ordering::Relaxed), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(metrics.saves_written.load(Ordering::Relaxed), 1);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
