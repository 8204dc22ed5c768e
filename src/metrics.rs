// Configuration metrics module
//
// Lightweight counters for the save scheduler and migration, logged at shutdown

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Session counters for the configuration core
///
/// Uses atomic operations so the saver, the façade and the migration step can
/// record without locks. Shared as `Arc<ConfigMetrics>`.
#[derive(Debug)]
pub struct ConfigMetrics {
    /// Calls to `schedule()` that were accepted
    pub saves_scheduled: AtomicU64,

    /// Scheduled saves that pushed out an already pending deadline
    pub saves_coalesced: AtomicU64,

    /// Schedules ignored while the saver was suppressed
    pub saves_suppressed: AtomicU64,

    /// Documents actually written
    pub saves_written: AtomicU64,

    /// Writes that failed
    pub save_failures: AtomicU64,

    /// Setting changes applied through the façade
    pub settings_changes: AtomicU64,

    /// Migrations that upgraded a document
    pub migrations_performed: AtomicU64,

    /// Migrations that failed and were rolled back
    pub migration_failures: AtomicU64,

    start_time: Instant,
}

impl ConfigMetrics {
    pub fn new() -> Self {
        Self {
            saves_scheduled: AtomicU64::new(0),
            saves_coalesced: AtomicU64::new(0),
            saves_suppressed: AtomicU64::new(0),
            saves_written: AtomicU64::new(0),
            save_failures: AtomicU64::new(0),
            settings_changes: AtomicU64::new(0),
            migrations_performed: AtomicU64::new(0),
            migration_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_save_scheduled(&self, coalesced: bool) {
        self.saves_scheduled.fetch_add(1, Ordering::Relaxed);
        if coalesced {
            self.saves_coalesced.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_save_suppressed(&self) {
        self.saves_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_save_written(&self) {
        self.saves_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_save_failure(&self) {
        self.save_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_settings_change(&self) {
        self.settings_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_migration(&self, successful: bool) {
        if successful {
            self.migrations_performed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.migration_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Configuration Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Saves: {} scheduled ({} coalesced, {} suppressed), {} written, {} failed",
            self.saves_scheduled.load(Ordering::Relaxed),
            self.saves_coalesced.load(Ordering::Relaxed),
            self.saves_suppressed.load(Ordering::Relaxed),
            self.saves_written.load(Ordering::Relaxed),
            self.save_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Setting changes: {}, migrations: {} performed, {} failed",
            self.settings_changes.load(Ordering::Relaxed),
            self.migrations_performed.load(Ordering::Relaxed),
            self.migration_failures.load(Ordering::Relaxed)
        );
    }
}

impl Default for ConfigMetrics {
    fn default() -> Self {
        Self::new()
    }
}
