// Performance metrics module
//
// Lightweight counters for the installer session, logged on shutdown

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Installer metrics
///
/// Uses atomic operations so the controller, the progress ticker and the
/// patch worker can all record without locks.
#[derive(Debug)]
pub struct Metrics {
    /// Patch attempts started
    pub patch_attempts: AtomicUsize,

    /// Attempts that installed the translation
    pub patches_succeeded: AtomicUsize,

    /// Attempts that ended in any failure
    pub patches_failed: AtomicUsize,

    /// Attempts abandoned at the backup confirmation
    pub patches_cancelled: AtomicUsize,

    /// Total time spent in patch sessions in milliseconds
    pub total_patch_time_ms: AtomicU64,

    /// Events accepted by the bridge
    pub events_posted: AtomicU64,

    /// Progress ticks dropped because the event queue was full
    pub progress_ticks_dropped: AtomicU64,

    /// Application start time
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            patch_attempts: AtomicUsize::new(0),
            patches_succeeded: AtomicUsize::new(0),
            patches_failed: AtomicUsize::new(0),
            patches_cancelled: AtomicUsize::new(0),
            total_patch_time_ms: AtomicU64::new(0),
            events_posted: AtomicU64::new(0),
            progress_ticks_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_patch_attempt(&self) {
        self.patch_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished session and its duration
    pub fn record_patch_finished(&self, success: bool, duration: Duration) {
        if success {
            self.patches_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.patches_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_patch_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_patch_cancelled(&self) {
        self.patches_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_posted(&self) {
        self.events_posted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_progress_tick_dropped(&self) {
        self.progress_ticks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average duration of finished sessions in milliseconds
    pub fn avg_patch_time_ms(&self) -> f64 {
        let total = self.total_patch_time_ms.load(Ordering::Relaxed);
        let count = self.patches_succeeded.load(Ordering::Relaxed)
            + self.patches_failed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Installer Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Patches: {} attempted, {} succeeded, {} failed, {} cancelled",
            self.patch_attempts.load(Ordering::Relaxed),
            self.patches_succeeded.load(Ordering::Relaxed),
            self.patches_failed.load(Ordering::Relaxed),
            self.patches_cancelled.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total patch time: {:.2}s (avg: {:.2}ms per session)",
            self.total_patch_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_patch_time_ms()
        );
        tracing::info!(
            "Events posted: {}, progress ticks dropped: {}",
            self.events_posted.load(Ordering::Relaxed),
            self.progress_ticks_dropped.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
