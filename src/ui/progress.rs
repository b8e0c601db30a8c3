// Cosmetic progress ticker
//
// The archive tool reports no progress, so the bar is animated on a timer:
// one point per tick, held at PROGRESS_CAP until the worker finishes.

use crate::ui::bridge::{EventLoopBridgeHandle, InstallerEvent};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const PROGRESS_TICK_INTERVAL: Duration = Duration::from_millis(75);

/// Highest value the animation reaches before completion
pub const PROGRESS_CAP: u8 = 95;

/// Next animated value: +1 per tick, never past the cap
pub fn advance(current: u8) -> u8 {
    if current < PROGRESS_CAP {
        current + 1
    } else {
        current
    }
}

/// Background task posting [`InstallerEvent::ProgressTick`] until stopped
pub struct ProgressTicker {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn start(bridge: &EventLoopBridgeHandle, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let poster = bridge.clone();

        let task = bridge.spawn_async(move || async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if poster.is_closed() {
                            break;
                        }
                        // Dropped ticks only slow the animation
                        poster.try_post(InstallerEvent::ProgressTick);
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::trace!("Progress ticker stopped");
        });

        Self { stop_tx, task }
    }

    /// Signal the task to stop; ticks already queued may still arrive
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
