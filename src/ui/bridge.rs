// EventLoopBridge - Coordinates between the tokio runtime and the installer event loop
//
// The controller owns all installer state and runs on a single thread. Everything
// else (operator input, the progress ticker, the patch worker) talks to it by
// posting InstallerEvents through the bridge:
// - try_post() for cosmetic or repeatable events; dropped when the queue is full
// - post() for events that must arrive (the patch completion)
// - spawn_async() to move work onto the tokio thread pool

use crate::metrics::Metrics;
use crate::services::patching::PatchReport;
use camino::Utf8PathBuf;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Bounded to 100 events so a stalled controller cannot grow memory unbounded
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Events handled by the installer controller, in arrival order
#[derive(Debug)]
pub enum InstallerEvent {
    /// The operator typed or picked a game folder (`None` clears it)
    PathSelected(Option<Utf8PathBuf>),

    /// The operator asked for the folder picker
    BrowseRequested,

    /// The keep-backup option was toggled
    KeepBackupToggled(bool),

    /// The operator pressed apply
    ApplyRequested,

    /// Cosmetic progress timer fired
    ProgressTick,

    /// The patch worker finished; posted exactly once per session
    PatchFinished(PatchReport),

    /// Stop the event loop
    Shutdown,
}

impl InstallerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InstallerEvent::PathSelected(_) => "PathSelected",
            InstallerEvent::BrowseRequested => "BrowseRequested",
            InstallerEvent::KeepBackupToggled(_) => "KeepBackupToggled",
            InstallerEvent::ApplyRequested => "ApplyRequested",
            InstallerEvent::ProgressTick => "ProgressTick",
            InstallerEvent::PatchFinished(_) => "PatchFinished",
            InstallerEvent::Shutdown => "Shutdown",
        }
    }
}

/// The controller's receiving side has been dropped
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Installer event loop has stopped")]
pub struct BridgeClosed;

/// Receiving end of the bridge, owned by the controller
///
/// # Example
/// ```ignore
/// let runtime = tokio::runtime::Runtime::new()?;
/// let mut bridge = EventLoopBridge::new(runtime.handle().clone(), metrics);
/// let handle = bridge.clone_handle();
///
/// handle.spawn_async(move || async move {
///     let report = PatchExecutor::new().execute(session).await;
///     let _ = handle.post(InstallerEvent::PatchFinished(report)).await;
/// });
///
/// while let Some(event) = bridge.next_event().await { /* ... */ }
/// ```
pub struct EventLoopBridge {
    handle: EventLoopBridgeHandle,
    event_rx: mpsc::Receiver<InstallerEvent>,
}

impl EventLoopBridge {
    /// Create a new EventLoopBridge
    ///
    /// # Arguments
    /// * `tokio_handle` - Handle to the tokio runtime for spawning tasks
    /// * `metrics` - Shared counters for posted and dropped events
    pub fn new(tokio_handle: tokio::runtime::Handle, metrics: Arc<Metrics>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            handle: EventLoopBridgeHandle {
                tokio_handle,
                event_tx,
                metrics,
            },
            event_rx,
        }
    }

    /// Wait for the next event
    pub async fn next_event(&mut self) -> Option<InstallerEvent> {
        self.event_rx.recv().await
    }

    /// Block the current thread until the next event arrives.
    ///
    /// For the controller's own thread; panics if called from inside the
    /// tokio runtime, like [`mpsc::Receiver::blocking_recv`].
    pub fn blocking_next_event(&mut self) -> Option<InstallerEvent> {
        self.event_rx.blocking_recv()
    }

    /// Take the next event if one is already queued
    pub fn try_next_event(&mut self) -> Option<InstallerEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Returns a lightweight handle that can be cloned into tasks and callbacks
    pub fn clone_handle(&self) -> EventLoopBridgeHandle {
        self.handle.clone()
    }
}

/// Cloneable sending side of the bridge
#[derive(Clone)]
pub struct EventLoopBridgeHandle {
    tokio_handle: tokio::runtime::Handle,
    event_tx: mpsc::Sender<InstallerEvent>,
    metrics: Arc<Metrics>,
}

impl EventLoopBridgeHandle {
    /// Queue an event without waiting.
    ///
    /// Returns `false` when the queue is full or the controller has stopped.
    pub fn try_post(&self, event: InstallerEvent) -> bool {
        match self.event_tx.try_send(event) {
            Ok(()) => {
                self.metrics.record_event_posted();
                true
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                if matches!(event, InstallerEvent::ProgressTick) {
                    self.metrics.record_progress_tick_dropped();
                    tracing::trace!("Event queue full - dropping progress tick");
                } else {
                    tracing::warn!("Event queue full - dropping {}", event.name());
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::debug!("Event loop stopped - discarding {}", event.name());
                false
            }
        }
    }

    /// Queue an event, waiting for room in the queue
    ///
    /// # Errors
    /// [`BridgeClosed`] if the controller is gone
    pub async fn post(&self, event: InstallerEvent) -> Result<(), BridgeClosed> {
        self.event_tx.send(event).await.map_err(|_| BridgeClosed)?;
        self.metrics.record_event_posted();
        Ok(())
    }

    /// Spawn an async task on the tokio runtime
    pub fn spawn_async<F, Fut>(&self, future_factory: F) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.tokio_handle.spawn(async move {
            future_factory().await;
        })
    }

    pub fn is_closed(&self) -> bool {
        self.event_tx.is_closed()
    }
}
