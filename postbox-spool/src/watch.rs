//! Filesystem watching with a debounced delivery trigger.

use std::{
    path::PathBuf,
    time::Duration,
};

use async_trait::async_trait;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use notify::event::{ModifyKind, RenameMode};
use postbox_common::{Signal, internal};
use tokio::{
    sync::{broadcast, mpsc},
    time::Instant,
};

use crate::error::WatchError;

/// Capacity of the channel bridging notify's thread into the async loop.
const EVENT_BUFFER: usize = 64;

/// Invoked once per quiet period after at least one arrival event.
#[async_trait]
pub trait WatchHandler: Send {
    async fn trigger(&mut self);
}

/// Watches a directory for message arrivals and debounces them into
/// delivery triggers.
///
/// The first arrival event arms a single timer; further events while it
/// is armed are dropped rather than resetting it. When the timer fires
/// the handler runs to completion before the slot clears, so a burst of
/// near-simultaneous arrivals collapses into one trigger and no two
/// triggers ever overlap. Arrivals observed while the handler is running
/// arm a fresh timer once it finishes.
///
/// No filename filtering happens here: any arrival-shaped event arms the
/// timer, and a trigger over an empty directory is a harmless no-op for
/// the handler.
#[derive(Debug)]
pub struct DirectoryWatcher {
    path: PathBuf,
    delay: Duration,
}

impl DirectoryWatcher {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            path: path.into(),
            delay,
        }
    }

    /// Watch until shutdown, invoking `handler` after each quiet period.
    ///
    /// # Errors
    ///
    /// Fails if the OS-level watch cannot be established, or if the
    /// event channel dies while the watcher is still supposed to be
    /// running.
    pub async fn run<H>(
        self,
        shutdown: broadcast::Receiver<Signal>,
        handler: H,
    ) -> Result<(), WatchError>
    where
        H: WatchHandler,
    {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        let mut watcher =
            notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
                match result {
                    Ok(event) if is_arrival(&event.kind) => {
                        // A full channel already holds an arming event.
                        let _ = events_tx.try_send(());
                    }
                    Ok(_) => {}
                    Err(error) => tracing::warn!(%error, "Filesystem watch reported an error"),
                }
            })
            .map_err(|source| WatchError::Setup {
                path: self.path.clone(),
                source,
            })?;

        watcher
            .watch(&self.path, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Setup {
                path: self.path.clone(),
                source,
            })?;

        internal!("Watching {} for new messages", self.path.display());

        // The watcher binding keeps the OS watch alive until the loop
        // returns.
        debounce(events_rx, shutdown, self.delay, handler).await
    }
}

/// Whether an event kind represents a file landing in the directory.
///
/// Creations and inbound renames arm the debounce. Reads and outbound
/// renames must not, or a delivery pass's own enumeration and moves
/// would re-arm the timer that started it.
const fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Name(
                RenameMode::To | RenameMode::Both | RenameMode::Any
            ))
    )
}

/// Single-slot debounce over the arrival-event stream.
async fn debounce<H>(
    mut events: mpsc::Receiver<()>,
    mut shutdown: broadcast::Receiver<Signal>,
    delay: Duration,
    mut handler: H,
) -> Result<(), WatchError>
where
    H: WatchHandler,
{
    let mut armed_at: Option<Instant> = None;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(()) => {
                        if armed_at.is_none() {
                            armed_at = Some(Instant::now() + delay);
                        }
                    }
                    None => return Err(WatchError::ChannelClosed),
                }
            }

            () = fire_at(armed_at), if armed_at.is_some() => {
                handler.trigger().await;
                armed_at = None;
            }

            _ = shutdown.recv() => {
                internal!(level = INFO, "Received Shutdown signal, shutting down");
                return Ok(());
            }
        }
    }
}

async fn fire_at(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
