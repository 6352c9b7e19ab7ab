//! Runtime event consumer
//!
//! One task per cache. It applies container events strictly in arrival order
//! and is the only writer of the container map.

use cb_core::{EventStatus, Result, RuntimeClient, RuntimeEvent};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::cache::StateCache;

/// Capacity of the runtime event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Why the consumption loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherExit {
    /// The handle asked it to stop
    Stopped,
    /// The runtime event stream ended or failed; the cache no longer follows
    /// container lifecycle
    StreamClosed,
}

impl fmt::Display for WatcherExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatcherExit::Stopped => write!(f, "stopped"),
            WatcherExit::StreamClosed => write!(f, "runtime event stream closed"),
        }
    }
}

pub struct Watcher {
    runtime: Arc<dyn RuntimeClient>,
    cache: StateCache,
}

impl Watcher {
    pub fn new(runtime: Arc<dyn RuntimeClient>, cache: StateCache) -> Self {
        Self { runtime, cache }
    }

    /// Subscribe to runtime events, seed the cache from the current network
    /// listing and spawn the consumption loop.
    ///
    /// Subscription or listing failures are returned before anything is
    /// spawned.
    pub async fn start(runtime: Arc<dyn RuntimeClient>, cache: StateCache) -> Result<WatcherHandle> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        runtime.add_event_listener(event_tx).await?;

        let networks = runtime.list_networks().await?;
        info!("Seeding cache with {} networks", networks.len());
        for network in networks {
            cache.register_network(network).await;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let watcher = Watcher::new(runtime, cache);
        let task = tokio::spawn(watcher.run(event_rx, stop_rx));

        Ok(WatcherHandle {
            stop: stop_tx,
            task: Some(task),
            exit: None,
        })
    }

    async fn run(
        self,
        mut events: mpsc::Receiver<RuntimeEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> WatcherExit {
        info!("Watching runtime events");
        let exit = loop {
            tokio::select! {
                biased;
                _ = stop.changed() => {
                    info!("Watcher stop requested");
                    break WatcherExit::Stopped;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        warn!("Runtime event stream closed");
                        break WatcherExit::StreamClosed;
                    }
                },
            }
        };
        info!("Watcher ended: {}", exit);
        exit
    }

    /// Apply one event to the cache
    pub async fn handle_event(&self, event: RuntimeEvent) {
        match event.status {
            EventStatus::Start | EventStatus::Create => self.container_started(&event).await,
            EventStatus::Die => self.container_died(&event.id).await,
            EventStatus::Other(ref status) => {
                trace!("Ignoring {} event for {}", status, event.id);
            }
        }
    }

    async fn container_started(&self, event: &RuntimeEvent) {
        debug!("Container {} event for {}", event.status, event.id);
        match self.runtime.inspect_container(&event.id).await {
            Ok(container) => self.cache.insert_container(container).await,
            Err(e) => warn!("Error inspecting container {}: {}", event.id, e),
        }
    }

    async fn container_died(&self, id: &str) {
        debug!("Container died {}", id);
        if let Err(e) = self.runtime.inspect_container(id).await {
            debug!("Inspect of dead container {} failed: {}", id, e);
        }
        if !self.cache.remove_container(id).await {
            debug!("Dead container {} was not tracked", id);
        }
    }
}

/// Handle to the running consumption loop.
///
/// Dropping the handle also ends the loop.
pub struct WatcherHandle {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<WatcherExit>>,
    exit: Option<WatcherExit>,
}

impl WatcherHandle {
    /// Wait until the loop ends on its own or through [`stop`](Self::stop).
    ///
    /// Cancel safe. Once the loop has ended the cached exit is returned
    /// immediately.
    pub async fn finished(&mut self) -> WatcherExit {
        if let Some(exit) = self.exit {
            return exit;
        }
        let exit = match self.task.as_mut() {
            Some(task) => match task.await {
                Ok(exit) => exit,
                Err(e) => {
                    warn!("Watcher task ended abnormally: {}", e);
                    WatcherExit::StreamClosed
                }
            },
            None => WatcherExit::Stopped,
        };
        self.task = None;
        self.exit = Some(exit);
        exit
    }

    /// Signal the loop to stop and wait for it to finish
    pub async fn stop(mut self) -> WatcherExit {
        let _ = self.stop.send(true);
        self.finished().await
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}
