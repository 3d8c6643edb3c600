//! Liveness state engine.
//!
//! The engine turns a high-rate stream of heartbeats into a low-rate
//! stream of edge-triggered webhook notifications. It owns a TTL cache
//! keyed by service id; a live service is an `Up` entry whose deadline
//! keeps being pushed out by heartbeats. When heartbeats stop, the cache
//! sweeper evicts the entry and the engine delivers a `Down` notification,
//! retrying a bounded number of times on failure.
//!
//! ## Expiry pipeline
//!
//! Eviction callbacks run on the sweeper while it holds the cache's write
//! lock, so the engine never notifies or re-inserts from inside the
//! callback. The callback only forwards the evicted entry onto a channel;
//! a dedicated worker task performs the delivery and, on failure, writes
//! the entry back with a short retry TTL as an ordinary cache write. The
//! channel's backlog is bounded by the cache population.
//!
//! ## Edge serialisation
//!
//! A coarse engine mutex orders heartbeat handling against the expiry
//! worker. Without it, a heartbeat arriving while a retry is in flight
//! could interleave its refresh with the worker's re-insert and lose the
//! attempt reset.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vakeel_core::{Cache, CacheConfig, Status};

use crate::directory::WebhookDirectory;
use crate::error::{Error, Result};
use crate::notifier::Notifier;

/// Tunables for the state engine.
///
/// The defaults are the production values; tests shrink them to drive
/// expiry quickly.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Entry lifetime granted by an accepted heartbeat.
    pub up_ttl: Duration,

    /// Entry lifetime after a failed down notification.
    pub retry_ttl: Duration,

    /// Delivery deadline for a single down notification attempt.
    pub notify_timeout: Duration,

    /// Maximum down-delivery attempts per edge.
    pub max_attempts: u32,

    /// How often the cache sweeper scans for expired entries. This bounds
    /// the detection latency for a service going down.
    pub sweep_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            up_ttl: Duration::from_secs(60),
            retry_ttl: Duration::from_secs(15),
            notify_timeout: Duration::from_secs(15),
            max_attempts: 5,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Cached per-service record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceState {
    /// Last status delivered (or refreshed) for the service.
    pub status: Status,

    /// Failed delivery attempts for the pending edge; 0 on a clean entry.
    pub attempt: u32,
}

/// Converts heartbeats and expiries into webhook notifications.
pub struct StateEngine {
    notifier: Arc<dyn Notifier>,
    directory: Arc<dyn WebhookDirectory>,
    cache: Cache<Uuid, ServiceState>,
    config: EngineConfig,
    edge_lock: Mutex<()>,
}

impl StateEngine {
    /// Builds an engine over the given collaborators.
    ///
    /// The cache is pre-sized from the directory, one slot per configured
    /// webhook. Background tasks are not running yet; call
    /// [`start`](Self::start) once.
    pub fn new(
        notifier: Arc<dyn Notifier>,
        directory: Arc<dyn WebhookDirectory>,
        config: EngineConfig,
    ) -> Self {
        let cache = Cache::new(CacheConfig {
            sweep_interval: config.sweep_interval,
            initial_capacity: directory.all().len(),
        });

        Self {
            notifier,
            directory,
            cache,
            config,
            edge_lock: Mutex::new(()),
        }
    }

    /// Starts the cache sweeper and the expiry worker.
    ///
    /// Both tasks observe `shutdown` and stop when it fires. Must be
    /// called at most once; a second call would register a second eviction
    /// callback and duplicate edges.
    pub fn start(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();

        self.cache.on_evict(move |id: &Uuid, state: &ServiceState| {
            // Runs on the sweeper under the cache lock: hand the edge to
            // the worker and return. Send only fails once the worker has
            // stopped, at which point the edge is moot.
            let _ = expired_tx.send((*id, *state));
        });

        let sweeper = self.cache.spawn_sweeper(shutdown.clone());
        let engine = Arc::clone(self);
        let worker = tokio::spawn(engine.run_expiry_worker(expired_rx, shutdown));

        vec![sweeper, worker]
    }

    /// Applies one heartbeat.
    ///
    /// An entry already carrying the incoming status is refreshed in
    /// place, with its attempt counter cleared, and produces no
    /// notification. Otherwise the transition is delivered first and the
    /// entry written only on success, so a failed delivery is retried by
    /// the next heartbeat.
    pub async fn send(&self, id: Uuid, status: Status) -> Result<()> {
        let _edge = self.edge_lock.lock().await;

        if let Some(current) = self.cache.get(&id).await {
            if current.status == status {
                self.cache
                    .add(id, ServiceState { status, attempt: 0 }, self.config.up_ttl)
                    .await;
                return Ok(());
            }
        }

        let target = self.directory.get(id).await?;

        info!(id = %id, status = %status, "Sending status update");
        self.notifier.send(&target, status).await?;

        self.cache
            .add(id, ServiceState { status, attempt: 0 }, self.config.up_ttl)
            .await;

        Ok(())
    }

    async fn run_expiry_worker(
        self: Arc<Self>,
        mut expired: mpsc::UnboundedReceiver<(Uuid, ServiceState)>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                evicted = expired.recv() => match evicted {
                    Some((id, state)) => self.handle_expiry(id, state).await,
                    None => break,
                },
            }
        }
        debug!("expiry worker stopped");
    }

    /// Handles one evicted entry: the up-to-down edge.
    async fn handle_expiry(&self, id: Uuid, state: ServiceState) {
        if state.attempt >= self.config.max_attempts {
            warn!(
                id = %id,
                attempts = state.attempt,
                "delivery attempts exhausted, dropping down notification"
            );
            return;
        }

        let _edge = self.edge_lock.lock().await;

        // A heartbeat can re-register the id between eviction and this
        // point; the fresh entry supersedes the stale edge.
        if self.cache.get(&id).await.is_some() {
            debug!(id = %id, "service re-registered, dropping stale expiry");
            return;
        }

        let target = match self.directory.get(id).await {
            Ok(target) => target,
            Err(err) => {
                debug!(id = %id, error = %err, "target lookup failed, scheduling retry");
                self.schedule_retry(id, state).await;
                return;
            }
        };

        info!(id = %id, status = %Status::Down, "Sending status update");

        let outcome = tokio::time::timeout(
            self.config.notify_timeout,
            self.notifier.send(&target, Status::Down),
        )
        .await
        .map_err(|_| Error::NotifyTimeout(self.config.notify_timeout))
        .and_then(|sent| sent);

        match outcome {
            // Delivered: the entry stays absent until the next heartbeat
            // raises the service again.
            Ok(()) => {}
            Err(err) => {
                warn!(
                    id = %id,
                    attempt = state.attempt + 1,
                    error = %err,
                    "down notification failed"
                );
                self.schedule_retry(id, state).await;
            }
        }
    }

    /// Re-arms the evicted entry so the next sweep retries the edge.
    async fn schedule_retry(&self, id: Uuid, state: ServiceState) {
        self.cache
            .add(
                id,
                ServiceState {
                    status: state.status,
                    attempt: state.attempt + 1,
                },
                self.config.retry_ttl,
            )
            .await;
    }
}
