//! Mesh Service Module
//!
//! Runs the [`MeshGraph`] on a single tokio task. Advertisements and
//! subscription requests arrive over an mpsc channel, housekeeping runs on an
//! interval, and every mutation publishes a fresh [`NetworkSnapshot`] through
//! a watch channel so readers never block the writer.

use crate::domain::mesh::{Diagnostics, IngestOutcome, MeshGraph};
use crate::domain::models::{
    AdvertisementEvent, DeviceRecord, MeshEdge, TransportAddress, UnitId,
};
use crate::domain::settings::MeshSettings;
use crate::domain::snapshot::NetworkSnapshot;
use crate::domain::transitions::TransitionEvent;
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Notifications forwarded to subscribers of the running service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    StateChanged(DeviceRecord, TransitionEvent),
}

enum Command {
    Advertisement(AdvertisementEvent),
    Subscribe(mpsc::UnboundedSender<MeshEvent>),
    Housekeeping(i64),
    Shutdown(oneshot::Sender<NetworkSnapshot>),
}

/// Current wall clock in Unix milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Owns the background task driving the mesh graph
pub struct MeshService {
    handle: MeshHandle,
    task: JoinHandle<()>,
}

impl MeshService {
    /// Validate settings and spawn the graph task on the current runtime
    pub fn start(settings: MeshSettings) -> Result<Self> {
        let graph = MeshGraph::new(settings)?;
        let interval = Duration::from_millis(graph.settings().housekeeping_interval_ms as u64);
        let (command_tx, command_rx) = mpsc::channel(1024);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(graph.snapshot()));

        let task = tokio::spawn(run(graph, command_rx, snapshot_tx, interval));
        info!("Mesh service started");

        Ok(Self {
            handle: MeshHandle {
                commands: command_tx,
                snapshots: snapshot_rx,
            },
            task,
        })
    }

    pub fn handle(&self) -> MeshHandle {
        self.handle.clone()
    }

    /// Stop the task and return the final network view
    pub async fn shutdown(self) -> Result<NetworkSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.handle
            .commands
            .send(Command::Shutdown(tx))
            .await
            .map_err(|_| anyhow::anyhow!("Mesh service already stopped"))?;
        let snapshot = rx.await?;
        self.task.await?;
        info!("Mesh service stopped");
        Ok(snapshot)
    }
}

/// Cloneable front end for feeding and querying a running [`MeshService`]
#[derive(Clone)]
pub struct MeshHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Arc<NetworkSnapshot>>,
}

impl MeshHandle {
    /// Queue one advertisement for the graph.
    ///
    /// Housekeeping ticks age records against the wall clock ([`now_ms`]), so
    /// `observed_at_ms` must be wall-clock Unix milliseconds. Recorded
    /// captures belong in a [`MeshGraph`] driven with explicit `evict` calls
    /// on capture time, or through [`MeshHandle::evict`].
    pub async fn ingest(&self, event: AdvertisementEvent) -> Result<()> {
        self.commands
            .send(Command::Advertisement(event))
            .await
            .map_err(|_| anyhow::anyhow!("Mesh service stopped"))
    }

    /// Run a housekeeping pass at an explicit time
    pub async fn evict(&self, now_ms: i64) -> Result<()> {
        self.commands
            .send(Command::Housekeeping(now_ms))
            .await
            .map_err(|_| anyhow::anyhow!("Mesh service stopped"))
    }

    /// Receive transitions and anomalies; dropping the receiver unsubscribes
    pub async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<MeshEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.commands
            .send(Command::Subscribe(tx))
            .await
            .map_err(|_| anyhow::anyhow!("Mesh service stopped"))?;
        Ok(rx)
    }

    /// Watch channel carrying every published snapshot
    pub fn watch(&self) -> watch::Receiver<Arc<NetworkSnapshot>> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> Arc<NetworkSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn list_physical_devices(&self) -> Vec<DeviceRecord> {
        self.snapshot().physical_devices()
    }

    pub fn list_virtual_aliases(&self) -> Vec<DeviceRecord> {
        self.snapshot().virtual_aliases()
    }

    pub fn list_unknown_devices(&self) -> Vec<DeviceRecord> {
        self.snapshot().unknown_devices()
    }

    pub fn list_mesh_edges(&self) -> Vec<MeshEdge> {
        self.snapshot().mesh_edges()
    }

    pub fn list_pending_aliases(&self) -> Vec<TransportAddress> {
        self.snapshot().pending_aliases.clone()
    }

    pub fn get_device(&self, unit_id: &UnitId) -> Option<DeviceRecord> {
        self.snapshot().get_device(unit_id)
    }

    pub fn get_device_by_address(&self, address: &TransportAddress) -> Option<DeviceRecord> {
        self.snapshot().get_device_by_address(address)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.snapshot().diagnostics
    }
}

async fn run(
    mut graph: MeshGraph,
    mut commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<Arc<NetworkSnapshot>>,
    interval: Duration,
) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<MeshEvent>();
    graph.subscribe(move |record, event| {
        let _ = event_tx.send(MeshEvent::StateChanged(record.clone(), event.clone()));
    });
    let mut subscribers: Vec<mpsc::UnboundedSender<MeshEvent>> = Vec::new();

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        let shutdown = tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Advertisement(event)) => {
                    if let IngestOutcome::Observed(observation) = graph.ingest(&event) {
                        debug!(
                            "{} {} ({} transitions, {} edge updates)",
                            observation.record.variant,
                            observation.record.unit_id,
                            observation.transitions.len(),
                            observation.edge_updates.len()
                        );
                    }
                    None
                }
                Some(Command::Housekeeping(at)) => {
                    graph.evict(at);
                    None
                }
                Some(Command::Subscribe(tx)) => {
                    subscribers.push(tx);
                    None
                }
                Some(Command::Shutdown(reply)) => Some(Some(reply)),
                None => Some(None),
            },
            _ = ticker.tick() => {
                let report = graph.evict(now_ms());
                if !report.purged.is_empty() || !report.newly_stale.is_empty() {
                    debug!(
                        "Housekeeping: {} stale, {} purged",
                        report.newly_stale.len(),
                        report.purged.len()
                    );
                }
                None
            }
        };

        while let Ok(event) = event_rx.try_recv() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }

        let snapshot = graph.snapshot();
        if let Some(reply) = shutdown {
            let _ = snapshots.send(Arc::new(snapshot.clone()));
            if let Some(reply) = reply {
                if reply.send(snapshot).is_err() {
                    warn!("Shutdown requester went away before the final snapshot");
                }
            }
            break;
        }
        snapshots.send_if_modified(|current| {
            if **current == snapshot {
                false
            } else {
                *current = Arc::new(snapshot);
                true
            }
        });
    }
}
