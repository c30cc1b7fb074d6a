mod admission;
mod availability;
mod error;
mod queries;
pub(crate) mod state;
mod store;

pub use admission::BundleItem;
pub use availability::{active_claims, peak_reserved, remaining_capacity, reserved_quantity};
pub use error::EngineError;
pub use state::TransitionAction;

use std::io;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;
use store::InMemoryStore;

pub type SharedResourceState = Arc<RwLock<ResourceState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    /// Multiple events committed as one unit: buffered together, one fsync,
    /// one acknowledgement. Used for bundle admission.
    AppendBatch {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::AppendBatch { events, response } => {
            metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                .record(events.len() as f64);
            let flush_start = std::time::Instant::now();
            let mut result = Ok(());
            for event in &events {
                if let Err(e) = wal.append_buffered(event) {
                    result = Err(e);
                    break;
                }
            }
            let flush_result = wal.flush_sync();
            metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                .record(flush_start.elapsed().as_secs_f64());
            let _ = response.send(result.and(flush_result));
        }
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The admission controller: all reservation reads and mutations go through
/// here. One `RwLock` per resource is the critical section that makes
/// check-then-insert and approval re-checks race-free; operations on
/// different resources never contend.
pub struct Engine {
    pub(super) store: InMemoryStore,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        notify: Arc<NotifyHub>,
        clock: Arc<dyn Clock>,
    ) -> io::Result<Self> {
        if let Some(parent) = config.wal_path.parent()
            && !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }

        let events = Wal::replay(&config.wal_path)?;
        let wal = Wal::open(&config.wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            store: InMemoryStore::new(),
            wal_tx,
            notify,
            clock,
            config,
        };

        // Replay events — we're the sole owner of these Arcs, so try_read/try_write
        // always succeed instantly (no contention).
        for event in &events {
            match event {
                Event::ResourceCreated { id, name, capacity, daily_rate } => {
                    let rs = ResourceState::new(*id, name.clone(), *capacity, *daily_rate);
                    engine.store.insert_resource(*id, Arc::new(RwLock::new(rs)));
                }
                Event::ResourceDeleted { id } => {
                    if let Some(entry) = engine.store.get_resource(id) {
                        let rs = entry.try_read().expect("replay: uncontended read");
                        for r in &rs.ledger {
                            engine.store.unmap_reservation(&r.id);
                            engine.store.drop_bundle_member(&r.bundle_id, &r.id);
                        }
                    }
                    engine.store.remove_resource(id);
                }
                other => {
                    if let Some(resource_id) = event_resource_id(other)
                        && let Some(rs_arc) = engine.store.get_resource(&resource_id) {
                            let mut guard =
                                rs_arc.try_write().expect("replay: uncontended write");
                            engine.store.apply_event(&mut guard, other);
                        }
                }
            }
        }

        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The engine's notion of "now", per the injected clock.
    pub fn now_ms(&self) -> Ms {
        self.clock.now_ms()
    }

    /// Spawn the background maintenance tasks: the stale-pending sweep (only
    /// when a TTL is configured) and the WAL compactor.
    pub fn spawn_maintenance(self: &Arc<Self>) {
        if self.config.pending_ttl.is_some() {
            let engine = self.clone();
            tokio::spawn(async move {
                crate::reaper::run_reaper(engine).await;
            });
        }
        let engine = self.clone();
        tokio::spawn(async move {
            crate::reaper::run_compactor(engine).await;
        });
    }

    /// Write one event to the WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Transient("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Transient("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    /// Write several events as one durable unit (bundle admission).
    pub(super) async fn wal_append_batch(&self, events: Vec<Event>) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::AppendBatch { events, response: tx })
            .await
            .map_err(|_| EngineError::Transient("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Transient("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    pub(super) fn get_resource(&self, id: &Ulid) -> Option<SharedResourceState> {
        self.store.get_resource(id)
    }

    /// WAL-append + apply + notify in one call, under the caller's lock.
    pub(super) async fn persist_and_apply(
        &self,
        resource_id: Ulid,
        rs: &mut ResourceState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_event(rs, event);
        self.notify.send(resource_id, event);
        Ok(())
    }

    /// Lookup reservation → resource, get resource, acquire write lock.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<ResourceState>), EngineError> {
        let resource_id = self
            .store
            .resource_for_reservation(reservation_id)
            .ok_or(EngineError::NotFound(*reservation_id))?;
        let rs = self
            .get_resource(&resource_id)
            .ok_or(EngineError::NotFound(resource_id))?;
        let guard = rs.write_owned().await;
        Ok((resource_id, guard))
    }
}

/// Extract the resource_id from an event (for non-Create/Delete events).
fn event_resource_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::ReservationOpened { resource_id, .. }
        | Event::ReservationTransitioned { resource_id, .. } => Some(*resource_id),
        Event::ResourceUpdated { id, .. } => Some(*id),
        Event::ResourceCreated { .. } | Event::ResourceDeleted { .. } => None,
    }
}
