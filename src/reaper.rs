use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::engine::Engine;
use crate::observability;

/// Background task that cancels reservations left pending past the
/// configured TTL, through the same cancel transition (and the same
/// per-resource lock) every other mutation uses.
pub async fn run_reaper(engine: Arc<Engine>) {
    let Some(ttl) = engine.config().pending_ttl else {
        return;
    };
    let mut interval = tokio::time::interval(engine.config().reap_interval);
    loop {
        interval.tick().await;
        let cutoff = engine.now_ms() - ttl;
        let stale = engine.collect_stale_pending(cutoff);
        for (reservation_id, _resource_id) in stale {
            match engine.expire_pending(reservation_id).await {
                Ok(_) => {
                    metrics::counter!(observability::RESERVATIONS_REAPED_TOTAL).increment(1);
                    info!("swept stale pending reservation {reservation_id}");
                }
                Err(e) => {
                    // Decided (approved/rejected/canceled) in the meantime — fine
                    debug!("sweep skip {reservation_id}: {e}");
                }
            }
        }
    }
}

/// Background task that compacts the WAL once enough appends accumulate.
pub async fn run_compactor(engine: Arc<Engine>) {
    let threshold = engine.config().compact_threshold;
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends >= threshold {
            match engine.compact_wal().await {
                Ok(()) => info!("compacted WAL after {appends} appends"),
                Err(e) => tracing::warn!("WAL compaction failed: {e}"),
            }
        }
    }
}
