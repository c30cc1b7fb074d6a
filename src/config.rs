use std::path::PathBuf;
use std::time::Duration;

use crate::model::Ms;

/// Engine bootstrap settings. `from_env` mirrors the deployment surface:
/// every knob is a `GEARBOOK_*` environment variable with a default.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path of the append-only event log.
    pub wal_path: PathBuf,
    /// WAL appends between background compactions.
    pub compact_threshold: u64,
    /// Age after which a still-pending reservation is swept to canceled.
    /// `None` disables the sweep — pendings then hold capacity until decided.
    pub pending_ttl: Option<Ms>,
    /// How often the maintenance sweeps wake up.
    pub reap_interval: Duration,
}

impl EngineConfig {
    pub fn new(wal_path: impl Into<PathBuf>) -> Self {
        Self {
            wal_path: wal_path.into(),
            compact_threshold: 1000,
            pending_ttl: None,
            reap_interval: Duration::from_secs(5),
        }
    }

    pub fn from_env() -> Self {
        let data_dir = std::env::var("GEARBOOK_DATA_DIR").unwrap_or_else(|_| "./data".into());
        let compact_threshold: u64 = std::env::var("GEARBOOK_COMPACT_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);
        let pending_ttl: Option<Ms> = std::env::var("GEARBOOK_PENDING_TTL_MS")
            .ok()
            .and_then(|s| s.parse().ok());
        let reap_interval_secs: u64 = std::env::var("GEARBOOK_REAP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Self {
            wal_path: PathBuf::from(data_dir).join("gearbook.wal"),
            compact_threshold,
            pending_ttl,
            reap_interval: Duration::from_secs(reap_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::new("/tmp/test.wal");
        assert_eq!(cfg.wal_path, PathBuf::from("/tmp/test.wal"));
        assert_eq!(cfg.compact_threshold, 1000);
        assert!(cfg.pending_ttl.is_none());
        assert_eq!(cfg.reap_interval, Duration::from_secs(5));
    }
}
