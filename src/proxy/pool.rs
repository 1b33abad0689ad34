//! Proxy pool module holding the current validated snapshot
//!
//! The pool owns exactly one shared mutable thing: the pointer to the
//! current snapshot. Readers clone an `Arc` and keep using their snapshot
//! safely across replacements; writers swap the pointer in one atomic
//! operation guarded by a monotonic refresh sequence, so a slow refresh
//! that finishes after a newer one is discarded instead of installed.

use crate::proxy::models::ValidatedProxy;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// An immutable point-in-time view of all currently validated proxies.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub proxies: Vec<ValidatedProxy>,
    pub created_at: DateTime<Utc>,
    /// Refresh sequence number this snapshot was built under.
    pub seq: u64,
}

impl PoolSnapshot {
    pub fn new(proxies: Vec<ValidatedProxy>, seq: u64) -> Self {
        Self {
            proxies,
            created_at: Utc::now(),
            seq,
        }
    }

    /// The snapshot installed before the first successful refresh.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Age of the snapshot relative to now.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

/// Pool health summary for operators
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolHealth {
    pub size: usize,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Holder of the current validated proxy snapshot.
pub struct ProxyPool {
    current: RwLock<Arc<PoolSnapshot>>,
    /// Ticket counter handed to refresh cycles as they start.
    next_seq: AtomicU64,
    /// Sequence of the snapshot currently installed.
    installed_seq: AtomicU64,
}

impl ProxyPool {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(PoolSnapshot::empty())),
            next_seq: AtomicU64::new(1),
            installed_seq: AtomicU64::new(0),
        }
    }

    /// Get the current snapshot. Always available, possibly empty before
    /// the first successful refresh; never blocks on network I/O.
    pub fn current(&self) -> Arc<PoolSnapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Take a sequence ticket for a refresh cycle that is about to start.
    pub fn begin_refresh(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Atomically replace the current snapshot.
    ///
    /// Installs only if the snapshot's sequence is newer than what is
    /// already installed; a stale completion is discarded and `false` is
    /// returned. Readers holding the old snapshot keep it alive via their
    /// own `Arc`.
    pub fn install(&self, snapshot: PoolSnapshot) -> bool {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let installed = self.installed_seq.load(Ordering::SeqCst);
        if snapshot.seq <= installed {
            debug!(
                seq = snapshot.seq,
                installed, "discarding stale refresh result"
            );
            return false;
        }

        info!(
            seq = snapshot.seq,
            size = snapshot.len(),
            "installing new pool snapshot"
        );
        self.installed_seq.store(snapshot.seq, Ordering::SeqCst);
        *current = Arc::new(snapshot);
        true
    }

    /// Whether any refresh has ever installed a snapshot.
    pub fn has_refreshed(&self) -> bool {
        self.installed_seq.load(Ordering::SeqCst) > 0
    }

    /// Pool size and last refresh time, for the health endpoint.
    pub fn health(&self) -> PoolHealth {
        let snapshot = self.current();
        PoolHealth {
            size: snapshot.len(),
            last_refresh: if self.has_refreshed() {
                Some(snapshot.created_at)
            } else {
                None
            },
        }
    }
}

impl Default for ProxyPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::{Anonymity, Schema};

    fn proxy(host: &str, port: u16) -> ValidatedProxy {
        ValidatedProxy {
            host: host.to_string(),
            port,
            schema: Schema::Http,
            country: None,
            anonymity: Anonymity::Anonymous,
            google: false,
            latency_ms: 50,
            checked_at: Utc::now(),
        }
    }

    #[test]
    fn test_pool_starts_empty() {
        let pool = ProxyPool::new();
        assert!(pool.current().is_empty());
        assert!(!pool.has_refreshed());

        let health = pool.health();
        assert_eq!(health.size, 0);
        assert!(health.last_refresh.is_none());
    }

    #[test]
    fn test_install_replaces_snapshot() {
        let pool = ProxyPool::new();
        let seq = pool.begin_refresh();
        assert!(pool.install(PoolSnapshot::new(vec![proxy("1.1.1.1", 80)], seq)));

        let snapshot = pool.current();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.proxies[0].host, "1.1.1.1");
        assert!(pool.has_refreshed());
        assert!(pool.health().last_refresh.is_some());
    }

    #[test]
    fn test_old_snapshot_stays_usable_after_replacement() {
        let pool = ProxyPool::new();
        let seq = pool.begin_refresh();
        pool.install(PoolSnapshot::new(vec![proxy("1.1.1.1", 80)], seq));

        let held = pool.current();
        let seq = pool.begin_refresh();
        pool.install(PoolSnapshot::new(vec![proxy("2.2.2.2", 81)], seq));

        // The reader's snapshot is unchanged.
        assert_eq!(held.proxies[0].host, "1.1.1.1");
        assert_eq!(pool.current().proxies[0].host, "2.2.2.2");
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let pool = ProxyPool::new();
        let slow_seq = pool.begin_refresh();
        let fast_seq = pool.begin_refresh();

        // The later-started cycle finishes first.
        assert!(pool.install(PoolSnapshot::new(vec![proxy("2.2.2.2", 81)], fast_seq)));
        // The earlier cycle completes afterwards and must be ignored.
        assert!(!pool.install(PoolSnapshot::new(vec![proxy("1.1.1.1", 80)], slow_seq)));

        assert_eq!(pool.current().proxies[0].host, "2.2.2.2");
    }

    #[test]
    fn test_sequence_tickets_are_monotonic() {
        let pool = ProxyPool::new();
        let a = pool.begin_refresh();
        let b = pool.begin_refresh();
        assert!(b > a);
    }
}
