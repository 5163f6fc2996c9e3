//! Process-wide connection registry (§5, §9 Design Note on cyclic
//! references).
//!
//! Connections never hold a strong reference to their paired remote
//! connection. Instead each `Connection` looks its peer up by `ConnId`
//! through this registry on every forward; if the peer already
//! disconnected, the lookup is a plain `HashMap` miss, not a dangling
//! pointer or a `Weak` upgrade failure to special-case.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

/// Monotonically increasing identifier; never reused within a process
/// lifetime, so a stale `ConnId` can never alias a newer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

#[derive(Debug, Default)]
struct IdGen(AtomicU64);

impl IdGen {
    fn next(&self) -> ConnId {
        ConnId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// What the registry keeps for each live connection: a channel to push
/// bytes to forward, and a watch of its current health.
#[derive(Debug, Clone)]
pub struct ConnHandle {
    pub forward_tx: mpsc::Sender<Vec<u8>>,
    pub healthy: Arc<std::sync::atomic::AtomicBool>,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<HashMap<ConnId, ConnHandle>>>,
    ids: Arc<IdGen>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, handle: ConnHandle) -> ConnId {
        let id = self.ids.next();
        self.inner.lock().await.insert(id, handle);
        id
    }

    pub async fn unregister(&self, id: ConnId) {
        self.inner.lock().await.remove(&id);
    }

    /// Look up a peer's forward channel. `None` means the peer is gone —
    /// callers treat this exactly like a closed socket, not an error.
    pub async fn forward_sender(&self, id: ConnId) -> Option<mpsc::Sender<Vec<u8>>> {
        self.inner.lock().await.get(&id).map(|h| h.forward_tx.clone())
    }

    pub async fn count_open(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn count_unhealthy(&self) -> usize {
        self.inner
            .lock()
            .await
            .values()
            .filter(|h| !h.healthy.load(Ordering::Relaxed))
            .count()
    }
}
