//! Connection registry
//! Concurrent index of live connections by id, with concurrent fan-out send

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use log::warn;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::connection::Connection;

/// Concurrent map from connection id to connection.
///
/// Used both as the process-wide connection registry and as the member set
/// of each group. Holds non-owning (shared) references: presence in the list
/// does not keep the transport alive beyond its session.
#[derive(Clone, Default)]
pub struct ConnectionList {
    inner: Arc<RwLock<HashMap<Uuid, Arc<Connection>>>>,
}

impl ConnectionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry keyed by the connection's id.
    /// Adding the same id twice leaves the count unchanged.
    pub async fn add(&self, connection: Arc<Connection>) {
        self.inner.write().await.insert(connection.id(), connection);
    }

    /// Atomically remove an entry, returning it if present
    pub async fn remove(&self, id: Uuid) -> Option<Arc<Connection>> {
        self.inner.write().await.remove(&id)
    }

    /// Non-blocking point lookup; absence is a normal condition, not an error
    pub async fn get(&self, id: Uuid) -> Option<Arc<Connection>> {
        self.inner.read().await.get(&id).cloned()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.inner.read().await.contains_key(&id)
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Snapshot of the current connections
    pub async fn connections(&self) -> Vec<Arc<Connection>> {
        self.inner.read().await.values().cloned().collect()
    }

    /// Send `payload` to every connection concurrently.
    ///
    /// Every individual send is attempted even when others fail; failures
    /// are logged and skipped. Returns the number of successful deliveries.
    pub async fn broadcast(&self, payload: &[u8]) -> usize {
        let targets = self.connections().await;
        deliver(&targets, payload).await
    }

    /// Send to one connection; a missing id is a silent no-op.
    /// Returns whether the payload was delivered.
    pub async fn send_to(&self, id: Uuid, payload: &[u8]) -> bool {
        let Some(connection) = self.get(id).await else {
            return false;
        };
        match connection.send(payload).await {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to send to connection {}: {}", id, e);
                false
            }
        }
    }

    /// Send to a set of connections concurrently; missing ids are skipped.
    /// Returns the number of successful deliveries.
    pub async fn send_to_many(&self, ids: &[Uuid], payload: &[u8]) -> usize {
        let mut targets = Vec::with_capacity(ids.len());
        {
            let connections = self.inner.read().await;
            for id in ids {
                if let Some(connection) = connections.get(id) {
                    targets.push(connection.clone());
                }
            }
        }
        deliver(&targets, payload).await
    }
}

// Fan one payload out to every target concurrently and join on all attempts
async fn deliver(targets: &[Arc<Connection>], payload: &[u8]) -> usize {
    let results = join_all(targets.iter().map(|connection| connection.send(payload))).await;
    let mut delivered = 0;
    for (connection, result) in targets.iter().zip(results) {
        match result {
            Ok(()) => delivered += 1,
            Err(e) => warn!("failed to send to connection {}: {}", connection.id(), e),
        }
    }
    delivered
}
