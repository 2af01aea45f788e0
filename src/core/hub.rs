//! Process-wide storage of connections and groups
//! Coordinates the connection registry and the group registry so that their
//! dual-indexed membership stays consistent under concurrent mutation.

use std::sync::Arc;

use log::debug;
use uuid::Uuid;

use crate::core::connection::Connection;
use crate::core::group::{Group, GroupRegistry};
use crate::core::registry::ConnectionList;

/// Process-wide storage of all connections and groups.
///
/// The connection registry is the authority for existence: a connection that
/// is not registered cannot be added to any group. Compound membership
/// mutations (join, leave, connection removal) hold the connection's
/// group-mutation lock so the two indexes (connection-to-groups and
/// group-to-connections) never diverge.
#[derive(Default)]
pub struct Hub {
    connections: ConnectionList,
    groups: GroupRegistry,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; idempotent for the same id
    pub async fn add_connection(&self, connection: Arc<Connection>) {
        self.connections.add(connection).await;
    }

    /// Deregister a connection and remove it from every group it had joined,
    /// deleting any group left empty. Idempotent: removing an unknown
    /// connection is a no-op.
    pub async fn remove_connection(&self, connection: &Arc<Connection>) {
        if self.connections.remove(connection.id()).await.is_none() {
            return;
        }
        let mut joined = connection.groups.lock().await;
        for name in joined.iter() {
            self.groups.remove(connection, name).await;
        }
        joined.clear();
        debug!("removed connection {} from storage", connection.id());
    }

    /// Add the connection to a named group, creating the group on demand.
    ///
    /// Silent no-op when the connection is not registered. Idempotent:
    /// joining a group twice has the effect of joining once.
    pub async fn join_group(&self, connection: &Arc<Connection>, name: &str) {
        if !self.connections.contains(connection.id()).await {
            return;
        }
        let mut joined = connection.groups.lock().await;
        joined.insert(name.to_string());
        self.groups.add(connection, name).await;
    }

    /// Add the connection to several groups under one lock acquisition
    pub async fn join_groups(&self, connection: &Arc<Connection>, names: &[&str]) {
        if !self.connections.contains(connection.id()).await {
            return;
        }
        let mut joined = connection.groups.lock().await;
        for name in names {
            joined.insert((*name).to_string());
            self.groups.add(connection, name).await;
        }
    }

    /// Remove the connection from a named group, deleting the group if it
    /// becomes empty. No-op when the connection was not a member.
    pub async fn leave_group(&self, connection: &Arc<Connection>, name: &str) {
        if !self.connections.contains(connection.id()).await {
            return;
        }
        let mut joined = connection.groups.lock().await;
        joined.remove(name);
        self.groups.remove(connection, name).await;
    }

    /// Look up a connection by id
    pub async fn connection(&self, id: Uuid) -> Option<Arc<Connection>> {
        self.connections.get(id).await
    }

    /// Snapshot of all live connections
    pub async fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.connections().await
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.count().await
    }

    /// Look up a group by name
    pub async fn group(&self, name: &str) -> Option<Group> {
        self.groups.get(name).await
    }

    /// Snapshot of all current groups
    pub async fn groups(&self) -> Vec<Group> {
        self.groups.groups().await
    }

    pub async fn group_count(&self) -> usize {
        self.groups.group_count().await
    }

    /// Send to every live connection; returns successful delivery count
    pub async fn broadcast(&self, payload: &[u8]) -> usize {
        self.connections.broadcast(payload).await
    }

    /// Send to every member of every group; a connection in several groups
    /// receives one copy per group
    pub async fn broadcast_groups(&self, payload: &[u8]) -> usize {
        self.groups.broadcast(payload).await
    }

    /// Send to one connection; a missing id is a silent no-op
    pub async fn send_to(&self, id: Uuid, payload: &[u8]) -> bool {
        self.connections.send_to(id, payload).await
    }

    /// Send to a set of connections; missing ids are skipped
    pub async fn send_to_many(&self, ids: &[Uuid], payload: &[u8]) -> usize {
        self.connections.send_to_many(ids, payload).await
    }
}
