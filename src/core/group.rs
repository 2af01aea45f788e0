//! Named connection groups
//! Groups are created lazily on first join and deleted when the last member
//! leaves; a group is never observably present with zero members.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::connection::Connection;
use crate::core::registry::ConnectionList;

/// A named, dynamically-sized set of connections used for fan-out addressing.
///
/// Cloning a `Group` is cheap: clones share the same member list.
#[derive(Clone)]
pub struct Group {
    name: String,
    members: ConnectionList,
}

impl Group {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            members: ConnectionList::new(),
        }
    }

    /// Group name; unique, case-sensitive key in the registry
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn member_count(&self) -> usize {
        self.members.count().await
    }

    /// Membership test
    pub async fn is_member(&self, connection: &Connection) -> bool {
        self.members.contains(connection.id()).await
    }

    /// Snapshot of the group's current members
    pub async fn members(&self) -> Vec<Arc<Connection>> {
        self.members.connections().await
    }

    /// Send to every member concurrently; returns successful delivery count
    pub async fn send_all(&self, payload: &[u8]) -> usize {
        self.members.broadcast(payload).await
    }

    /// Send to one member; a non-member id is a silent no-op
    pub async fn send_to(&self, id: Uuid, payload: &[u8]) -> bool {
        self.members.send_to(id, payload).await
    }

    pub(crate) async fn add_member(&self, connection: Arc<Connection>) {
        self.members.add(connection).await;
    }

    pub(crate) async fn remove_member(&self, id: Uuid) {
        self.members.remove(id).await;
    }
}

/// Process-wide index of groups by name
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Group>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a group by name
    pub async fn get(&self, name: &str) -> Option<Group> {
        self.groups.read().await.get(name).cloned()
    }

    /// Snapshot of all current groups
    pub async fn groups(&self) -> Vec<Group> {
        self.groups.read().await.values().cloned().collect()
    }

    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }

    /// Send to every member of every group; returns successful delivery
    /// count. A connection in several groups receives one copy per group.
    pub async fn broadcast(&self, payload: &[u8]) -> usize {
        let groups = self.groups().await;
        let mut delivered = 0;
        for group in groups {
            delivered += group.send_all(payload).await;
        }
        delivered
    }

    /// Add `connection` to the named group, creating the group on demand.
    /// The caller holds the connection's group-mutation lock.
    pub(crate) async fn add(&self, connection: &Arc<Connection>, name: &str) {
        let mut groups = self.groups.write().await;
        let group = groups
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("creating group '{}'", name);
                Group::new(name.to_string())
            })
            .clone();
        group.add_member(connection.clone()).await;
    }

    /// Remove `connection` from the named group, deleting the group when its
    /// member count reaches zero. No-op for unknown groups or non-members.
    /// The caller holds the connection's group-mutation lock.
    pub(crate) async fn remove(&self, connection: &Connection, name: &str) {
        let mut groups = self.groups.write().await;
        let Some(group) = groups.get(name).cloned() else {
            return;
        };
        group.remove_member(connection.id()).await;
        if group.member_count().await == 0 {
            debug!("deleting empty group '{}'", name);
            groups.remove(name);
        }
    }
}
