//! Runtime addressing primitive and the in-process connection table.
//!
//! Every method of [`Runtime`] is a non-blocking handoff: frames are queued
//! on per-connection channels and written by the connection's writer task.
//! Undeliverable frames (unknown user, closed connection) are dropped.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use tether_protocol::{ConnectionId, GroupId, UserId};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Addressing operations the execution contexts delegate to.
pub trait Runtime: Send + Sync + 'static {
    fn send_to_connection(&self, connection_id: ConnectionId, frame: Bytes);
    fn send_to_user(&self, user_id: UserId, frame: Bytes);
    fn send_to_users(&self, user_ids: &[UserId], frame: Bytes);
    fn broadcast(&self, frame: Bytes);
    fn send_to_group(&self, group_id: GroupId, frame: Bytes);
    fn kick(&self, user_id: UserId);
    fn bind_connection(&self, connection_id: ConnectionId, user_id: UserId, kick_existing: bool);
    fn unbind_user(&self, user_id: UserId);
    fn close_connection(&self, connection_id: ConnectionId);
    fn add_group_member(&self, user_id: UserId, group_id: GroupId);
    fn remove_group_member(&self, user_id: UserId, group_id: GroupId);
}

/// Item queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(Bytes),
    Close,
}

/// Connection table shared by the listener and the execution contexts.
pub struct LocalRuntime {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<Outbound>>,
    connection_users: DashMap<ConnectionId, UserId>,
    user_connections: DashMap<UserId, ConnectionId>,
    groups: DashMap<GroupId, HashSet<UserId>>,
    next_id: AtomicU64,
}

impl LocalRuntime {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            connection_users: DashMap::new(),
            user_connections: DashMap::new(),
            groups: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a connection. The receiver yields everything addressed to it.
    pub fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(id, tx);
        (id, rx)
    }

    /// Drop a connection and its user binding. Group memberships are kept,
    /// they belong to the user.
    pub fn deregister(&self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
        if let Some((_, user_id)) = self.connection_users.remove(&connection_id) {
            self.user_connections
                .remove_if(&user_id, |_, conn| *conn == connection_id);
        }
    }

    pub fn user_of(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.connection_users.get(&connection_id).map(|u| *u)
    }

    pub fn connection_of(&self, user_id: UserId) -> Option<ConnectionId> {
        self.user_connections.get(&user_id).map(|c| *c)
    }

    pub fn group_members(&self, group_id: GroupId) -> Vec<UserId> {
        let mut members: Vec<UserId> = self
            .groups
            .get(&group_id)
            .map(|g| g.iter().copied().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Ask every connection's writer to shut down.
    pub fn close_all(&self) {
        for entry in self.connections.iter() {
            let _ = entry.value().send(Outbound::Close);
        }
    }

    fn push(&self, connection_id: ConnectionId, item: Outbound) {
        match self.connections.get(&connection_id) {
            Some(tx) => {
                if tx.send(item).is_err() {
                    debug!(connection_id, "writer gone, frame dropped");
                }
            }
            None => debug!(connection_id, "unknown connection, frame dropped"),
        }
    }
}

impl Default for LocalRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime for LocalRuntime {
    fn send_to_connection(&self, connection_id: ConnectionId, frame: Bytes) {
        self.push(connection_id, Outbound::Frame(frame));
    }

    fn send_to_user(&self, user_id: UserId, frame: Bytes) {
        match self.connection_of(user_id) {
            Some(connection_id) => self.push(connection_id, Outbound::Frame(frame)),
            None => debug!(user_id, "user not online, frame dropped"),
        }
    }

    fn send_to_users(&self, user_ids: &[UserId], frame: Bytes) {
        for user_id in user_ids {
            self.send_to_user(*user_id, frame.clone());
        }
    }

    fn broadcast(&self, frame: Bytes) {
        for entry in self.connections.iter() {
            let _ = entry.value().send(Outbound::Frame(frame.clone()));
        }
    }

    fn send_to_group(&self, group_id: GroupId, frame: Bytes) {
        let members = self.group_members(group_id);
        self.send_to_users(&members, frame);
    }

    fn kick(&self, user_id: UserId) {
        if let Some((_, connection_id)) = self.user_connections.remove(&user_id) {
            self.connection_users
                .remove_if(&connection_id, |_, u| *u == user_id);
            info!(user_id, connection_id, "Kicking user");
            self.close_connection(connection_id);
        }
    }

    fn bind_connection(&self, connection_id: ConnectionId, user_id: UserId, kick_existing: bool) {
        if let Some(previous) = self.user_connections.insert(user_id, connection_id) {
            if previous != connection_id {
                self.connection_users
                    .remove_if(&previous, |_, u| *u == user_id);
                if kick_existing {
                    info!(user_id, previous, "User rebound, closing previous connection");
                    self.close_connection(previous);
                }
            }
        }
        if let Some(old_user) = self.connection_users.insert(connection_id, user_id) {
            if old_user != user_id {
                self.user_connections
                    .remove_if(&old_user, |_, c| *c == connection_id);
            }
        }
    }

    fn unbind_user(&self, user_id: UserId) {
        if let Some((_, connection_id)) = self.user_connections.remove(&user_id) {
            self.connection_users
                .remove_if(&connection_id, |_, u| *u == user_id);
        }
    }

    fn close_connection(&self, connection_id: ConnectionId) {
        self.push(connection_id, Outbound::Close);
    }

    fn add_group_member(&self, user_id: UserId, group_id: GroupId) {
        self.groups.entry(group_id).or_default().insert(user_id);
    }

    fn remove_group_member(&self, user_id: UserId, group_id: GroupId) {
        let now_empty = match self.groups.get_mut(&group_id) {
            Some(mut members) => {
                members.remove(&user_id);
                members.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.groups.remove_if(&group_id, |_, members| members.is_empty());
        }
    }
}
