//! Per-connection bookkeeping kept by the TCP listener.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tether_protocol::ConnectionId;

/// A connected TCP client.
#[derive(Debug)]
pub struct ClientConnection {
    /// Connection id in the runtime's table
    pub id: ConnectionId,
    /// Remote address
    pub peer: SocketAddr,
    /// When the client connected
    pub connected_at: Instant,
    /// Last time we received any frame from this client
    pub last_activity: Instant,
    /// Frames received so far
    pub frames: u64,
}

impl ClientConnection {
    pub fn new(id: ConnectionId, peer: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id,
            peer,
            connected_at: now,
            last_activity: now,
            frames: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
        self.frames += 1;
    }

    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
