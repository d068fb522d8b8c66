//! Tether - Protocol Types
//!
//! Wire-level types shared by the transport and server crates: identifier
//! aliases, the inbound envelope decoded at the transport boundary, the RPC
//! reply envelope, captured outbound actions and the fault taxonomy.

pub mod capture;
pub mod envelope;
pub mod error;
pub mod route;

pub use capture::CapturedAction;
pub use envelope::{InboundFrame, InboundMessage, RpcReply, TransportKind};
pub use error::{FaultKind, ProtocolError};
pub use route::Route;

/// Identifier of a live connection inside the runtime's connection table.
pub type ConnectionId = u64;

/// Logical identity a connection can be bound to.
pub type UserId = u64;

/// Identifier of a named set of users.
pub type GroupId = u64;
