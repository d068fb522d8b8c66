//! Records of outbound actions diverted by capture mode.
//!
//! Each façade operation maps to one variant. Serialized, a record looks like
//! `{"action": "sendToGroup", "groupId": 42, "data": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ConnectionId, GroupId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CapturedAction {
    /// Reply to the bound connection. `data` holds the fully encoded frame.
    Reply {
        connection_id: ConnectionId,
        data: Vec<u8>,
    },
    SendToUser {
        user_id: UserId,
        data: Value,
    },
    SendToUsers {
        user_ids: Vec<UserId>,
        data: Value,
    },
    SendToAll {
        data: Value,
    },
    SendToGroup {
        group_id: GroupId,
        data: Value,
    },
    Kick {
        user_id: UserId,
    },
    Bind {
        connection_id: ConnectionId,
        user_id: UserId,
        kick_existing: bool,
    },
    Unbind {
        user_id: UserId,
    },
    Close {
        connection_id: ConnectionId,
    },
    AddToGroup {
        user_id: UserId,
        group_id: GroupId,
    },
    RemoveFromGroup {
        user_id: UserId,
        group_id: GroupId,
    },
}

impl CapturedAction {
    /// The `action` tag this record serializes with.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reply { .. } => "reply",
            Self::SendToUser { .. } => "sendToUser",
            Self::SendToUsers { .. } => "sendToUsers",
            Self::SendToAll { .. } => "sendToAll",
            Self::SendToGroup { .. } => "sendToGroup",
            Self::Kick { .. } => "kick",
            Self::Bind { .. } => "bind",
            Self::Unbind { .. } => "unbind",
            Self::Close { .. } => "close",
            Self::AddToGroup { .. } => "addToGroup",
            Self::RemoveFromGroup { .. } => "removeFromGroup",
        }
    }
}
