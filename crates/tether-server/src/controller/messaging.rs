//! Outbound messaging façade.
//!
//! Every operation fails with [`ControllerError::AlreadyReleased`] once the
//! activation has ended. In capture mode the operation is recorded instead
//! of reaching the runtime.

use bytes::Bytes;
use serde_json::Value;
use tether_protocol::{CapturedAction, ConnectionId, GroupId, RpcReply, UserId};
use tracing::trace;

use super::Controller;
use crate::error::ControllerError;

/// What a sending operation does with the activation once it is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Completion {
    /// Release the controller; the send was the activation's last effect.
    #[default]
    Release,
    /// Keep the activation open for further sends.
    Keep,
}

impl Controller {
    pub(super) fn ensure_live(&self, action: &'static str) -> Result<(), ControllerError> {
        if self.destroyed {
            return Err(ControllerError::AlreadyReleased { action });
        }
        Ok(())
    }

    pub(super) fn finish(&mut self, completion: Completion) {
        if completion == Completion::Release {
            self.release();
        }
    }

    /// Record `action` in capture mode, otherwise hand it to the runtime.
    fn emit(&mut self, action: CapturedAction) -> Result<(), ControllerError> {
        if self.env.config.capture {
            trace!(action = action.name(), "Captured outbound action");
            self.captured.push(action);
            return Ok(());
        }

        let runtime = &self.env.runtime;
        let codec = &self.env.codec;
        match action {
            CapturedAction::Reply {
                connection_id,
                data,
            } => runtime.send_to_connection(connection_id, Bytes::from(data)),
            CapturedAction::SendToUser { user_id, data } => {
                runtime.send_to_user(user_id, codec.encode(&data)?)
            }
            CapturedAction::SendToUsers { user_ids, data } => {
                runtime.send_to_users(&user_ids, codec.encode(&data)?)
            }
            CapturedAction::SendToAll { data } => runtime.broadcast(codec.encode(&data)?),
            CapturedAction::SendToGroup { group_id, data } => {
                runtime.send_to_group(group_id, codec.encode(&data)?)
            }
            CapturedAction::Kick { user_id } => runtime.kick(user_id),
            CapturedAction::Bind {
                connection_id,
                user_id,
                kick_existing,
            } => runtime.bind_connection(connection_id, user_id, kick_existing),
            CapturedAction::Unbind { user_id } => runtime.unbind_user(user_id),
            CapturedAction::Close { connection_id } => runtime.close_connection(connection_id),
            CapturedAction::AddToGroup { user_id, group_id } => {
                runtime.add_group_member(user_id, group_id)
            }
            CapturedAction::RemoveFromGroup { user_id, group_id } => {
                runtime.remove_group_member(user_id, group_id)
            }
        }
        Ok(())
    }

    // ── Sends ───────────────────────────────────────────────────────────

    /// Answer the bound connection.
    ///
    /// RPC activations with a non-empty token get the result wrapped as
    /// `{"rpc_token": .., "rpc_result": data}`. The codec runs once per call,
    /// also in capture mode, where the record holds the encoded frame.
    pub fn reply(
        &mut self,
        data: impl Into<Value>,
        completion: Completion,
    ) -> Result<(), ControllerError> {
        self.ensure_live("reply")?;
        let connection_id = self.connection_id.ok_or(ControllerError::NoConnection)?;
        let data = match &self.rpc {
            Some(rpc) if !rpc.token.is_empty() => {
                RpcReply::new(rpc.token.clone(), data.into()).into_value()
            }
            _ => data.into(),
        };
        let frame = self.env.codec.encode(&data)?;
        self.emit(CapturedAction::Reply {
            connection_id,
            data: frame.to_vec(),
        })?;
        self.finish(completion);
        Ok(())
    }

    pub fn send_to_user(
        &mut self,
        user_id: UserId,
        data: impl Into<Value>,
        completion: Completion,
    ) -> Result<(), ControllerError> {
        self.ensure_live("send_to_user")?;
        self.emit(CapturedAction::SendToUser {
            user_id,
            data: data.into(),
        })?;
        self.finish(completion);
        Ok(())
    }

    pub fn send_to_users(
        &mut self,
        user_ids: &[UserId],
        data: impl Into<Value>,
        completion: Completion,
    ) -> Result<(), ControllerError> {
        self.ensure_live("send_to_users")?;
        self.emit(CapturedAction::SendToUsers {
            user_ids: user_ids.to_vec(),
            data: data.into(),
        })?;
        self.finish(completion);
        Ok(())
    }

    /// Broadcast to every connected client.
    pub fn send_to_all(
        &mut self,
        data: impl Into<Value>,
        completion: Completion,
    ) -> Result<(), ControllerError> {
        self.ensure_live("send_to_all")?;
        self.emit(CapturedAction::SendToAll { data: data.into() })?;
        self.finish(completion);
        Ok(())
    }

    pub fn send_to_group(
        &mut self,
        group_id: GroupId,
        data: impl Into<Value>,
        completion: Completion,
    ) -> Result<(), ControllerError> {
        self.ensure_live("send_to_group")?;
        self.emit(CapturedAction::SendToGroup {
            group_id,
            data: data.into(),
        })?;
        self.finish(completion);
        Ok(())
    }

    /// End the HTTP response with `body`.
    pub fn end(
        &mut self,
        body: impl Into<Bytes>,
        completion: Completion,
    ) -> Result<(), ControllerError> {
        self.ensure_live("end")?;
        self.http_output.end(body)?;
        self.finish(completion);
        Ok(())
    }

    // ── Connection management ───────────────────────────────────────────
    //
    // None of these answer the current request, so none of them release,
    // except `close`.

    pub fn kick(&mut self, user_id: UserId) -> Result<(), ControllerError> {
        self.ensure_live("kick")?;
        self.emit(CapturedAction::Kick { user_id })
    }

    /// Associate `connection_id` with `user_id`. With `kick_existing`, a
    /// connection already bound to the user is dropped.
    pub fn bind_user(
        &mut self,
        connection_id: ConnectionId,
        user_id: UserId,
        kick_existing: bool,
    ) -> Result<(), ControllerError> {
        self.ensure_live("bind")?;
        self.emit(CapturedAction::Bind {
            connection_id,
            user_id,
            kick_existing,
        })
    }

    pub fn unbind_user(&mut self, user_id: UserId) -> Result<(), ControllerError> {
        self.ensure_live("unbind")?;
        self.emit(CapturedAction::Unbind { user_id })
    }

    pub fn close(
        &mut self,
        connection_id: ConnectionId,
        completion: Completion,
    ) -> Result<(), ControllerError> {
        self.ensure_live("close")?;
        self.emit(CapturedAction::Close { connection_id })?;
        self.finish(completion);
        Ok(())
    }

    pub fn add_to_group(&mut self, user_id: UserId, group_id: GroupId) -> Result<(), ControllerError> {
        self.ensure_live("add_to_group")?;
        self.emit(CapturedAction::AddToGroup { user_id, group_id })
    }

    pub fn remove_from_group(
        &mut self,
        user_id: UserId,
        group_id: GroupId,
    ) -> Result<(), ControllerError> {
        self.ensure_live("remove_from_group")?;
        self.emit(CapturedAction::RemoveFromGroup { user_id, group_id })
    }
}
