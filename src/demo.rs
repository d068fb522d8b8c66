//! Demo `chat/*` handler wired into the binary.
//!
//! Over TCP a client logs in once (`chat/login`), which binds its
//! connection to a user id; later frames on that connection arrive with the
//! user id attached. Over HTTP only `chat/whoami` is meaningful.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tether_protocol::{GroupId, TransportKind, UserId};
use tether_server::{Completion, Controller, ControllerError, Handler};

pub struct ChatHandler;

#[derive(Deserialize)]
struct Login {
    user: UserId,
}

#[derive(Deserialize)]
struct Membership {
    group: GroupId,
}

#[derive(Deserialize)]
struct Say {
    group: GroupId,
    text: String,
}

#[derive(Deserialize)]
struct Whisper {
    to: UserId,
    text: String,
}

#[derive(Deserialize)]
struct Shout {
    text: String,
}

#[derive(Deserialize)]
struct Kick {
    user: UserId,
}

/// Decode the activation's parameters: the frame over TCP, the JSON body
/// over HTTP.
fn params<T: DeserializeOwned>(controller: &Controller) -> Result<T, ControllerError> {
    let decoded = match controller.transport_kind() {
        Some(TransportKind::Http) => controller.http_input().json(),
        _ => serde_json::from_value(controller.payload().cloned().unwrap_or(Value::Null)),
    };
    decoded.map_err(|e| ControllerError::fault(format!("invalid params: {e}")))
}

fn logged_in(controller: &Controller) -> Result<UserId, ControllerError> {
    controller
        .user_id()
        .ok_or_else(|| ControllerError::fault("not logged in"))
}

impl Handler for ChatHandler {
    fn namespace(&self) -> &str {
        "chat"
    }

    async fn handle(&self, method: &str, c: &mut Controller) -> Result<(), ControllerError> {
        match method {
            "chat/login" => {
                let Login { user } = params(c)?;
                let connection_id = c.connection_id().ok_or(ControllerError::NoConnection)?;
                c.bind_user(connection_id, user, true)?;
                c.reply(json!({"ok": true, "user": user}), Completion::Release)
            }
            "chat/join" => {
                let user = logged_in(c)?;
                let Membership { group } = params(c)?;
                c.add_to_group(user, group)?;
                c.reply(json!({"joined": group}), Completion::Release)
            }
            "chat/leave" => {
                let user = logged_in(c)?;
                let Membership { group } = params(c)?;
                c.remove_from_group(user, group)?;
                c.reply(json!({"left": group}), Completion::Release)
            }
            "chat/say" => {
                let from = logged_in(c)?;
                let Say { group, text } = params(c)?;
                let message = json!({"event": "message", "group": group, "from": from, "text": text});
                c.send_to_group(group, message, Completion::Keep)?;
                c.reply(json!({"sent": true}), Completion::Release)
            }
            "chat/whisper" => {
                let from = logged_in(c)?;
                let Whisper { to, text } = params(c)?;
                let message = json!({"event": "whisper", "from": from, "text": text});
                c.send_to_user(to, message, Completion::Keep)?;
                c.reply(json!({"sent": true}), Completion::Release)
            }
            "chat/shout" => {
                let from = logged_in(c)?;
                let Shout { text } = params(c)?;
                c.send_to_all(json!({"event": "shout", "from": from, "text": text}), Completion::Release)
            }
            "chat/kick" => {
                let Kick { user } = params(c)?;
                c.kick(user)?;
                c.reply(json!({"kicked": user}), Completion::Release)
            }
            "chat/quit" => {
                let connection_id = c.connection_id().ok_or(ControllerError::NoConnection)?;
                c.close(connection_id, Completion::Release)
            }
            "chat/whoami" => whoami(c),
            "chat/boom" => Err(ControllerError::fault_with(
                "boom requested",
                json!({"operation": c.operation()}),
            )),
            _ => Err(ControllerError::method_not_found(method)),
        }
    }
}

fn whoami(c: &mut Controller) -> Result<(), ControllerError> {
    let body = json!({
        "transport": c.transport_kind(),
        "user": c.user_id(),
        "connection": c.connection_id(),
        "rpc": c.is_rpc(),
        "correlation_id": c.correlation_id(),
    });
    match c.transport_kind() {
        Some(TransportKind::Http) => {
            c.http_output().set_header("content-type", "application/json")?;
            c.end(body.to_string(), Completion::Release)
        }
        _ => c.reply(body, Completion::Release),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tether_protocol::{CapturedAction, InboundMessage};
    use tether_server::{ControllerConfig, ControllerEnv, ControllerPool, Dispatcher, PoolConfig};
    use tether_transport::{JsonLineCodec, LocalRuntime};

    use super::*;

    fn capturing() -> Dispatcher {
        let env = ControllerEnv::new(Arc::new(LocalRuntime::new()), Arc::new(JsonLineCodec::default()))
            .with_config(ControllerConfig {
                debug: true,
                capture: true,
            });
        let mut dispatcher = Dispatcher::new(ControllerPool::new(Arc::new(env), PoolConfig::default()));
        dispatcher.register_handler(ChatHandler);
        dispatcher
    }

    fn reply_value(action: &CapturedAction) -> serde_json::Value {
        match action {
            CapturedAction::Reply { data, .. } => serde_json::from_slice(data).unwrap(),
            other => panic!("expected a reply, got {}", other.name()),
        }
    }

    #[tokio::test]
    async fn login_binds_then_replies() {
        let d = capturing();
        let actions = d
            .dispatch_tcp(3, None, "chat/login", InboundMessage::plain(json!({"user": 42})))
            .await
            .unwrap();

        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[0],
            CapturedAction::Bind {
                connection_id: 3,
                user_id: 42,
                kick_existing: true,
            }
        );
        assert_eq!(reply_value(&actions[1]), json!({"ok": true, "user": 42}));
    }

    #[tokio::test]
    async fn say_sends_to_group_before_reply() {
        let d = capturing();
        let actions = d
            .dispatch_tcp(
                3,
                Some(42),
                "chat/say",
                InboundMessage::plain(json!({"group": 7, "text": "hi"})),
            )
            .await
            .unwrap();

        assert_eq!(
            actions[0],
            CapturedAction::SendToGroup {
                group_id: 7,
                data: json!({"event": "message", "group": 7, "from": 42, "text": "hi"}),
            }
        );
        assert_eq!(reply_value(&actions[1]), json!({"sent": true}));
    }

    #[tokio::test]
    async fn anonymous_join_is_refused() {
        let d = capturing();
        let actions = d
            .dispatch_tcp(3, None, "chat/join", InboundMessage::plain(json!({"group": 1})))
            .await
            .unwrap();

        assert_eq!(actions.len(), 1);
        assert_eq!(reply_value(&actions[0]), json!("not logged in"));
    }

    #[tokio::test]
    async fn bad_params_are_reported() {
        let d = capturing();
        let actions = d
            .dispatch_tcp(3, None, "chat/login", InboundMessage::plain(json!({"name": "x"})))
            .await
            .unwrap();

        let message = reply_value(&actions[0]);
        assert!(message.as_str().unwrap().starts_with("invalid params"));
    }

    #[tokio::test]
    async fn rpc_whoami_is_wrapped() {
        let d = capturing();
        let actions = d
            .dispatch_tcp(
                9,
                Some(5),
                "chat/whoami",
                InboundMessage::decode(json!({"rpc_request_id": "R9", "rpc_token": "T1"})),
            )
            .await
            .unwrap();

        let reply = reply_value(&actions[0]);
        assert_eq!(reply["rpc_token"], "T1");
        assert_eq!(reply["rpc_result"]["correlation_id"], "R9");
        assert_eq!(reply["rpc_result"]["transport"], "tcp");
        assert_eq!(reply["rpc_result"]["user"], 5);
    }
}
