//! Activation driver.
//!
//! Acquires a controller, binds it, routes to the handler registered for
//! the operation's namespace and makes sure the unit is released whatever
//! the handler did. Faults are translated into client responses here and
//! nowhere else.

use tether_protocol::{CapturedAction, ConnectionId, InboundFrame, InboundMessage, Route, UserId};
use tether_transport::{ActivationHandler, HttpRequest, HttpResponder};
use tracing::{debug, error, info, warn};

use crate::controller::Controller;
use crate::error::ControllerError;
use crate::handler::{Handler, HandlerDyn};
use crate::pool::{ControllerPool, PooledController};

pub struct Dispatcher {
    pool: ControllerPool,
    handlers: Vec<Box<dyn HandlerDyn>>,
}

impl Dispatcher {
    pub fn new(pool: ControllerPool) -> Self {
        Self {
            pool,
            handlers: Vec::new(),
        }
    }

    pub fn register_handler<H: Handler + 'static>(&mut self, handler: H) {
        info!("Registering handler: {}", handler.namespace());
        self.handlers.push(Box::new(handler));
    }

    pub fn pool(&self) -> &ControllerPool {
        &self.pool
    }

    /// Run one TCP activation.
    ///
    /// Returns whatever the activation captured (empty unless capture mode
    /// is on). Handler faults are answered on the connection and do not
    /// surface here; only [`ControllerError::AlreadyReleased`] does.
    pub async fn dispatch_tcp(
        &self,
        connection_id: ConnectionId,
        user_id: Option<UserId>,
        operation: &str,
        message: InboundMessage,
    ) -> Result<Vec<CapturedAction>, ControllerError> {
        let mut lease = self.pool.acquire();
        lease.bind_tcp(connection_id, user_id, message, operation);
        self.activate(lease).await
    }

    /// Run one HTTP activation; the response goes out through `responder`.
    pub async fn dispatch_http(
        &self,
        operation: &str,
        request: HttpRequest,
        responder: HttpResponder,
    ) -> Result<Vec<CapturedAction>, ControllerError> {
        let mut lease = self.pool.acquire();
        lease.bind_http(request, responder, operation);
        self.activate(lease).await
    }

    async fn activate(
        &self,
        mut lease: PooledController,
    ) -> Result<Vec<CapturedAction>, ControllerError> {
        let outcome = match self.route(&mut lease).await {
            Ok(()) => Ok(()),
            Err(err @ ControllerError::AlreadyReleased { .. }) => {
                error!(
                    correlation_id = %lease.correlation_id(),
                    "Handler used its controller after release: {err}"
                );
                Err(err)
            }
            Err(err) => {
                if let Err(send_err) = lease.translate_failure(&err) {
                    warn!(
                        correlation_id = %lease.correlation_id(),
                        "Failed to deliver fault response: {send_err}"
                    );
                }
                Ok(())
            }
        };

        lease.release();
        let captured = lease.take_captured_actions();
        self.pool.release(lease);
        outcome.map(|()| captured)
    }

    async fn route(&self, controller: &mut Controller) -> Result<(), ControllerError> {
        let operation = controller.operation().to_string();
        let namespace = Route::parse(&operation).namespace;

        let Some(handler) = self.handlers.iter().find(|h| h.namespace_dyn() == namespace) else {
            debug!(operation = %operation, "No handler for namespace");
            return controller.default_method();
        };
        let result = handler.handle_dyn(&operation, controller).await;
        match result {
            Err(ControllerError::MethodNotFound { .. }) if !controller.is_released() => {
                controller.default_method()
            }
            result => result,
        }
    }
}

impl ActivationHandler for Dispatcher {
    async fn on_tcp(&self, connection_id: ConnectionId, user_id: Option<UserId>, frame: InboundFrame) {
        let InboundFrame { route, message } = frame;
        if let Err(err) = self
            .dispatch_tcp(connection_id, user_id, &route, message)
            .await
        {
            error!(connection_id, operation = %route, "TCP activation failed: {err}");
        }
    }

    async fn on_http(&self, operation: String, request: HttpRequest, responder: HttpResponder) {
        if let Err(err) = self.dispatch_http(&operation, request, responder).await {
            error!(operation = %operation, "HTTP activation failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode, Uri};
    use serde_json::json;
    use tether_protocol::InboundMessage;
    use tether_transport::{HttpRequest, HttpResponder};

    use super::*;
    use crate::config::{ControllerConfig, PoolConfig};
    use crate::controller::Completion;
    use crate::controller::tests::{Call, recording_env};

    struct Echo;

    impl Handler for Echo {
        fn namespace(&self) -> &str {
            "echo"
        }

        async fn handle(&self, method: &str, c: &mut Controller) -> Result<(), ControllerError> {
            match method {
                "echo/say" => {
                    let payload = c.payload().cloned().unwrap_or_default();
                    c.reply(payload, Completion::Release)
                }
                "echo/twice" => {
                    c.reply("one", Completion::Release)?;
                    c.reply("two", Completion::Release)
                }
                "echo/boom" => Err(ControllerError::fault_with("boom", json!({"n": 1}))),
                "echo/silent" => Ok(()),
                _ => Err(ControllerError::method_not_found(method)),
            }
        }
    }

    fn frame(value: serde_json::Value) -> bytes::Bytes {
        let mut line = serde_json::to_vec(&value).unwrap();
        line.push(b'\n');
        line.into()
    }

    fn dispatcher(
        config: ControllerConfig,
    ) -> (Dispatcher, std::sync::Arc<crate::controller::tests::RecordingRuntime>) {
        let (env, rt, _codec) = recording_env(config);
        let mut dispatcher = Dispatcher::new(ControllerPool::new(env, PoolConfig::default()));
        dispatcher.register_handler(Echo);
        (dispatcher, rt)
    }

    #[tokio::test]
    async fn tcp_activation_replies_and_releases() {
        let (d, rt) = dispatcher(ControllerConfig::default());
        d.dispatch_tcp(1, None, "echo/say", InboundMessage::plain(json!({"m": 1})))
            .await
            .unwrap();

        assert_eq!(rt.calls(), vec![Call::ToConnection(1, frame(json!({"m": 1})))]);
        let stats = d.pool().stats();
        assert_eq!(stats.released, 1);
        assert_eq!(stats.busy, 0);
        assert_eq!(stats.idle, 1);
    }

    #[tokio::test]
    async fn silent_handler_is_still_released() {
        let (d, rt) = dispatcher(ControllerConfig::default());
        d.dispatch_tcp(1, None, "echo/silent", InboundMessage::plain(json!({})))
            .await
            .unwrap();
        assert!(rt.calls().is_empty());
        assert_eq!(d.pool().stats().released, 1);
    }

    #[tokio::test]
    async fn fault_is_translated_then_released() {
        let (d, rt) = dispatcher(ControllerConfig::default());
        d.dispatch_tcp(4, None, "echo/boom", InboundMessage::plain(json!({})))
            .await
            .unwrap();
        assert_eq!(rt.calls(), vec![Call::ToConnection(4, frame(json!("error")))]);
        assert_eq!(d.pool().stats().released, 1);
    }

    #[tokio::test]
    async fn use_after_release_surfaces() {
        let (d, rt) = dispatcher(ControllerConfig::default());
        let err = d
            .dispatch_tcp(4, None, "echo/twice", InboundMessage::plain(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::AlreadyReleased { action: "reply" }));
        assert_eq!(rt.calls(), vec![Call::ToConnection(4, frame(json!("one")))]);
        assert_eq!(d.pool().stats().released, 1);
    }

    #[tokio::test]
    async fn tcp_unknown_method_replies_with_fault() {
        let (d, rt) = dispatcher(ControllerConfig {
            debug: true,
            ..Default::default()
        });
        d.dispatch_tcp(2, None, "echo/nope", InboundMessage::plain(json!({})))
            .await
            .unwrap();
        d.dispatch_tcp(2, None, "missing/op", InboundMessage::plain(json!({})))
            .await
            .unwrap();

        assert_eq!(
            rt.calls(),
            vec![
                Call::ToConnection(2, frame(json!("method not found: echo/nope"))),
                Call::ToConnection(2, frame(json!("method not found: missing/op"))),
            ]
        );
    }

    #[tokio::test]
    async fn http_unknown_method_is_not_found() {
        let (d, _rt) = dispatcher(ControllerConfig::default());
        let (responder, rx) = HttpResponder::channel();
        let request = HttpRequest::new(Method::GET, Uri::from_static("/echo/nope"));
        d.dispatch_http("echo/nope", request, responder).await.unwrap();

        let reply = rx.await.unwrap();
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn capture_mode_returns_actions() {
        let (d, rt) = dispatcher(ControllerConfig {
            capture: true,
            ..Default::default()
        });
        let actions = d
            .dispatch_tcp(3, None, "echo/say", InboundMessage::plain(json!("hi")))
            .await
            .unwrap();

        assert_eq!(
            actions,
            vec![CapturedAction::Reply {
                connection_id: 3,
                data: frame(json!("hi")).to_vec(),
            }]
        );
        assert!(rt.calls().is_empty());
    }
}
