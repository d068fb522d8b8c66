use serde_json::Value;
use tether_protocol::envelope::RPC_REQUEST_ID;
use tether_protocol::{ConnectionId, InboundMessage, TransportKind, UserId};
use tether_transport::{HttpRequest, HttpResponder};
use tracing::debug;

use super::{Controller, RpcIdentity};
use crate::correlation::derive_correlation_id;

impl Controller {
    /// Bind the controller to an inbound TCP message.
    ///
    /// Whatever the previous activation left behind is cleared first; an RPC
    /// identity is only present when `message` is the RPC variant.
    pub fn bind_tcp(
        &mut self,
        connection_id: ConnectionId,
        user_id: Option<UserId>,
        message: InboundMessage,
        operation: &str,
    ) {
        self.reset();
        self.captured.clear();

        self.transport = Some(TransportKind::Tcp);
        self.connection_id = Some(connection_id);
        self.user_id = user_id;
        match message {
            InboundMessage::Plain { payload } => {
                self.payload = Some(payload);
            }
            InboundMessage::Rpc {
                payload,
                token,
                request_id,
            } => {
                self.payload = Some(payload);
                self.rpc = Some(RpcIdentity { token, request_id });
            }
        }
        self.begin(operation);
    }

    /// Bind the controller to an HTTP request and the channel its response
    /// goes out on. A non-empty `rpc_request_id` header marks the
    /// activation as RPC, with an empty token.
    pub fn bind_http(&mut self, request: HttpRequest, responder: HttpResponder, operation: &str) {
        self.reset();
        self.captured.clear();

        let request_id = request
            .headers
            .get(RPC_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        if let Some(request_id) = request_id {
            self.rpc = Some(RpcIdentity {
                token: String::new(),
                request_id,
            });
        }
        self.http_input.set(request);
        self.http_output.set(responder);
        self.transport = Some(TransportKind::Http);
        self.begin(operation);
    }

    fn begin(&mut self, operation: &str) {
        self.operation = operation.to_string();
        self.correlation_id = derive_correlation_id(self.rpc_request_id(), operation);
        self.context.insert(
            "request_id".to_string(),
            Value::String(self.correlation_id.clone()),
        );
        self.destroyed = false;
        debug!(
            correlation_id = %self.correlation_id,
            operation,
            transport = ?self.transport,
            "Controller bound"
        );
    }
}
