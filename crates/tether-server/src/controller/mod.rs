//! The pooled execution context.
//!
//! A `Controller` is built once and then rebound for many unrelated
//! activations. All per-activation state is cleared by a single
//! `reset`, which runs before every bind and on release, so
//! nothing set during one activation is visible to the next.
//!
//! The impl is split by concern:
//! - `binding`: `bind_tcp` / `bind_http`
//! - `messaging`: the outbound façade (`reply`, `send_to_*`, groups, ...)
//! - `failure`: fault translation and the default-method fallback

mod binding;
mod failure;
mod messaging;

use std::sync::{Arc, Weak};

use serde_json::{Map, Value};
use tether_protocol::{CapturedAction, ConnectionId, TransportKind, UserId};
use tether_transport::{HttpInput, HttpOutput};
use tracing::{debug, trace};

use crate::config::ControllerConfig;
use crate::env::ControllerEnv;
use crate::pool::ReleaseNotifier;

pub use failure::GENERIC_ERROR_MESSAGE;
pub use messaging::Completion;

/// A handle acquired during an activation that must not outlive it.
pub trait ScopedResource: Send + Sync {
    fn name(&self) -> &str;

    /// Give the resource back. Called once, from [`Controller::release`].
    fn close(self: Box<Self>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RpcIdentity {
    token: String,
    request_id: String,
}

pub struct Controller {
    env: Arc<ControllerEnv>,
    notifier: Option<Weak<dyn ReleaseNotifier>>,

    transport: Option<TransportKind>,
    operation: String,
    connection_id: Option<ConnectionId>,
    user_id: Option<UserId>,
    payload: Option<Value>,
    rpc: Option<RpcIdentity>,
    http_input: HttpInput,
    http_output: HttpOutput,
    correlation_id: String,
    context: Map<String, Value>,
    resources: Vec<Box<dyn ScopedResource>>,
    destroyed: bool,

    // Survives release so a test harness can drain it after the activation
    // ends; cleared on the next bind and when the unit goes back to the pool.
    captured: Vec<CapturedAction>,
}

impl Controller {
    /// A standalone controller. It starts released: outbound operations
    /// fail until it is bound.
    pub fn new(env: Arc<ControllerEnv>) -> Self {
        Self {
            env,
            notifier: None,
            transport: None,
            operation: String::new(),
            connection_id: None,
            user_id: None,
            payload: None,
            rpc: None,
            http_input: HttpInput::default(),
            http_output: HttpOutput::default(),
            correlation_id: String::new(),
            context: Map::new(),
            resources: Vec::new(),
            destroyed: true,
            captured: Vec::new(),
        }
    }

    pub(crate) fn pooled(env: Arc<ControllerEnv>, notifier: Weak<dyn ReleaseNotifier>) -> Self {
        let mut controller = Self::new(env);
        controller.notifier = Some(notifier);
        controller
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn config(&self) -> &ControllerConfig {
        &self.env.config
    }

    pub fn transport_kind(&self) -> Option<TransportKind> {
        self.transport
    }

    /// Operation name the current activation was bound for.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn is_rpc(&self) -> bool {
        self.rpc.is_some()
    }

    pub fn rpc_token(&self) -> Option<&str> {
        self.rpc.as_ref().map(|r| r.token.as_str())
    }

    pub fn rpc_request_id(&self) -> Option<&str> {
        self.rpc.as_ref().map(|r| r.request_id.as_str())
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn http_input(&self) -> &HttpInput {
        &self.http_input
    }

    pub fn http_output(&mut self) -> &mut HttpOutput {
        &mut self.http_output
    }

    /// Key/value context of the activation, seeded with `request_id`.
    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn set_context(&mut self, key: impl Into<String>, value: Value) {
        self.context.insert(key.into(), value);
    }

    pub fn is_released(&self) -> bool {
        self.destroyed
    }

    // ── Resources ───────────────────────────────────────────────────────

    /// Tie `resource` to the current activation; it is closed on release.
    pub fn attach_resource(&mut self, resource: Box<dyn ScopedResource>) {
        self.resources.push(resource);
    }

    fn close_resources(&mut self) {
        while let Some(resource) = self.resources.pop() {
            trace!(resource = resource.name(), "Closing scoped resource");
            resource.close();
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Clear every per-activation field. Adapters are reset in place.
    fn reset(&mut self) {
        self.close_resources();
        self.transport = None;
        self.operation.clear();
        self.connection_id = None;
        self.user_id = None;
        self.payload = None;
        self.rpc = None;
        self.http_input.reset();
        self.http_output.reset();
        self.correlation_id.clear();
        self.context.clear();
    }

    /// End the activation and hand the unit back to its pool.
    ///
    /// Calling this on a released controller does nothing, so the pool is
    /// notified at most once per activation.
    pub fn release(&mut self) {
        if self.destroyed {
            trace!("release on a released controller ignored");
            return;
        }
        let correlation_id = std::mem::take(&mut self.correlation_id);
        self.destroyed = true;
        self.reset();
        debug!(correlation_id = %correlation_id, "Controller released");
        if let Some(notifier) = self.notifier.as_ref().and_then(Weak::upgrade) {
            notifier.unit_released(&correlation_id);
        }
    }

    /// Drain the capture log.
    pub fn take_captured_actions(&mut self) -> Vec<CapturedAction> {
        std::mem::take(&mut self.captured)
    }

    pub(crate) fn clear_captured(&mut self) {
        self.captured.clear();
    }
}
