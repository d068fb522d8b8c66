//! Tether Transport Layer
//!
//! Everything the execution contexts talk to but do not own:
//! - the runtime addressing primitive ([`Runtime`]) and an in-process
//!   implementation backed by a connection table ([`LocalRuntime`])
//! - the two-stage payload codec ([`Codec`])
//! - HTTP input/output adapters over raw request/response handles
//! - fallback view rendering
//! - the TCP + HTTP listener that feeds activations to an [`ActivationHandler`]

pub mod client;
pub mod codec;
pub mod http;
pub mod runtime;
pub mod server;
pub mod view;

pub use client::ClientConnection;
pub use codec::{Codec, CodecError, JsonLineCodec};
pub use http::{HttpError, HttpInput, HttpOutput, HttpReply, HttpRequest, HttpResponder};
pub use runtime::{LocalRuntime, Outbound, Runtime};
pub use server::{ActivationHandler, TransportConfig, TransportError, TransportServer};
pub use view::{StaticViews, ViewError, ViewRenderer};
