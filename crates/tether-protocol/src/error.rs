//! Fault taxonomy and frame decoding errors.

use serde::{Deserialize, Serialize};

/// The three fault kinds an activation can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FaultKind {
    /// An outbound operation was attempted after the unit was released.
    AlreadyReleased,
    /// A TCP activation targeted an operation no handler implements.
    MethodNotFound,
    /// Anything else raised by handler logic.
    ApplicationFault,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyReleased => "already_released",
            Self::MethodNotFound => "method_not_found",
            Self::ApplicationFault => "application_fault",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while decoding an inbound TCP frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame must be a JSON object")]
    NotAnObject,
    #[error("frame has no route")]
    MissingRoute,
}
