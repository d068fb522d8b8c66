//! Errors an activation can end with.

use serde_json::Value;
use tether_protocol::FaultKind;
use tether_transport::{CodecError, HttpError};

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Outbound operation on a controller whose activation already ended.
    #[error("controller is released, cannot {action}")]
    AlreadyReleased { action: &'static str },

    #[error("method not found: {operation}")]
    MethodNotFound { operation: String },

    /// Fault raised deliberately by handler code. `others` carries extra
    /// diagnostics that are logged but never sent to the client.
    #[error("{message}")]
    Fault {
        message: String,
        others: Option<Value>,
    },

    #[error("reply needs a TCP activation with a bound connection")]
    NoConnection,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Http(#[from] HttpError),

    /// Any other failure bubbling out of handler code.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl ControllerError {
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault {
            message: message.into(),
            others: None,
        }
    }

    pub fn fault_with(message: impl Into<String>, others: Value) -> Self {
        Self::Fault {
            message: message.into(),
            others: Some(others),
        }
    }

    pub fn method_not_found(operation: impl Into<String>) -> Self {
        Self::MethodNotFound {
            operation: operation.into(),
        }
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            Self::AlreadyReleased { .. } => FaultKind::AlreadyReleased,
            Self::MethodNotFound { .. } => FaultKind::MethodNotFound,
            _ => FaultKind::ApplicationFault,
        }
    }

    /// Auxiliary diagnostic payload, for faults that carry one.
    pub fn diagnostics(&self) -> Option<&Value> {
        match self {
            Self::Fault { others, .. } => others.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kinds() {
        assert_eq!(
            ControllerError::AlreadyReleased { action: "reply" }.kind(),
            FaultKind::AlreadyReleased
        );
        assert_eq!(
            ControllerError::method_not_found("chat/x").kind(),
            FaultKind::MethodNotFound
        );
        assert_eq!(ControllerError::fault("boom").kind(), FaultKind::ApplicationFault);
        assert_eq!(
            ControllerError::from(anyhow::anyhow!("io")).kind(),
            FaultKind::ApplicationFault
        );
    }

    #[test]
    fn messages() {
        assert_eq!(
            ControllerError::method_not_found("chat/x").to_string(),
            "method not found: chat/x"
        );
        let err = ControllerError::fault_with("bad input", json!({"field": "user"}));
        assert_eq!(err.to_string(), "bad input");
        assert_eq!(err.diagnostics(), Some(&json!({"field": "user"})));
    }
}
