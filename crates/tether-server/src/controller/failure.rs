use axum::http::StatusCode;
use tether_protocol::TransportKind;
use tether_transport::view::NOT_FOUND_VIEW;
use tracing::{error, info, warn};

use super::{Completion, Controller};
use crate::error::ControllerError;

/// Client-visible message for faults when debug output is off.
pub const GENERIC_ERROR_MESSAGE: &str = "error";

const PLAIN_NOT_FOUND: &str = "404 Not Found";

impl Controller {
    /// Turn a fault that escaped handler code into a client response.
    ///
    /// HTTP activations get the message as the response body, TCP ones as a
    /// reply. The activation stays open; the caller releases it.
    pub fn translate_failure(&mut self, fault: &ControllerError) -> Result<(), ControllerError> {
        error!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            kind = %fault.kind(),
            "Activation failed: {fault} ({fault:?})"
        );
        if let Some(diagnostics) = fault.diagnostics() {
            info!(
                correlation_id = %self.correlation_id,
                %diagnostics,
                "Fault diagnostics"
            );
        }

        let message = if self.config().debug {
            fault.to_string()
        } else {
            GENERIC_ERROR_MESSAGE.to_string()
        };

        match self.transport {
            Some(TransportKind::Http) => {
                self.http_output.end(message)?;
                Ok(())
            }
            Some(TransportKind::Tcp) => self.reply(message, Completion::Keep),
            None => {
                warn!("Fault raised outside a bound activation, nothing sent");
                Ok(())
            }
        }
    }

    /// Fallback for operations no handler implements.
    ///
    /// HTTP gets a 404 with the not-found view. TCP has no such page, so the
    /// activation fails with `MethodNotFound` instead.
    pub fn default_method(&mut self) -> Result<(), ControllerError> {
        self.ensure_live("default_method")?;
        if self.transport != Some(TransportKind::Http) {
            return Err(ControllerError::method_not_found(self.operation.clone()));
        }

        let (content_type, page) = match self.env.views.render(NOT_FOUND_VIEW) {
            Ok(page) => ("text/html; charset=utf-8", page),
            Err(err) => {
                warn!(error = %err, "Not-found view unavailable, sending plain text");
                ("text/plain; charset=utf-8", PLAIN_NOT_FOUND.to_string())
            }
        };
        self.http_output.set_status(StatusCode::NOT_FOUND);
        self.http_output.set_header("content-type", content_type)?;
        self.http_output.end(page)?;
        Ok(())
    }
}
