//! Application handler trait.

use std::future::Future;
use std::pin::Pin;

use crate::controller::Controller;
use crate::error::ControllerError;

/// Handles every operation under one namespace (`"chat"` for `"chat/say"`).
///
/// `method` is the full operation name. Return
/// [`ControllerError::MethodNotFound`] for names the handler does not know;
/// the dispatcher then runs the controller's default method.
pub trait Handler: Send + Sync {
    fn namespace(&self) -> &str;

    fn handle(
        &self,
        method: &str,
        controller: &mut Controller,
    ) -> impl Future<Output = Result<(), ControllerError>> + Send;
}

pub(crate) type HandlerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), ControllerError>> + Send + 'a>>;

/// Object-safe wrapper for [`Handler`].
pub(crate) trait HandlerDyn: Send + Sync {
    fn namespace_dyn(&self) -> &str;

    fn handle_dyn<'a>(&'a self, method: &'a str, controller: &'a mut Controller)
    -> HandlerFuture<'a>;
}

impl<T: Handler> HandlerDyn for T {
    fn namespace_dyn(&self) -> &str {
        self.namespace()
    }

    fn handle_dyn<'a>(
        &'a self,
        method: &'a str,
        controller: &'a mut Controller,
    ) -> HandlerFuture<'a> {
        Box::pin(self.handle(method, controller))
    }
}
