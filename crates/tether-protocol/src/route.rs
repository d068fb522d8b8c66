//! Operation names — `namespace/method` strings used to pick a handler.

/// A parsed operation name such as `chat/send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route<'a> {
    pub namespace: &'a str,
    pub method: &'a str,
}

impl<'a> Route<'a> {
    /// Split an operation name at its first `/`. A name without a slash is
    /// all namespace with an empty method.
    pub fn parse(operation: &'a str) -> Self {
        match operation.split_once('/') {
            Some((namespace, method)) => Self { namespace, method },
            None => Self {
                namespace: operation,
                method: "",
            },
        }
    }

    /// Turn an HTTP request path into an operation name (`/chat/send` → `chat/send`).
    pub fn operation_from_path(path: &str) -> &str {
        path.trim_matches('/')
    }
}
