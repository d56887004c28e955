/// Authorization failures raised by route guards.
///
/// The checks themselves live with the application; the dispatcher only
/// consumes this type and treats every variant as access denied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A listener or handler was invoked directly although it only accepts
    /// invocations routed through its owning resource.
    #[error("Invocation not allowed: {0}")]
    InvocationNotAllowed(String),
}

impl GuardError {
    pub fn message(&self) -> &str {
        match self {
            GuardError::Forbidden(msg)
            | GuardError::Unauthorized(msg)
            | GuardError::InvocationNotAllowed(msg) => msg,
        }
    }
}
