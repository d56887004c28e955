//! Failure taxonomy
//!
//! A [`Failure`] is the error that interrupted a request. Its [`FailureKind`]
//! is an explicit tag, so the dispatcher matches on it exhaustively instead of
//! probing error types at runtime.

use crate::guard::GuardError;
use crate::resource::ResourceHandle;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::io;
use std::sync::Arc;
use strum_macros::{Display, IntoStaticStr};
use uuid::Uuid;

/// A type-erased error, as produced by services in the request pipeline.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// The closed set of failure categories the dispatcher understands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    StaleState,
    ResourceExpired,
    AccessDenied,
    ClientDisconnected,
    ResourceBlocked,
    Unclassified,
}

/// Why access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenial {
    /// An authorization check rejected the request.
    Unauthorized,
    /// A listener was invoked directly although it does not allow it.
    InvocationNotAllowed,
}

/// Category tag plus whatever data the category carries.
#[derive(Debug, Clone)]
pub enum FailureKind {
    /// The client's view of the resource is out of date. Carries the
    /// resource instance to re-render.
    StaleState(ResourceHandle),
    /// The targeted resource or its session state is gone.
    ResourceExpired,
    AccessDenied(AccessDenial),
    /// Writing the response failed because the peer went away.
    ClientDisconnected,
    /// A protected resource was requested.
    ResourceBlocked,
    Unclassified,
}

impl FailureKind {
    pub fn category(&self) -> FailureCategory {
        match self {
            FailureKind::StaleState(_) => FailureCategory::StaleState,
            FailureKind::ResourceExpired => FailureCategory::ResourceExpired,
            FailureKind::AccessDenied(_) => FailureCategory::AccessDenied,
            FailureKind::ClientDisconnected => FailureCategory::ClientDisconnected,
            FailureKind::ResourceBlocked => FailureCategory::ResourceBlocked,
            FailureKind::Unclassified => FailureCategory::Unclassified,
        }
    }
}

/// The error being dispatched.
///
/// Cloning is cheap and keeps the identity: clones share the same [`id`](Failure::id)
/// and compare equal.
#[derive(Debug, Clone)]
pub struct Failure {
    id: Uuid,
    kind: FailureKind,
    message: Option<String>,
    source: Option<Arc<dyn Error + Send + Sync>>,
}

impl Failure {
    pub fn new(kind: FailureKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: None,
            source: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn stale_state(resource: ResourceHandle) -> Self {
        Self::new(FailureKind::StaleState(resource))
    }

    pub fn resource_expired() -> Self {
        Self::new(FailureKind::ResourceExpired)
    }

    pub fn access_denied(denial: AccessDenial) -> Self {
        Self::new(FailureKind::AccessDenied(denial))
    }

    pub fn client_disconnected() -> Self {
        Self::new(FailureKind::ClientDisconnected)
    }

    pub fn resource_blocked(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ResourceBlocked).with_message(message)
    }

    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unclassified).with_message(message)
    }

    /// Classify an arbitrary pipeline error.
    ///
    /// A boxed `Failure` is returned unchanged. Guard rejections become
    /// access-denied failures and I/O errors caused by the peer closing the
    /// connection become client disconnects. Everything else is unclassified
    /// and keeps the original error as its source.
    pub fn from_error(error: BoxError) -> Self {
        let error = match error.downcast::<Failure>() {
            Ok(failure) => return *failure,
            Err(other) => other,
        };
        let error = match error.downcast::<GuardError>() {
            Ok(guard) => return Failure::from(*guard),
            Err(other) => other,
        };
        match error.downcast::<io::Error>() {
            Ok(io_error) => Failure::from(*io_error),
            Err(other) => Self {
                message: Some(other.to_string()),
                source: Some(Arc::from(other)),
                ..Self::new(FailureKind::Unclassified)
            },
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &FailureKind {
        &self.kind
    }

    pub fn category(&self) -> FailureCategory {
        self.kind.category()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Single-line description including the full source chain.
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        let mut cause = self.source();
        while let Some(err) = cause {
            out.push_str(": caused by: ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.category(), message),
            None => write!(f, "{}", self.category()),
        }
    }
}

impl Error for Failure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn Error + 'static))
    }
}

impl PartialEq for Failure {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Failure {}

impl From<GuardError> for Failure {
    fn from(error: GuardError) -> Self {
        let denial = match error {
            GuardError::InvocationNotAllowed(_) => AccessDenial::InvocationNotAllowed,
            GuardError::Forbidden(_) | GuardError::Unauthorized(_) => AccessDenial::Unauthorized,
        };
        Failure::access_denied(denial)
            .with_message(error.message().to_string())
            .with_source(error)
    }
}

impl From<io::Error> for Failure {
    fn from(error: io::Error) -> Self {
        let kind = match error.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => FailureKind::ClientDisconnected,
            _ => FailureKind::Unclassified,
        };
        Failure::new(kind)
            .with_message(error.to_string())
            .with_source(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("template missing")]
    struct TemplateError;

    #[test]
    fn test_boxed_failure_passes_through() {
        let failure = Failure::resource_expired();
        let id = failure.id();

        let mapped = Failure::from_error(Box::new(failure));
        assert_eq!(mapped.id(), id);
        assert_eq!(mapped.category(), FailureCategory::ResourceExpired);
    }

    #[test]
    fn test_guard_errors_become_access_denied() {
        let mapped = Failure::from_error(Box::new(GuardError::Forbidden("admin only".into())));
        assert!(matches!(
            mapped.kind(),
            FailureKind::AccessDenied(AccessDenial::Unauthorized)
        ));
        assert_eq!(mapped.message(), Some("admin only"));

        let mapped = Failure::from(GuardError::InvocationNotAllowed("onSubmit".into()));
        assert!(matches!(
            mapped.kind(),
            FailureKind::AccessDenied(AccessDenial::InvocationNotAllowed)
        ));
    }

    #[test]
    fn test_peer_io_errors_become_client_disconnect() {
        for kind in [
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
        ] {
            let mapped = Failure::from_error(Box::new(io::Error::new(kind, "peer gone")));
            assert_eq!(mapped.category(), FailureCategory::ClientDisconnected);
        }

        let mapped = Failure::from_error(Box::new(io::Error::other("disk full")));
        assert_eq!(mapped.category(), FailureCategory::Unclassified);
    }

    #[test]
    fn test_unknown_errors_keep_their_source() {
        let mapped = Failure::from_error(Box::new(TemplateError));
        assert_eq!(mapped.category(), FailureCategory::Unclassified);
        assert_eq!(mapped.message(), Some("template missing"));
        assert!(mapped.source().is_some());
        assert_eq!(
            mapped.report(),
            "unclassified: template missing: caused by: template missing"
        );
    }

    #[test]
    fn test_clones_share_identity() {
        let failure = Failure::unclassified("boom");
        let clone = failure.clone();
        assert_eq!(failure, clone);
        assert_ne!(failure, Failure::unclassified("boom"));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(FailureCategory::StaleState.to_string(), "stale_state");
        assert_eq!(
            Failure::resource_blocked("/secret.properties").to_string(),
            "resource_blocked: /secret.properties"
        );
    }
}
