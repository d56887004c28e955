//! Resource descriptors
//!
//! The dispatcher never looks inside a resource. It only needs to say *which*
//! resource should be rendered next: a live instance (re-rendering a stale
//! page), a configured reference (the expired / access-denied / internal-error
//! pages), or a diagnostic report built from the failure itself.

use crate::failure::Failure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

/// A renderable resource owned by the application's page model.
pub trait Resource: fmt::Debug + Send + Sync {
    /// Human-readable name, used in logs and diagnostic output.
    fn name(&self) -> &str;
}

/// Shared handle to a live resource instance.
///
/// Two handles are considered the same resource only if they point at the
/// same allocation.
pub type ResourceHandle = Arc<dyn Resource>;

/// A configured, application-level resource such as `/error/expired`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRef(String);

impl ResourceRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceRef {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// What the pipeline should render next.
#[derive(Debug, Clone)]
pub enum ResourceDescriptor {
    /// An existing resource instance, rendered as-is.
    Instance(ResourceHandle),
    /// A configured resource, instantiated by the pipeline.
    Reference(ResourceRef),
    /// A diagnostic page describing an unexpected failure.
    Diagnostic(Arc<DiagnosticReport>),
}

impl ResourceDescriptor {
    pub fn instance(&self) -> Option<&ResourceHandle> {
        match self {
            ResourceDescriptor::Instance(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn reference(&self) -> Option<&ResourceRef> {
        match self {
            ResourceDescriptor::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn diagnostic(&self) -> Option<&DiagnosticReport> {
        match self {
            ResourceDescriptor::Diagnostic(report) => Some(report),
            _ => None,
        }
    }
}

impl PartialEq for ResourceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ResourceDescriptor::Instance(a), ResourceDescriptor::Instance(b)) => Arc::ptr_eq(a, b),
            (ResourceDescriptor::Reference(a), ResourceDescriptor::Reference(b)) => a == b,
            (ResourceDescriptor::Diagnostic(a), ResourceDescriptor::Diagnostic(b)) => a == b,
            _ => false,
        }
    }
}

impl From<ResourceRef> for ResourceDescriptor {
    fn from(reference: ResourceRef) -> Self {
        ResourceDescriptor::Reference(reference)
    }
}

impl From<ResourceHandle> for ResourceDescriptor {
    fn from(handle: ResourceHandle) -> Self {
        ResourceDescriptor::Instance(handle)
    }
}

/// Details shown on the diagnostic page for an unexpected failure.
///
/// Equality ignores `captured_at`: two reports for the same failure and the
/// same active resource describe the same page.
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    failure: Failure,
    resource: Option<ResourceHandle>,
    captured_at: DateTime<Utc>,
}

impl DiagnosticReport {
    pub fn new(failure: Failure, resource: Option<ResourceHandle>) -> Self {
        Self {
            failure,
            resource,
            captured_at: Utc::now(),
        }
    }

    pub fn failure(&self) -> &Failure {
        &self.failure
    }

    /// The resource that was being rendered when the failure occurred, if known.
    pub fn resource(&self) -> Option<&ResourceHandle> {
        self.resource.as_ref()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Plain-text rendering of the report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Unexpected error {}", self.failure.id());
        let _ = writeln!(out, "Category: {}", self.failure.category());
        let _ = writeln!(out, "Detail: {}", self.failure.report());
        if let Some(resource) = &self.resource {
            let _ = writeln!(out, "Resource: {}", resource.name());
        }
        let _ = writeln!(out, "Captured at: {}", self.captured_at.to_rfc3339());
        out
    }
}

impl PartialEq for DiagnosticReport {
    fn eq(&self, other: &Self) -> bool {
        let same_resource = match (&self.resource, &other.resource) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.failure == other.failure && same_resource
    }
}
