use crate::resource::ResourceDescriptor;
use axum::http::StatusCode;
use strum_macros::Display;

/// Whether rendering a resource may change the browser's URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RedirectPolicy {
    /// Render in place so the address bar keeps the failing URL.
    NeverRedirect,
    /// Let the renderer redirect when it sees fit.
    AutoRedirect,
}

/// What the pipeline should do after a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    RenderResource {
        resource: ResourceDescriptor,
        redirect: RedirectPolicy,
    },
    StatusOnly(StatusCode),
    /// Write nothing.
    NoOp,
}

impl Outcome {
    pub fn render(resource: impl Into<ResourceDescriptor>, redirect: RedirectPolicy) -> Self {
        Outcome::RenderResource {
            resource: resource.into(),
            redirect,
        }
    }

    pub fn status(code: StatusCode) -> Self {
        Outcome::StatusOnly(code)
    }

    pub fn internal_error() -> Self {
        Outcome::StatusOnly(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Outcome::StatusOnly(code) => Some(*code),
            _ => None,
        }
    }

    pub fn resource(&self) -> Option<&ResourceDescriptor> {
        match self {
            Outcome::RenderResource { resource, .. } => Some(resource),
            _ => None,
        }
    }

    pub fn redirect_policy(&self) -> Option<RedirectPolicy> {
        match self {
            Outcome::RenderResource { redirect, .. } => Some(*redirect),
            _ => None,
        }
    }
}
