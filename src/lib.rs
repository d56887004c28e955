//! # Catchpoint
//!
//! Decides what a web application renders when a request fails mid-render.
//!
//! Given a [`Failure`] and the request it interrupted, the
//! [`ExceptionDispatcher`](exception::ExceptionDispatcher) picks the next
//! [`Outcome`](exception::Outcome): re-render the original resource, render a
//! configured error resource, answer with a bare status code, or do nothing
//! at all when the client is already gone.
//!
//! ## Features
//!
//! - **Closed failure taxonomy**: stale state, expired resources, access denied,
//!   client disconnects, blocked resources, and everything else
//! - **Display policy**: diagnostic page, generic error page or bare status for
//!   unexpected failures, with a separate strategy for partial-update requests
//! - **Never fails**: errors raised while deciding collapse into a bare 500
//! - **No caching of error responses**: the output channel is told before
//!   anything else happens
//! - **Tower integration**: [`ExceptionLayer`](exception::ExceptionLayer) maps
//!   service errors straight to axum responses
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use catchpoint::prelude::*;
//!
//! fn handle(request: &axum::http::Request<axum::body::Body>, failure: Failure) -> Outcome {
//!     let config = ConfigService::from_env().expect("invalid configuration");
//!     let dispatcher = ExceptionDispatcher::new(Arc::new(config));
//!
//!     let cycle = RequestCycle::new().with_request(WebRequest::of(request));
//!     dispatcher.dispatch(&failure, &cycle)
//! }
//! ```

pub mod common;
pub mod config;
pub mod error;
pub mod exception;
pub mod failure;
pub mod guard;
pub mod request;
pub mod resource;

// Re-export core types
pub use error::{DispatchError, Result};
pub use exception::{ExceptionDispatcher, ExceptionLayer, ExceptionMapper, Outcome, RedirectPolicy};
pub use failure::{Failure, FailureCategory, FailureKind};

/// Prelude module for convenient imports
///
/// ```
/// use catchpoint::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{
        AsyncFailureStrategy, ConfigService, ConfigSnapshot, ConfigStore, DisplayPolicy,
        ErrorResources, RuntimeMode, StaticConfig, UnexpectedErrorDisplay,
    };
    pub use crate::error::{DispatchError, Result};
    pub use crate::exception::http::{DefaultRenderer, OutcomeResponder, ResourceRenderer};
    pub use crate::exception::{
        DispatchObserver, DispatchStage, ExceptionDispatcher, ExceptionLayer, ExceptionMapper,
        Outcome, RedirectPolicy,
    };
    pub use crate::failure::{AccessDenial, BoxError, Failure, FailureCategory, FailureKind};
    pub use crate::guard::GuardError;
    pub use crate::request::{
        HttpOutputChannel, OutputChannel, Request, RequestContext, RequestCycle, RequestHandler,
        ResourceHandler, WebRequest,
    };
    pub use crate::resource::{
        DiagnosticReport, Resource, ResourceDescriptor, ResourceHandle, ResourceRef,
    };
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
