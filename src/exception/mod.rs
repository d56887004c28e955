//! Exception mapping
//!
//! Turns a [`Failure`] raised mid-request into the [`Outcome`] the pipeline
//! acts on next. [`ExceptionDispatcher`] is the default mapper; the HTTP
//! responder and the tower layer adapt its outcomes to axum responses.

mod dispatcher;
pub mod http;
mod layer;
mod outcome;

pub use dispatcher::{DispatchObserver, DispatchStage, ExceptionDispatcher};
pub use layer::{ExceptionLayer, ExceptionMiddleware};
pub use outcome::{Outcome, RedirectPolicy};

use crate::failure::Failure;
use crate::request::RequestContext;

/// Maps a failure to the next outcome.
///
/// Implementations must always produce an outcome; a mapper is the last
/// error boundary of the rendering pipeline.
pub trait ExceptionMapper: Send + Sync + 'static {
    fn map(&self, failure: &Failure, context: &dyn RequestContext) -> Outcome;
}
