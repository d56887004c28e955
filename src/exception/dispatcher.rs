use super::{ExceptionMapper, Outcome, RedirectPolicy};
use crate::config::{AsyncFailureStrategy, ConfigSnapshot, ConfigStore, UnexpectedErrorDisplay};
use crate::error::{DispatchError, Result};
use crate::failure::{Failure, FailureKind};
use crate::request::RequestContext;
use crate::resource::{DiagnosticReport, ResourceDescriptor, ResourceHandle};
use axum::http::StatusCode;
use std::sync::Arc;
use strum_macros::Display;
use tracing::Level;

/// Pipeline stages reported to a [`DispatchObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DispatchStage {
    Entry,
    AsyncShortCircuit,
    KnownClassifier,
    UnexpectedClassifier,
    Fallback,
}

/// Instrumentation hook, called as a dispatch moves through its stages.
pub trait DispatchObserver: Send + Sync {
    fn stage_entered(&self, failure: &Failure, stage: DispatchStage);
}

/// Decides which outcome follows a failure raised while rendering.
///
/// Dispatch is a pure decision over the failure, the request context and a
/// configuration snapshot: it never blocks and never fails. Errors raised by
/// collaborators while deciding collapse into a bare 500.
///
/// # Example
///
/// ```rust,ignore
/// use catchpoint::prelude::*;
///
/// let dispatcher = ExceptionDispatcher::new(Arc::new(ConfigService::from_env()?));
/// let cycle = RequestCycle::new().with_request(WebRequest::of(&request));
///
/// match dispatcher.dispatch(&Failure::resource_expired(), &cycle) {
///     Outcome::RenderResource { resource, redirect } => { /* render it */ }
///     Outcome::StatusOnly(code) => { /* send the bare status */ }
///     Outcome::NoOp => {}
/// }
/// ```
#[derive(Clone)]
pub struct ExceptionDispatcher {
    config: Arc<dyn ConfigStore>,
    observer: Option<Arc<dyn DispatchObserver>>,
}

impl ExceptionDispatcher {
    pub fn new(config: Arc<dyn ConfigStore>) -> Self {
        Self {
            config,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Map `failure` to the next outcome.
    ///
    /// Caching is disabled on the context's output channel first; error
    /// responses must never be cached.
    pub fn dispatch(&self, failure: &Failure, context: &dyn RequestContext) -> Outcome {
        self.notify(failure, DispatchStage::Entry);

        if let Some(output) = context.output_channel() {
            output.disable_caching();
        }

        match self.map_failure(failure, context) {
            Ok(outcome) => outcome,
            Err(nested) => self.handle_nested_failure(failure, &nested),
        }
    }

    fn map_failure(&self, failure: &Failure, context: &dyn RequestContext) -> Result<Outcome> {
        let config = self.config.snapshot()?;
        // Read once; every later decision in this dispatch sees the same mode.
        let is_async = self.is_async_request(context);

        if is_async && config.policy.async_failure_strategy == AsyncFailureStrategy::StatusOnly {
            self.notify(failure, DispatchStage::AsyncShortCircuit);
            return Ok(Outcome::internal_error());
        }

        if let Some(outcome) = self.classify_known(failure, &config, context, is_async) {
            return Ok(outcome);
        }

        self.classify_unexpected(failure, &config, context, is_async)
    }

    /// Whether the request in flight is an asynchronous / partial update.
    pub fn is_async_request(&self, context: &dyn RequestContext) -> bool {
        context
            .current_request()
            .and_then(|request| request.is_async())
            .unwrap_or(false)
    }

    /// Outcome for the expected failure categories, or `None` if the failure
    /// is not one of them.
    pub fn classify_known(
        &self,
        failure: &Failure,
        config: &ConfigSnapshot,
        context: &dyn RequestContext,
        is_async: bool,
    ) -> Option<Outcome> {
        self.notify(failure, DispatchStage::KnownClassifier);

        match failure.kind() {
            // The URL was already fixed by an earlier redirect, so re-rendering
            // the same instance is enough.
            FailureKind::StaleState(resource) => Some(Outcome::render(
                Arc::clone(resource),
                redirect_policy(is_async),
            )),
            FailureKind::ResourceExpired => Some(self.build_render_outcome(
                config.resources.expired.clone().into(),
                context,
                is_async,
            )),
            FailureKind::AccessDenied(_) => Some(self.build_render_outcome(
                config.resources.access_denied.clone().into(),
                context,
                is_async,
            )),
            FailureKind::ClientDisconnected => {
                tracing::debug!(
                    failure_id = %failure.id(),
                    detail = %failure.report(),
                    "Connection lost, giving up on the response"
                );
                Some(Outcome::NoOp)
            }
            FailureKind::ResourceBlocked if config.mode.is_hardened() => {
                tracing::debug!(
                    failure_id = %failure.id(),
                    detail = %failure.report(),
                    "Blocked resource requested"
                );
                Some(Outcome::status(StatusCode::NOT_FOUND))
            }
            FailureKind::ResourceBlocked | FailureKind::Unclassified => None,
        }
    }

    /// Outcome for anything the known classifier did not claim.
    pub fn classify_unexpected(
        &self,
        failure: &Failure,
        config: &ConfigSnapshot,
        context: &dyn RequestContext,
        is_async: bool,
    ) -> Result<Outcome> {
        self.notify(failure, DispatchStage::UnexpectedClassifier);

        tracing::error!(
            failure_id = %failure.id(),
            category = %failure.category(),
            detail = %failure.report(),
            "Unexpected error occurred"
        );

        let outcome = match config.policy.unexpected_error_display {
            UnexpectedErrorDisplay::DiagnosticPage => {
                let resource = self.extract_active_resource(context)?;
                let report = DiagnosticReport::new(failure.clone(), resource);
                let resource = ResourceDescriptor::Diagnostic(Arc::new(report));
                self.build_render_outcome(resource, context, is_async)
            }
            UnexpectedErrorDisplay::GenericErrorPage => self.build_render_outcome(
                config.resources.internal_error.clone().into(),
                context,
                is_async,
            ),
            UnexpectedErrorDisplay::StatusOnly => Outcome::internal_error(),
        };
        Ok(outcome)
    }

    /// Render `resource`, keeping the failing URL for synchronous requests.
    ///
    /// # Panics
    ///
    /// Panics if `context` has no request in flight. Rendering outside a
    /// request is a contract violation of the caller, not a failure to map.
    pub fn build_render_outcome(
        &self,
        resource: ResourceDescriptor,
        context: &dyn RequestContext,
        is_async: bool,
    ) -> Outcome {
        if context.current_request().is_none() {
            panic!("there is no request in flight for this dispatch");
        }
        Outcome::render(resource, redirect_policy(is_async))
    }

    /// The resource being rendered when the failure happened.
    ///
    /// Looks at the active handler, or at the scheduled one when nothing is
    /// active.
    pub fn extract_active_resource(
        &self,
        context: &dyn RequestContext,
    ) -> Result<Option<ResourceHandle>> {
        match context
            .active_handler()
            .or_else(|| context.scheduled_handler())
        {
            Some(handler) => handler.resource(),
            None => Ok(None),
        }
    }

    fn handle_nested_failure(&self, original: &Failure, nested: &DispatchError) -> Outcome {
        self.notify(original, DispatchStage::Fallback);

        if tracing::enabled!(Level::DEBUG) {
            tracing::error!(error = %nested, "An error occurred while handling a previous error");
        }
        tracing::error!(
            failure_id = %original.id(),
            detail = %original.report(),
            "Unexpected error when handling another error"
        );
        Outcome::internal_error()
    }

    fn notify(&self, failure: &Failure, stage: DispatchStage) {
        if let Some(observer) = &self.observer {
            observer.stage_entered(failure, stage);
        }
    }
}

fn redirect_policy(is_async: bool) -> RedirectPolicy {
    if is_async {
        RedirectPolicy::AutoRedirect
    } else {
        RedirectPolicy::NeverRedirect
    }
}

impl ExceptionMapper for ExceptionDispatcher {
    fn map(&self, failure: &Failure, context: &dyn RequestContext) -> Outcome {
        self.dispatch(failure, context)
    }
}
