use crate::config::ConfigStore;
use crate::exception::{ExceptionDispatcher, ExceptionMapper};
use crate::exception::http::{DefaultRenderer, OutcomeResponder, ResourceRenderer};
use crate::failure::{BoxError, Failure};
use crate::request::{HttpOutputChannel, RequestCycle, WebRequest};
use axum::{body::Body, http::Request, response::Response};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that answers failed requests through an [`ExceptionMapper`].
///
/// Errors returned by the wrapped service are classified with
/// [`Failure::from_error`], mapped, and turned into a response, so the
/// resulting service never fails.
pub struct ExceptionLayer<M, R = DefaultRenderer> {
    mapper: Arc<M>,
    responder: OutcomeResponder<R>,
}

impl<M: ExceptionMapper> ExceptionLayer<M> {
    pub fn new(mapper: M) -> Self {
        Self {
            mapper: Arc::new(mapper),
            responder: OutcomeResponder::default(),
        }
    }
}

impl ExceptionLayer<ExceptionDispatcher> {
    /// Dispatch and render against the same configuration store.
    pub fn from_config(config: Arc<dyn ConfigStore>) -> Self {
        Self {
            mapper: Arc::new(ExceptionDispatcher::new(Arc::clone(&config))),
            responder: OutcomeResponder::new(DefaultRenderer::from_store(config)),
        }
    }
}

impl<M: ExceptionMapper, R: ResourceRenderer> ExceptionLayer<M, R> {
    pub fn with_renderer<R2: ResourceRenderer>(self, renderer: R2) -> ExceptionLayer<M, R2> {
        ExceptionLayer {
            mapper: self.mapper,
            responder: OutcomeResponder::new(renderer),
        }
    }
}

impl<M, R> Clone for ExceptionLayer<M, R> {
    fn clone(&self) -> Self {
        Self {
            mapper: Arc::clone(&self.mapper),
            responder: self.responder.clone(),
        }
    }
}

impl<S, M, R> Layer<S> for ExceptionLayer<M, R> {
    type Service = ExceptionMiddleware<S, M, R>;

    fn layer(&self, inner: S) -> Self::Service {
        ExceptionMiddleware {
            inner,
            mapper: Arc::clone(&self.mapper),
            responder: self.responder.clone(),
            not_ready: None,
        }
    }
}

pub struct ExceptionMiddleware<S, M, R = DefaultRenderer> {
    inner: S,
    mapper: Arc<M>,
    responder: OutcomeResponder<R>,
    // A readiness error of `inner`, answered on the next call.
    not_ready: Option<BoxError>,
}

impl<S: Clone, M, R> Clone for ExceptionMiddleware<S, M, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            mapper: Arc::clone(&self.mapper),
            responder: self.responder.clone(),
            not_ready: None,
        }
    }
}

impl<S, M, R> Service<Request<Body>> for ExceptionMiddleware<S, M, R>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError> + Send,
    M: ExceptionMapper,
    R: ResourceRenderer,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.not_ready.is_some() {
            return Poll::Ready(Ok(()));
        }
        match self.inner.poll_ready(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
            Poll::Ready(Err(e)) => {
                self.not_ready = Some(e.into());
                Poll::Ready(Ok(()))
            }
        }
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let web_request = WebRequest::of(&request);
        let mapper = Arc::clone(&self.mapper);
        let responder = self.responder.clone();
        let not_ready = self.not_ready.take();

        // Keep the instance that was polled ready; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let result = match not_ready {
                Some(error) => Err(error),
                None => inner.call(request).await.map_err(Into::into),
            };

            let error = match result {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            let failure = Failure::from_error(error);
            let channel = Arc::new(HttpOutputChannel::new());
            let outcome = {
                let cycle = RequestCycle::new()
                    .with_request(web_request)
                    .with_output(channel.clone());
                mapper.map(&failure, &cycle)
            };

            tracing::debug!(
                failure_id = %failure.id(),
                category = %failure.category(),
                outcome = ?outcome,
                "Failure mapped"
            );
            Ok(responder.respond(outcome, Some(channel.as_ref())).await)
        })
    }
}
