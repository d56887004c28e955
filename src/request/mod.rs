//! Request context
//!
//! The dispatcher never looks up "the current request" on its own. The
//! pipeline hands it a [`RequestContext`] describing the request in flight:
//! its interaction mode, the handler that was running, the handler scheduled
//! next, and the output channel.

mod channel;

pub use channel::{HttpOutputChannel, OutputChannel};

use crate::error::Result;
use crate::resource::ResourceHandle;
use axum::http::{HeaderMap, Method, Uri, request::Parts};
use std::sync::Arc;

/// Header sent by XMLHttpRequest-style clients.
pub const REQUESTED_WITH: &str = "x-requested-with";
/// Header sent by htmx partial updates.
pub const HX_REQUEST: &str = "hx-request";

/// A request as seen by the dispatcher.
pub trait Request: Send + Sync {
    /// Whether this is an asynchronous / partial-update exchange.
    ///
    /// `None` when the request type carries no such information.
    fn is_async(&self) -> Option<bool> {
        None
    }
}

/// A unit of work scheduled by the pipeline.
pub trait RequestHandler: Send + Sync {
    fn name(&self) -> &str;

    /// The resource this handler renders, if it renders one.
    fn resource(&self) -> Result<Option<ResourceHandle>> {
        Ok(None)
    }
}

/// Narrow view of the request being processed.
pub trait RequestContext {
    fn current_request(&self) -> Option<&dyn Request>;

    fn active_handler(&self) -> Option<&dyn RequestHandler>;

    fn scheduled_handler(&self) -> Option<&dyn RequestHandler>;

    fn output_channel(&self) -> Option<&dyn OutputChannel>;
}

/// An HTTP request snapshot.
#[derive(Debug, Clone)]
pub struct WebRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl WebRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(parts.method.clone(), parts.uri.clone(), parts.headers.clone())
    }

    pub fn of<B>(request: &axum::http::Request<B>) -> Self {
        Self::new(
            request.method().clone(),
            request.uri().clone(),
            request.headers().clone(),
        )
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// True for XMLHttpRequest and htmx requests.
    pub fn is_partial_update(&self) -> bool {
        let header_is = |name: &str, expected: &str| {
            self.headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(expected))
        };
        header_is(REQUESTED_WITH, "XMLHttpRequest") || header_is(HX_REQUEST, "true")
    }
}

impl Request for WebRequest {
    fn is_async(&self) -> Option<bool> {
        Some(self.is_partial_update())
    }
}

/// A handler that renders a known resource instance.
#[derive(Debug, Clone)]
pub struct ResourceHandler {
    name: String,
    resource: ResourceHandle,
}

impl ResourceHandler {
    pub fn new(resource: ResourceHandle) -> Self {
        Self {
            name: format!("render {}", resource.name()),
            resource,
        }
    }
}

impl RequestHandler for ResourceHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource(&self) -> Result<Option<ResourceHandle>> {
        Ok(Some(Arc::clone(&self.resource)))
    }
}

/// The concrete request context handed to the dispatcher.
///
/// # Example
///
/// ```rust,ignore
/// let cycle = RequestCycle::new()
///     .with_request(WebRequest::of(&request))
///     .with_active_handler(Arc::new(ResourceHandler::new(page)))
///     .with_output(channel.clone());
/// ```
#[derive(Default)]
pub struct RequestCycle {
    request: Option<Box<dyn Request>>,
    active_handler: Option<Arc<dyn RequestHandler>>,
    scheduled_handler: Option<Arc<dyn RequestHandler>>,
    output: Option<Arc<dyn OutputChannel>>,
}

impl RequestCycle {
    /// A context with no request in flight.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(mut self, request: impl Request + 'static) -> Self {
        self.request = Some(Box::new(request));
        self
    }

    pub fn with_active_handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.active_handler = Some(handler);
        self
    }

    pub fn with_scheduled_handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.scheduled_handler = Some(handler);
        self
    }

    pub fn with_output(mut self, output: Arc<dyn OutputChannel>) -> Self {
        self.output = Some(output);
        self
    }
}

impl RequestContext for RequestCycle {
    fn current_request(&self) -> Option<&dyn Request> {
        self.request.as_deref()
    }

    fn active_handler(&self) -> Option<&dyn RequestHandler> {
        self.active_handler.as_deref()
    }

    fn scheduled_handler(&self) -> Option<&dyn RequestHandler> {
        self.scheduled_handler.as_deref()
    }

    fn output_channel(&self) -> Option<&dyn OutputChannel> {
        self.output.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn request_with(name: &'static str, value: &'static str) -> WebRequest {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        WebRequest::new(Method::POST, Uri::from_static("/cart"), headers)
    }

    #[test]
    fn test_partial_update_detection() {
        assert!(request_with(REQUESTED_WITH, "XMLHttpRequest").is_partial_update());
        assert!(request_with(HX_REQUEST, "true").is_partial_update());
        assert!(!request_with(HX_REQUEST, "false").is_partial_update());

        let plain = WebRequest::new(Method::GET, Uri::from_static("/"), HeaderMap::new());
        assert_eq!(plain.is_async(), Some(false));
    }

    #[test]
    fn test_from_axum_request() {
        let request = axum::http::Request::builder()
            .uri("/orders/7")
            .header(REQUESTED_WITH, "xmlhttprequest")
            .body(())
            .unwrap();

        let web = WebRequest::of(&request);
        assert_eq!(web.uri().path(), "/orders/7");
        assert_eq!(web.is_async(), Some(true));

        let (parts, _) = request.into_parts();
        assert!(WebRequest::from_parts(&parts).is_partial_update());
    }

    #[test]
    fn test_empty_cycle_exposes_nothing() {
        let cycle = RequestCycle::new();
        assert!(cycle.current_request().is_none());
        assert!(cycle.active_handler().is_none());
        assert!(cycle.scheduled_handler().is_none());
        assert!(cycle.output_channel().is_none());
    }
}
