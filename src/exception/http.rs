use crate::common::ErrorBody;
use crate::config::{ConfigStore, ErrorResources};
use crate::exception::{Outcome, RedirectPolicy};
use crate::request::HttpOutputChannel;
use crate::resource::{ResourceDescriptor, ResourceRef};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use std::fmt;
use std::sync::Arc;

/// Produces the response for a [`Outcome::RenderResource`].
///
/// Page construction and markup belong to the application; implement this
/// to plug them in.
#[async_trait]
pub trait ResourceRenderer: Send + Sync + 'static {
    async fn render(&self, resource: &ResourceDescriptor, redirect: RedirectPolicy) -> Response;
}

/// A minimal plain-text renderer.
///
/// Configured references are rendered in place with the status of the
/// failure they stand for, or answered with a `303 See Other` when
/// redirecting is allowed. Diagnostic reports are rendered as text with a
/// 500 status.
#[derive(Clone, Default)]
pub struct DefaultRenderer {
    config: Option<Arc<dyn ConfigStore>>,
}

impl DefaultRenderer {
    /// Resolve error resources against `config` at render time, so a
    /// reconfigured page keeps its status.
    pub fn from_store(config: Arc<dyn ConfigStore>) -> Self {
        Self {
            config: Some(config),
        }
    }

    fn resources(&self) -> ErrorResources {
        let Some(config) = &self.config else {
            return ErrorResources::default();
        };
        match config.snapshot() {
            Ok(snapshot) => snapshot.resources.clone(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Configuration unavailable, using default error resources"
                );
                ErrorResources::default()
            }
        }
    }

    /// Status sent along with an error resource rendered in place.
    pub fn status_for(&self, reference: &ResourceRef) -> StatusCode {
        let resources = self.resources();
        if *reference == resources.access_denied {
            StatusCode::FORBIDDEN
        } else if *reference == resources.expired {
            StatusCode::GONE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl fmt::Debug for DefaultRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultRenderer")
            .field("configured", &self.config.is_some())
            .finish()
    }
}

#[async_trait]
impl ResourceRenderer for DefaultRenderer {
    async fn render(&self, resource: &ResourceDescriptor, redirect: RedirectPolicy) -> Response {
        match resource {
            ResourceDescriptor::Reference(reference) => match redirect {
                RedirectPolicy::AutoRedirect => Redirect::to(reference.as_str()).into_response(),
                RedirectPolicy::NeverRedirect => {
                    (self.status_for(reference), reference.to_string()).into_response()
                }
            },
            ResourceDescriptor::Instance(instance) => instance.name().to_string().into_response(),
            ResourceDescriptor::Diagnostic(report) => {
                (StatusCode::INTERNAL_SERVER_ERROR, report.render_text()).into_response()
            }
        }
    }
}

/// Turns outcomes into axum responses.
pub struct OutcomeResponder<R = DefaultRenderer> {
    renderer: Arc<R>,
}

impl Default for OutcomeResponder<DefaultRenderer> {
    fn default() -> Self {
        Self::new(DefaultRenderer::default())
    }
}

impl<R> Clone for OutcomeResponder<R> {
    fn clone(&self) -> Self {
        Self {
            renderer: Arc::clone(&self.renderer),
        }
    }
}

impl<R: ResourceRenderer> OutcomeResponder<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer: Arc::new(renderer),
        }
    }

    /// Build the response for `outcome`, copying any headers collected on
    /// `channel` (the no-cache headers in particular) onto it.
    pub async fn respond(&self, outcome: Outcome, channel: Option<&HttpOutputChannel>) -> Response {
        let mut response = match outcome {
            Outcome::RenderResource { resource, redirect } => {
                self.renderer.render(&resource, redirect).await
            }
            Outcome::StatusOnly(code) => ErrorBody::new(code).into_response(),
            // Nobody is listening; send nothing.
            Outcome::NoOp => Response::new(Body::empty()),
        };

        if let Some(channel) = channel {
            channel.apply_to(&mut response);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::Failure;
    use crate::request::OutputChannel;
    use crate::config::{ConfigService, INTERNAL_ERROR_RESOURCE};
    use crate::resource::DiagnosticReport;
    use axum::http::header;

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_status_only_renders_json_body() {
        let response = OutcomeResponder::default()
            .respond(Outcome::status(StatusCode::NOT_FOUND), None)
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["statusCode"], 404);
        assert_eq!(body["message"], "Not Found");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_noop_writes_nothing() {
        let response = OutcomeResponder::default().respond(Outcome::NoOp, None).await;
        assert!(body_string(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_reference_rendering_follows_redirect_policy() {
        let responder = OutcomeResponder::default();
        let expired = ResourceRef::new("/error/expired");

        let inline = responder
            .respond(
                Outcome::render(expired.clone(), RedirectPolicy::NeverRedirect),
                None,
            )
            .await;
        assert_eq!(inline.status(), StatusCode::GONE);
        assert_eq!(body_string(inline).await, "/error/expired");

        let redirected = responder
            .respond(Outcome::render(expired, RedirectPolicy::AutoRedirect), None)
            .await;
        assert_eq!(redirected.status(), StatusCode::SEE_OTHER);
        assert_eq!(redirected.headers()[header::LOCATION], "/error/expired");
    }

    #[tokio::test]
    async fn test_diagnostic_report_rendered_as_500() {
        let report = DiagnosticReport::new(Failure::unclassified("disk on fire"), None);
        let outcome = Outcome::render(
            ResourceDescriptor::Diagnostic(Arc::new(report)),
            RedirectPolicy::NeverRedirect,
        );

        let response = OutcomeResponder::default().respond(outcome, None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response).await.contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_channel_headers_are_applied() {
        let channel = HttpOutputChannel::new();
        channel.disable_caching();

        let response = OutcomeResponder::default()
            .respond(Outcome::internal_error(), Some(&channel))
            .await;
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache, no-store");
    }

    #[tokio::test]
    async fn test_error_resources_carry_failure_status() {
        let responder = OutcomeResponder::default();
        let cases = [
            ("/error/access-denied", StatusCode::FORBIDDEN),
            ("/error/expired", StatusCode::GONE),
            ("/error/internal", StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (path, status) in cases {
            let outcome = Outcome::render(ResourceRef::new(path), RedirectPolicy::NeverRedirect);
            let response = responder.respond(outcome, None).await;
            assert_eq!(response.status(), status, "{path}");
        }
    }

    #[tokio::test]
    async fn test_reconfigured_internal_error_page_is_500() {
        let config = ConfigService::from_pairs([(INTERNAL_ERROR_RESOURCE, "/oops")]).unwrap();
        let responder = OutcomeResponder::new(DefaultRenderer::from_store(Arc::new(config)));

        let outcome = Outcome::render(ResourceRef::new("/oops"), RedirectPolicy::NeverRedirect);
        let response = responder.respond(outcome, None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_stale_state_rerender_is_ok() {
        #[derive(Debug)]
        struct Cart;

        impl crate::resource::Resource for Cart {
            fn name(&self) -> &str {
                "cart"
            }
        }

        let outcome = Outcome::render(
            ResourceDescriptor::Instance(Arc::new(Cart)),
            RedirectPolicy::NeverRedirect,
        );
        let response = OutcomeResponder::default().respond(outcome, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
