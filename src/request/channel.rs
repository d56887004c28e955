use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::Response;
use std::sync::{Mutex, PoisonError};

/// The response channel of the request being handled.
pub trait OutputChannel: Send + Sync {
    /// Forbid browsers and intermediaries from caching this response.
    ///
    /// Channels without cache control leave this as a no-op.
    fn disable_caching(&self) {}
}

/// Output channel for HTTP responses built with axum.
///
/// Headers are collected while the request is handled and copied onto the
/// final response with [`apply_to`](HttpOutputChannel::apply_to).
#[derive(Debug, Default)]
pub struct HttpOutputChannel {
    headers: Mutex<HeaderMap>,
}

impl HttpOutputChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(&self) -> HeaderMap {
        self.headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn apply_to(&self, response: &mut Response) {
        let headers = self.headers.lock().unwrap_or_else(PoisonError::into_inner);
        for (name, value) in headers.iter() {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
}

impl OutputChannel for HttpOutputChannel {
    fn disable_caching(&self) {
        let mut headers = self.headers.lock().unwrap_or_else(PoisonError::into_inner);
        let now = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        if let Ok(date) = HeaderValue::from_str(&now) {
            headers.insert(header::DATE, date);
        }
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store"),
        );
    }
}
