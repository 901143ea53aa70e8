use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::n8n::errors::N8nError;
use crate::observability::ApiMetrics;

/// Header n8n uses to bind a session to a browser.
pub const BROWSER_ID_HEADER: &str = "browser-id";
/// Browser id sent when none is configured.
pub const DEFAULT_BROWSER_ID: &str = "test-browser-id";

/// JSON transport for the n8n REST API.
///
/// Every request carries the fixed client headers; authenticated calls also
/// pass the session cookie. Each request is attempted exactly once.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    metrics: Arc<ApiMetrics>,
}

impl HttpClient {
    /// Create a client sending `browser_id` on every request
    pub fn new(browser_id: &str, timeout: Option<Duration>) -> Result<Self, N8nError> {
        let mut headers = HeaderMap::new();
        let browser_id = HeaderValue::from_str(browser_id)
            .map_err(|_| N8nError::Config(format!("invalid browser id: {browser_id:?}")))?;
        headers.insert(HeaderName::from_static(BROWSER_ID_HEADER), browser_id);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            inner: builder.build()?,
            metrics: Arc::new(ApiMetrics::new()),
        })
    }

    pub async fn get(&self, url: &str, cookie: Option<&str>) -> Result<Response, N8nError> {
        let request = with_cookie(self.inner.get(url), cookie)?;
        self.send(request, "GET", url).await
    }

    pub async fn post_json<T>(
        &self,
        url: &str,
        body: &T,
        cookie: Option<&str>,
    ) -> Result<Response, N8nError>
    where
        T: Serialize + ?Sized,
    {
        let request = with_cookie(self.inner.post(url).json(body), cookie)?;
        self.send(request, "POST", url).await
    }

    async fn send(&self, request: RequestBuilder, method: &str, url: &str) -> Result<Response, N8nError> {
        self.metrics.record_request();
        debug!(method, url, "Sending n8n API request");

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                debug!(method, url, status = status.as_u16(), "Received n8n API response");
                if !status.is_success() {
                    self.metrics.record_error();
                }
                Ok(response)
            }
            Err(err) => {
                self.metrics.record_error();
                Err(N8nError::Transport(err))
            }
        }
    }

    pub fn metrics(&self) -> &ApiMetrics {
        &self.metrics
    }
}

fn with_cookie(request: RequestBuilder, cookie: Option<&str>) -> Result<RequestBuilder, N8nError> {
    match cookie {
        Some(cookie) => {
            let value = HeaderValue::from_str(cookie)
                .map_err(|_| N8nError::auth("session token is not a valid header value"))?;
            Ok(request.header(COOKIE, value))
        }
        None => Ok(request),
    }
}
