//! HTTP transport used by the ODP API managers.
//!
//! The transport is injected through the [`RequestHandler`] trait, so hosts can route requests
//! through their own HTTP stack. [`ReqwestRequestHandler`] is the default implementation.
//!
//! Requests are futures: dropping a request future aborts the request.
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Request {
        Request {
            url: url.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Request {
        Request {
            url: url.into(),
            method: HttpMethod::Post,
            headers: HashMap::new(),
            body: Some(body.into()),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Request {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub status_code: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Performs HTTP requests on behalf of the SDK.
///
/// Implementations should enforce their own timeouts; the callers don't.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Send `request` and return the response. Non-success status codes are *not* errors at this
    /// level; `Err` is reserved for transport failures.
    async fn make_request(&self, request: Request) -> Result<Response>;
}

/// [`RequestHandler`] backed by `reqwest`.
pub struct ReqwestRequestHandler {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestRequestHandler {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> ReqwestRequestHandler {
        ReqwestRequestHandler::with_timeout(ReqwestRequestHandler::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> ReqwestRequestHandler {
        ReqwestRequestHandler {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

impl Default for ReqwestRequestHandler {
    fn default() -> ReqwestRequestHandler {
        ReqwestRequestHandler::new()
    }
}

#[async_trait]
impl RequestHandler for ReqwestRequestHandler {
    async fn make_request(&self, request: Request) -> Result<Response> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(self.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;

        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_owned(), value.to_owned()))
            })
            .collect();
        let body = response.text().await?;

        Ok(Response {
            status_code,
            body,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpMethod, Request, Response};

    #[test]
    fn success_status_codes() {
        let response = |status_code| Response {
            status_code,
            ..Default::default()
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(199).is_success());
        assert!(!response(300).is_success());
        assert!(!response(500).is_success());
    }

    #[test]
    fn request_builders() {
        let request = Request::post("https://api.zaius.com/v3/events", "[]")
            .with_header("x-api-key", "key");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body.as_deref(), Some("[]"));
        assert_eq!(request.headers["x-api-key"], "key");

        let request = Request::get("https://jumbe.zaius.com/v2/zaius.gif");
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.body, None);
    }
}
