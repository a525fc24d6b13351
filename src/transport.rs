//! Transport abstraction.
//!
//! The [`RestClient`] trait decouples resource-kit from any particular HTTP
//! library. Implement it over reqwest, hyper, or anything else that can issue
//! get/post/put/delete requests. Timeouts, retries and connection handling
//! belong to the implementation; failures should surface as
//! `Error::Transport`.
//!
//! [`StubTransport`] answers from canned responses and records every request,
//! which makes it suitable for testing code built on the manager.

use crate::error::{Error, Result};
use crate::response::RawResponse;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// The four verbs a transport must support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "delete" => Ok(HttpMethod::Delete),
            _ => Err(Error::UnknownRestMethod(s.to_string())),
        }
    }
}

/// Query parameters and body of a request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestOptions {
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn with_query(query: BTreeMap<String, String>) -> Self {
        RequestOptions { query, body: None }
    }

    pub fn with_body(body: Value) -> Self {
        RequestOptions {
            query: BTreeMap::new(),
            body: Some(body),
        }
    }
}

/// Trait for transport implementations.
///
/// All methods take `&self`; implementations share connection state through
/// interior mutability or a cloneable client handle.
#[allow(async_fn_in_trait)]
pub trait RestClient: Send + Sync {
    /// # Errors
    /// Returns `Err` if the request could not be completed.
    async fn get(&self, path: &str, options: &RequestOptions) -> Result<RawResponse>;

    /// # Errors
    /// Returns `Err` if the request could not be completed.
    async fn post(&self, path: &str, options: &RequestOptions) -> Result<RawResponse>;

    /// # Errors
    /// Returns `Err` if the request could not be completed.
    async fn put(&self, path: &str, options: &RequestOptions) -> Result<RawResponse>;

    /// # Errors
    /// Returns `Err` if the request could not be completed.
    async fn delete(&self, path: &str, options: &RequestOptions) -> Result<RawResponse>;

    /// Dispatch by verb.
    ///
    /// # Errors
    /// Returns `Err` if the request could not be completed.
    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        options: &RequestOptions,
    ) -> Result<RawResponse> {
        match method {
            HttpMethod::Get => self.get(path, options).await,
            HttpMethod::Post => self.post(path, options).await,
            HttpMethod::Put => self.put(path, options).await,
            HttpMethod::Delete => self.delete(path, options).await,
        }
    }

    /// Dispatch by verb name.
    ///
    /// # Errors
    /// Returns `Error::UnknownRestMethod` for verbs other than get, post, put
    /// and delete.
    async fn request_verb(
        &self,
        verb: &str,
        path: &str,
        options: &RequestOptions,
    ) -> Result<RawResponse> {
        let method: HttpMethod = verb.parse()?;
        self.request(method, path, options).await
    }
}

// ============================================================================
// Stub transport
// ============================================================================

/// A request seen by [`StubTransport`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub path: String,
    pub options: RequestOptions,
}

/// Transport answering from canned responses.
///
/// Responses are matched on verb and path (query parameters are recorded but
/// not matched). A request with no stub fails with `Error::Transport`, the
/// same way a test harness that disallows real connections would.
///
/// # Example
///
/// ```
/// use resource_kit::transport::{HttpMethod, StubTransport};
/// use serde_json::json;
///
/// let transport = StubTransport::new();
/// transport.stub_json(HttpMethod::Get, "/dummies/1", 200, &json!({"id": 1}));
/// assert_eq!(transport.call_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct StubTransport {
    routes: Arc<DashMap<(HttpMethod, String), RawResponse>>,
    calls: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method path` with `response` until replaced or removed.
    pub fn stub(&self, method: HttpMethod, path: impl Into<String>, response: RawResponse) {
        self.routes.insert((method, path.into()), response);
    }

    /// Answer `method path` with `code` and a JSON body.
    pub fn stub_json(&self, method: HttpMethod, path: impl Into<String>, code: u16, body: &Value) {
        self.stub(method, path, RawResponse::json(code, body));
    }

    /// Remove a stub, so the route refuses connections again.
    pub fn unstub(&self, method: HttpMethod, path: &str) {
        self.routes.remove(&(method, path.to_string()));
    }

    /// Remove every stub.
    pub fn clear(&self) {
        self.routes.clear();
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<RecordedRequest> {
        self.lock_calls().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    /// Requests received for `method path`.
    pub fn calls_to(&self, method: HttpMethod, path: &str) -> usize {
        self.lock_calls()
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }

    pub fn reset_calls(&self) {
        self.lock_calls().clear();
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<RecordedRequest>> {
        // A panic while holding the lock leaves the log itself intact.
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn answer(&self, method: HttpMethod, path: &str, options: &RequestOptions) -> Result<RawResponse> {
        self.lock_calls().push(RecordedRequest {
            method,
            path: path.to_string(),
            options: options.clone(),
        });

        match self.routes.get(&(method, path.to_string())) {
            Some(response) => {
                debug!("✓ Stub {} {} -> {}", method, path, response.code);
                Ok(response.value().clone())
            }
            None => Err(Error::Transport(format!(
                "connection refused: no stub for {} {}",
                method, path
            ))),
        }
    }
}

impl RestClient for StubTransport {
    async fn get(&self, path: &str, options: &RequestOptions) -> Result<RawResponse> {
        self.answer(HttpMethod::Get, path, options)
    }

    async fn post(&self, path: &str, options: &RequestOptions) -> Result<RawResponse> {
        self.answer(HttpMethod::Post, path, options)
    }

    async fn put(&self, path: &str, options: &RequestOptions) -> Result<RawResponse> {
        self.answer(HttpMethod::Put, path, options)
    }

    async fn delete(&self, path: &str, options: &RequestOptions) -> Result<RawResponse> {
        self.answer(HttpMethod::Delete, path, options)
    }
}

// ============================================================================
// HTTP transport
// ============================================================================

/// Transport over `reqwest`, sending paths relative to a host.
#[cfg(feature = "http")]
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    host: String,
}

#[cfg(feature = "http")]
impl HttpTransport {
    /// `host` is prepended to every path, e.g. `https://api.example.com`.
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), host)
    }

    pub fn with_client(client: reqwest::Client, host: impl Into<String>) -> Self {
        HttpTransport {
            client,
            host: host.into().trim_end_matches('/').to_string(),
        }
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        options: &RequestOptions,
    ) -> Result<RawResponse> {
        let url = format!("{}{}", self.host, path);
        let mut request = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");

        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let code = response.status().as_u16();
        let text = response.text().await?;

        Ok(RawResponse {
            code,
            body: if text.is_empty() { None } else { Some(text) },
        })
    }
}

#[cfg(feature = "http")]
impl RestClient for HttpTransport {
    async fn get(&self, path: &str, options: &RequestOptions) -> Result<RawResponse> {
        self.send(reqwest::Method::GET, path, options).await
    }

    async fn post(&self, path: &str, options: &RequestOptions) -> Result<RawResponse> {
        self.send(reqwest::Method::POST, path, options).await
    }

    async fn put(&self, path: &str, options: &RequestOptions) -> Result<RawResponse> {
        self.send(reqwest::Method::PUT, path, options).await
    }

    async fn delete(&self, path: &str, options: &RequestOptions) -> Result<RawResponse> {
        self.send(reqwest::Method::DELETE, path, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_from_str() {
        assert_eq!("get".parse::<HttpMethod>().expect("verb"), HttpMethod::Get);
        assert_eq!("DELETE".parse::<HttpMethod>().expect("verb"), HttpMethod::Delete);
        assert!(matches!(
            "patch".parse::<HttpMethod>(),
            Err(Error::UnknownRestMethod(_))
        ));
    }

    #[tokio::test]
    async fn test_stub_transport_answers_and_records() {
        let transport = StubTransport::new();
        transport.stub_json(HttpMethod::Get, "/dummies/1", 200, &json!({"id": 1}));

        let response = transport
            .get("/dummies/1", &RequestOptions::default())
            .await
            .expect("stubbed");
        assert_eq!(response.code, 200);
        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.calls_to(HttpMethod::Get, "/dummies/1"), 1);
    }

    #[tokio::test]
    async fn test_stub_transport_refuses_unstubbed() {
        let transport = StubTransport::new();
        let result = transport
            .post("/dummies", &RequestOptions::default())
            .await;
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_request_verb_rejects_unknown() {
        let transport = StubTransport::new();
        let result = transport
            .request_verb("patch", "/dummies/1", &RequestOptions::default())
            .await;
        assert!(matches!(result, Err(Error::UnknownRestMethod(_))));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unstub() {
        let transport = StubTransport::new();
        transport.stub(HttpMethod::Delete, "/dummies/1", RawResponse::empty(200));
        transport.unstub(HttpMethod::Delete, "/dummies/1");

        let result = transport
            .delete("/dummies/1", &RequestOptions::default())
            .await;
        assert!(result.is_err());
    }
}
