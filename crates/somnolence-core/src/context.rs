//! Request context types.
//!
//! The [`RequestContext`] carries the transport-level facts about a request
//! (id, method, path, headers, peer address) into authorizers and lifecycle
//! hooks. Handlers only see their typed input.

use std::net::SocketAddr;
use std::time::Instant;

use http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for request tracking
/// and log correlation.
///
/// # Example
///
/// ```
/// use somnolence_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Per-request context handed to authorizers and hooks.
///
/// # Example
///
/// ```
/// use http::{HeaderValue, Method};
/// use somnolence_core::RequestContext;
///
/// let ctx = RequestContext::new(Method::GET, "/hello")
///     .with_header("authorization", HeaderValue::from_static("Bearer 1234"));
///
/// assert_eq!(ctx.path(), "/hello");
/// assert_eq!(ctx.bearer_token(), Some("1234"));
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request.
    request_id: RequestId,

    /// HTTP method (informational; routing ignores it).
    method: Method,

    /// Normalized request path.
    path: String,

    /// Request headers.
    headers: HeaderMap,

    /// Peer address, when known.
    remote_addr: Option<SocketAddr>,

    /// When the request started processing.
    started_at: Instant,
}

impl RequestContext {
    /// Creates a context for the given method and path with a fresh request ID.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            remote_addr: None,
            started_at: Instant::now(),
        }
    }

    /// Creates a context from the parts of an `http` request.
    #[must_use]
    pub fn from_parts(method: Method, path: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            headers,
            ..Self::new(method, path)
        }
    }

    /// Returns a new context with the specified request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Returns a new context with an additional header.
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns a new context with the peer address set.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the normalized path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string, if present and valid ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns the token of an `Authorization: Bearer <token>` header.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.header(http::header::AUTHORIZATION.as_str())?
            .strip_prefix("Bearer ")
            .map(str::trim)
    }

    /// Returns the peer address, if known.
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_request_id_new_generates_unique_ids() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2, "Each RequestId should be unique");
    }

    #[test]
    fn test_request_id_display() {
        let display = RequestId::new().to_string();
        assert_eq!(display.len(), 36, "UUID string should be 36 characters");
    }

    #[test]
    fn test_request_id_serialization() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).expect("serialization should work");
        let parsed: RequestId = serde_json::from_str(&json).expect("deserialization should work");
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_context_accessors() {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let ctx = RequestContext::new(Method::GET, "/hello").with_remote_addr(addr);

        assert_eq!(*ctx.method(), Method::GET);
        assert_eq!(ctx.path(), "/hello");
        assert_eq!(ctx.remote_addr(), Some(addr));
        assert!(ctx.headers().is_empty());
    }

    #[test]
    fn test_bearer_token() {
        let ctx = RequestContext::new(Method::GET, "/secure")
            .with_header("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(ctx.bearer_token(), Some("abc"));

        let ctx = RequestContext::new(Method::GET, "/secure")
            .with_header("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(ctx.bearer_token(), None);
    }

    #[test]
    fn test_from_parts_keeps_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant", HeaderValue::from_static("acme"));
        let ctx = RequestContext::from_parts(Method::POST, "/t", headers);
        assert_eq!(ctx.header("x-tenant"), Some("acme"));
    }

    #[test]
    fn test_request_context_elapsed() {
        let ctx = RequestContext::new(Method::GET, "/");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(ctx.elapsed() >= std::time::Duration::from_millis(10));
    }
}
