//! Request dispatch.
//!
//! The [`Dispatcher`] turns an untyped request into a typed handler call and
//! back:
//!
//! 1. **Match** the normalized path (the schema path short-circuits)
//! 2. **Decode** the query string against the route's input descriptor
//! 3. **Authorize** with the route's authorizer, if any
//! 4. **Invoke** the handler
//! 5. **Encode** the output against the route's output descriptor
//!
//! Every request ends in exactly one [`Outcome`]. Failures never escape:
//! they become a status code and a short JSON error body, and internal
//! detail is only logged.

use std::any::Any;
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use futures_util::FutureExt;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use http_body_util::Full;

use somnolence_core::codec::{self, CONTENT_TYPE_JSON};
use somnolence_core::{DecodeError, RequestContext};

use crate::registry::{normalize_path, Registry, SCHEMA_PATH};
use crate::route::{Rejection, RouteDescriptor};
use crate::schema;

/// Type alias for HTTP response body.
pub type ResponseBody = Full<Bytes>;

/// Type alias for the HTTP response.
pub type HttpResponse = Response<ResponseBody>;

/// Metrics label for requests that matched no route.
const UNMATCHED_ROUTE: &str = "unmatched";

/// The terminal state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The handler ran and its output was encoded.
    Success,
    /// No route matches the path.
    NotFound,
    /// The query did not decode into the route input.
    BadRequest,
    /// The authorizer denied the request.
    Unauthorized,
    /// The handler failed, panicked or produced a non-conforming output.
    InternalError,
}

impl Outcome {
    /// Returns the HTTP status for this outcome.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the snake_case name used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::InternalError => "internal_error",
        }
    }

    fn error_code(self) -> &'static str {
        match self {
            Self::Success => "OK",
            Self::NotFound => "NOT_FOUND",
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of dispatching one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    /// How the request ended.
    pub outcome: Outcome,
    /// MIME type of `body`.
    pub content_type: &'static str,
    /// Response body.
    pub body: Bytes,
}

impl DispatchResponse {
    fn error(outcome: Outcome, message: &str) -> Self {
        let body = serde_json::json!({
            "error": {
                "code": outcome.error_code(),
                "message": message
            }
        });
        Self {
            outcome,
            content_type: CONTENT_TYPE_JSON,
            body: Bytes::from(body.to_string()),
        }
    }

    fn not_found(path: &str) -> Self {
        Self::error(Outcome::NotFound, &format!("Route not found: {path}"))
    }

    fn bad_request(err: &DecodeError) -> Self {
        Self::error(Outcome::BadRequest, &err.to_string())
    }

    fn unauthorized() -> Self {
        Self::error(Outcome::Unauthorized, "Not Authorized")
    }

    fn internal_error() -> Self {
        Self::error(Outcome::InternalError, "Internal Server Error")
    }

    /// Returns the HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.outcome.status()
    }

    /// Converts into an HTTP response.
    #[must_use]
    pub fn into_http(self) -> HttpResponse {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.outcome.status();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        response
    }
}

/// Routes requests through the registry.
///
/// Stateless apart from the rendered schema, which is produced on first use
/// and kept for the life of the dispatcher. `dispatch` takes `&self` and is
/// safe to call concurrently.
pub struct Dispatcher {
    registry: Arc<Registry>,
    schema: OnceLock<Bytes>,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            schema: OnceLock::new(),
        }
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the rendered schema document.
    pub fn schema(&self) -> &Bytes {
        self.schema.get_or_init(|| {
            match schema::render(&schema::reflect_all(&self.registry)) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to render schema document");
                    Bytes::from_static(b"{}")
                }
            }
        })
    }

    /// Handles an HTTP request.
    ///
    /// Only the method, path, query string and headers are read; the body is
    /// dropped unread.
    pub async fn handle<B>(
        &self,
        req: Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Result<HttpResponse, Infallible> {
        let (parts, _) = req.into_parts();
        let path = normalize_path(parts.uri.path()).into_owned();
        let mut ctx = RequestContext::from_parts(parts.method, path, parts.headers);
        if let Some(addr) = remote_addr {
            ctx = ctx.with_remote_addr(addr);
        }

        let response = self.dispatch(&ctx, parts.uri.query()).await;
        Ok(response.into_http())
    }

    /// Runs the pipeline for one request.
    pub async fn dispatch(&self, ctx: &RequestContext, query: Option<&str>) -> DispatchResponse {
        let path = normalize_path(ctx.path());

        let (label, response) = if path == SCHEMA_PATH {
            (
                SCHEMA_PATH,
                DispatchResponse {
                    outcome: Outcome::Success,
                    content_type: CONTENT_TYPE_JSON,
                    body: self.schema().clone(),
                },
            )
        } else if let Some(route) = self.registry.resolve(&path) {
            (route.path(), self.run(route, ctx, query).await)
        } else {
            (UNMATCHED_ROUTE, DispatchResponse::not_found(&path))
        };

        let status = response.status().as_u16();
        let latency = ctx.elapsed();
        somnolence_telemetry::record_request(label, status, latency);
        if response.outcome != Outcome::Success {
            somnolence_telemetry::record_outcome(label, response.outcome.as_str());
        }

        tracing::info!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %path,
            status,
            outcome = %response.outcome,
            latency_ms = latency.as_secs_f64() * 1000.0,
            "Request completed"
        );

        response
    }

    async fn run(
        &self,
        route: &RouteDescriptor,
        ctx: &RequestContext,
        query: Option<&str>,
    ) -> DispatchResponse {
        let endpoint = route.endpoint();
        guard_hook("on_start", ctx, || endpoint.on_start(ctx));

        let response = self.invoke(route, ctx, query).await;

        let outcome = response.outcome;
        guard_hook("on_finish", ctx, || endpoint.on_finish(ctx, outcome));
        response
    }

    async fn invoke(
        &self,
        route: &RouteDescriptor,
        ctx: &RequestContext,
        query: Option<&str>,
    ) -> DispatchResponse {
        let input = match codec::decode_query(route.input(), query) {
            Ok(input) => input,
            Err(e) => {
                tracing::debug!(request_id = %ctx.request_id(), error = %e, "Query decode failed");
                return DispatchResponse::bad_request(&e);
            }
        };

        let prepared =
            panic::catch_unwind(AssertUnwindSafe(|| route.endpoint().prepare(ctx, input)));
        let invocation = match prepared {
            Ok(Ok(invocation)) => invocation,
            Ok(Err(Rejection::Decode(e))) => {
                tracing::debug!(request_id = %ctx.request_id(), error = %e, "Input conversion failed");
                return DispatchResponse::bad_request(&e);
            }
            Ok(Err(Rejection::Unauthorized)) => {
                tracing::debug!(request_id = %ctx.request_id(), "Authorizer denied request");
                return DispatchResponse::unauthorized();
            }
            Err(payload) => {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    panic = panic_message(payload.as_ref()),
                    "Authorizer panicked"
                );
                return DispatchResponse::internal_error();
            }
        };

        let value = match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                tracing::error!(request_id = %ctx.request_id(), error = %e, "Handler failed");
                return DispatchResponse::internal_error();
            }
            Err(payload) => {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    panic = panic_message(payload.as_ref()),
                    "Handler panicked"
                );
                return DispatchResponse::internal_error();
            }
        };

        match codec::encode_output(route.output(), &value) {
            Ok(encoded) => DispatchResponse {
                outcome: Outcome::Success,
                content_type: encoded.content_type,
                body: encoded.body,
            },
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id(), error = %e, "Output encoding failed");
                DispatchResponse::internal_error()
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.registry.len())
            .field("schema_cached", &self.schema.get().is_some())
            .finish()
    }
}

fn guard_hook(name: &'static str, ctx: &RequestContext, hook: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(hook)) {
        tracing::warn!(
            request_id = %ctx.request_id(),
            hook = name,
            panic = panic_message(payload.as_ref()),
            "Lifecycle hook panicked"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use crate::route::Route;
    use http::{HeaderValue, Method};
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};
    use somnolence_core::{Describe, Field, HandlerError, TypeDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Deserialize)]
    struct HelloInput {
        name: String,
    }

    impl Describe for HelloInput {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::record(vec![Field::of::<String>("name")])
        }
    }

    #[derive(Serialize)]
    struct HelloOutput {
        message: String,
    }

    impl Describe for HelloOutput {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::record(vec![Field::of::<String>("message")])
        }
    }

    /// Claims to have a `message` field but serializes without one.
    #[derive(Serialize)]
    struct Liar {
        other: u8,
    }

    impl Describe for Liar {
        fn describe() -> TypeDescriptor {
            HelloOutput::describe()
        }
    }

    struct Fixture {
        dispatcher: Dispatcher,
        calls: Arc<AtomicUsize>,
        finished: Arc<Mutex<Vec<Outcome>>>,
    }

    fn fixture() -> Fixture {
        let calls = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(Mutex::new(Vec::new()));
        let mut builder = RegistryBuilder::new();

        let counter = Arc::clone(&calls);
        let log = Arc::clone(&finished);
        builder
            .register(
                "/hello",
                Route::new(move |input: HelloInput| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        Ok(HelloOutput {
                            message: format!("Hello, {}!", input.name),
                        })
                    }
                })
                .on_finish(move |_, outcome| log.lock().unwrap().push(outcome)),
            )
            .unwrap();

        let counter = Arc::clone(&calls);
        builder
            .register(
                "/secure",
                Route::new(move |(): ()| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok("secret".to_string()) }
                })
                .authorizer(|ctx, _| ctx.bearer_token() == Some("1234")),
            )
            .unwrap();

        builder
            .register(
                "/fail",
                Route::new(|(): ()| async {
                    Err::<(), _>(HandlerError::msg("database password is hunter2"))
                }),
            )
            .unwrap();

        builder
            .register(
                "/upstream",
                Route::new(|(): ()| async {
                    Err::<(), _>(anyhow::anyhow!("upstream at 10.0.0.7 timed out"))?;
                    Ok::<(), HandlerError>(())
                }),
            )
            .unwrap();

        builder
            .register(
                "/panic",
                Route::new(|(): ()| async {
                    if true {
                        panic!("handler exploded");
                    }
                    Ok(())
                }),
            )
            .unwrap();

        builder
            .register(
                "/liar",
                Route::new(|(): ()| async { Ok(Liar { other: 1 }) }),
            )
            .unwrap();

        builder
            .register("/count", Route::new(|(): ()| async { Ok(42_i64) }))
            .unwrap();

        Fixture {
            dispatcher: Dispatcher::new(Arc::new(builder.build())),
            calls,
            finished,
        }
    }

    fn ctx(path: &str) -> RequestContext {
        RequestContext::new(Method::GET, path)
    }

    fn body_json(response: &DispatchResponse) -> Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[tokio::test]
    async fn test_hello_success() {
        let f = fixture();
        let response = f.dispatcher.dispatch(&ctx("/hello"), Some("name=World")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.content_type, CONTENT_TYPE_JSON);
        assert_eq!(body_json(&response), json!({"message": "Hello, World!"}));
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*f.finished.lock().unwrap(), vec![Outcome::Success]);
    }

    #[tokio::test]
    async fn test_missing_field_is_bad_request_without_invocation() {
        let f = fixture();
        let response = f.dispatcher.dispatch(&ctx("/hello"), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&response)["error"]["code"], "BAD_REQUEST");
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*f.finished.lock().unwrap(), vec![Outcome::BadRequest]);
    }

    #[tokio::test]
    async fn test_not_found() {
        let f = fixture();
        let response = f.dispatcher.dispatch(&ctx("/nope"), Some("name=x")).await;
        assert_eq!(response.outcome, Outcome::NotFound);
        assert_eq!(
            body_json(&response)["error"]["message"],
            "Route not found: /nope"
        );
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authorizer() {
        let f = fixture();

        let denied = f.dispatcher.dispatch(&ctx("/secure"), None).await;
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(&denied)["error"]["message"], "Not Authorized");
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);

        let allowed_ctx =
            ctx("/secure").with_header("authorization", HeaderValue::from_static("Bearer 1234"));
        let allowed = f.dispatcher.dispatch(&allowed_ctx, None).await;
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(allowed.content_type, codec::CONTENT_TYPE_TEXT);
        assert_eq!(&allowed.body[..], b"secret");
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_error_is_opaque() {
        let f = fixture();
        let response = f.dispatcher.dispatch(&ctx("/fail"), None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = String::from_utf8(response.body.to_vec()).unwrap();
        assert!(!text.contains("hunter2"));
        assert_eq!(body_json(&response)["error"]["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_anyhow_error_is_opaque() {
        let f = fixture();
        let response = f.dispatcher.dispatch(&ctx("/upstream"), None).await;
        assert_eq!(response.outcome, Outcome::InternalError);
        let text = String::from_utf8(response.body.to_vec()).unwrap();
        assert!(!text.contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_handler_panic_is_internal_error() {
        let f = fixture();
        let response = f.dispatcher.dispatch(&ctx("/panic"), None).await;
        assert_eq!(response.outcome, Outcome::InternalError);
        let text = String::from_utf8(response.body.to_vec()).unwrap();
        assert!(!text.contains("exploded"));
    }

    #[tokio::test]
    async fn test_non_conforming_output_is_internal_error() {
        let f = fixture();
        let response = f.dispatcher.dispatch(&ctx("/liar"), None).await;
        assert_eq!(response.outcome, Outcome::InternalError);
    }

    #[tokio::test]
    async fn test_primitive_output_is_json_text() {
        let f = fixture();
        let response = f.dispatcher.dispatch(&ctx("/count/"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.content_type, CONTENT_TYPE_JSON);
        assert_eq!(&response.body[..], b"42");
    }

    #[tokio::test]
    async fn test_schema_is_served_and_cached() {
        let f = fixture();
        let first = f.dispatcher.dispatch(&ctx("/__schema"), None).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.content_type, CONTENT_TYPE_JSON);

        let document = schema::parse(&first.body).unwrap();
        assert_eq!(document.len(), 7);
        let hello = document.get("/hello").unwrap();
        let name = hello.input.field("name").unwrap();
        assert!(name.is_required());
        assert_eq!(name.descriptor(), &String::describe());
        assert!(hello.output.field("message").unwrap().is_required());

        let second = f.dispatcher.dispatch(&ctx("/__schema/"), None).await;
        assert_eq!(first.body.as_ptr(), second.body.as_ptr());
    }

    #[tokio::test]
    async fn test_handle_http_request() {
        let f = fixture();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/hello/?name=Ada&name=Bob")
            .body(())
            .unwrap();
        let response = f
            .dispatcher
            .handle(request, Some("127.0.0.1:5000".parse().unwrap()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({"message": "Hello, Ada!"})
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatch() {
        let f = fixture();
        let dispatcher = Arc::new(f.dispatcher);

        let tasks = (0..50_usize).map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let (path, query) = match i % 4 {
                    0 => ("/hello", Some(format!("name=user{i}"))),
                    1 => ("/secure", None),
                    2 => ("/count", None),
                    _ => ("/missing", None),
                };
                let response = dispatcher.dispatch(&ctx(path), query.as_deref()).await;
                (i, response)
            })
        });

        let mut hellos = 0;
        for joined in futures_util::future::join_all(tasks).await {
            let (i, response) = joined.unwrap();
            match i % 4 {
                0 => {
                    hellos += 1;
                    assert_eq!(response.status(), StatusCode::OK);
                    assert_eq!(
                        body_json(&response),
                        json!({"message": format!("Hello, user{i}!")})
                    );
                }
                1 => assert_eq!(response.status(), StatusCode::UNAUTHORIZED),
                2 => assert_eq!(&response.body[..], b"42"),
                _ => assert_eq!(response.status(), StatusCode::NOT_FOUND),
            }
        }

        assert_eq!(f.calls.load(Ordering::SeqCst), hellos);
        assert_eq!(f.finished.lock().unwrap().len(), hellos);
    }

    #[test]
    fn test_outcome_status() {
        assert_eq!(Outcome::Success.status(), StatusCode::OK);
        assert_eq!(Outcome::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(Outcome::BadRequest.status(), StatusCode::BAD_REQUEST);
        assert_eq!(Outcome::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Outcome::InternalError.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(Outcome::BadRequest.to_string(), "bad_request");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
