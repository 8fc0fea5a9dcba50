//! Typed routes and their type-erased form.
//!
//! A [`Route<I, O>`] bundles an async handler from `I` to `O` with an
//! optional authorizer and lifecycle hooks. The registry erases the types
//! behind the object-safe [`Endpoint`] trait and stores the result in a
//! [`RouteDescriptor`] together with the input and output descriptors taken
//! from `I` and `O`. Deserialization into `I` happens inside the route, so the
//! dispatcher never casts.
//!
//! # Example
//!
//! ```rust,ignore
//! use somnolence_server::Route;
//!
//! let route = Route::new(|input: HelloInput| async move {
//!     Ok(HelloOutput { message: format!("Hello, {}!", input.name) })
//! })
//! .authorizer(|ctx, _input| ctx.bearer_token() == Some("1234"));
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

use somnolence_core::{
    DecodeError, Describe, EncodeError, HandlerError, RequestContext, TypeDescriptor,
};

use crate::dispatcher::Outcome;

/// A prepared handler call, yielding the serialized output.
pub type BoxedInvocation = Pin<Box<dyn Future<Output = Result<Value, InvokeError>> + Send>>;

type HandlerFuture<O> = Pin<Box<dyn Future<Output = Result<O, HandlerError>> + Send>>;
type HandlerFn<I, O> = Arc<dyn Fn(I) -> HandlerFuture<O> + Send + Sync>;
type AuthorizerFn<I> = Box<dyn Fn(&RequestContext, &I) -> bool + Send + Sync>;
type StartHook = Box<dyn Fn(&RequestContext) + Send + Sync>;
type FinishHook = Box<dyn Fn(&RequestContext, Outcome) + Send + Sync>;

/// Why a request was turned away before its handler ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The decoded query did not fit the input type.
    Decode(DecodeError),
    /// The authorizer returned `false`.
    Unauthorized,
}

/// A handler invocation failed.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The handler returned an error.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The handler output could not be serialized.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Object-safe view of a typed route.
pub trait Endpoint: Send + Sync {
    /// Returns `true` if the route carries an authorizer.
    fn has_authorizer(&self) -> bool;

    /// Converts the decoded input into the route's input type, runs the
    /// authorizer and returns the pending handler call.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] if the input does not deserialize or the
    /// authorizer denies the request.
    fn prepare(&self, ctx: &RequestContext, input: Value) -> Result<BoxedInvocation, Rejection>;

    /// Called once the route has been matched.
    fn on_start(&self, _ctx: &RequestContext) {}

    /// Called once the request reached its outcome.
    fn on_finish(&self, _ctx: &RequestContext, _outcome: Outcome) {}
}

/// A typed route: handler, optional authorizer and hooks.
pub struct Route<I, O> {
    handler: HandlerFn<I, O>,
    authorizer: Option<AuthorizerFn<I>>,
    on_start: Option<StartHook>,
    on_finish: Option<FinishHook>,
}

impl<I, O> Route<I, O>
where
    I: Describe + DeserializeOwned + Send + 'static,
    O: Describe + Serialize + Send + 'static,
{
    /// Creates a route from an async handler.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, HandlerError>> + Send + 'static,
    {
        let handler: HandlerFn<I, O> =
            Arc::new(move |input: I| Box::pin(handler(input)) as HandlerFuture<O>);
        Self {
            handler,
            authorizer: None,
            on_start: None,
            on_finish: None,
        }
    }

    /// Sets the authorizer. Returning `false` answers 401 without invoking
    /// the handler.
    #[must_use]
    pub fn authorizer<A>(mut self, authorizer: A) -> Self
    where
        A: Fn(&RequestContext, &I) -> bool + Send + Sync + 'static,
    {
        self.authorizer = Some(Box::new(authorizer));
        self
    }

    /// Sets a hook run after the route is matched, before decoding.
    #[must_use]
    pub fn on_start<H>(mut self, hook: H) -> Self
    where
        H: Fn(&RequestContext) + Send + Sync + 'static,
    {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Sets a hook run when the request reaches its outcome.
    #[must_use]
    pub fn on_finish<H>(mut self, hook: H) -> Self
    where
        H: Fn(&RequestContext, Outcome) + Send + Sync + 'static,
    {
        self.on_finish = Some(Box::new(hook));
        self
    }
}

impl<I, O> Endpoint for Route<I, O>
where
    I: Describe + DeserializeOwned + Send + 'static,
    O: Describe + Serialize + Send + 'static,
{
    fn has_authorizer(&self) -> bool {
        self.authorizer.is_some()
    }

    fn prepare(&self, ctx: &RequestContext, input: Value) -> Result<BoxedInvocation, Rejection> {
        let input: I = serde_json::from_value(input).map_err(|e| {
            Rejection::Decode(DecodeError::Invalid {
                reason: e.to_string(),
            })
        })?;

        if let Some(authorize) = &self.authorizer {
            if !authorize(ctx, &input) {
                return Err(Rejection::Unauthorized);
            }
        }

        let handler = Arc::clone(&self.handler);
        Ok(Box::pin(async move {
            let output = (*handler)(input).await?;
            let value = serde_json::to_value(output).map_err(EncodeError::from)?;
            Ok(value)
        }))
    }

    fn on_start(&self, ctx: &RequestContext) {
        if let Some(hook) = &self.on_start {
            hook(ctx);
        }
    }

    fn on_finish(&self, ctx: &RequestContext, outcome: Outcome) {
        if let Some(hook) = &self.on_finish {
            hook(ctx, outcome);
        }
    }
}

impl<I, O> fmt::Debug for Route<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("input", &std::any::type_name::<I>())
            .field("output", &std::any::type_name::<O>())
            .field("authorizer", &self.authorizer.is_some())
            .finish_non_exhaustive()
    }
}

/// A registered route: its path, input and output descriptors, and the
/// type-erased endpoint.
///
/// Owned by the [`Registry`](crate::Registry) and immutable once built.
pub struct RouteDescriptor {
    path: String,
    input: TypeDescriptor,
    output: TypeDescriptor,
    endpoint: Box<dyn Endpoint>,
}

impl RouteDescriptor {
    pub(crate) fn new<I, O>(path: String, route: Route<I, O>) -> Self
    where
        I: Describe + DeserializeOwned + Send + 'static,
        O: Describe + Serialize + Send + 'static,
    {
        Self {
            path,
            input: I::describe(),
            output: O::describe(),
            endpoint: Box::new(route),
        }
    }

    pub(crate) fn with_path(mut self, path: String) -> Self {
        self.path = path;
        self
    }

    /// Returns the normalized path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the input descriptor.
    #[must_use]
    pub const fn input(&self) -> &TypeDescriptor {
        &self.input
    }

    /// Returns the output descriptor.
    #[must_use]
    pub const fn output(&self) -> &TypeDescriptor {
        &self.output
    }

    /// Returns `true` if the route carries an authorizer.
    #[must_use]
    pub fn has_authorizer(&self) -> bool {
        self.endpoint.has_authorizer()
    }

    /// Returns the type-erased endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &dyn Endpoint {
        self.endpoint.as_ref()
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("path", &self.path)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("authorizer", &self.has_authorizer())
            .finish()
    }
}
