//! Route registry.
//!
//! Routes are collected in a [`RegistryBuilder`] and frozen into an immutable
//! [`Registry`]. Every check (path collisions, the reserved schema path,
//! malformed descriptors) runs at registration, so a built registry only
//! contains routes the dispatcher can serve.

use std::borrow::Cow;

use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Serialize};

use somnolence_core::{Describe, RegistrationError};

use crate::route::{Route, RouteDescriptor};

/// Path at which the schema document is served. Cannot be registered.
pub const SCHEMA_PATH: &str = "/__schema";

/// Normalizes a route path.
///
/// A leading `/` is added when missing and trailing slashes are removed; the
/// root stays `/`.
///
/// ```
/// use somnolence_server::normalize_path;
///
/// assert_eq!(normalize_path("hello"), "/hello");
/// assert_eq!(normalize_path("/hello/"), "/hello");
/// assert_eq!(normalize_path(""), "/");
/// ```
#[must_use]
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Cow::Borrowed("/");
    }
    if trimmed.starts_with('/') {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(format!("/{trimmed}"))
    }
}

fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = normalize_path(prefix);
    let path = normalize_path(path);
    match (prefix.as_ref(), path.as_ref()) {
        ("/", p) => p.to_string(),
        (pre, "/") => pre.to_string(),
        (pre, p) => format!("{pre}{p}"),
    }
}

/// Collects routes before the server starts.
///
/// # Example
///
/// ```rust,ignore
/// use somnolence_server::{RegistryBuilder, Route};
///
/// let mut builder = RegistryBuilder::new();
/// builder.register("/hello", Route::new(hello))?;
/// let registry = builder.build();
/// ```
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    routes: IndexMap<String, RouteDescriptor>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed route at `path`.
    ///
    /// The input and output descriptors come from `I` and `O`.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::ReservedPath`] for the schema path.
    /// - [`RegistrationError::DuplicatePath`] if the normalized path is taken.
    /// - [`RegistrationError::InvalidDescriptor`] if a descriptor repeats a
    ///   field name, or the input cannot be decoded from query parameters.
    pub fn register<I, O>(&mut self, path: &str, route: Route<I, O>) -> Result<(), RegistrationError>
    where
        I: Describe + DeserializeOwned + Send + 'static,
        O: Describe + Serialize + Send + 'static,
    {
        let path = normalize_path(path).into_owned();
        self.check_path(&path)?;

        let descriptor = RouteDescriptor::new(path.clone(), route);
        let invalid = |position, source| RegistrationError::InvalidDescriptor {
            path: path.clone(),
            position,
            source,
        };
        descriptor
            .input()
            .validate()
            .and_then(|()| descriptor.input().validate_query_input())
            .map_err(|e| invalid("input", e))?;
        descriptor
            .output()
            .validate()
            .map_err(|e| invalid("output", e))?;

        tracing::debug!(path = %path, input = %descriptor.input(), output = %descriptor.output(), "Route registered");
        self.routes.insert(path, descriptor);
        Ok(())
    }

    /// Moves every route of `nested` under `prefix`.
    ///
    /// Nothing is merged if any joined path is reserved or already taken.
    ///
    /// # Errors
    ///
    /// Same path errors as [`register`](Self::register).
    pub fn nest(&mut self, prefix: &str, nested: RegistryBuilder) -> Result<(), RegistrationError> {
        let joined: Vec<(String, RouteDescriptor)> = nested
            .routes
            .into_iter()
            .map(|(path, descriptor)| (join_paths(prefix, &path), descriptor))
            .collect();

        for (index, (path, _)) in joined.iter().enumerate() {
            self.check_path(path)?;
            if joined[..index].iter().any(|(other, _)| other == path) {
                return Err(RegistrationError::DuplicatePath { path: path.clone() });
            }
        }

        for (path, descriptor) in joined {
            self.routes.insert(path.clone(), descriptor.with_path(path));
        }
        Ok(())
    }

    fn check_path(&self, path: &str) -> Result<(), RegistrationError> {
        if path == SCHEMA_PATH {
            return Err(RegistrationError::ReservedPath {
                path: path.to_string(),
            });
        }
        if self.routes.contains_key(path) {
            return Err(RegistrationError::DuplicatePath {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freezes the builder.
    #[must_use]
    pub fn build(self) -> Registry {
        Registry {
            routes: self.routes,
        }
    }
}

/// Immutable mapping from path to route.
#[derive(Debug, Default)]
pub struct Registry {
    routes: IndexMap<String, RouteDescriptor>,
}

impl Registry {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Looks up the route for `path` (normalized first).
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&RouteDescriptor> {
        self.routes.get(normalize_path(path).as_ref())
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if the registry has no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns the registered paths in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Returns the routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &RouteDescriptor> {
        self.routes.values()
    }
}
