//! # Somnolence Server
//!
//! Route registry, schema reflection, request dispatch and the HTTP server
//! for Somnolence.
//!
//! - [`RegistryBuilder`] binds paths to typed [`Route`]s and freezes into a
//!   [`Registry`]
//! - [`schema`] reflects every route's input and output shapes, served at
//!   [`SCHEMA_PATH`]
//! - [`Dispatcher`] runs match, decode, authorize, invoke and encode for each
//!   request
//! - [`Server`] serves the dispatcher over HTTP/1.1 with graceful shutdown
//!
//! ## Example
//!
//! ```rust,ignore
//! use somnolence_core::Describe;
//! use somnolence_server::{Registry, Route};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize, Describe)]
//! struct HelloInput { name: String }
//!
//! #[derive(Serialize, Describe)]
//! struct HelloOutput { message: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut routes = Registry::builder();
//!     routes.register("/hello", Route::new(|input: HelloInput| async move {
//!         Ok(HelloOutput { message: format!("Hello, {}!", input.name) })
//!     }))?;
//!
//!     somnolence_server::start(8080, routes.build()).await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/somnolence-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod dispatcher;
mod registry;
mod route;
pub mod schema;
mod server;
mod shutdown;

pub use config::{
    ServerConfig, ServerConfigBuilder, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
pub use dispatcher::{DispatchResponse, Dispatcher, HttpResponse, Outcome, ResponseBody};
pub use registry::{normalize_path, Registry, RegistryBuilder, SCHEMA_PATH};
pub use route::{BoxedInvocation, Endpoint, InvokeError, Rejection, Route, RouteDescriptor};
pub use schema::{RouteSchema, SchemaDocument, SchemaError};
pub use server::{start, BoundServer, Server, ServerError};
pub use shutdown::{ConnectionTracker, ConnectionToken, ShutdownSignal};
