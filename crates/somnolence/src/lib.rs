//! # Somnolence
//!
//! **A minimal typed-route HTTP server.**
//!
//! Each route binds a path to an async handler from a typed input to a typed
//! output. Inputs are decoded from query parameters against a structural
//! description of the input type, outputs are checked against the output
//! type's description, and every route's shapes are published as a JSON
//! schema at `/__schema`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use somnolence::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize, Describe)]
//! #[describe(crate = "somnolence::core")]
//! struct HelloInput {
//!     name: String,
//! }
//!
//! #[derive(Serialize, Describe)]
//! #[describe(crate = "somnolence::core")]
//! struct HelloOutput {
//!     message: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut routes = Registry::builder();
//!     routes.register("/hello", Route::new(|input: HelloInput| async move {
//!         Ok(HelloOutput { message: format!("Hello, {}!", input.name) })
//!     }))?;
//!
//!     somnolence::start(8080, routes.build()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request Pipeline
//!
//! ```text
//! Request → Match → Decode → Authorize → Invoke → Encode → Response
//!             ↓        ↓          ↓          ↓        ↓
//!            404      400        401        500      500
//! ```

#![doc(html_root_url = "https://docs.rs/somnolence/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use somnolence_core as core;

// Re-export server types
pub use somnolence_server as server;

// Re-export telemetry types
pub use somnolence_telemetry as telemetry;

// Re-export configuration types
pub use somnolence_config as config;

pub use somnolence_server::start;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use somnolence::prelude::*;
///
/// let registry = Registry::builder().build();
/// assert!(registry.is_empty());
/// ```
pub mod prelude {
    pub use somnolence_core::{Describe, HandlerError, RequestContext};
    pub use somnolence_server::{
        Outcome, Registry, RegistryBuilder, Route, Server, ServerConfig, ShutdownSignal,
    };

    pub use somnolence_config::{ConfigLoader, SomnolenceConfig};
    pub use somnolence_telemetry::{init_telemetry, TelemetryConfig};
}
