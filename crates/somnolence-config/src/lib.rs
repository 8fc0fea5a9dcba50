//! Layered configuration for Somnolence servers.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict parsing (unknown keys are errors)
//! - Layering: defaults → files → environment
//!
//! # Example
//!
//! ```no_run
//! use somnolence_config::ConfigLoader;
//!
//! # fn main() -> Result<(), somnolence_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("somnolence.toml")?
//!     .with_env_prefix("SOMNOLENCE")
//!     .load()?;
//!
//! let server = config.server_config();
//! println!("Server will listen on: {}", server.http_addr());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! shutdown_timeout_secs = 30
//! keep_alive = true
//!
//! [telemetry]
//! service_name = "greeter"
//! environment = "production"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Every key can be overridden with `PREFIX__SECTION__KEY`:
//!
//! - `SOMNOLENCE__SERVER__PORT=9000`
//! - `SOMNOLENCE__TELEMETRY__LOGGING__LEVEL=debug`
//! - `SOMNOLENCE__TELEMETRY__METRICS__ENABLED=true`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod sections;

pub use config::SomnolenceConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use sections::{LogFormat, LoggingSection, MetricsSection, ServerSection, TelemetrySection};
