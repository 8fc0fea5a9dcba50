//! The root configuration type.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use somnolence_server::ServerConfig;
use somnolence_telemetry::{LogConfig, MetricsConfig, TelemetryConfig};

use crate::sections::{LogFormat, LoggingSection, ServerSection, TelemetrySection};
use crate::ConfigError;

/// Complete Somnolence configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to layer files and environment
/// variables on top of the defaults.
///
/// # Example
///
/// ```
/// use somnolence_config::SomnolenceConfig;
///
/// let config = SomnolenceConfig::default();
/// assert_eq!(config.server.port, 8080);
/// assert_eq!(config.server_config().http_addr(), "0.0.0.0:8080");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct SomnolenceConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Logging and metrics settings.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl SomnolenceConfig {
    /// Development preset: pretty debug logs with file and line.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging = LoggingSection {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            span_events: true,
            file_line_info: true,
            ..LoggingSection::default()
        };
        config
    }

    /// Production preset: JSON logs at `info`.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.environment = "production".to_string();
        config
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if:
    /// - `server.host` is empty
    /// - `server.shutdown_timeout_secs` is zero
    /// - `telemetry.service_name` or `telemetry.logging.level` is empty
    /// - metrics are enabled and `telemetry.metrics.addr` is not a socket address
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::invalid_value("server.host", "must not be empty"));
        }

        if self.server.shutdown_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "server.shutdown_timeout_secs",
                "must be at least 1",
            ));
        }

        if self.telemetry.service_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "telemetry.service_name",
                "must not be empty",
            ));
        }

        if self.telemetry.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "telemetry.logging.level",
                "must not be empty",
            ));
        }

        if self.telemetry.metrics.enabled
            && self.telemetry.metrics.addr.parse::<SocketAddr>().is_err()
        {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.addr",
                format!("invalid socket address: {}", self.telemetry.metrics.addr),
            ));
        }

        Ok(())
    }

    /// Builds the server configuration.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::builder()
            .host(self.server.host.clone())
            .port(self.server.port)
            .shutdown_timeout(Duration::from_secs(self.server.shutdown_timeout_secs))
            .keep_alive(self.server.keep_alive)
            .build()
    }

    /// Builds the telemetry configuration.
    #[must_use]
    pub fn telemetry_config(&self) -> TelemetryConfig {
        let section = &self.telemetry;
        let logging = &section.logging;

        TelemetryConfig::builder()
            .service_name(&section.service_name)
            .environment(&section.environment)
            .metrics(MetricsConfig {
                enabled: section.metrics.enabled,
                addr: section.metrics.addr.clone(),
                ..MetricsConfig::default()
            })
            .logging(LogConfig {
                enabled: logging.enabled,
                level: logging.level.clone(),
                json_format: logging.format == LogFormat::Json,
                span_events: logging.span_events,
                file_line_info: logging.file_line_info,
                thread_ids: false,
                include_target: logging.include_target,
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SomnolenceConfig::default().validate().is_ok());
        assert!(SomnolenceConfig::development().validate().is_ok());
        assert!(SomnolenceConfig::production().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_host() {
        let mut config = SomnolenceConfig::default();
        config.server.host = "  ".to_string();
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "server.host"),
            other => panic!("Expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_zero_shutdown_timeout() {
        let mut config = SomnolenceConfig::default();
        config.server.shutdown_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_metrics_addr_only_when_enabled() {
        let mut config = SomnolenceConfig::default();
        config.telemetry.metrics.addr = "not-an-addr".to_string();
        assert!(config.validate().is_ok());

        config.telemetry.metrics.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_config_conversion() {
        let mut config = SomnolenceConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 3000;
        config.server.shutdown_timeout_secs = 5;
        config.server.keep_alive = false;

        let server = config.server_config();
        assert_eq!(server.http_addr(), "127.0.0.1:3000");
        assert_eq!(server.shutdown_timeout(), Duration::from_secs(5));
        assert!(!server.keep_alive());
    }

    #[test]
    fn test_telemetry_config_conversion() {
        let config = SomnolenceConfig::development();
        let telemetry = config.telemetry_config();

        assert_eq!(telemetry.service_name, "somnolence");
        assert_eq!(telemetry.logging.level, "debug");
        assert!(!telemetry.logging.json_format);
        assert!(telemetry.logging.file_line_info);
        assert!(!telemetry.metrics.enabled);
    }

    #[test]
    fn test_production_logs_json() {
        let telemetry = SomnolenceConfig::production().telemetry_config();
        assert!(telemetry.logging.json_format);
        assert_eq!(telemetry.environment, "production");
    }
}
