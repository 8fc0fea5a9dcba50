//! HTTP server implementation.
//!
//! The server binds a TCP listener, serves every connection with hyper's
//! HTTP/1.1 implementation and hands each request to the shared
//! [`Dispatcher`]. Shutdown is cooperative: once the [`ShutdownSignal`]
//! fires the accept loop stops, open connections finish their in-flight
//! request and the server waits up to the configured timeout for them to
//! drain.
//!
//! # Example
//!
//! ```rust,ignore
//! use somnolence_server::{Registry, Route, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut routes = Registry::builder();
//!     routes.register("/ping", Route::new(|(): ()| async { Ok("pong".to_string()) }))?;
//!
//!     let config = ServerConfig::builder().port(8080).build();
//!     Server::new(config, routes.build()).run().await?;
//!     Ok(())
//! }
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::registry::Registry;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// The Somnolence HTTP server.
///
/// Owns the configuration and a [`Dispatcher`] over a frozen [`Registry`].
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    /// Creates a server for the given routes.
    #[must_use]
    pub fn new(config: ServerConfig, registry: Registry) -> Self {
        Self {
            config,
            dispatcher: Arc::new(Dispatcher::new(Arc::new(registry))),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the request dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Resolves the configured address and binds a listener to it.
    ///
    /// # Errors
    ///
    /// - [`ServerError::InvalidAddress`] if the host does not resolve.
    /// - [`ServerError::Bind`] if the socket cannot be bound.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let host = self.config.host();
        let port = self.config.port();

        let addr = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| ServerError::InvalidAddress {
                addr: self.config.http_addr(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| ServerError::InvalidAddress {
                addr: self.config.http_addr(),
                reason: "no addresses resolved".to_string(),
            })?;

        let listener = TcpListener::bind(addr).await.map_err(|source| {
            tracing::error!(%addr, error = %source, "Failed to bind");
            ServerError::Bind { addr, source }
        })?;
        let local_addr = listener.local_addr()?;

        Ok(BoundServer {
            listener,
            local_addr,
            config: self.config,
            dispatcher: self.dispatcher,
        })
    }

    /// Runs the server until SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Runs the server until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        self.bind().await?.serve(shutdown).await
    }
}

/// A server whose listener is bound but not yet accepting.
#[derive(Debug)]
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
}

impl BoundServer {
    /// Returns the address the listener is bound to.
    ///
    /// Useful when the configured port is `0`.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until `shutdown` fires, then drains them.
    ///
    /// # Errors
    ///
    /// Currently infallible once bound; accept errors are logged and the
    /// loop continues.
    pub async fn serve(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let Self {
            listener,
            local_addr,
            config,
            dispatcher,
        } = self;

        tracing::info!(
            addr = %local_addr,
            routes = dispatcher.registry().len(),
            "Server listening"
        );

        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, remote_addr)) => {
                        let token = tracker.acquire();
                        let dispatcher = Arc::clone(&dispatcher);
                        let shutdown = shutdown.clone();
                        let keep_alive = config.keep_alive();

                        tokio::spawn(async move {
                            serve_connection(dispatcher, stream, remote_addr, keep_alive, shutdown).await;
                            drop(token);
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },
                () = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        drop(listener);

        let timeout = config.shutdown_timeout();
        tracing::info!(
            timeout = ?timeout,
            active = tracker.active_connections(),
            "Waiting for connections to close"
        );

        tokio::select! {
            () = tracker.wait_for_drain() => {
                tracing::info!("All connections closed");
            }
            () = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    active = tracker.active_connections(),
                    "Shutdown timeout reached with connections still active"
                );
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn serve_connection(
    dispatcher: Arc<Dispatcher>,
    stream: TcpStream,
    remote_addr: SocketAddr,
    keep_alive: bool,
    shutdown: ShutdownSignal,
) {
    let service = service_fn(move |req: Request<Incoming>| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.handle(req, Some(remote_addr)).await }
    });

    let mut builder = http1::Builder::new();
    builder.keep_alive(keep_alive);
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut draining = false;
    let result = loop {
        tokio::select! {
            result = conn.as_mut() => break result,
            () = shutdown.recv(), if !draining => {
                tracing::debug!(%remote_addr, "Closing connection for shutdown");
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    };

    if let Err(e) = result {
        log_connection_error(&e, remote_addr);
    }
}

/// Logs a connection error, quietly when it is just the peer going away.
fn log_connection_error(err: &hyper::Error, remote_addr: SocketAddr) {
    if is_orderly_close(err) {
        tracing::debug!(%remote_addr, error = %err, "Connection closed");
    } else {
        tracing::warn!(%remote_addr, error = %err, "Connection error");
    }
}

fn is_orderly_close(err: &hyper::Error) -> bool {
    err.is_incomplete_message() || err.is_canceled() || err.is_closed()
}

/// Starts a server on `0.0.0.0:port` and serves until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if the port cannot be bound.
pub async fn start(port: u16, registry: Registry) -> Result<(), ServerError> {
    let config = ServerConfig::builder().port(port).build();
    Server::new(config, registry).run().await
}

/// Server errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured host and port do not form a usable address.
    #[error("invalid address `{addr}`: {reason}")]
    InvalidAddress {
        /// The configured `host:port`.
        addr: String,
        /// Why resolution failed.
        reason: String,
    },

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The resolved address.
        addr: SocketAddr,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Another I/O error on the listener.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn local_config() -> ServerConfig {
        ServerConfig::builder()
            .host("127.0.0.1")
            .port(0)
            .shutdown_timeout(Duration::from_secs(1))
            .build()
    }

    #[tokio::test]
    async fn test_triggered_shutdown_returns_ok() {
        let server = Server::new(local_config(), Registry::builder().build());
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let result = tokio::time::timeout(Duration::from_secs(5), server.run_with_shutdown(shutdown))
            .await
            .expect("server should stop");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_bind_reports_local_addr() {
        let bound = Server::new(local_config(), Registry::builder().build())
            .bind()
            .await
            .unwrap();
        assert!(bound.local_addr().ip().is_loopback());
        assert_ne!(bound.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_occupied_port() {
        let holder = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = holder.local_addr().unwrap().port();

        let config = ServerConfig::builder().host("127.0.0.1").port(port).build();
        match Server::new(config, Registry::builder().build()).bind().await {
            Err(ServerError::Bind { addr, .. }) => assert_eq!(addr.port(), port),
            other => panic!("Expected Bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_host() {
        let config = ServerConfig::builder().host("not a host name").port(0).build();
        let result = tokio::time::timeout(
            Duration::from_secs(30),
            Server::new(config, Registry::builder().build()).bind(),
        )
        .await
        .expect("resolution should finish");

        match result {
            Err(ServerError::InvalidAddress { addr, .. }) => assert_eq!(addr, "not a host name:0"),
            other => panic!("Expected InvalidAddress, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_serve_stops_when_triggered_later() {
        let bound = Server::new(local_config(), Registry::builder().build())
            .bind()
            .await
            .unwrap();
        let shutdown = ShutdownSignal::new();
        let handle = tokio::spawn(bound.serve(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("server should stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::InvalidAddress {
            addr: "x:1".to_string(),
            reason: "nope".to_string(),
        };
        assert_eq!(err.to_string(), "invalid address `x:1`: nope");
    }
}
