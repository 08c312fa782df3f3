//! Errors raised while assembling or running the webhook server.

use thiserror::Error;

/// Errors that can occur when building or running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Listener or connection error
    #[error("Webhook server error: {0}")]
    Server(#[from] std::io::Error),

    /// Two policies registered under the same path
    #[error("route {0} is already registered")]
    DuplicateRoute(String),

    /// Route paths must be absolute
    #[error("route {0:?} must start with '/'")]
    InvalidRoute(String),
}
