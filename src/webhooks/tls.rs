//! TLS setup for the webhook listener.
//!
//! The API server authenticates us by certificate; we do not ask it for one,
//! so the rustls config is built with client authentication disabled.

use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::ServerConfig;

use super::WebhookError;

/// Load a PEM certificate chain and private key from disk
pub async fn load_rustls_config(
    cert_path: &Path,
    key_path: &Path,
) -> Result<RustlsConfig, WebhookError> {
    let cert_pem = tokio::fs::read(cert_path).await.map_err(|e| {
        WebhookError::TlsConfig(format!("failed to read {}: {}", cert_path.display(), e))
    })?;
    let key_pem = tokio::fs::read(key_path).await.map_err(|e| {
        WebhookError::TlsConfig(format!("failed to read {}: {}", key_path.display(), e))
    })?;

    let config = server_config(&cert_pem, &key_pem)?;
    Ok(RustlsConfig::from_config(Arc::new(config)))
}

/// Build a server config from PEM-encoded certificate chain and key
pub fn server_config(cert_pem: &[u8], key_pem: &[u8]) -> Result<ServerConfig, WebhookError> {
    let mut cert_reader = cert_pem;
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| WebhookError::TlsConfig(format!("failed to parse certificates: {}", e)))?;
    if certs.is_empty() {
        return Err(WebhookError::TlsConfig(
            "no certificates found in PEM input".to_string(),
        ));
    }

    let mut key_reader = key_pem;
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| WebhookError::TlsConfig(format!("failed to parse private key: {}", e)))?
        .ok_or_else(|| WebhookError::TlsConfig("no private key found in PEM input".to_string()))?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::aws_lc_rs::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| WebhookError::TlsConfig(e.to_string()))?
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}
