//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::policies::service_exposure::EXPOSURE_ANNOTATION;
use crate::webhooks::DEFAULT_MAX_BODY_BYTES;

/// Validating admission webhooks for Kubernetes
#[derive(Clone, Debug, Parser)]
#[command(name = "admission-webhooks", version, about)]
pub struct Args {
    /// PEM certificate chain served to the API server
    #[arg(long, env = "TLS_CERT", default_value = "/etc/tls/server.pem")]
    pub tls_cert: PathBuf,

    /// PEM private key for the certificate
    #[arg(long, env = "TLS_KEY", default_value = "/etc/tls/server-key.pem")]
    pub tls_key: PathBuf,

    /// Address the HTTPS webhook listener binds to
    #[arg(long, env = "WEBHOOK_ADDR", default_value = "0.0.0.0:8080")]
    pub addr: SocketAddr,

    /// Address of the plain-HTTP probe and metrics listener
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    pub health_addr: SocketAddr,

    /// Annotation that opts a LoadBalancer Service into public exposure
    #[arg(long, env = "EXPOSURE_ANNOTATION", default_value = EXPOSURE_ANNOTATION)]
    pub exposure_annotation: String,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}
