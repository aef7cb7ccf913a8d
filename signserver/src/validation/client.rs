// SPDX-License-Identifier: MIT
// Copyright (c) Microsoft Corporation.

//! A client for a cluster of validation service nodes.

use std::{path::PathBuf, pin::Pin, time::Duration};

use futures::{SinkExt, StreamExt};
use openssl::ssl::{Ssl, SslConnector};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_openssl::SslStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{instrument, Instrument};

use super::{Certificate, ValidateRequest, ValidateResponse, ValidationTransport};
use crate::error::ValidationError;

// Responses are a status and a short list of purposes; anything longer is not a response.
const MAX_RESPONSE_LENGTH: usize = 64 * 1024;

/// Configuration for the validation client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The hostnames of the validation service nodes, tried in order.
    pub hosts: Vec<String>,
    /// The port of the validation service on every node.
    ///
    /// If unset, 8080 is used, or 8442 when a truststore is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// The PKCS#12 truststore with the CA certificates for the nodes' TLS certificates.
    ///
    /// Connections use TLS only when a truststore is configured. The password is not read from
    /// the configuration file; provide it on the command line or via the environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truststore: Option<PathBuf>,
    /// The amount of time to wait for a node to answer before moving on to the next one.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost".to_string()],
            port: None,
            truststore: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(feature = "cli")]
impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            toml::ser::to_string_pretty(&self).unwrap_or_default()
        )
    }
}

/// Sends validation requests to the first node that answers.
///
/// Nodes are tried in order. A node that refuses the connection, fails the TLS handshake,
/// times out, or answers with garbage is logged and skipped.
#[derive(Debug, Clone)]
pub struct ClusterClient {
    hosts: Vec<String>,
    port: u16,
    request_timeout: Duration,
    tls: Option<SslConnector>,
}

impl ClusterClient {
    /// Create a new client.
    ///
    /// If `tls` is [`None`], requests are sent over plain TCP.
    pub fn new(
        hosts: Vec<String>,
        port: u16,
        request_timeout: Duration,
        tls: Option<SslConnector>,
    ) -> Self {
        Self {
            hosts,
            port,
            request_timeout,
            tls,
        }
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    #[instrument(skip_all, fields(host = %host), err)]
    async fn send_to(
        &self,
        host: &str,
        request: &ValidateRequest,
    ) -> Result<ValidateResponse, ValidationError> {
        let tcp_stream = TcpStream::connect((host, self.port)).await?;
        tracing::debug!(host, port = self.port, "TCP connection established");

        match &self.tls {
            Some(connector) => {
                let ssl: Ssl = connector.configure()?.into_ssl(host)?;
                let mut stream = SslStream::new(ssl, tcp_stream)?;
                Pin::new(&mut stream).connect().await?;
                tracing::debug!(host, "TLS session established");
                exchange(stream, request).await
            }
            None => exchange(tcp_stream, request).await,
        }
    }
}

// Write the request as a single JSON line and read a single JSON line back.
async fn exchange<S>(stream: S, request: &ValidateRequest) -> Result<ValidateResponse, ValidationError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_RESPONSE_LENGTH));
    framed.send(serde_json::to_string(request)?).await?;

    match framed.next().await {
        Some(Ok(line)) => Ok(serde_json::from_str(&line)?),
        Some(Err(error)) => Err(error.into()),
        None => Err(ValidationError::Protocol(
            "connection closed before a response was sent".to_string(),
        )),
    }
}

impl ValidationTransport for ClusterClient {
    async fn validate(
        &self,
        service: &str,
        certificate: &Certificate,
        requested_purposes: Option<&str>,
    ) -> Result<ValidateResponse, ValidationError> {
        let request = ValidateRequest::new(service, certificate, requested_purposes)?;
        let span = tracing::info_span!("validate", request_id = %request.request_id, service);

        async {
            for host in &self.hosts {
                let error = match tokio::time::timeout(
                    self.request_timeout,
                    self.send_to(host, &request),
                )
                .await
                {
                    Ok(Ok(response)) => {
                        tracing::info!(host = %host, status = %response.status, "Validation service responded");
                        return Ok(response);
                    }
                    Ok(Err(error)) => error,
                    Err(_elapsed) => ValidationError::Timeout { host: host.clone() },
                };
                tracing::warn!(host = %host, %error, "Error communicating with host");
            }

            Err(ValidationError::NoServerAvailable)
        }
        .instrument(span)
        .await
    }
}
