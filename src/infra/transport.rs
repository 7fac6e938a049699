use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::app::ports::{BatchSink, DeliveryOutcome};
use crate::config::AtakConfig;
use crate::error::{BridgeError, Result};
use crate::metrics;
use crate::types::DeviceBatch;

/// Delivers one JSON document per batch over a fresh TCP connection, optionally TLS-wrapped.
///
/// Connect, handshake, write and close share a single deadline. Failures come back as a
/// [`DeliveryOutcome::Failed`]; nothing is retried.
pub struct TransportSender {
    host: String,
    port: u16,
    timeout: Duration,
    tls: Option<tokio_native_tls::TlsConnector>,
}

impl TransportSender {
    pub fn new(config: &AtakConfig) -> Result<Self> {
        let tls = if config.use_tls {
            if !config.verify_certificates {
                warn!(
                    host = %config.host,
                    "TLS certificate verification disabled for downstream delivery"
                );
            }
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(!config.verify_certificates)
                .danger_accept_invalid_hostnames(!config.verify_certificates)
                .build()
                .map_err(|e| BridgeError::Configuration(format!("Cannot build TLS connector: {}", e)))?;
            Some(tokio_native_tls::TlsConnector::from(connector))
        } else {
            None
        };

        info!(
            "Transport sender configured for {}:{} (tls: {})",
            config.host,
            config.port,
            tls.is_some()
        );
        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            timeout: Duration::from_secs(config.timeout_secs),
            tls,
        })
    }

    pub fn destination(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_tls(&self) -> bool {
        self.tls.is_some()
    }

    pub async fn send(&self, batch: &DeviceBatch) -> DeliveryOutcome {
        let payload = match batch.to_json() {
            Ok(payload) => payload,
            Err(e) => return self.failed(e.into()),
        };

        match tokio::time::timeout(self.timeout, self.write_payload(payload.as_bytes())).await {
            Ok(Ok(())) => {
                info!(
                    devices = batch.len(),
                    bytes = payload.len(),
                    "Sent batch to {}",
                    self.destination()
                );
                metrics::transport::delivered(payload.len());
                DeliveryOutcome::Delivered {
                    devices: batch.len(),
                    bytes: payload.len(),
                }
            }
            Ok(Err(e)) => self.failed(e),
            Err(_) => self.failed(BridgeError::Timeout(self.timeout.as_secs())),
        }
    }

    async fn write_payload(&self, payload: &[u8]) -> Result<()> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| self.map_io(e))?;
        debug!("Connected to {}", self.destination());

        match &self.tls {
            Some(connector) => {
                let tls_stream = connector.connect(&self.host, stream).await.map_err(|e| {
                    BridgeError::Connectivity(format!(
                        "TLS handshake with {} failed: {}",
                        self.destination(),
                        e
                    ))
                })?;
                self.write_and_close(tls_stream, payload).await
            }
            None => self.write_and_close(stream, payload).await,
        }
    }

    async fn write_and_close<S>(&self, mut stream: S, payload: &[u8]) -> Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        stream.write_all(payload).await.map_err(|e| self.map_io(e))?;
        stream.shutdown().await.map_err(|e| self.map_io(e))?;
        Ok(())
    }

    fn map_io(&self, e: std::io::Error) -> BridgeError {
        match e.kind() {
            ErrorKind::ConnectionRefused => {
                BridgeError::Connectivity(format!("Connection refused by {}", self.destination()))
            }
            ErrorKind::TimedOut => BridgeError::Timeout(self.timeout.as_secs()),
            _ => BridgeError::Io(e),
        }
    }

    fn failed(&self, e: BridgeError) -> DeliveryOutcome {
        match &e {
            BridgeError::Timeout(_) => error!("Transport timeout to {}", self.destination()),
            BridgeError::Connectivity(msg) => error!("{}", msg),
            other => error!("Transport error to {}: {}", self.destination(), other),
        }
        metrics::transport::failed(e.kind());
        DeliveryOutcome::Failed(e)
    }
}

#[async_trait]
impl BatchSink for TransportSender {
    async fn deliver(&self, batch: &DeviceBatch) -> DeliveryOutcome {
        self.send(batch).await
    }
}
