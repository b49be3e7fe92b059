//! Metric sinks.
//!
//! [`StatsdSink`] speaks the plain statsd gauge line protocol over UDP, which
//! is what the DataDog agent listens for on port 8125. [`NoopSink`] backs
//! dry runs.

use std::fmt;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

/// Maximum UDP payload (65535 - 20 IP header - 8 UDP header).
const MAX_UDP_MESSAGE_SIZE: usize = 65507;

#[derive(Debug)]
pub enum SinkError {
    ConnectionFailed(String),
    SendFailed(String),
    MessageTooLarge { size: usize, max: usize },
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::ConnectionFailed(msg) => write!(f, "metrics connection failed: {msg}"),
            SinkError::SendFailed(msg) => write!(f, "metrics send failed: {msg}"),
            SinkError::MessageTooLarge { size, max } => {
                write!(f, "metric line too large: {size} bytes (max {max})")
            }
        }
    }
}

impl std::error::Error for SinkError {}

/// Destination for gauge values.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn gauge(&self, name: &str, value: u64) -> Result<(), SinkError>;
}

/// statsd gauge line: `name:value|g`.
pub fn gauge_line(name: &str, value: u64) -> String {
    format!("{name}:{value}|g")
}

/// UDP statsd sink. One connected socket per sink.
pub struct StatsdSink {
    socket: UdpSocket,
    addr: String,
}

impl StatsdSink {
    pub async fn connect(host: &str, port: u16) -> Result<Self, SinkError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| SinkError::ConnectionFailed(format!("UDP bind failed: {e}")))?;

        let addr = format!("{host}:{port}");
        socket
            .connect(&addr)
            .await
            .map_err(|e| SinkError::ConnectionFailed(format!("UDP connect to {addr} failed: {e}")))?;

        Ok(Self { socket, addr })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl MetricsSink for StatsdSink {
    async fn gauge(&self, name: &str, value: u64) -> Result<(), SinkError> {
        let line = gauge_line(name, value);
        if line.len() > MAX_UDP_MESSAGE_SIZE {
            return Err(SinkError::MessageTooLarge {
                size: line.len(),
                max: MAX_UDP_MESSAGE_SIZE,
            });
        }

        self.socket
            .send(line.as_bytes())
            .await
            .map_err(|e| SinkError::SendFailed(format!("UDP send to {} failed: {e}", self.addr)))?;

        debug!(metric = name, value, "gauge sent");
        Ok(())
    }
}

/// Accepts every gauge and sends nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl MetricsSink for NoopSink {
    async fn gauge(&self, _name: &str, _value: u64) -> Result<(), SinkError> {
        Ok(())
    }
}
