//! WebSocket client for the backend push channel.
//!
//! [`ChannelClient`] holds the endpoint for one dashboard session. Call
//! [`ChannelClient::connect`] to establish a live [`ChannelConnection`].

use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// Configuration handle for the push endpoint.
pub struct ChannelClient {
    url: String,
}

/// A live WebSocket connection to the push endpoint.
pub struct ChannelConnection {
    /// Random id used to correlate log lines for one connection.
    pub connection_id: String,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl ChannelClient {
    /// * `url` - full WebSocket URL, e.g. `ws://host:8080/ws/websocket`.
    pub fn new(url: String) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open the WebSocket connection.
    pub async fn connect(&self) -> Result<ChannelConnection, ChannelClientError> {
        let connection_id = uuid::Uuid::now_v7().to_string();

        let (ws_stream, _response) = connect_async(self.url.as_str()).await.map_err(|e| {
            ChannelClientError::Connection(format!(
                "Failed to connect to push channel at {}: {e}",
                self.url
            ))
        })?;

        tracing::info!(
            connection_id = %connection_id,
            "Connected to push channel at {}",
            self.url,
        );

        Ok(ChannelConnection {
            connection_id,
            ws_stream,
        })
    }
}

/// Transport-level failures. Never fatal: the channel reconnects.
#[derive(Debug, thiserror::Error)]
pub enum ChannelClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A send or receive failed on an established connection, or the
    /// channel task is no longer running.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
