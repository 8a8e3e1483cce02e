use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use crate::models::{ClientMessage, ServerMessage};

/// Reconnects at a fixed delay; the session is not resumed client-side, the
/// server answers the fresh join with either a new battle start or an end.
pub struct ReconnectPolicy {
    pub max_attempts: Option<usize>,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(5),
            delay: Duration::from_secs(2),
        }
    }
}

pub struct Connection {
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
    session_token: String,
    reconnect_policy: ReconnectPolicy,
}

impl Connection {
    /// Connects and performs the join handshake.
    pub async fn connect(url: String, session_token: String, policy: ReconnectPolicy) -> Result<Self> {
        let ws_stream = Self::establish_connection(&url)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;

        let mut connection = Self {
            ws_stream,
            url,
            session_token,
            reconnect_policy: policy,
        };
        connection.join().await?;
        Ok(connection)
    }

    async fn establish_connection(url: &str) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>> {
        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| "WebSocket handshake failed")?;
        Ok(ws_stream)
    }

    async fn join(&mut self) -> Result<()> {
        let join = ClientMessage::Join {
            session_token: self.session_token.clone(),
        };
        self.send(&join).await.context("Join handshake failed")
    }

    async fn reconnect(&mut self) -> Result<()> {
        let mut attempt = 1;
        loop {
            if let Some(max) = self.reconnect_policy.max_attempts {
                if attempt > max {
                    anyhow::bail!("Failed to reconnect after {} attempts to {}", max, self.url);
                }
            }

            tokio::time::sleep(self.reconnect_policy.delay).await;

            match Self::establish_connection(&self.url).await {
                Ok(ws_stream) => {
                    self.ws_stream = ws_stream;
                    self.join().await?;
                    info!(url = %self.url, "reconnected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = ?self.reconnect_policy.max_attempts,
                        error = %e,
                        "Reconnection attempt failed"
                    );
                    attempt += 1;
                }
            }
        }
    }

    /// Next server message, reconnecting through losses. Transport control
    /// frames are handled inline.
    pub async fn recv(&mut self) -> Result<ServerMessage> {
        loop {
            match self.ws_stream.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
                    Ok(message) => return Ok(message),
                    Err(e) => {
                        warn!(error = %e, "unparseable server message, skipping");
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    self.ws_stream
                        .send(Message::Pong(data))
                        .await
                        .context("Failed to send pong")?;
                }
                Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => {
                    self.reconnect()
                        .await
                        .context("Connection lost and reconnection failed")?;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error, attempting reconnect");
                    self.reconnect()
                        .await
                        .context("WebSocket error and reconnection failed")?;
                }
            }
        }
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        let text = serde_json::to_string(message).context("Failed to serialize client message")?;
        self.ws_stream
            .send(Message::Text(text.into()))
            .await
            .context("Failed to send message")?;
        Ok(())
    }
}
