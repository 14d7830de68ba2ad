//! WebSocket implementation of the channel transport.
//!
//! Frames are JSON over text messages. Pings are answered by tungstenite
//! itself; non-text frames are skipped rather than treated as errors.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use telecare_shared::model::Chat;
use telecare_shared::wire::{self, WsFrame};

use crate::error::NetError;
use crate::transport::{ChannelConnection, ChannelTransport};

/// Connects to `{ws_base_url}/chat-room`.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(ws_base_url: &str) -> Self {
        Self {
            url: format!(
                "{}{}",
                ws_base_url.trim_end_matches('/'),
                telecare_shared::constants::WS_CHAT_PATH
            ),
        }
    }
}

#[async_trait]
impl ChannelTransport for WsTransport {
    async fn connect(&self) -> Result<Box<dyn ChannelConnection>, NetError> {
        let (stream, response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| NetError::Connect(e.to_string()))?;

        debug!(url = %self.url, status = %response.status(), "WebSocket connected");

        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl ChannelConnection for WsConnection {
    async fn send(&mut self, frame: &WsFrame) -> Result<(), NetError> {
        let text = frame.to_json()?;
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn next(&mut self) -> Option<Result<Chat, NetError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(wire::decode_inbound(&text).map_err(NetError::from));
                }
                Ok(Message::Close(_)) => {
                    debug!("Server sent close frame");
                    return None;
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "WebSocket read error");
                    return Some(Err(NetError::WebSocket(e)));
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
