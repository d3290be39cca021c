//! Shared websocket plumbing for the venue sessions.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{protocol::WebSocketConfig, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use crate::connection::Frame;
use crate::error::FeedError;

/// Book snapshots can be large with many price levels.
const MAX_MESSAGE_SIZE: usize = 2_097_152;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One websocket stream with text-frame send/receive. Protocol-level pings
/// are answered inside the receive path; callers only ever see text frames
/// and the close event.
pub(crate) struct WsTransport {
    ws: Option<WsStream>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self { ws: None }
    }

    pub async fn connect(&mut self, url: &str) -> Result<(), FeedError> {
        let config = WebSocketConfig {
            max_message_size: Some(MAX_MESSAGE_SIZE),
            max_frame_size: Some(MAX_MESSAGE_SIZE),
            ..Default::default()
        };
        let (ws, response) = connect_async_with_config(url, Some(config), false).await?;
        debug!(url, status = ?response.status(), "websocket connected");
        self.ws = Some(ws);
        Ok(())
    }

    pub async fn send_text(&mut self, text: String) -> Result<(), FeedError> {
        self.stream()?.send(Message::Text(text)).await?;
        Ok(())
    }

    pub async fn next_frame(&mut self) -> Result<Frame, FeedError> {
        let ws = self.stream()?;
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Frame::Text(text)),
                Some(Ok(Message::Ping(data))) => ws.send(Message::Pong(data)).await?,
                Some(Ok(Message::Close(frame))) => {
                    return Ok(Frame::Closed(frame.map(|f| f.reason.into_owned())))
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(Frame::Closed(None)),
            }
        }
    }

    pub async fn close(&mut self) {
        if let Some(ws) = self.ws.as_mut() {
            if let Err(e) = ws.close(None).await {
                debug!(error = %e, "websocket close failed");
            }
        }
    }

    fn stream(&mut self) -> Result<&mut WsStream, FeedError> {
        self.ws.as_mut().ok_or(FeedError::NotConnected)
    }
}
