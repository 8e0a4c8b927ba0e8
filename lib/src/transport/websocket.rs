use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{
    WebSocketStream,
    tungstenite::{self, Message, protocol::WebSocketConfig},
};

use super::{MAX_FRAME_BYTES, ProtocolError, Transport};

/// Limits tungstenite enforces while reading, so an oversized message is
/// refused before it is buffered in full.
pub fn websocket_config() -> WebSocketConfig {
    WebSocketConfig {
        max_message_size: Some(MAX_FRAME_BYTES),
        max_frame_size: Some(MAX_FRAME_BYTES),
        ..WebSocketConfig::default()
    }
}

/// One binary WebSocket message per protocol message.
pub struct WebSocketTransport<S> {
    stream: WebSocketStream<S>,
}

impl<S> WebSocketTransport<S> {
    pub const fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }
}

impl<S> Transport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    if data.len() > MAX_FRAME_BYTES {
                        return Err(ProtocolError::FrameTooLarge(data.len()));
                    }
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // text is not part of the protocol; ping/pong are answered by tungstenite
                Some(Ok(_)) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => {
                    return Ok(None);
                }
                Some(Err(err)) => return Err(err.into()),
            }
        }
    }

    async fn send(&mut self, message: Vec<u8>) -> Result<(), ProtocolError> {
        if message.len() > MAX_FRAME_BYTES {
            return Err(ProtocolError::FrameTooLarge(message.len()));
        }
        self.stream.send(Message::binary(message)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
