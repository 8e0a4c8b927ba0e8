//! Message-oriented transports that carry handshake and session traffic.
//!
//! Every transport delivers whole binary messages. `recv` returning
//! `Ok(None)` is an orderly close by the peer; any `Err` is a read failure.

mod framed;
mod websocket;

use std::{error::Error, fmt, future::Future, io};

use tokio_tungstenite::tungstenite;

pub use framed::{FramedTransport, read_bytes_frame, write_bytes_frame};
pub use websocket::{WebSocketTransport, websocket_config};

pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub enum ProtocolError {
    Io(io::Error),
    WebSocket(Box<tungstenite::Error>),
    FrameTooLarge(usize),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Io(err) => write!(f, "I/O error: {}", err),
            ProtocolError::WebSocket(err) => write!(f, "WebSocket error: {}", err),
            ProtocolError::FrameTooLarge(size) => write!(
                f,
                "frame is {} bytes, above configured maximum {}",
                size, MAX_FRAME_BYTES
            ),
        }
    }
}

impl Error for ProtocolError {}

impl From<io::Error> for ProtocolError {
    fn from(value: io::Error) -> Self {
        ProtocolError::Io(value)
    }
}

impl From<tungstenite::Error> for ProtocolError {
    fn from(value: tungstenite::Error) -> Self {
        ProtocolError::WebSocket(Box::new(value))
    }
}

pub trait Transport: Send {
    /// Waits for the next whole message.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, ProtocolError>> + Send;

    fn send(&mut self, message: Vec<u8>) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Releases the underlying connection. Callers invoke this once, after
    /// the last `send`.
    fn close(&mut self) -> impl Future<Output = Result<(), ProtocolError>> + Send;
}

impl<T: Transport> Transport for &mut T {
    fn recv(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, ProtocolError>> + Send {
        (**self).recv()
    }

    fn send(&mut self, message: Vec<u8>) -> impl Future<Output = Result<(), ProtocolError>> + Send {
        (**self).send(message)
    }

    fn close(&mut self) -> impl Future<Output = Result<(), ProtocolError>> + Send {
        (**self).close()
    }
}
