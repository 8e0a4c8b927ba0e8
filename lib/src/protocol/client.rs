//! Client side of the protocol: send the handshake, then issue correlated
//! requests one at a time.

use std::{error::Error, fmt};

use serde::{Serialize, de::DeserializeOwned};

use super::{
    CodecError, FrameError, HandshakeReply, ReplyKind, cbor_decode, cbor_encode,
    decode_handshake_reply, decode_reply, encode_request,
};
use crate::{
    transport::{ProtocolError, Transport},
    types::{ErrorReply, HandshakeAccepted, HandshakeRequest},
};

#[derive(Debug)]
pub enum ClientError {
    Protocol(ProtocolError),
    Codec(CodecError),
    Frame(FrameError),
    /// The server closed the connection while a reply was outstanding.
    Closed,
    /// The server answered with a structured error.
    Remote(ErrorReply),
    MismatchedReply { expected: u32, got: u32 },
    EmptyReply,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Protocol(err) => write!(f, "protocol error: {}", err),
            ClientError::Codec(err) => write!(f, "codec error: {}", err),
            ClientError::Frame(err) => write!(f, "frame error: {}", err),
            ClientError::Closed => f.write_str("connection closed by server"),
            ClientError::Remote(err) => write!(f, "server error {}", err),
            ClientError::MismatchedReply { expected, got } => write!(
                f,
                "reply correlation id {} does not match request {}",
                got, expected
            ),
            ClientError::EmptyReply => f.write_str("reply carried no payload"),
        }
    }
}

impl Error for ClientError {}

impl From<ProtocolError> for ClientError {
    fn from(value: ProtocolError) -> Self {
        Self::Protocol(value)
    }
}

impl From<CodecError> for ClientError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<FrameError> for ClientError {
    fn from(value: FrameError) -> Self {
        Self::Frame(value)
    }
}

pub struct Session<T> {
    transport: T,
    accepted: HandshakeAccepted,
    next_id: u32,
}

impl<T: Transport> Session<T> {
    /// Sends `request` and waits for the handshake reply. A rejection comes
    /// back as `ClientError::Remote`.
    pub async fn connect(mut transport: T, request: &HandshakeRequest) -> Result<Self, ClientError> {
        transport.send(cbor_encode(request)?).await?;
        let reply = transport.recv().await?.ok_or(ClientError::Closed)?;
        match decode_handshake_reply(&reply)? {
            HandshakeReply::Accepted(accepted) => Ok(Self {
                transport,
                accepted,
                next_id: 1,
            }),
            HandshakeReply::Rejected(err) => Err(ClientError::Remote(err)),
        }
    }

    pub const fn accepted(&self) -> &HandshakeAccepted {
        &self.accepted
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Sends one request with an already-encoded payload and returns the raw
    /// success payload, if any.
    pub async fn call_raw(&mut self, kind: &str, payload: &[u8]) -> Result<Option<Vec<u8>>, ClientError> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        self.transport.send(encode_request(id, kind, payload)?).await?;
        let message = self.transport.recv().await?.ok_or(ClientError::Closed)?;
        let reply = decode_reply(&message)?;
        if reply.id != id {
            return Err(ClientError::MismatchedReply {
                expected: id,
                got: reply.id,
            });
        }

        match reply.kind {
            ReplyKind::Success if reply.payload.is_empty() => Ok(None),
            ReplyKind::Success => Ok(Some(reply.payload.to_vec())),
            ReplyKind::Error => Err(ClientError::Remote(cbor_decode(reply.payload)?)),
        }
    }

    pub async fn call<Req>(&mut self, kind: &str, request: &Req) -> Result<Option<Vec<u8>>, ClientError>
    where
        Req: Serialize + ?Sized,
    {
        let payload = cbor_encode(request)?;
        self.call_raw(kind, &payload).await
    }

    pub async fn request<Req, Resp>(&mut self, kind: &str, request: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = self.call(kind, request).await?.ok_or(ClientError::EmptyReply)?;
        Ok(cbor_decode(&payload)?)
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.transport.close().await?;
        Ok(())
    }
}
