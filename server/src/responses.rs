use ciborium::Value;
use lib::{
    protocol::{
        HANDSHAKE_REJECTED, ReplyKind, cbor_encode, encode_handshake_accepted,
        encode_handshake_rejected, encode_reply,
    },
    transport::{ProtocolError, Transport},
    types::{ErrorReply, HandshakeAccepted, UserInfo},
};
use tracing::{error, warn};

/// Sends the handshake success reply. Returns `false` if our own reply could
/// not be encoded, in which case an opaque rejection went out instead.
pub(crate) async fn send_accept<T: Transport>(
    transport: &mut T,
    user: UserInfo,
) -> Result<bool, ProtocolError> {
    match encode_handshake_accepted(&HandshakeAccepted::new(user)) {
        Ok(message) => {
            transport.send(message).await?;
            Ok(true)
        }
        Err(err) => {
            error!("failed to encode handshake reply: {}", err);
            send_reject(transport, &ErrorReply::opaque()).await?;
            Ok(false)
        }
    }
}

pub(crate) async fn send_reject<T: Transport>(
    transport: &mut T,
    reply: &ErrorReply,
) -> Result<(), ProtocolError> {
    let message = encode_handshake_rejected(reply)
        .or_else(|err| {
            error!("failed to encode handshake rejection: {}", err);
            encode_handshake_rejected(&ErrorReply::opaque())
        })
        .unwrap_or_else(|_| vec![HANDSHAKE_REJECTED]);
    transport.send(message).await
}

/// Writes a correlated success reply. Encode and write failures are logged
/// and nothing else is sent for that request.
pub(crate) async fn send_success<T: Transport>(transport: &mut T, id: u32, value: Option<Value>) {
    match value.as_ref().map(cbor_encode).transpose() {
        Ok(payload) => write_reply(transport, id, ReplyKind::Success, payload.as_deref()).await,
        Err(err) => error!("failed to encode reply for request {}: {}", id, err),
    }
}

pub(crate) async fn send_error<T: Transport>(transport: &mut T, id: u32, reply: &ErrorReply) {
    match cbor_encode(reply) {
        Ok(payload) => write_reply(transport, id, ReplyKind::Error, Some(&payload)).await,
        Err(err) => error!("failed to encode error reply for request {}: {}", id, err),
    }
}

async fn write_reply<T: Transport>(
    transport: &mut T,
    id: u32,
    kind: ReplyKind,
    payload: Option<&[u8]>,
) {
    if let Err(err) = transport.send(encode_reply(id, kind, payload)).await {
        warn!("failed to write reply for request {}: {}", id, err);
    }
}
