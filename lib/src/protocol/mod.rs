pub mod client;
mod codec;
mod frame;
mod handshake;

pub use codec::{CodecError, cbor_decode, cbor_encode};
pub use frame::{
    Frame, FrameError, MAX_REQUEST_TYPE_LEN, MIN_FRAME_LEN, PROTOCOL_REQUEST_REPLY,
    PROTOCOL_STREAM, ReplyFrame, ReplyKind, RequestFrame, SHORT_STRING_MARKER, decode_frame,
    decode_reply, encode_reply, encode_request,
};
pub use handshake::{
    HANDSHAKE_ACCEPTED, HANDSHAKE_REJECTED, HandshakeDecodeError, HandshakeReply,
    decode_handshake_reply, decode_handshake_request, encode_handshake_accepted,
    encode_handshake_rejected,
};
