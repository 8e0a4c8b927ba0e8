//! Post-handshake frame header.
//!
//! Request: `[0][u32 BE correlation id][0x78][name len][name][payload..]`
//! Reply:   `[0][u32 BE correlation id][reply kind][payload..]`
//!
//! `0x78` is the CBOR header for a text string with a one-byte length, so a
//! request's name is itself a well-formed CBOR item.

use std::{error::Error, fmt, str};

pub const PROTOCOL_REQUEST_REPLY: u8 = 0;
pub const PROTOCOL_STREAM: u8 = 1;

pub const SHORT_STRING_MARKER: u8 = 0x78;
pub const MIN_FRAME_LEN: usize = 7;
pub const MAX_REQUEST_TYPE_LEN: usize = u8::MAX as usize;

const REPLY_HEADER_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Success,
    Error,
}

impl ReplyKind {
    pub const fn as_u8(self) -> u8 {
        match self {
            ReplyKind::Success => 0,
            ReplyKind::Error => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFrame<'a> {
    pub id: u32,
    pub kind: &'a str,
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Request(RequestFrame<'a>),
    /// Reserved discriminator; carried through undecoded.
    Stream { id: u32, body: &'a [u8] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyFrame<'a> {
    pub id: u32,
    pub kind: ReplyKind,
    /// Empty when the reply carries no payload.
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    TooShort(usize),
    UnknownProtocol(u8),
    BadTypeMarker { id: u32, found: u8 },
    NameOverrun { id: u32, declared: usize, available: usize },
    NameNotUtf8 { id: u32 },
    NameTooLong(usize),
    UnknownReplyKind(u8),
}

impl FrameError {
    /// The correlation id, when the header got far enough to carry one that
    /// an error reply can be tagged with.
    pub const fn correlation_id(&self) -> Option<u32> {
        match self {
            FrameError::BadTypeMarker { id, .. }
            | FrameError::NameOverrun { id, .. }
            | FrameError::NameNotUtf8 { id } => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooShort(len) => {
                write!(f, "frame is {} bytes, below the {}-byte header", len, MIN_FRAME_LEN)
            }
            FrameError::UnknownProtocol(byte) => {
                write!(f, "invalid protocol byte (expected 0 or 1, got {})", byte)
            }
            FrameError::BadTypeMarker { found, .. } => write!(
                f,
                "request type must be a short string (marker {:#04x}), got {:#04x}",
                SHORT_STRING_MARKER, found
            ),
            FrameError::NameOverrun {
                declared,
                available,
                ..
            } => write!(
                f,
                "request type declares {} bytes but only {} remain",
                declared, available
            ),
            FrameError::NameNotUtf8 { .. } => f.write_str("request type is not valid UTF-8"),
            FrameError::NameTooLong(len) => write!(
                f,
                "request type is {} bytes, above maximum {}",
                len, MAX_REQUEST_TYPE_LEN
            ),
            FrameError::UnknownReplyKind(byte) => {
                write!(f, "invalid reply kind (expected 0 or 1, got {})", byte)
            }
        }
    }
}

impl Error for FrameError {}

fn read_id(msg: &[u8]) -> u32 {
    u32::from_be_bytes([msg[1], msg[2], msg[3], msg[4]])
}

pub fn decode_frame(msg: &[u8]) -> Result<Frame<'_>, FrameError> {
    if msg.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort(msg.len()));
    }

    let id = read_id(msg);
    match msg[0] {
        PROTOCOL_REQUEST_REPLY => {}
        PROTOCOL_STREAM => return Ok(Frame::Stream { id, body: &msg[5..] }),
        other => return Err(FrameError::UnknownProtocol(other)),
    }

    if msg[5] != SHORT_STRING_MARKER {
        return Err(FrameError::BadTypeMarker { id, found: msg[5] });
    }

    let declared = msg[6] as usize;
    let rest = &msg[MIN_FRAME_LEN..];
    if declared > rest.len() {
        return Err(FrameError::NameOverrun {
            id,
            declared,
            available: rest.len(),
        });
    }

    let (name, payload) = rest.split_at(declared);
    let kind = str::from_utf8(name).map_err(|_| FrameError::NameNotUtf8 { id })?;
    Ok(Frame::Request(RequestFrame { id, kind, payload }))
}

pub fn encode_request(id: u32, kind: &str, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if kind.len() > MAX_REQUEST_TYPE_LEN {
        return Err(FrameError::NameTooLong(kind.len()));
    }

    let mut frame = Vec::with_capacity(MIN_FRAME_LEN + kind.len() + payload.len());
    frame.push(PROTOCOL_REQUEST_REPLY);
    frame.extend_from_slice(&id.to_be_bytes());
    frame.push(SHORT_STRING_MARKER);
    frame.push(kind.len() as u8);
    frame.extend_from_slice(kind.as_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

pub fn encode_reply(id: u32, kind: ReplyKind, payload: Option<&[u8]>) -> Vec<u8> {
    let payload = payload.unwrap_or_default();
    let mut frame = Vec::with_capacity(REPLY_HEADER_LEN + payload.len());
    frame.push(PROTOCOL_REQUEST_REPLY);
    frame.extend_from_slice(&id.to_be_bytes());
    frame.push(kind.as_u8());
    frame.extend_from_slice(payload);
    frame
}

pub fn decode_reply(msg: &[u8]) -> Result<ReplyFrame<'_>, FrameError> {
    if msg.len() < REPLY_HEADER_LEN {
        return Err(FrameError::TooShort(msg.len()));
    }
    if msg[0] != PROTOCOL_REQUEST_REPLY {
        return Err(FrameError::UnknownProtocol(msg[0]));
    }

    let kind = match msg[5] {
        0 => ReplyKind::Success,
        1 => ReplyKind::Error,
        other => return Err(FrameError::UnknownReplyKind(other)),
    };
    Ok(ReplyFrame {
        id: read_id(msg),
        kind,
        payload: &msg[REPLY_HEADER_LEN..],
    })
}

#[cfg(test)]
mod tests {
    use super::{
        Frame, FrameError, ReplyKind, RequestFrame, decode_frame, decode_reply, encode_reply,
        encode_request,
    };

    #[test]
    fn request_header_layout_is_fixed() {
        let frame = encode_request(0x0102_0304, "user:list", &[0xf6]).expect("short name");
        assert_eq!(&frame[..7], &[0, 1, 2, 3, 4, 0x78, 9]);
        assert_eq!(&frame[7..16], b"user:list");
        assert_eq!(&frame[16..], &[0xf6]);
    }

    #[test]
    fn decodes_request_with_empty_payload() {
        let frame = encode_request(7, "user:list", &[]).expect("short name");
        assert_eq!(
            decode_frame(&frame),
            Ok(Frame::Request(RequestFrame {
                id: 7,
                kind: "user:list",
                payload: &[],
            }))
        );
    }

    #[test]
    fn short_frame_is_rejected_without_an_id() {
        let err = decode_frame(&[0, 0, 0, 0, 1, 0x78]).expect_err("too short");
        assert_eq!(err, FrameError::TooShort(6));
        assert_eq!(err.correlation_id(), None);
    }

    #[test]
    fn wrong_marker_keeps_the_correlation_id() {
        let err = decode_frame(&[0, 0, 0, 0, 9, 0x61, b'x']).expect_err("bad marker");
        assert_eq!(err.correlation_id(), Some(9));
    }

    #[test]
    fn name_length_past_end_is_an_overrun() {
        let err = decode_frame(&[0, 0, 0, 0, 3, 0x78, 10, b'a', b'b']).expect_err("overrun");
        assert_eq!(
            err,
            FrameError::NameOverrun {
                id: 3,
                declared: 10,
                available: 2
            }
        );
    }

    #[test]
    fn stream_discriminator_is_not_parsed_further() {
        let frame = [1, 0, 0, 0, 5, 0xff, 0xff];
        assert_eq!(
            decode_frame(&frame),
            Ok(Frame::Stream {
                id: 5,
                body: &[0xff, 0xff]
            })
        );
    }

    #[test]
    fn reply_without_payload_is_header_only() {
        let frame = encode_reply(42, ReplyKind::Success, None);
        assert_eq!(frame, vec![0, 0, 0, 0, 42, 0]);
        let reply = decode_reply(&frame).expect("valid reply");
        assert_eq!(reply.id, 42);
        assert_eq!(reply.kind, ReplyKind::Success);
        assert!(reply.payload.is_empty());
    }

    #[test]
    fn overlong_request_type_is_refused() {
        let name = "x".repeat(256);
        assert_eq!(
            encode_request(1, &name, &[]),
            Err(FrameError::NameTooLong(256))
        );
    }
}
