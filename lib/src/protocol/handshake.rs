use std::{error::Error, fmt};

use ciborium::Value;
use zeroize::{Zeroize, Zeroizing};

use super::{CodecError, cbor_decode, cbor_encode};
use crate::types::{ErrorReply, HandshakeAccepted, HandshakeRequest};

/// Leading byte of a handshake reply.
pub const HANDSHAKE_ACCEPTED: u8 = 0;
pub const HANDSHAKE_REJECTED: u8 = 1;

const SCRATCH_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeDecodeError {
    /// Not a well-formed CBOR item, or the outer item is not a map.
    Encoding,
    /// A map, but without the required keys or with mistyped values.
    Schema,
}

impl fmt::Display for HandshakeDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeDecodeError::Encoding => f.write_str("handshake is not a CBOR map"),
            HandshakeDecodeError::Schema => f.write_str("handshake is missing required fields"),
        }
    }
}

impl Error for HandshakeDecodeError {}

/// Single pass: the message is parsed once into a [`Value`] whose byte and
/// text strings are overwritten when it goes out of scope. The parser's
/// scratch space is scrubbed the same way.
pub fn decode_handshake_request(bytes: &[u8]) -> Result<HandshakeRequest, HandshakeDecodeError> {
    let mut scratch = Zeroizing::new([0u8; SCRATCH_LEN]);
    let value: Value = ciborium::from_reader_with_buffer(bytes, &mut scratch[..])
        .map_err(|_| HandshakeDecodeError::Encoding)?;
    let value = Scrubbed(value);
    if !value.0.is_map() {
        return Err(HandshakeDecodeError::Encoding);
    }

    value.0.deserialized().map_err(|_| HandshakeDecodeError::Schema)
}

struct Scrubbed(Value);

impl Drop for Scrubbed {
    fn drop(&mut self) {
        scrub(&mut self.0);
    }
}

fn scrub(value: &mut Value) {
    match value {
        Value::Bytes(bytes) => bytes.zeroize(),
        Value::Text(text) => text.zeroize(),
        Value::Tag(_, inner) => scrub(inner),
        Value::Array(items) => items.iter_mut().for_each(scrub),
        Value::Map(entries) => {
            for (key, item) in entries.iter_mut() {
                scrub(key);
                scrub(item);
            }
        }
        _ => {}
    }
}

pub fn encode_handshake_accepted(reply: &HandshakeAccepted) -> Result<Vec<u8>, CodecError> {
    Ok(prefixed(HANDSHAKE_ACCEPTED, cbor_encode(reply)?))
}

pub fn encode_handshake_rejected(reply: &ErrorReply) -> Result<Vec<u8>, CodecError> {
    Ok(prefixed(HANDSHAKE_REJECTED, cbor_encode(reply)?))
}

fn prefixed(lead: u8, body: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(lead);
    out.extend(body);
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeReply {
    Accepted(HandshakeAccepted),
    Rejected(ErrorReply),
}

pub fn decode_handshake_reply(bytes: &[u8]) -> Result<HandshakeReply, CodecError> {
    match bytes.split_first() {
        Some((&HANDSHAKE_ACCEPTED, body)) => Ok(HandshakeReply::Accepted(cbor_decode(body)?)),
        Some((_, body)) => Ok(HandshakeReply::Rejected(cbor_decode(body)?)),
        None => Err(CodecError::Decode("empty handshake reply".into())),
    }
}

#[cfg(test)]
mod tests {
    use ciborium::Value;

    use super::{
        HandshakeDecodeError, HandshakeReply, decode_handshake_reply, decode_handshake_request,
        encode_handshake_rejected, scrub,
    };
    use crate::{
        protocol::cbor_encode,
        types::{ErrorReply, HandshakeRequest, Secret},
    };

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    #[test]
    fn decodes_a_login_request() {
        let request = HandshakeRequest::login("alice", Secret::from("hunter2"));
        let bytes = cbor_encode(&request).expect("encodes");
        let decoded = decode_handshake_request(&bytes).expect("decodes");
        assert_eq!(decoded.username, "alice");
        assert_eq!(decoded.password.expose(), b"hunter2");
        assert!(!decoded.is_registration());
    }

    #[test]
    fn garbage_is_an_encoding_error() {
        let result = decode_handshake_request(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(HandshakeDecodeError::Encoding)));
    }

    #[test]
    fn non_map_outer_value_is_an_encoding_error() {
        let bytes = cbor_encode(&vec![1, 2, 3]).expect("encodes");
        let result = decode_handshake_request(&bytes);
        assert!(matches!(result, Err(HandshakeDecodeError::Encoding)));
    }

    #[test]
    fn missing_username_is_a_schema_error() {
        let map = Value::Map(vec![
            (text("protocol"), Value::Integer(0u8.into())),
            (text("registration_token"), text("")),
            (text("password"), Value::Bytes(b"pw".to_vec())),
        ]);
        let bytes = cbor_encode(&map).expect("encodes");
        let result = decode_handshake_request(&bytes);
        assert!(matches!(result, Err(HandshakeDecodeError::Schema)));
    }

    #[test]
    fn text_password_is_accepted_as_bytes() {
        let map = Value::Map(vec![
            (text("protocol"), Value::Integer(0u8.into())),
            (text("registration_token"), text("")),
            (text("username"), text("bob")),
            (text("password"), text("pw")),
        ]);
        let bytes = cbor_encode(&map).expect("encodes");
        let decoded = decode_handshake_request(&bytes).expect("decodes");
        assert_eq!(decoded.password.expose(), b"pw");
        assert_eq!(decoded.email, "");
    }

    #[test]
    fn rejection_is_prefixed_with_nonzero_byte() {
        let bytes = encode_handshake_rejected(&ErrorReply::bad_username_password()).expect("encodes");
        assert_eq!(bytes[0], 1);
        assert_eq!(
            decode_handshake_reply(&bytes),
            Ok(HandshakeReply::Rejected(ErrorReply::bad_username_password()))
        );
    }

    #[test]
    fn scrub_clears_nested_strings() {
        let mut value = Value::Map(vec![
            (text("password"), Value::Bytes(b"hunter2".to_vec())),
            (text("nested"), Value::Array(vec![text("secret")])),
        ]);
        scrub(&mut value);
        let Value::Map(entries) = value else {
            panic!("still a map");
        };
        for (key, item) in entries {
            assert_eq!(key, text(""));
            match item {
                Value::Bytes(bytes) => assert!(bytes.is_empty()),
                Value::Array(items) => assert_eq!(items, vec![text("")]),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn indefinite_length_password_decodes() {
        // {"protocol": 0, "registration_token": "", "username": "u",
        //  "password": (_ h'6869', h'21')}
        let mut bytes = vec![0xa4];
        bytes.extend([0x68]);
        bytes.extend(b"protocol");
        bytes.push(0x00);
        bytes.push(0x72);
        bytes.extend(b"registration_token");
        bytes.push(0x60);
        bytes.push(0x68);
        bytes.extend(b"username");
        bytes.extend([0x61, b'u']);
        bytes.push(0x68);
        bytes.extend(b"password");
        bytes.extend([0x5f, 0x42, b'h', b'i', 0x41, b'!', 0xff]);

        let decoded = decode_handshake_request(&bytes).expect("decodes");
        assert_eq!(decoded.password.expose(), b"hi!");
    }
}
