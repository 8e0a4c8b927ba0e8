use std::{error::Error, fmt};

use ciborium::Value;
use serde::{Deserialize, Serialize};

/// Stable machine-readable error codes sent to peers.
pub mod codes {
    pub const UNSPECIFIED: &str = "unspecified";
    pub const HANDSHAKE_TIMEOUT: &str = "handshake-timeout";
    pub const BAD_HANDSHAKE_ENCODING: &str = "bad-handshake-encoding";
    pub const BAD_HANDSHAKE_SCHEMA: &str = "bad-handshake-schema";
    pub const UNSUPPORTED_PROTOCOL: &str = "unsupported-protocol";
    pub const BAD_REGISTRATION_TOKEN: &str = "bad-registration-token";
    pub const USERNAME_TAKEN: &str = "username-taken";
    pub const BAD_USERNAME_PASSWORD: &str = "bad-username-password";
    pub const UNKNOWN_REQUEST_TYPE: &str = "unknown-request-type";
    pub const BAD_FRAME_HEADER: &str = "bad-frame-header";
    pub const BAD_REQUEST_PAYLOAD: &str = "bad-request-payload";
    pub const ROLE_TOO_LOW: &str = "role-too-low";
    pub const NOT_FOUND: &str = "not-found";
    pub const TOKEN_EXISTS: &str = "token-exists";
}

/// Structured error sent as a handshake rejection or an error reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorReply {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_owned(),
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Generic failure that reveals nothing about its cause.
    pub fn opaque() -> Self {
        Self::new(
            codes::UNSPECIFIED,
            "a system-level error occurred (please let an administrator know)",
        )
    }

    pub fn handshake_timeout(timeout_ms: u64) -> Self {
        Self::new(
            codes::HANDSHAKE_TIMEOUT,
            format!("did not receive client handshake within {}ms", timeout_ms),
        )
        .with_details(Value::Map(vec![(
            Value::Text("timeout_milliseconds".into()),
            Value::Integer(timeout_ms.into()),
        )]))
    }

    pub fn bad_handshake_encoding() -> Self {
        Self::new(
            codes::BAD_HANDSHAKE_ENCODING,
            "client handshake was not valid CBOR or outer value was not a map",
        )
    }

    pub fn bad_handshake_schema() -> Self {
        Self::new(
            codes::BAD_HANDSHAKE_SCHEMA,
            "client handshake did not contain required fields",
        )
    }

    pub fn unsupported_protocol(supported: u8) -> Self {
        Self::new(
            codes::UNSUPPORTED_PROTOCOL,
            format!("server only speaks protocol {}", supported),
        )
        .with_details(Value::Map(vec![(
            Value::Text("supported".into()),
            Value::Integer(supported.into()),
        )]))
    }

    pub fn bad_registration_token() -> Self {
        Self::new(codes::BAD_REGISTRATION_TOKEN, "registration token is invalid")
    }

    pub fn username_taken() -> Self {
        Self::new(codes::USERNAME_TAKEN, "username is taken")
    }

    pub fn bad_username_password() -> Self {
        Self::new(
            codes::BAD_USERNAME_PASSWORD,
            "no account found with that username/password combination",
        )
    }

    pub fn unknown_request_type(name: &str) -> Self {
        Self::new(
            codes::UNKNOWN_REQUEST_TYPE,
            format!("no handler registered for request type {:?}", name),
        )
        .with_details(Value::Text(name.to_owned()))
    }

    pub fn bad_frame_header(reason: impl Into<String>) -> Self {
        Self::new(codes::BAD_FRAME_HEADER, reason)
    }

    pub fn bad_request_payload(reason: impl Into<String>) -> Self {
        Self::new(codes::BAD_REQUEST_PAYLOAD, reason)
    }

    pub fn role_too_low(message: impl Into<String>) -> Self {
        Self::new(codes::ROLE_TOO_LOW, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(codes::NOT_FOUND, message)
    }
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for ErrorReply {}
