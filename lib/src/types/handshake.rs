use std::fmt;

use serde::{
    Deserialize, Serialize,
    de::{self, SeqAccess, Visitor},
};
use zeroize::Zeroizing;

use super::UserInfo;

pub const PROTOCOL_VERSION: u8 = 0;

/// Raw secret bytes. The buffer is overwritten with zeros when dropped, and
/// the `Debug` output never shows the contents.
#[derive(Clone, Default)]
pub struct Secret(Zeroizing<Vec<u8>>);

impl Secret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    pub fn expose_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

struct SecretVisitor;

impl<'de> Visitor<'de> for SecretVisitor {
    type Value = Secret;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte string")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Secret, E> {
        let mut buf = Vec::with_capacity(v.len());
        buf.extend_from_slice(v);
        Ok(Secret::new(buf))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Secret, E> {
        Ok(Secret::new(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Secret, E> {
        self.visit_bytes(v.as_bytes())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Secret, A::Error> {
        let mut buf = Zeroizing::new(Vec::with_capacity(seq.size_hint().unwrap_or(16)));
        while let Some(byte) = seq.next_element::<u8>()? {
            if buf.len() == buf.capacity() {
                // Grow by hand so the old allocation is scrubbed, not just freed.
                let mut bigger = Zeroizing::new(Vec::with_capacity(buf.capacity().max(8) * 2));
                bigger.extend_from_slice(&buf);
                buf = bigger;
            }
            buf.push(byte);
        }
        Ok(Secret(buf))
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(SecretVisitor)
    }
}

/// The single message a client sends before anything else. A non-empty
/// `registration_token` asks for a new account; an empty one is a login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub protocol: u8,
    pub registration_token: String,
    pub username: String,
    pub password: Secret,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
}

impl HandshakeRequest {
    pub fn login(username: impl Into<String>, password: Secret) -> Self {
        Self {
            protocol: PROTOCOL_VERSION,
            registration_token: String::new(),
            username: username.into(),
            password,
            email: String::new(),
        }
    }

    pub fn register(
        registration_token: impl Into<String>,
        username: impl Into<String>,
        password: Secret,
    ) -> Self {
        Self {
            registration_token: registration_token.into(),
            ..Self::login(username, password)
        }
    }

    pub fn is_registration(&self) -> bool {
        !self.registration_token.is_empty()
    }
}

// Reserved. Braced so they encode as empty maps rather than null.
#[allow(clippy::empty_structs_with_brackets)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {}

#[allow(clippy::empty_structs_with_brackets)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeAccepted {
    pub protocol: u8,
    pub server: ServerInfo,
    pub user: UserInfo,
    pub session: SessionInfo,
}

impl HandshakeAccepted {
    pub fn new(user: UserInfo) -> Self {
        Self {
            protocol: PROTOCOL_VERSION,
            server: ServerInfo::default(),
            user,
            session: SessionInfo::default(),
        }
    }
}
