//! CBOR, the self-describing encoding used for every payload.

use std::{error::Error, fmt};

use serde::{Serialize, de::DeserializeOwned};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    Encode(String),
    Decode(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encode(err) => write!(f, "CBOR encode error: {}", err),
            CodecError::Decode(err) => write!(f, "CBOR decode error: {}", err),
        }
    }
}

impl Error for CodecError {}

pub fn cbor_encode<T>(value: &T) -> Result<Vec<u8>, CodecError>
where
    T: Serialize + ?Sized,
{
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).map_err(|err| CodecError::Encode(err.to_string()))?;
    Ok(out)
}

pub fn cbor_decode<T>(bytes: &[u8]) -> Result<T, CodecError>
where
    T: DeserializeOwned,
{
    ciborium::from_reader(bytes).map_err(|err| CodecError::Decode(err.to_string()))
}
