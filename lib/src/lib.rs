//! Shared pieces of the hiveway session protocol: wire types, the CBOR and
//! frame codecs, credential hashing, and the message transports.

pub mod constants;
pub mod credential;
pub mod protocol;
pub mod transport;
pub mod types;
