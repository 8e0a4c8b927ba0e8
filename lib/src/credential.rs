//! Salted, iterated SHA-256 password digests.
//!
//! Every function that receives a raw secret overwrites the caller's buffer
//! before returning, on every path.

use std::{error::Error, fmt};

use constant_time_eq::constant_time_eq;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest as _, Sha256};
use zeroize::{Zeroize, Zeroizing};

pub const DIGEST_LEN: usize = 32;
pub const DEFAULT_SALT_LEN: usize = 12;
pub const DEFAULT_HASH_ROUNDS: u32 = 20_000;

pub type Digest = [u8; DIGEST_LEN];

#[derive(Debug)]
pub struct CredentialError(rand::Error);

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "secure random generator failed: {}", self.0)
    }
}

impl Error for CredentialError {}

/// Hashes `salt || secret`, then re-hashes the digest `rounds - 1` more
/// times. A `rounds` of zero is treated as one.
pub fn derive(secret: &mut [u8], salt: &[u8], rounds: u32) -> Digest {
    let mut salted = Zeroizing::new(Vec::with_capacity(salt.len() + secret.len()));
    salted.extend_from_slice(salt);
    salted.extend_from_slice(secret);
    secret.zeroize();

    let mut digest: Digest = Sha256::digest(salted.as_slice()).into();
    drop(salted);

    for _ in 1..rounds {
        digest = Sha256::digest(digest).into();
    }
    digest
}

pub fn new_salt(len: usize) -> Result<Vec<u8>, CredentialError> {
    let mut salt = vec![0u8; len];
    OsRng.try_fill_bytes(&mut salt).map_err(CredentialError)?;
    Ok(salt)
}

pub fn verify(secret: &mut [u8], salt: &[u8], rounds: u32, expected: &[u8]) -> bool {
    let digest = derive(secret, salt, rounds);
    expected.len() == DIGEST_LEN && constant_time_eq(&digest, expected)
}
