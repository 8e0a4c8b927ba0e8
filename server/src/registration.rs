//! Turns a presented registration token into a new account.

use std::{error::Error, fmt};

use constant_time_eq::constant_time_eq;
use lib::{
    constants::ROOT_DISPLAY_NAME,
    credential::{self, CredentialError},
    types::{ErrorReply, Role, Secret},
};
use tracing::info;
use uuid::Uuid;

use crate::store::{Credential, RegistrationTxn, Store, StoreError};

/// What a non-empty `registration_token` turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClaim<'a> {
    RootBootstrap,
    Stored(&'a str),
}

impl<'a> TokenClaim<'a> {
    /// Compares against the bootstrap token in constant time. `None` means
    /// bootstrap is disabled and every token is looked up in storage.
    pub fn classify(presented: &'a str, bootstrap: Option<&str>) -> Self {
        match bootstrap {
            Some(root) if constant_time_eq(presented.as_bytes(), root.as_bytes()) => {
                TokenClaim::RootBootstrap
            }
            _ => TokenClaim::Stored(presented),
        }
    }
}

#[derive(Debug)]
pub enum RegistrationError {
    /// Unknown, already used, or a bootstrap after root exists. The caller
    /// cannot tell these apart.
    BadToken,
    UsernameTaken,
    Credential(CredentialError),
    Store(StoreError),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::BadToken => f.write_str("registration token rejected"),
            RegistrationError::UsernameTaken => f.write_str("username already taken"),
            RegistrationError::Credential(err) => write!(f, "credential error: {}", err),
            RegistrationError::Store(err) => write!(f, "store error: {}", err),
        }
    }
}

impl Error for RegistrationError {}

impl From<CredentialError> for RegistrationError {
    fn from(value: CredentialError) -> Self {
        Self::Credential(value)
    }
}

impl From<StoreError> for RegistrationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UniqueViolation => Self::UsernameTaken,
            other => Self::Store(other),
        }
    }
}

impl RegistrationError {
    /// Reply sent to the peer. System failures never leave the process.
    pub fn to_reply(&self) -> ErrorReply {
        match self {
            RegistrationError::BadToken => ErrorReply::bad_registration_token(),
            RegistrationError::UsernameTaken => ErrorReply::username_taken(),
            RegistrationError::Credential(_) | RegistrationError::Store(_) => {
                ErrorReply::opaque()
            }
        }
    }
}

/// Account fields fixed before the registration transaction opens. Role and
/// display name come from the token.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub id: String,
    pub username: String,
    pub salt: Vec<u8>,
    pub rounds: u32,
    pub password_hash: Vec<u8>,
    pub email: String,
}

impl NewCredential {
    /// Salts and hashes `password`, scrubbing it in the process.
    pub fn prepare(
        username: &str,
        email: &str,
        password: &mut Secret,
        salt_len: usize,
        rounds: u32,
    ) -> Result<Self, CredentialError> {
        let salt = credential::new_salt(salt_len)?;
        let digest = credential::derive(password.expose_mut(), &salt, rounds);
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            username: username.to_owned(),
            salt,
            rounds,
            password_hash: digest.to_vec(),
            email: email.to_owned(),
        })
    }

    fn into_credential(self, role: Role, name: String) -> Credential {
        Credential {
            id: self.id,
            username: self.username,
            salt: self.salt,
            rounds: self.rounds,
            password_hash: self.password_hash,
            role,
            name,
            email: self.email,
        }
    }
}

/// Resolves `claim` and inserts the account in one storage transaction. On
/// any error the transaction is dropped, so a consumed token is restored.
pub async fn register<S: Store>(
    store: &S,
    claim: TokenClaim<'_>,
    new: NewCredential,
) -> Result<Credential, RegistrationError> {
    let mut txn = store.begin_registration().await?;

    let (role, name) = match claim {
        TokenClaim::RootBootstrap => {
            if txn.root_exists().await? {
                return Err(RegistrationError::BadToken);
            }
            (Role::Root, ROOT_DISPLAY_NAME.to_owned())
        }
        TokenClaim::Stored(id) => {
            let token = txn
                .consume_token(id)
                .await?
                .ok_or(RegistrationError::BadToken)?;
            (token.role, token.name)
        }
    };

    let credential = new.into_credential(role, name);
    txn.insert_credential(&credential).await?;
    txn.commit().await?;

    info!(
        "registered account {} (id={}, role={})",
        credential.username,
        credential.id,
        credential.role.as_str()
    );
    Ok(credential)
}
