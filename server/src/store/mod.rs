//! Persistence for accounts and registration tokens.

mod memory;
mod postgres;

use std::{error::Error, fmt, future::Future};

use lib::types::{RegistrationToken, Role, UserInfo, UserPatch};

use crate::error::BoxError;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A stored account. Only the salt, round count and derived hash of the
/// password are ever kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub username: String,
    pub salt: Vec<u8>,
    pub rounds: u32,
    pub password_hash: Vec<u8>,
    pub role: Role,
    pub name: String,
    pub email: String,
}

impl Credential {
    pub fn public(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            role: self.role,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    pub fn apply(&mut self, patch: &UserPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(email) = &patch.email {
            self.email.clone_from(email);
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
    }
}

#[derive(Debug)]
pub enum StoreError {
    /// A unique key (username, user id, token id) already exists.
    UniqueViolation,
    Backend(BoxError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UniqueViolation => f.write_str("unique constraint violated"),
            StoreError::Backend(err) => write!(f, "storage backend error: {}", err),
        }
    }
}

impl Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        match &value {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::UniqueViolation,
            _ => StoreError::Backend(Box::new(value)),
        }
    }
}

pub trait Store: Send + Sync + 'static {
    type Registration: RegistrationTxn;

    /// Opens the atomic unit a registration runs in. Nothing it does is
    /// visible to others until `commit`; dropping it rolls back.
    fn begin_registration(
        &self,
    ) -> impl Future<Output = Result<Self::Registration, StoreError>> + Send;

    fn find_credential(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<Credential>, StoreError>> + Send;

    fn find_user(&self, id: &str)
    -> impl Future<Output = Result<Option<Credential>, StoreError>> + Send;

    fn list_users(&self) -> impl Future<Output = Result<Vec<Credential>, StoreError>> + Send;

    fn delete_user(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn update_user(
        &self,
        patch: &UserPatch,
    ) -> impl Future<Output = Result<Option<Credential>, StoreError>> + Send;

    fn list_tokens(
        &self,
    ) -> impl Future<Output = Result<Vec<RegistrationToken>, StoreError>> + Send;

    fn create_token(
        &self,
        token: &RegistrationToken,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_token(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

pub trait RegistrationTxn: Send {
    fn root_exists(&mut self) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Removes and returns the token in one step, so a token can only ever be
    /// handed out to one registration.
    fn consume_token(
        &mut self,
        id: &str,
    ) -> impl Future<Output = Result<Option<RegistrationToken>, StoreError>> + Send;

    fn insert_credential(
        &mut self,
        credential: &Credential,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
