//! Request handlers and the name → handler registry.
//!
//! The dispatcher does no authorization of its own. Each handler checks the
//! caller's role against what it is about to do.

mod registration_token;
mod user;

use std::{collections::HashMap, error::Error, fmt};

use ciborium::Value;
use futures_util::future::BoxFuture;
use lib::{
    protocol::cbor_decode,
    types::{ErrorReply, Role, UserInfo},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::BoxError,
    store::{Store, StoreError},
};

pub use registration_token::{CreateToken, DeleteToken, ListTokens};
pub use user::{DeleteUser, ListUsers, UpdateUser};

/// `Ok(None)` is a success reply without a payload.
pub type HandlerResult = Result<Option<Value>, HandlerError>;

#[derive(Debug)]
pub enum HandlerError {
    /// Sent to the caller as-is.
    Reply(ErrorReply),
    /// Logged, then replaced by an opaque error.
    Internal(BoxError),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Reply(reply) => write!(f, "{}", reply),
            HandlerError::Internal(err) => write!(f, "internal error: {}", err),
        }
    }
}

impl Error for HandlerError {}

impl From<ErrorReply> for HandlerError {
    fn from(value: ErrorReply) -> Self {
        Self::Reply(value)
    }
}

impl From<StoreError> for HandlerError {
    fn from(value: StoreError) -> Self {
        Self::Internal(Box::new(value))
    }
}

/// What a handler gets to see of the session it runs in.
pub struct Context<'a, S> {
    pub store: &'a S,
    pub caller: &'a UserInfo,
}

pub trait Handler<S>: Send + Sync {
    fn call<'a>(&'a self, cx: Context<'a, S>, payload: &'a [u8]) -> BoxFuture<'a, HandlerResult>;
}

/// Immutable once the server starts; shared read-only by every session.
pub struct Registry<S> {
    handlers: HashMap<String, Box<dyn Handler<S>>>,
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<S: Store> Registry<S> {
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register("user:list", ListUsers);
        registry.register("user:delete", DeleteUser);
        registry.register("user:update", UpdateUser);
        registry.register("registration_token:list", ListTokens);
        registry.register("registration_token:create", CreateToken);
        registry.register("registration_token:delete", DeleteToken);
        registry
    }
}

impl<S> Registry<S> {
    /// Replaces any handler already registered under `name`.
    pub fn register(&mut self, name: impl Into<String>, handler: impl Handler<S> + 'static) {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Handler<S>> {
        self.handlers.get(name).map(Box::as_ref)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, HandlerError> {
    cbor_decode(payload).map_err(|err| ErrorReply::bad_request_payload(err.to_string()).into())
}

pub fn respond<T: Serialize + ?Sized>(value: &T) -> HandlerResult {
    Value::serialized(value)
        .map(Some)
        .map_err(|err| HandlerError::Internal(Box::new(err)))
}

pub fn require_role(caller: &UserInfo, required: Role) -> Result<(), HandlerError> {
    if caller.role < required {
        return Err(ErrorReply::role_too_low(format!(
            "requires role {} or above",
            required.as_str()
        ))
        .into());
    }
    Ok(())
}

/// Admins may act on themselves or on accounts strictly below them.
pub fn require_authority_over(
    caller: &UserInfo,
    target_id: &str,
    target_role: Role,
) -> Result<(), HandlerError> {
    if caller.id != target_id && target_role >= caller.role {
        return Err(ErrorReply::role_too_low("target role is not below your own").into());
    }
    Ok(())
}
