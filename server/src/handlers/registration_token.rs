use chrono::Utc;
use futures_util::future::BoxFuture;
use lib::types::{ErrorReply, RegistrationToken, Role, TokenSpec, codes};
use rand::{RngCore, rngs::OsRng};
use tracing::info;

use super::{Context, Handler, HandlerError, HandlerResult, decode_payload, require_role, respond};
use crate::store::{Store, StoreError};

const GENERATED_TOKEN_BYTES: usize = 16;

/// `registration_token:list`
pub struct ListTokens;

impl<S: Store> Handler<S> for ListTokens {
    fn call<'a>(&'a self, cx: Context<'a, S>, _payload: &'a [u8]) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            require_role(cx.caller, Role::Admin)?;
            respond(&cx.store.list_tokens().await?)
        })
    }
}

/// `registration_token:create`: payload is a [`TokenSpec`]. Replies with the
/// stored token.
pub struct CreateToken;

impl<S: Store> Handler<S> for CreateToken {
    fn call<'a>(&'a self, cx: Context<'a, S>, payload: &'a [u8]) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            require_role(cx.caller, Role::Admin)?;
            let spec: TokenSpec = decode_payload(payload)?;
            if spec.role > cx.caller.role {
                return Err(ErrorReply::role_too_low("cannot issue a role above your own").into());
            }

            let id = if spec.id.is_empty() {
                generate_token_id()?
            } else {
                spec.id
            };
            let token = RegistrationToken {
                id,
                role: spec.role,
                name: spec.name,
                notes: spec.notes,
                created_at: u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default(),
                created_by: cx.caller.id.clone(),
            };

            match cx.store.create_token(&token).await {
                Ok(()) => {}
                Err(StoreError::UniqueViolation) => {
                    return Err(
                        ErrorReply::new(codes::TOKEN_EXISTS, "registration token already exists")
                            .into(),
                    );
                }
                Err(err) => return Err(err.into()),
            }
            info!(
                "registration token created by {} (role={})",
                cx.caller.id,
                token.role.as_str()
            );
            respond(&token)
        })
    }
}

/// `registration_token:delete`: payload is the token id.
pub struct DeleteToken;

impl<S: Store> Handler<S> for DeleteToken {
    fn call<'a>(&'a self, cx: Context<'a, S>, payload: &'a [u8]) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            require_role(cx.caller, Role::Admin)?;
            let id: String = decode_payload(payload)?;
            if !cx.store.delete_token(&id).await? {
                return Err(ErrorReply::not_found("no such registration token").into());
            }
            info!("registration token deleted by {}", cx.caller.id);
            Ok(None)
        })
    }
}

fn generate_token_id() -> Result<String, HandlerError> {
    let mut bytes = [0u8; GENERATED_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| HandlerError::Internal(Box::new(err)))?;
    Ok(hex::encode(bytes))
}
