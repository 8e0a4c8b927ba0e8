use futures_util::future::BoxFuture;
use lib::types::{ErrorReply, Role, UserInfo, UserPatch};
use tracing::info;

use super::{
    Context, Handler, HandlerResult, decode_payload, require_authority_over, require_role, respond,
};
use crate::store::Store;

/// `user:list`: every account's public view. Open to all roles.
pub struct ListUsers;

impl<S: Store> Handler<S> for ListUsers {
    fn call<'a>(&'a self, cx: Context<'a, S>, _payload: &'a [u8]) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let users: Vec<UserInfo> = cx
                .store
                .list_users()
                .await?
                .iter()
                .map(|user| user.public())
                .collect();
            respond(&users)
        })
    }
}

/// `user:delete`: payload is the account id.
pub struct DeleteUser;

impl<S: Store> Handler<S> for DeleteUser {
    fn call<'a>(&'a self, cx: Context<'a, S>, payload: &'a [u8]) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            require_role(cx.caller, Role::Admin)?;
            let id: String = decode_payload(payload)?;

            let target = cx
                .store
                .find_user(&id)
                .await?
                .ok_or_else(|| ErrorReply::not_found("no such user"))?;
            require_authority_over(cx.caller, &target.id, target.role)?;

            if !cx.store.delete_user(&id).await? {
                return Err(ErrorReply::not_found("no such user").into());
            }
            info!("user {} deleted by {}", id, cx.caller.id);
            Ok(None)
        })
    }
}

/// `user:update`: payload is a [`UserPatch`]. Keys outside the patch are
/// ignored when decoding.
pub struct UpdateUser;

impl<S: Store> Handler<S> for UpdateUser {
    fn call<'a>(&'a self, cx: Context<'a, S>, payload: &'a [u8]) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            require_role(cx.caller, Role::Admin)?;
            let patch: UserPatch = decode_payload(payload)?;

            let target = cx
                .store
                .find_user(&patch.id)
                .await?
                .ok_or_else(|| ErrorReply::not_found("no such user"))?;
            require_authority_over(cx.caller, &target.id, target.role)?;
            if patch.role.is_some_and(|role| role > cx.caller.role) {
                return Err(ErrorReply::role_too_low("cannot grant a role above your own").into());
            }
            if patch.is_empty() {
                return respond(&target.public());
            }

            let updated = cx
                .store
                .update_user(&patch)
                .await?
                .ok_or_else(|| ErrorReply::not_found("no such user"))?;
            info!("user {} updated by {}", updated.id, cx.caller.id);
            respond(&updated.public())
        })
    }
}
