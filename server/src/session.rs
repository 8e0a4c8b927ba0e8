//! Read loop of an authenticated connection.
//!
//! Frames are handled strictly one at a time: the next frame is not read
//! until the current handler has returned and its reply has been written.

use lib::{
    protocol::{Frame, RequestFrame, decode_frame},
    transport::{ProtocolError, Transport},
    types::{ErrorReply, UserInfo},
};
use tracing::{debug, error, warn};

use crate::{
    handlers::{Context, HandlerError},
    responses::{send_error, send_success},
    state::ServerState,
    store::Store,
};

/// Runs until the peer closes (`Ok`) or a read fails (`Err`). Malformed
/// frames never end the session.
pub async fn run_session<S: Store, T: Transport>(
    transport: &mut T,
    state: &ServerState<S>,
    caller: &UserInfo,
) -> Result<(), ProtocolError> {
    while let Some(message) = transport.recv().await? {
        match decode_frame(&message) {
            Ok(Frame::Request(request)) => dispatch(transport, state, caller, request).await,
            Ok(Frame::Stream { id, body }) => {
                debug!(
                    "ignoring stream frame from {} (id={}, {} bytes)",
                    caller.id,
                    id,
                    body.len()
                );
            }
            Err(err) => match err.correlation_id() {
                Some(id) => {
                    warn!("bad frame header from {} (id={}): {}", caller.id, id, err);
                    send_error(transport, id, &ErrorReply::bad_frame_header(err.to_string()))
                        .await;
                }
                None => warn!("skipping malformed frame from {}: {}", caller.id, err),
            },
        }
    }
    debug!("session closed by peer (user_id={})", caller.id);
    Ok(())
}

async fn dispatch<S: Store, T: Transport>(
    transport: &mut T,
    state: &ServerState<S>,
    caller: &UserInfo,
    request: RequestFrame<'_>,
) {
    let RequestFrame { id, kind, payload } = request;
    let Some(handler) = state.registry.get(kind) else {
        warn!("unknown request type {} from {} (id={})", kind, caller.id, id);
        send_error(transport, id, &ErrorReply::unknown_request_type(kind)).await;
        return;
    };

    debug!("dispatching {} for {} (id={})", kind, caller.id, id);
    let cx = Context {
        store: state.store.as_ref(),
        caller,
    };
    match handler.call(cx, payload).await {
        Ok(value) => send_success(transport, id, value).await,
        Err(HandlerError::Reply(reply)) => {
            debug!("{} failed for {} (id={}): {}", kind, caller.id, id, reply);
            send_error(transport, id, &reply).await;
        }
        Err(HandlerError::Internal(err)) => {
            error!("{} failed for {} (id={}): {}", kind, caller.id, id, err);
            send_error(transport, id, &ErrorReply::opaque()).await;
        }
    }
}
