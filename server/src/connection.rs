//! Handshake state machine: one message decides whether a connection is
//! authenticated, registered, or rejected.

use lib::{
    credential,
    protocol::{HandshakeDecodeError, decode_handshake_request},
    transport::{ProtocolError, Transport},
    types::{ErrorReply, HandshakeRequest, PROTOCOL_VERSION},
};
use tokio::time::timeout;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use crate::{
    error::BoxError,
    registration::{NewCredential, RegistrationError, TokenClaim, register},
    responses::{send_accept, send_reject},
    session::run_session,
    state::ServerState,
    store::{Credential, Store},
};

/// Serves one accepted connection from handshake to teardown. The transport
/// is closed exactly once, whichever way the connection ends.
pub async fn serve_connection<S: Store, T: Transport>(
    mut transport: T,
    state: ServerState<S>,
    peer: &str,
) -> Result<(), BoxError> {
    let result = serve(&mut transport, &state, peer).await;
    if let Err(err) = transport.close().await {
        warn!("failed to close connection from {}: {}", peer, err);
    }
    result.map_err(Into::into)
}

async fn serve<S: Store, T: Transport>(
    transport: &mut T,
    state: &ServerState<S>,
    peer: &str,
) -> Result<(), ProtocolError> {
    let Some(credential) = handshake(transport, state, peer).await? else {
        return Ok(());
    };

    let user = credential.public();
    info!(
        "session started: {} (user_id={}, role={})",
        peer,
        user.id,
        user.role.as_str()
    );
    let result = run_session(transport, state, &user).await;
    info!("session ended: {} (user_id={})", peer, user.id);
    result
}

/// `Ok(Some(_))` once authenticated; `Ok(None)` when the connection was
/// rejected (reply already written) or the peer left first.
async fn handshake<S: Store, T: Transport>(
    transport: &mut T,
    state: &ServerState<S>,
    peer: &str,
) -> Result<Option<Credential>, ProtocolError> {
    let wait = state.auth.handshake_timeout;
    let message = match timeout(wait, transport.recv()).await {
        Ok(Ok(Some(message))) => Zeroizing::new(message),
        Ok(Ok(None)) => {
            info!("{} closed before sending a handshake", peer);
            return Ok(None);
        }
        Ok(Err(err)) => {
            warn!("failed to read handshake from {}: {}", peer, err);
            // Best effort; the read already failed.
            let _ = send_reject(transport, &ErrorReply::opaque()).await;
            return Err(err);
        }
        Err(_) => {
            warn!("handshake timeout for {} after {:?}", peer, wait);
            let timeout_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
            send_reject(transport, &ErrorReply::handshake_timeout(timeout_ms)).await?;
            return Ok(None);
        }
    };

    match authenticate(&message, state, peer).await {
        Ok(credential) => {
            let accepted = send_accept(transport, credential.public()).await?;
            Ok(accepted.then_some(credential))
        }
        Err(reply) => {
            send_reject(transport, &reply).await?;
            Ok(None)
        }
    }
}

async fn authenticate<S: Store>(
    message: &[u8],
    state: &ServerState<S>,
    peer: &str,
) -> Result<Credential, ErrorReply> {
    let mut request = decode_handshake_request(message).map_err(|err| {
        warn!("rejected handshake from {}: {}", peer, err);
        match err {
            HandshakeDecodeError::Encoding => ErrorReply::bad_handshake_encoding(),
            HandshakeDecodeError::Schema => ErrorReply::bad_handshake_schema(),
        }
    })?;

    if request.protocol != PROTOCOL_VERSION {
        warn!(
            "rejected handshake from {}: unsupported protocol {}",
            peer, request.protocol
        );
        return Err(ErrorReply::unsupported_protocol(PROTOCOL_VERSION));
    }

    if request.is_registration() {
        register_account(&mut request, state, peer).await
    } else {
        login(&mut request, state, peer).await
    }
}

async fn register_account<S: Store>(
    request: &mut HandshakeRequest,
    state: &ServerState<S>,
    peer: &str,
) -> Result<Credential, ErrorReply> {
    if request.username.is_empty() {
        warn!("rejected registration from {}: empty username", peer);
        return Err(ErrorReply::bad_handshake_schema());
    }

    let new = NewCredential::prepare(
        &request.username,
        &request.email,
        &mut request.password,
        state.auth.salt_len,
        state.auth.hash_rounds,
    )
    .map_err(|err| {
        error!("registration from {} failed: {}", peer, err);
        ErrorReply::opaque()
    })?;

    let bootstrap = state.auth.bootstrap_token.as_ref().map(|token| token.as_str());
    let claim = TokenClaim::classify(&request.registration_token, bootstrap);
    register(state.store.as_ref(), claim, new)
        .await
        .map_err(|err| {
            match &err {
                RegistrationError::BadToken | RegistrationError::UsernameTaken => warn!(
                    "rejected registration of {} from {}: {}",
                    request.username, peer, err
                ),
                RegistrationError::Credential(_) | RegistrationError::Store(_) => {
                    error!("registration from {} failed: {}", peer, err);
                }
            }
            err.to_reply()
        })
}

async fn login<S: Store>(
    request: &mut HandshakeRequest,
    state: &ServerState<S>,
    peer: &str,
) -> Result<Credential, ErrorReply> {
    let stored = state
        .store
        .find_credential(&request.username)
        .await
        .map_err(|err| {
            error!("credential lookup for {} failed: {}", peer, err);
            ErrorReply::opaque()
        })?;

    // Unknown user and wrong password must look identical from outside,
    // in bytes and in time, so both run the full hash chain.
    let Some(stored) = stored else {
        let salt = vec![0u8; state.auth.salt_len];
        let _ = credential::verify(
            request.password.expose_mut(),
            &salt,
            state.auth.hash_rounds,
            &[0u8; credential::DIGEST_LEN],
        );
        warn!("rejected login from {}: unknown username", peer);
        return Err(ErrorReply::bad_username_password());
    };
    let password = request.password.expose_mut();
    if !credential::verify(password, &stored.salt, stored.rounds, &stored.password_hash) {
        warn!("rejected login from {}: wrong password", peer);
        return Err(ErrorReply::bad_username_password());
    }
    Ok(stored)
}
