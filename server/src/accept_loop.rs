use std::{
    future::{Future, pending},
    net::SocketAddr,
};

use lib::transport::{FramedTransport, WebSocketTransport, websocket_config};
use tokio::{
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tokio_tungstenite::{
    accept_hdr_async_with_config,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
    },
};
use tracing::{error, info, warn};

use crate::{connection::serve_connection, error::BoxError, state::ServerState, store::Store};

/// How accepted sockets are turned into message transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerKind {
    /// WebSocket upgrade, accepted only on `path`.
    WebSocket { path: String },
    /// Raw TCP with `u32` length-prefixed messages.
    Framed,
}

pub async fn run<S: Store>(
    listener: TcpListener,
    kind: ListenerKind,
    state: ServerState<S>,
) -> Result<(), BoxError> {
    run_until(listener, kind, state, pending::<()>()).await
}

pub async fn run_until<S: Store>(
    listener: TcpListener,
    kind: ListenerKind,
    state: ServerState<S>,
    shutdown: impl Future<Output = ()> + Send,
) -> Result<(), BoxError> {
    let local_addr = listener.local_addr()?;
    tokio::pin!(shutdown);

    info!("server listening on {} ({:?})", local_addr, kind);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop on {}", local_addr);
                return Ok(());
            }
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        let kind = kind.clone();
                        let state = state.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_socket(stream, peer, kind, state).await {
                                error!("connection from {} failed: {}", peer, err);
                            }
                        });
                    }
                    Err(err) => {
                        error!("accept error: {}", err);
                    }
                }
            }
        }
    }
}

async fn handle_socket<S: Store>(
    stream: TcpStream,
    peer: SocketAddr,
    kind: ListenerKind,
    state: ServerState<S>,
) -> Result<(), BoxError> {
    let peer = peer.to_string();
    match kind {
        ListenerKind::Framed => {
            serve_connection(FramedTransport::new(stream), state, &peer).await
        }
        ListenerKind::WebSocket { path } => {
            let check_path = move |request: &Request, response: Response| {
                if request.uri().path() == path {
                    Ok(response)
                } else {
                    Err(not_found())
                }
            };
            let upgrade = accept_hdr_async_with_config(stream, check_path, Some(websocket_config()));
            let websocket = match timeout(state.auth.handshake_timeout, upgrade).await {
                Ok(Ok(websocket)) => websocket,
                Ok(Err(err)) => {
                    warn!("WebSocket upgrade from {} failed: {}", peer, err);
                    return Ok(());
                }
                Err(_) => {
                    warn!("WebSocket upgrade from {} timed out", peer);
                    return Ok(());
                }
            };
            serve_connection(WebSocketTransport::new(websocket), state, &peer).await
        }
    }
}

fn not_found() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("not found".to_owned()));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}
