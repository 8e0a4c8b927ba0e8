use std::{error::Error, net::SocketAddr, time::Duration};

use ciborium::Value;
use hiveway_server::{ListenerKind, ServerState, config::AuthSettings, run, store::MemoryStore};
use lib::{
    protocol::{
        HandshakeReply, cbor_encode,
        client::{ClientError, Session},
        decode_handshake_reply,
    },
    transport::{FramedTransport, MAX_FRAME_BYTES, Transport, WebSocketTransport},
    types::{ErrorReply, HandshakeRequest, Role, Secret, codes},
};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
    time::timeout,
};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{
    MaybeTlsStream, connect_async,
    tungstenite::{self, Message},
};

const BOOTSTRAP: &str = "first-boot";

type Ws = WebSocketTransport<MaybeTlsStream<TcpStream>>;

async fn spawn_server(
    kind: ListenerKind,
) -> Result<(SocketAddr, JoinHandle<()>), Box<dyn Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let auth = AuthSettings {
        bootstrap_token: Some(BOOTSTRAP.to_owned().into()),
        handshake_timeout: Duration::from_millis(200),
        hash_rounds: 10,
        salt_len: 12,
    };
    let state = ServerState::new(MemoryStore::new(), auth);
    let task = tokio::spawn(async move {
        let _ = run(listener, kind, state).await;
    });
    Ok((addr, task))
}

async fn spawn_ws_server() -> Result<(SocketAddr, JoinHandle<()>), Box<dyn Error>> {
    spawn_server(ListenerKind::WebSocket {
        path: "/connect".into(),
    })
    .await
}

async fn open(addr: SocketAddr) -> Result<Ws, Box<dyn Error>> {
    let (stream, _) = connect_async(format!("ws://{}/connect", addr)).await?;
    Ok(WebSocketTransport::new(stream))
}

/// Sends raw handshake bytes and returns the rejection the server answers with.
async fn rejected_with(addr: SocketAddr, message: Vec<u8>) -> Result<ErrorReply, Box<dyn Error>> {
    let mut transport = open(addr).await?;
    transport.send(message).await?;
    let reply = timeout(Duration::from_secs(2), transport.recv())
        .await??
        .ok_or("server closed without replying")?;
    match decode_handshake_reply(&reply)? {
        HandshakeReply::Rejected(err) => Ok(err),
        HandshakeReply::Accepted(_) => Err("handshake unexpectedly accepted".into()),
    }
}

async fn connect(
    addr: SocketAddr,
    request: HandshakeRequest,
) -> Result<Result<Session<Ws>, ClientError>, Box<dyn Error>> {
    let transport = open(addr).await?;
    Ok(timeout(Duration::from_secs(2), Session::connect(transport, &request)).await?)
}

fn remote_code(result: Result<Session<Ws>, ClientError>) -> Option<String> {
    match result {
        Err(ClientError::Remote(err)) => Some(err.code),
        _ => None,
    }
}

#[tokio::test]
async fn bootstrap_registers_root_once_then_logs_in() -> Result<(), Box<dyn Error>> {
    let (addr, server_task) = spawn_ws_server().await?;

    let request = HandshakeRequest::register(BOOTSTRAP, "admin", Secret::from("s3cret"));
    let session = connect(addr, request).await??;
    let root = session.accepted().user.clone();
    assert_eq!(root.role, Role::Root);
    assert_eq!(root.name, "Root");
    session.close().await?;

    let again = HandshakeRequest::register(BOOTSTRAP, "admin2", Secret::from("s3cret"));
    assert_eq!(
        remote_code(connect(addr, again).await?).as_deref(),
        Some(codes::BAD_REGISTRATION_TOKEN)
    );

    let login = HandshakeRequest::login("admin", Secret::from("s3cret"));
    let session = connect(addr, login).await??;
    assert_eq!(session.accepted().user, root);
    session.close().await?;

    server_task.abort();
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_the_same() -> Result<(), Box<dyn Error>> {
    let (addr, server_task) = spawn_ws_server().await?;
    let request = HandshakeRequest::register(BOOTSTRAP, "admin", Secret::from("right"));
    connect(addr, request).await??.close().await?;

    let wrong = rejected_with(
        addr,
        cbor_encode(&HandshakeRequest::login("admin", Secret::from("wrong")))?,
    )
    .await?;
    let unknown = rejected_with(
        addr,
        cbor_encode(&HandshakeRequest::login("ghost", Secret::from("right")))?,
    )
    .await?;
    assert_eq!(wrong.code, codes::BAD_USERNAME_PASSWORD);
    assert_eq!(wrong, unknown);

    server_task.abort();
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn malformed_handshakes_are_rejected() -> Result<(), Box<dyn Error>> {
    let (addr, server_task) = spawn_ws_server().await?;

    let garbage = rejected_with(addr, b"\xff\xff not cbor".to_vec()).await?;
    assert_eq!(garbage.code, codes::BAD_HANDSHAKE_ENCODING);

    let not_a_map = rejected_with(addr, cbor_encode(&vec![1u8, 2, 3])?).await?;
    assert_eq!(not_a_map.code, codes::BAD_HANDSHAKE_ENCODING);

    let missing_username = cbor_encode(&Value::Map(vec![
        (Value::from("protocol"), Value::from(0u8)),
        (Value::from("registration_token"), Value::from("")),
        (Value::from("password"), Value::Bytes(b"pw".to_vec())),
    ]))?;
    let schema = rejected_with(addr, missing_username).await?;
    assert_eq!(schema.code, codes::BAD_HANDSHAKE_SCHEMA);

    server_task.abort();
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn silent_client_times_out() -> Result<(), Box<dyn Error>> {
    let (addr, server_task) = spawn_ws_server().await?;

    let mut transport = open(addr).await?;
    let reply = timeout(Duration::from_secs(2), transport.recv())
        .await??
        .ok_or("server closed without replying")?;
    let HandshakeReply::Rejected(err) = decode_handshake_reply(&reply)? else {
        return Err("handshake unexpectedly accepted".into());
    };
    assert_eq!(err.code, codes::HANDSHAKE_TIMEOUT);
    assert_eq!(
        err.details,
        Some(Value::Map(vec![(
            Value::from("timeout_milliseconds"),
            Value::from(200u64)
        )]))
    );

    let closed = timeout(Duration::from_secs(2), transport.recv()).await?;
    assert!(matches!(closed, Ok(None) | Err(_)));

    server_task.abort();
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn oversized_handshake_is_not_accepted() -> Result<(), Box<dyn Error>> {
    let (addr, server_task) = spawn_ws_server().await?;

    let (mut stream, _) = connect_async(format!("ws://{}/connect", addr)).await?;
    // The server may drop the connection while this is still being written.
    let _ = stream
        .send(Message::binary(vec![0xa0; MAX_FRAME_BYTES + 1]))
        .await;
    loop {
        match timeout(Duration::from_secs(2), stream.next()).await? {
            Some(Ok(Message::Binary(reply))) => {
                match decode_handshake_reply(&reply)? {
                    HandshakeReply::Rejected(err) => assert_ne!(err.code, codes::HANDSHAKE_TIMEOUT),
                    HandshakeReply::Accepted(_) => {
                        return Err("oversized handshake was accepted".into());
                    }
                }
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => {}
        }
    }

    server_task.abort();
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn upgrade_on_other_paths_is_refused() -> Result<(), Box<dyn Error>> {
    let (addr, server_task) = spawn_ws_server().await?;

    match connect_async(format!("ws://{}/elsewhere", addr)).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 404),
        Err(err) => return Err(err.into()),
        Ok(_) => return Err("upgrade on an unknown path was accepted".into()),
    }

    server_task.abort();
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn framed_listener_speaks_the_same_handshake() -> Result<(), Box<dyn Error>> {
    let (addr, server_task) = spawn_server(ListenerKind::Framed).await?;

    let stream = TcpStream::connect(addr).await?;
    let request = HandshakeRequest::register(BOOTSTRAP, "admin", Secret::from("pw"));
    let session = timeout(
        Duration::from_secs(2),
        Session::connect(FramedTransport::new(stream), &request),
    )
    .await??;
    assert_eq!(session.accepted().user.role, Role::Root);
    session.close().await?;

    server_task.abort();
    let _ = server_task.await;
    Ok(())
}
