use std::{error::Error, net::SocketAddr, time::Duration};

use hiveway_server::{ListenerKind, ServerState, config::AuthSettings, run, store::MemoryStore};
use lib::{
    protocol::client::{ClientError, Session},
    transport::WebSocketTransport,
    types::{
        HandshakeRequest, RegistrationToken, Role, Secret, TokenSpec, UserInfo, UserPatch, codes,
    },
};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{MaybeTlsStream, connect_async};

const BOOTSTRAP: &str = "first-boot";

type Ws = WebSocketTransport<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> Result<(SocketAddr, JoinHandle<()>), Box<dyn Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let auth = AuthSettings {
        bootstrap_token: Some(BOOTSTRAP.to_owned().into()),
        handshake_timeout: Duration::from_secs(2),
        hash_rounds: 10,
        salt_len: 12,
    };
    let state = ServerState::new(MemoryStore::new(), auth);
    let kind = ListenerKind::WebSocket {
        path: "/connect".into(),
    };
    let task = tokio::spawn(async move {
        let _ = run(listener, kind, state).await;
    });
    Ok((addr, task))
}

async fn connect(
    addr: SocketAddr,
    request: HandshakeRequest,
) -> Result<Session<Ws>, Box<dyn Error>> {
    let (stream, _) = connect_async(format!("ws://{}/connect", addr)).await?;
    let session = timeout(
        Duration::from_secs(2),
        Session::connect(WebSocketTransport::new(stream), &request),
    )
    .await??;
    Ok(session)
}

fn remote_code<T>(result: Result<T, ClientError>) -> Option<String> {
    match result {
        Err(ClientError::Remote(err)) => Some(err.code),
        _ => None,
    }
}

#[tokio::test]
async fn unknown_request_type_does_not_end_the_session() -> Result<(), Box<dyn Error>> {
    let (addr, server_task) = spawn_server().await?;
    let mut root = connect(
        addr,
        HandshakeRequest::register(BOOTSTRAP, "root", Secret::from("pw")),
    )
    .await?;

    let result = timeout(Duration::from_secs(2), root.call_raw("bogus:op", &[])).await?;
    match result {
        Err(ClientError::Remote(err)) => {
            assert_eq!(err.code, codes::UNKNOWN_REQUEST_TYPE);
            assert_eq!(err.details, Some("bogus:op".into()));
        }
        other => return Err(format!("expected unknown-request-type, got {:?}", other).into()),
    }

    let users: Vec<UserInfo> =
        timeout(Duration::from_secs(2), root.request("user:list", &())).await??;
    assert_eq!(users.len(), 1);
    root.close().await?;

    server_task.abort();
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn issued_token_registers_one_account_with_its_role() -> Result<(), Box<dyn Error>> {
    let (addr, server_task) = spawn_server().await?;
    let mut root = connect(
        addr,
        HandshakeRequest::register(BOOTSTRAP, "root", Secret::from("pw")),
    )
    .await?;

    let spec = TokenSpec {
        id: String::new(),
        role: Role::Admin,
        name: "Alex".into(),
        notes: "ops".into(),
    };
    let token: RegistrationToken = root.request("registration_token:create", &spec).await?;
    assert_eq!(token.created_by, root.accepted().user.id);

    let mut request = HandshakeRequest::register(token.id.clone(), "alex", Secret::from("pw2"));
    request.email = "alex@example.com".into();
    let alex = connect(addr, request).await?;
    let alex_info = alex.accepted().user.clone();
    assert_eq!(alex_info.role, Role::Admin);
    assert_eq!(alex_info.name, "Alex");
    assert_eq!(alex_info.email, "alex@example.com");
    alex.close().await?;

    // Single use.
    let reuse = HandshakeRequest::register(token.id.clone(), "alex2", Secret::from("pw3"));
    let err = connect(addr, reuse).await.err().ok_or("token was accepted twice")?;
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::Remote(reply)) => assert_eq!(reply.code, codes::BAD_REGISTRATION_TOKEN),
        _ => return Err(err),
    }

    let tokens: Vec<RegistrationToken> = root.request("registration_token:list", &()).await?;
    assert!(tokens.is_empty());
    root.close().await?;

    server_task.abort();
    let _ = server_task.await;
    Ok(())
}

#[tokio::test]
async fn handlers_enforce_roles() -> Result<(), Box<dyn Error>> {
    let (addr, server_task) = spawn_server().await?;
    let mut root = connect(
        addr,
        HandshakeRequest::register(BOOTSTRAP, "root", Secret::from("pw")),
    )
    .await?;
    let spec = TokenSpec {
        id: "welcome-norm".into(),
        role: Role::Normal,
        name: "Norm".into(),
        notes: String::new(),
    };
    let _: RegistrationToken = root.request("registration_token:create", &spec).await?;

    let mut norm = connect(
        addr,
        HandshakeRequest::register("welcome-norm", "norm", Secret::from("pw")),
    )
    .await?;
    let norm_id = norm.accepted().user.id.clone();
    let root_id = root.accepted().user.id.clone();

    assert_eq!(
        remote_code(norm.call("registration_token:list", &()).await).as_deref(),
        Some(codes::ROLE_TOO_LOW)
    );
    assert_eq!(
        remote_code(norm.call("user:delete", &root_id).await).as_deref(),
        Some(codes::ROLE_TOO_LOW)
    );
    let escalate = UserPatch {
        id: norm_id.clone(),
        role: Some(Role::Root),
        ..UserPatch::default()
    };
    assert_eq!(
        remote_code(norm.call("user:update", &escalate).await).as_deref(),
        Some(codes::ROLE_TOO_LOW)
    );

    // Everyone may list users.
    let users: Vec<UserInfo> = norm.request("user:list", &()).await?;
    assert_eq!(users.len(), 2);
    norm.close().await?;

    assert!(root.call("user:delete", &norm_id).await?.is_none());
    assert_eq!(
        remote_code(root.call("user:delete", &norm_id).await).as_deref(),
        Some(codes::NOT_FOUND)
    );
    root.close().await?;

    server_task.abort();
    let _ = server_task.await;
    Ok(())
}
