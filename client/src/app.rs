use std::{env, error::Error};

use ciborium::Value;
use lib::{
    protocol::{cbor_decode, cbor_encode, client::Session},
    transport::{Transport, WebSocketTransport},
    types::{HandshakeRequest, Secret},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tracing::info;
use zeroize::Zeroizing;

use crate::Cli;

const PASSWORD_ENV: &str = "HIVEWAY_PASSWORD";

pub async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let password = read_password().await?;
    let payload: serde_json::Value = serde_json::from_str(&cli.payload)?;

    let (stream, _) = connect_async(cli.url.as_str()).await?;
    info!("connected to {}", cli.url);

    let mut request = HandshakeRequest::register(cli.registration_token, cli.username, password);
    request.email = cli.email;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut session = tokio::select! {
        connected = Session::connect(WebSocketTransport::new(stream), &request) => connected?,
        _ = &mut shutdown => {
            info!("interrupted during handshake, exiting");
            return Ok(());
        }
    };
    drop(request);
    println!("{}", serde_json::to_string_pretty(&session.accepted().user)?);

    if let Some(kind) = cli.request_type {
        let body = cbor_encode(&payload)?;
        let reply = tokio::select! {
            reply = session.call_raw(&kind, &body) => reply?,
            _ = &mut shutdown => {
                info!("interrupted while waiting for {} reply, exiting", kind);
                session.transport_mut().close().await?;
                return Ok(());
            }
        };
        match reply {
            Some(bytes) => {
                let value: Value = cbor_decode(&bytes)?;
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            None => println!("null"),
        }
    }

    session.close().await?;
    Ok(())
}

/// `HIVEWAY_PASSWORD`, or else the first line of stdin.
async fn read_password() -> Result<Secret, Box<dyn Error>> {
    if let Ok(password) = env::var(PASSWORD_ENV) {
        let password = Zeroizing::new(password);
        return Ok(Secret::from(password.as_str()));
    }

    let mut line = Zeroizing::new(String::new());
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(Secret::from(line.trim_end_matches(['\r', '\n'])))
}
