use std::error::Error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;

/// Performs a login or registration handshake, then optionally sends one
/// request and prints the reply as JSON.
#[derive(Debug, Parser)]
#[command(name = "hiveway-client")]
pub struct Cli {
    /// WebSocket endpoint of the server.
    #[arg(long, default_value = "ws://127.0.0.1:8080/connect")]
    url: String,

    #[arg(long)]
    username: String,

    /// Registers a new account with this token instead of logging in.
    #[arg(long, default_value = "")]
    registration_token: String,

    /// Contact address stored with a new account.
    #[arg(long, default_value = "")]
    email: String,

    /// Request type to send after the handshake, e.g. `user:list`.
    request_type: Option<String>,

    /// JSON request payload, converted to CBOR before sending.
    #[arg(long, default_value = "null")]
    payload: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    app::run(Cli::parse()).await
}
