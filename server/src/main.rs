use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use hiveway_server::{
    BoxError, ListenerKind, ServerState,
    config::Config,
    run_until,
    signal::Shutdown,
    store::{MemoryStore, PgStore, Store},
};
use tokio::{net::TcpListener, task::JoinSet};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hiveway-server", about = "Authenticated request/reply server")]
struct Cli {
    /// TOML configuration file. Defaults apply when it does not exist.
    #[arg(long, default_value = "hiveway.toml")]
    config: PathBuf,

    /// Overrides `server.listen`.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Log filter, e.g. `info` or `hiveway_server=debug`. `RUST_LOG` wins
    /// when set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load(Some(&cli.config))?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if config.auth.bootstrap_registration_token.is_empty() {
        info!("no bootstrap registration token configured, root bootstrap disabled");
    }

    match config.database.url.clone() {
        Some(url) => {
            let store = PgStore::connect(&url, config.database.max_connections).await?;
            serve(config, store).await
        }
        None => {
            warn!("no database configured, accounts are kept in memory and lost on exit");
            serve(config, MemoryStore::new()).await
        }
    }
}

async fn serve<S: Store>(config: Config, store: S) -> Result<(), BoxError> {
    let state = ServerState::new(store, config.auth_settings());
    let shutdown = Shutdown::install();
    let mut listeners = JoinSet::new();

    let websocket = TcpListener::bind(config.server.listen).await?;
    listeners.spawn(run_until(
        websocket,
        ListenerKind::WebSocket {
            path: config.server.path.clone(),
        },
        state.clone(),
        shutdown.clone().wait(),
    ));

    if let Some(addr) = config.server.tcp_listen {
        let framed = TcpListener::bind(addr).await?;
        listeners.spawn(run_until(
            framed,
            ListenerKind::Framed,
            state.clone(),
            shutdown.clone().wait(),
        ));
    }

    while let Some(joined) = listeners.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("listener failed: {}", err),
            Err(err) => error!("listener task panicked: {}", err),
        }
    }
    info!("server stopped");
    Ok(())
}
