mod accept_loop;
pub mod config;
mod connection;
mod error;
pub mod handlers;
pub mod registration;
mod responses;
mod session;
pub mod signal;
mod state;
pub mod store;
#[cfg(test)]
mod testing;

pub use accept_loop::{ListenerKind, run, run_until};
pub use connection::serve_connection;
pub use error::BoxError;
pub use session::run_session;
pub use state::ServerState;
