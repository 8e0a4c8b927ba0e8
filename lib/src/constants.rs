use std::time::Duration;

pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_CONNECT_PATH: &str = "/connect";
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Display name given to the account created with the bootstrap token.
pub const ROOT_DISPLAY_NAME: &str = "Root";
