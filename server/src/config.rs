//! Server configuration: TOML file plus CLI overrides.

use std::{
    error::Error,
    fmt, fs, io,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use lib::{
    constants::{DEFAULT_CONNECT_PATH, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_SERVER_PORT},
    credential::{DEFAULT_HASH_ROUNDS, DEFAULT_SALT_LEN},
};
use serde::Deserialize;
use tracing::info;
use zeroize::Zeroizing;

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "cannot read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "cannot parse config {}: {}", path.display(), source)
            }
            ConfigError::Invalid(reason) => write!(f, "invalid config: {}", reason),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub auth: AuthSection,
    pub database: DatabaseSection,
}

/// `[server]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// WebSocket listener.
    pub listen: SocketAddr,
    /// Optional raw TCP listener speaking length-prefixed messages.
    pub tcp_listen: Option<SocketAddr>,
    /// HTTP path the WebSocket upgrade is accepted on.
    pub path: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], DEFAULT_SERVER_PORT)),
            tcp_listen: None,
            path: DEFAULT_CONNECT_PATH.to_owned(),
        }
    }
}

/// `[auth]`
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Lets the first root account register. Empty disables bootstrap.
    pub bootstrap_registration_token: String,
    pub handshake_timeout_ms: u64,
    pub hash_rounds: u32,
    pub salt_len: usize,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            bootstrap_registration_token: String::new(),
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT.as_millis() as u64,
            hash_rounds: DEFAULT_HASH_ROUNDS,
            salt_len: DEFAULT_SALT_LEN,
        }
    }
}

impl fmt::Debug for AuthSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSection")
            .field("bootstrap_registration_token", &"[REDACTED]")
            .field("handshake_timeout_ms", &self.handshake_timeout_ms)
            .field("hash_rounds", &self.hash_rounds)
            .field("salt_len", &self.salt_len)
            .finish()
    }
}

/// `[database]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// PostgreSQL URL. Without one the server keeps everything in memory.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

impl Config {
    /// Loads `path` if it exists, otherwise starts from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) if path.exists() => {
                info!("loading config file {}", path.display());
                let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str::<Config>(&content).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Some(path) => {
                info!("config file {} not found, using defaults", path.display());
                Config::default()
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.hash_rounds == 0 {
            return Err(ConfigError::Invalid("auth.hash_rounds must be at least 1".into()));
        }
        if self.auth.salt_len == 0 {
            return Err(ConfigError::Invalid("auth.salt_len must be at least 1".into()));
        }
        if self.auth.handshake_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "auth.handshake_timeout_ms must be at least 1".into(),
            ));
        }
        if !self.server.path.starts_with('/') {
            return Err(ConfigError::Invalid("server.path must start with '/'".into()));
        }
        Ok(())
    }

    pub fn auth_settings(&self) -> AuthSettings {
        let token = &self.auth.bootstrap_registration_token;
        AuthSettings {
            bootstrap_token: (!token.is_empty()).then(|| Zeroizing::new(token.clone())),
            handshake_timeout: Duration::from_millis(self.auth.handshake_timeout_ms),
            hash_rounds: self.auth.hash_rounds,
            salt_len: self.auth.salt_len,
        }
    }
}

/// The handshake-time view of `[auth]`.
#[derive(Clone)]
pub struct AuthSettings {
    pub bootstrap_token: Option<Zeroizing<String>>,
    pub handshake_timeout: Duration,
    pub hash_rounds: u32,
    pub salt_len: usize,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Config::default().auth_settings()
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("bootstrap_enabled", &self.bootstrap_token.is_some())
            .field("handshake_timeout", &self.handshake_timeout)
            .field("hash_rounds", &self.hash_rounds)
            .field("salt_len", &self.salt_len)
            .finish()
    }
}
