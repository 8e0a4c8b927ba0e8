mod error;
mod handshake;
mod role;
mod user;

pub use error::{ErrorReply, codes};
pub use handshake::{
    HandshakeAccepted, HandshakeRequest, PROTOCOL_VERSION, Secret, ServerInfo, SessionInfo,
};
pub use role::{Role, RoleError};
pub use user::{RegistrationToken, TokenSpec, UserInfo, UserPatch};
