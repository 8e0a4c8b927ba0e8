use serde::{Deserialize, Serialize};

use super::Role;

/// Public view of an account. Never carries the username or any credential
/// material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub role: Role,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
}

/// Admin-supplied fields of a registration token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpec {
    /// The token string itself. Left empty, the server picks a random one.
    #[serde(default)]
    pub id: String,
    pub role: Role,
    /// Name of the person the token is for; becomes their display name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notes: String,
}

/// A stored, single-use registration token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationToken {
    pub id: String,
    pub role: Role,
    pub name: String,
    pub notes: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    pub created_by: String,
}

/// Partial update of an account. Only these keys are honoured; anything else
/// in the submitted map is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl UserPatch {
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none()
    }
}
