use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};

/// Account privilege level. The derived ordering is the privilege ordering,
/// so "at least admin" is `role >= Role::Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Role {
    #[default]
    Normal,
    Admin,
    Root,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleError(pub i64);

impl fmt::Display for RoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role value {} (expected 0, 1 or 2)", self.0)
    }
}

impl Error for RoleError {}

impl Role {
    pub const fn as_u8(self) -> u8 {
        match self {
            Role::Normal => 0,
            Role::Admin => 1,
            Role::Root => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Normal => "normal",
            Role::Admin => "admin",
            Role::Root => "root",
        }
    }
}

impl TryFrom<i64> for Role {
    type Error = RoleError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Role::Normal),
            1 => Ok(Role::Admin),
            2 => Ok(Role::Root),
            other => Err(RoleError(other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        Role::try_from(value).map_err(serde::de::Error::custom)
    }
}
