//! Capability issuer port (driven/secondary port, server side)
//!
//! Issues the single-use, time-limited URLs that let a client move one
//! object directly to or from the blob store.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What a capability permits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityOp {
    /// Read the object
    Get,
    /// Replace the object
    Put,
}

impl CapabilityOp {
    /// Wire name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityOp::Get => "get",
            CapabilityOp::Put => "put",
        }
    }
}

/// Port trait for issuing transfer capabilities
pub trait ICapabilityIssuer: Send + Sync {
    /// Issues a URL permitting `op` on `object_key` for `ttl`
    fn issue(&self, op: CapabilityOp, object_key: &str, ttl: Duration) -> anyhow::Result<String>;
}

/// Storage key of one save file: `users/{account}/games/{game}/{filename}`
pub fn object_key(
    account: &crate::domain::AccountId,
    game: &crate::domain::GameId,
    filename: &crate::domain::Filename,
) -> String {
    format!("users/{account}/games/{game}/{filename}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, Filename, GameId};

    #[test]
    fn test_object_key() {
        let key = object_key(
            &AccountId::new("user-1").unwrap(),
            &GameId::new("vn").unwrap(),
            &Filename::new("persistent").unwrap(),
        );
        assert_eq!(key, "users/user-1/games/vn/persistent");
    }
}
