//! Credential validator port (driving side of the request handler)
//!
//! Maps the bearer credential of an incoming request to the account it
//! belongs to. Verification of the credential itself is delegated to the
//! identity provider or the gateway in front of the handler.

use crate::domain::AccountId;
use crate::error::SaveSyncError;

/// Port trait resolving request credentials to accounts
pub trait ICredentialValidator: Send + Sync {
    /// Returns the account owning `bearer`, or an authentication error
    fn account_for(&self, bearer: &str) -> Result<AccountId, SaveSyncError>;
}
