//! # Authorization Guard
//!
//! Runs before any mutating intent leaves the session: the acting account
//! must be a current owner of the vault. The check reads only the cached
//! roster, so unauthorized callers are turned away without a network round
//! trip and without any chance of partial external state changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Address;
use crate::vault::roster::OwnerRoster;

/// Raised when a non-owner attempts a vault mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AuthorizationError {
    /// The acting account is not in the vault's owner set.
    #[error("current account {account} is not an owner of this vault")]
    NotAnOwner {
        /// The account that attempted the operation.
        account: Address,
    },
}

/// Confirms the acting account is a current owner.
///
/// # Errors
///
/// [`AuthorizationError::NotAnOwner`] otherwise. No external call is made
/// either way.
pub fn ensure_owner(roster: &OwnerRoster, account: &Address) -> Result<(), AuthorizationError> {
    if roster.contains(account) {
        Ok(())
    } else {
        Err(AuthorizationError::NotAnOwner { account: *account })
    }
}
