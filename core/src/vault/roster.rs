//! # Owner Roster
//!
//! The cached owner set of a vault, together with the cosmetic nickname
//! map. Two invariants hold at all times:
//!
//! 1. Owners are unique by address and kept in the exact order the vault
//!    collaborator reports them. The roster never sorts or reorders.
//! 2. The nickname map's key set equals the owner set. Owners without an
//!    explicit nickname get the positional default `"owner N"`, counting
//!    back from the most recently added owner (`owner 1`).
//!
//! The roster is rebuilt from collaborator ground truth after every
//! executed mutation via [`OwnerRoster::reconcile`] — there is no code
//! path that derives a new owner set from local arithmetic.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::NICKNAME_PREFIX;
use crate::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by roster construction and mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// The same address appears more than once in an owner list.
    #[error("duplicate owner: {account}")]
    DuplicateOwner {
        /// The address that appears twice.
        account: Address,
    },

    /// An owner list with no entries was supplied. A vault without owners
    /// cannot approve anything, including its own repair.
    #[error("owner set is empty")]
    EmptyOwnerSet,

    /// A nickname operation referenced an address that is not an owner.
    #[error("{account} is not an owner of this vault")]
    UnknownOwner {
        /// The address that is not in the owner set.
        account: Address,
    },
}

// ---------------------------------------------------------------------------
// OwnerRoster
// ---------------------------------------------------------------------------

/// The owner set and nickname map of one vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerRoster {
    /// Owners in the order reported by the vault collaborator.
    owners: Vec<Address>,

    /// Display labels, keyed by owner. Keys always equal the owner set.
    nicknames: HashMap<Address, String>,
}

impl OwnerRoster {
    /// Builds a roster from a collaborator-reported owner list, assigning
    /// every owner its positional default nickname.
    ///
    /// # Errors
    ///
    /// [`RosterError::EmptyOwnerSet`] for an empty list,
    /// [`RosterError::DuplicateOwner`] when an address repeats.
    pub fn from_owners(owners: Vec<Address>) -> Result<Self, RosterError> {
        ensure_unique(&owners)?;

        let count = owners.len();
        let nicknames = owners
            .iter()
            .enumerate()
            .map(|(i, owner)| (*owner, default_nickname(i, count)))
            .collect();

        Ok(Self { owners, nicknames })
    }

    /// Number of owners.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// True when the roster holds no owners. Construction forbids an
    /// empty owner set, so this exists for API completeness.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// The owners, in reported order.
    pub fn owners(&self) -> &[Address] {
        &self.owners
    }

    /// Whether the given address is a current owner.
    pub fn contains(&self, account: &Address) -> bool {
        self.owners.contains(account)
    }

    /// The nickname of an owner, if the address is in the roster.
    pub fn nickname(&self, account: &Address) -> Option<&str> {
        self.nicknames.get(account).map(String::as_str)
    }

    /// Read access to the full nickname map.
    pub fn nicknames(&self) -> &HashMap<Address, String> {
        &self.nicknames
    }

    /// Assigns a nickname to a current owner.
    ///
    /// # Errors
    ///
    /// [`RosterError::UnknownOwner`] when the address is not an owner —
    /// nicknames for departed owners would be unreachable garbage.
    pub fn set_nickname(
        &mut self,
        account: &Address,
        nickname: impl Into<String>,
    ) -> Result<(), RosterError> {
        if !self.contains(account) {
            return Err(RosterError::UnknownOwner { account: *account });
        }
        self.nicknames.insert(*account, nickname.into());
        Ok(())
    }

    /// Rebuilds the roster from a freshly fetched owner list.
    ///
    /// Surviving owners keep their nicknames (including user edits);
    /// removed owners take their nickname entries with them; newcomers get
    /// positional defaults. This is the only mutation path for the owner
    /// set after initial load.
    pub fn reconcile(&mut self, new_owners: Vec<Address>) -> Result<(), RosterError> {
        ensure_unique(&new_owners)?;

        let count = new_owners.len();
        let mut nicknames = HashMap::with_capacity(count);
        for (i, owner) in new_owners.iter().enumerate() {
            let label = self
                .nicknames
                .get(owner)
                .cloned()
                .unwrap_or_else(|| default_nickname(i, count));
            nicknames.insert(*owner, label);
        }

        self.owners = new_owners;
        self.nicknames = nicknames;
        Ok(())
    }
}

/// Positional default label for the owner at index `i` of `count`.
/// The most recently added owner reads `owner 1`; the founding owner
/// reads `owner count`.
fn default_nickname(i: usize, count: usize) -> String {
    format!("{} {}", NICKNAME_PREFIX, count - i)
}

fn ensure_unique(owners: &[Address]) -> Result<(), RosterError> {
    if owners.is_empty() {
        return Err(RosterError::EmptyOwnerSet);
    }
    let mut seen = HashSet::with_capacity(owners.len());
    for owner in owners {
        if !seen.insert(owner) {
            return Err(RosterError::DuplicateOwner { account: *owner });
        }
    }
    Ok(())
}
