//! # Pending Actions
//!
//! A vault action (add owner, remove owner, change threshold, transfer)
//! proposed but not yet executed, together with the ordered list of owners
//! who have signed or approved it so far.
//!
//! The signer list is append-only until the action is executed or
//! discarded, and its order is strictly submission order — the engine's
//! "last signer executes" rule depends on that order never being touched.
//! Action identity is a BLAKE3 content hash over the vault address, the
//! action payload, and a per-proposal id, so two otherwise identical
//! proposals remain distinct.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use crate::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by pending-action bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// An account tried to sign an action it already signed. Duplicate
    /// entries would inflate the approval count without adding approvals.
    #[error("{account} has already signed this action")]
    DuplicateSigner {
        /// The account that already appears in the signer list.
        account: Address,
    },

    /// The action has left the pending state and no longer accepts
    /// signatures or transitions.
    #[error("action is {status}, expected pending")]
    NotPending {
        /// The action's current status.
        status: ActionStatus,
    },
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// The state-changing operations a vault supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Add a new owner to the vault.
    AddOwner {
        /// The address joining the owner set.
        owner: Address,
    },
    /// Remove an existing owner from the vault.
    RemoveOwner {
        /// The address leaving the owner set.
        owner: Address,
    },
    /// Change the approval threshold.
    ChangeThreshold {
        /// The new threshold value.
        threshold: usize,
    },
    /// Move funds out of the vault.
    Transfer {
        /// Recipient address.
        to: Address,
        /// Amount in the smallest unit.
        amount: u64,
    },
}

impl ActionKind {
    /// Stable byte encoding used for action hashing. A tag byte keeps the
    /// variants from colliding; fields follow in fixed order.
    fn payload_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(32);
        match self {
            ActionKind::AddOwner { owner } => {
                bytes.push(0x01);
                bytes.extend_from_slice(owner.as_bytes());
            }
            ActionKind::RemoveOwner { owner } => {
                bytes.push(0x02);
                bytes.extend_from_slice(owner.as_bytes());
            }
            ActionKind::ChangeThreshold { threshold } => {
                bytes.push(0x03);
                bytes.extend_from_slice(&(*threshold as u64).to_le_bytes());
            }
            ActionKind::Transfer { to, amount } => {
                bytes.push(0x04);
                bytes.extend_from_slice(to.as_bytes());
                bytes.extend_from_slice(&amount.to_le_bytes());
            }
        }
        bytes
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::AddOwner { owner } => write!(f, "add owner {}", owner.short()),
            ActionKind::RemoveOwner { owner } => write!(f, "remove owner {}", owner.short()),
            ActionKind::ChangeThreshold { threshold } => {
                write!(f, "change threshold to {}", threshold)
            }
            ActionKind::Transfer { to, amount } => {
                write!(f, "transfer {} to {}", amount, to.short())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ActionHash
// ---------------------------------------------------------------------------

/// Content hash identifying a pending action.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionHash([u8; 32]);

impl ActionHash {
    /// Computes the hash for a proposal: vault address, action payload,
    /// and the per-proposal id.
    pub fn compute(vault: &Address, kind: &ActionKind, proposal_id: &Uuid) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(vault.as_bytes());
        hasher.update(&kind.payload_bytes());
        hasher.update(proposal_id.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// The raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ActionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ActionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionHash(0x{}…)", hex::encode(&self.0[..4]))
    }
}

impl Serialize for ActionHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ActionHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| de::Error::custom(format!("invalid action hash: {}", e)))?;
        Ok(Self(bytes))
    }
}

// ---------------------------------------------------------------------------
// SignerList
// ---------------------------------------------------------------------------

/// The ordered list of owners who have signed or approved an action.
///
/// Append-only; order is submission order. The last entry holds the final
/// approval slot and is the action's canonical executor once the threshold
/// is met.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerList(Vec<Address>);

impl SignerList {
    /// An empty signer list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a signer.
    ///
    /// # Errors
    ///
    /// [`ActionError::DuplicateSigner`] when the account already signed.
    pub fn record(&mut self, account: Address) -> Result<(), ActionError> {
        if self.contains(&account) {
            return Err(ActionError::DuplicateSigner { account });
        }
        self.0.push(account);
        Ok(())
    }

    /// Whether the account appears in the list.
    pub fn contains(&self, account: &Address) -> bool {
        self.0.contains(account)
    }

    /// The most recent signer — the canonical executor once the
    /// threshold is met.
    pub fn last(&self) -> Option<&Address> {
        self.0.last()
    }

    /// Number of recorded signatures.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nobody has signed yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The signers in submission order.
    pub fn as_slice(&self) -> &[Address] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a SignerList {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Address> for SignerList {
    /// Builds a list from collaborator-reported signers. Duplicates are
    /// collapsed, keeping first occurrence — the collaborator's order wins.
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        let mut list = SignerList::new();
        for account in iter {
            let _ = list.record(account);
        }
        list
    }
}

// ---------------------------------------------------------------------------
// ActionStatus / PendingAction
// ---------------------------------------------------------------------------

/// Lifecycle state of a proposed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    /// Collecting signatures.
    Pending,
    /// Executed on the vault; the signer list is frozen history.
    Executed,
    /// Abandoned before execution.
    Discarded,
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionStatus::Pending => write!(f, "pending"),
            ActionStatus::Executed => write!(f, "executed"),
            ActionStatus::Discarded => write!(f, "discarded"),
        }
    }
}

/// A proposed vault action awaiting threshold approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    /// Content hash identifying this action.
    pub hash: ActionHash,
    /// What the action does when executed.
    pub kind: ActionKind,
    /// Per-proposal id, folded into the hash so repeated proposals of the
    /// same operation stay distinct.
    pub proposal_id: Uuid,
    /// Owners who have signed, in submission order.
    pub signers: SignerList,
    /// Lifecycle state.
    pub status: ActionStatus,
    /// When the action was proposed.
    pub created_at: DateTime<Utc>,
}

impl PendingAction {
    /// Creates a fresh proposal against the given vault.
    pub fn propose(vault: &Address, kind: ActionKind) -> Self {
        let proposal_id = Uuid::new_v4();
        Self {
            hash: ActionHash::compute(vault, &kind, &proposal_id),
            kind,
            proposal_id,
            signers: SignerList::new(),
            status: ActionStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Records a signature or approval from an owner.
    ///
    /// # Errors
    ///
    /// [`ActionError::NotPending`] when the action is closed,
    /// [`ActionError::DuplicateSigner`] when the account already signed.
    pub fn record_signature(&mut self, account: Address) -> Result<(), ActionError> {
        self.ensure_pending()?;
        self.signers.record(account)
    }

    /// Marks the action executed. The signer list is frozen from here on.
    pub fn mark_executed(&mut self) -> Result<(), ActionError> {
        self.ensure_pending()?;
        self.status = ActionStatus::Executed;
        Ok(())
    }

    /// Abandons the action.
    pub fn discard(&mut self) -> Result<(), ActionError> {
        self.ensure_pending()?;
        self.status = ActionStatus::Discarded;
        Ok(())
    }

    /// Whether the action still accepts signatures.
    pub fn is_pending(&self) -> bool {
        self.status == ActionStatus::Pending
    }

    fn ensure_pending(&self) -> Result<(), ActionError> {
        if self.status != ActionStatus::Pending {
            return Err(ActionError::NotPending {
                status: self.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn vault() -> Address {
        addr(0xAB)
    }

    #[test]
    fn proposals_of_same_kind_get_distinct_hashes() {
        let kind = ActionKind::ChangeThreshold { threshold: 2 };
        let a = PendingAction::propose(&vault(), kind);
        let b = PendingAction::propose(&vault(), kind);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn hash_is_stable_for_same_inputs() {
        let kind = ActionKind::AddOwner { owner: addr(7) };
        let id = Uuid::new_v4();
        let h1 = ActionHash::compute(&vault(), &kind, &id);
        let h2 = ActionHash::compute(&vault(), &kind, &id);
        assert_eq!(h1, h2);
    }

    #[test]
    fn signer_list_preserves_submission_order() {
        let mut signers = SignerList::new();
        signers.record(addr(3)).unwrap();
        signers.record(addr(1)).unwrap();
        signers.record(addr(2)).unwrap();

        assert_eq!(signers.as_slice(), &[addr(3), addr(1), addr(2)]);
        assert_eq!(signers.last(), Some(&addr(2)));
    }

    #[test]
    fn signer_list_rejects_duplicates() {
        let mut signers = SignerList::new();
        signers.record(addr(1)).unwrap();
        assert_eq!(
            signers.record(addr(1)).unwrap_err(),
            ActionError::DuplicateSigner { account: addr(1) }
        );
        assert_eq!(signers.len(), 1);
    }

    #[test]
    fn executed_action_rejects_further_signatures() {
        let mut action = PendingAction::propose(&vault(), ActionKind::AddOwner { owner: addr(9) });
        action.record_signature(addr(1)).unwrap();
        action.mark_executed().unwrap();

        assert_eq!(
            action.record_signature(addr(2)).unwrap_err(),
            ActionError::NotPending {
                status: ActionStatus::Executed
            }
        );
        // The recorded history is intact.
        assert_eq!(action.signers.as_slice(), &[addr(1)]);
    }

    #[test]
    fn discarded_action_cannot_be_executed() {
        let mut action =
            PendingAction::propose(&vault(), ActionKind::ChangeThreshold { threshold: 1 });
        action.discard().unwrap();
        assert!(action.mark_executed().is_err());
    }

    #[test]
    fn kind_display_is_human_readable() {
        let kind = ActionKind::ChangeThreshold { threshold: 3 };
        assert_eq!(kind.to_string(), "change threshold to 3");
    }

    #[test]
    fn action_hash_serde_round_trip() {
        let action = PendingAction::propose(&vault(), ActionKind::Transfer {
            to: addr(5),
            amount: 1_000,
        });
        let json = serde_json::to_string(&action.hash).unwrap();
        let recovered: ActionHash = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered, action.hash);
    }
}
