//! # Vault Collaborator Contracts
//!
//! The traits a vault session talks through. Transaction encoding, gas,
//! signature cryptography, and transport are all behind these seams — the
//! session passes identities and action hashes, never key material, and
//! treats whatever comes back as ground truth.
//!
//! [`VaultConnector`] covers discovery (deploy a new vault, attach to an
//! existing one); [`VaultBackend`] is the handle to one vault. Both are
//! object-safe so callers can hold `Arc<dyn VaultBackend>` regardless of
//! which implementation — the in-memory chain here, or a real RPC-backed
//! one elsewhere — is underneath.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::action::{ActionHash, ActionKind, PendingAction};
use crate::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures surfaced by the vault collaborator. These are external errors:
/// the session reports them verbatim and leaves its own state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BackendError {
    /// No vault exists at the given address.
    #[error("no vault found at {address}")]
    VaultNotFound {
        /// The address that was queried.
        address: Address,
    },

    /// The action hash does not correspond to a known pending action.
    #[error("unknown action {hash}")]
    UnknownAction {
        /// The unrecognized hash.
        hash: ActionHash,
    },

    /// The collaborator refused the proposal outright.
    #[error("proposal rejected: {reason}")]
    InvalidProposal {
        /// Collaborator-supplied explanation.
        reason: String,
    },

    /// A signer or executor the collaborator does not recognize as an
    /// owner. The session's guard makes this unreachable in normal flows;
    /// it exists because the collaborator enforces its own rules.
    #[error("{account} is not an owner of this vault")]
    NotAnOwner {
        /// The rejected account.
        account: Address,
    },

    /// The account's signature is already recorded for this action.
    #[error("{account} has already signed this action")]
    DuplicateSignature {
        /// The account whose signature already exists.
        account: Address,
    },

    /// Execution was attempted before enough signatures were collected.
    #[error("threshold not reached: have {have} of {need} signatures")]
    ThresholdNotReached {
        /// Signatures collected so far.
        have: usize,
        /// Signatures required.
        need: usize,
    },

    /// The action has already been executed or discarded.
    #[error("action is no longer pending")]
    ActionClosed,

    /// Transport or session-level failure talking to the collaborator.
    #[error("vault connection failed: {0}")]
    Connection(String),
}

// ---------------------------------------------------------------------------
// ExecutionOutcome
// ---------------------------------------------------------------------------

/// Result of an execution attempt that reached the vault.
///
/// `Reverted` is not a transport failure: the call went through and the
/// vault said no. The action's signer list survives a revert, so the
/// action stays resumable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    /// The action took effect.
    Committed,
    /// The vault rejected the execution.
    Reverted {
        /// Vault-supplied reason, passed through verbatim.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// VaultBackend
// ---------------------------------------------------------------------------

/// Handle to one vault held by the external collaborator.
#[async_trait]
pub trait VaultBackend: Send + Sync {
    /// The vault's current owner set, in the vault's own order.
    async fn owners(&self) -> Result<Vec<Address>, BackendError>;

    /// The vault's current approval threshold.
    async fn threshold(&self) -> Result<usize, BackendError>;

    /// The vault's address.
    async fn address(&self) -> Result<Address, BackendError>;

    /// Proposes a new action, returning it with an empty signer list.
    async fn propose(&self, kind: ActionKind) -> Result<PendingAction, BackendError>;

    /// Records the proposer-side signature for an action.
    async fn sign(&self, hash: &ActionHash, signer: &Address) -> Result<(), BackendError>;

    /// Records an approval for an action.
    async fn approve(&self, hash: &ActionHash, approver: &Address) -> Result<(), BackendError>;

    /// Executes a fully approved action.
    async fn execute(
        &self,
        hash: &ActionHash,
        executor: &Address,
    ) -> Result<ExecutionOutcome, BackendError>;

    /// The ordered signer list of an action, as the vault recorded it.
    async fn signers_of(&self, hash: &ActionHash) -> Result<Vec<Address>, BackendError>;
}

// ---------------------------------------------------------------------------
// VaultConnector
// ---------------------------------------------------------------------------

/// Factory half of the collaborator contract: deploy or attach.
#[async_trait]
pub trait VaultConnector: Send + Sync {
    /// Deploys a new vault with the given owners and threshold. The
    /// caller validates inputs first; the connector may still refuse.
    async fn create_vault(
        &self,
        owners: &[Address],
        threshold: usize,
    ) -> Result<Arc<dyn VaultBackend>, BackendError>;

    /// Attaches to an existing vault.
    ///
    /// # Errors
    ///
    /// [`BackendError::VaultNotFound`] when nothing lives at the address.
    async fn connect_vault(&self, address: &Address)
        -> Result<Arc<dyn VaultBackend>, BackendError>;
}
