//! # In-Memory Vault Chain
//!
//! A deterministic, process-local implementation of the vault collaborator
//! contracts. No I/O, no clocks to wait on — it exists so the integration
//! tests and the console demo can exercise full approval flows without a
//! node.
//!
//! The chain enforces its own rules independently of the client-side
//! engine, the way a real vault contract would: only owners may sign,
//! duplicate signatures are refused, and execution requires the threshold
//! to be met. What it deliberately does **not** enforce is the
//! last-signer-executes policy — that is client discipline, and keeping it
//! out of the chain is what makes the policy testable.
//!
//! Failure injection: [`InMemoryChain::revert_next_execution`] arms a
//! one-shot revert so callers can verify that a reverted execution leaves
//! the signer list intact.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use super::action::{ActionError, ActionHash, ActionKind, PendingAction};
use super::backend::{BackendError, ExecutionOutcome, VaultBackend, VaultConnector};
use crate::config::{CHAIN_ID_LOCAL, MIN_THRESHOLD};
use crate::identity::Address;

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// A process-local chain hosting any number of vaults.
pub struct InMemoryChain {
    chain_id: u64,
    vaults: DashMap<Address, Arc<VaultCell>>,
}

struct VaultCell {
    address: Address,
    state: RwLock<VaultState>,
}

struct VaultState {
    owners: Vec<Address>,
    threshold: usize,
    balance: u64,
    actions: HashMap<ActionHash, PendingAction>,
    revert_next: Option<String>,
}

impl InMemoryChain {
    /// Creates an empty chain with the local development chain id.
    pub fn new() -> Self {
        Self::with_chain_id(CHAIN_ID_LOCAL)
    }

    /// Creates an empty chain with an explicit chain id.
    pub fn with_chain_id(chain_id: u64) -> Self {
        Self {
            chain_id,
            vaults: DashMap::new(),
        }
    }

    /// The chain id this instance reports.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Number of deployed vaults.
    pub fn vault_count(&self) -> usize {
        self.vaults.len()
    }

    /// Credits a vault's balance. Stand-in for an inbound deposit.
    pub fn deposit(&self, vault: &Address, amount: u64) -> Result<(), BackendError> {
        let cell = self.cell(vault)?;
        let mut state = cell.state.write();
        state.balance = state.balance.saturating_add(amount);
        Ok(())
    }

    /// Arms a one-shot revert: the next `execute` on the vault fails with
    /// the given reason, leaving all action state untouched.
    pub fn revert_next_execution(
        &self,
        vault: &Address,
        reason: impl Into<String>,
    ) -> Result<(), BackendError> {
        let cell = self.cell(vault)?;
        cell.state.write().revert_next = Some(reason.into());
        Ok(())
    }

    fn cell(&self, address: &Address) -> Result<Arc<VaultCell>, BackendError> {
        self.vaults
            .get(address)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(BackendError::VaultNotFound { address: *address })
    }

    /// Derives a fresh vault address from the chain id and a random id.
    fn derive_address(&self) -> Address {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.chain_id.to_le_bytes());
        hasher.update(Uuid::new_v4().as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[..20]);
        Address::from_bytes(bytes)
    }
}

impl Default for InMemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VaultConnector for InMemoryChain {
    async fn create_vault(
        &self,
        owners: &[Address],
        threshold: usize,
    ) -> Result<Arc<dyn VaultBackend>, BackendError> {
        if owners.is_empty() {
            return Err(BackendError::InvalidProposal {
                reason: "a vault needs at least one owner".into(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for owner in owners {
            if !seen.insert(owner) {
                return Err(BackendError::InvalidProposal {
                    reason: format!("duplicate owner {}", owner),
                });
            }
        }
        if threshold < MIN_THRESHOLD || threshold > owners.len() {
            return Err(BackendError::InvalidProposal {
                reason: format!(
                    "threshold {} out of range for {} owner(s)",
                    threshold,
                    owners.len()
                ),
            });
        }

        let address = self.derive_address();
        let cell = Arc::new(VaultCell {
            address,
            state: RwLock::new(VaultState {
                owners: owners.to_vec(),
                threshold,
                balance: 0,
                actions: HashMap::new(),
                revert_next: None,
            }),
        });
        self.vaults.insert(address, Arc::clone(&cell));

        Ok(Arc::new(InMemoryVault { cell }))
    }

    async fn connect_vault(
        &self,
        address: &Address,
    ) -> Result<Arc<dyn VaultBackend>, BackendError> {
        let cell = self.cell(address)?;
        Ok(Arc::new(InMemoryVault { cell }))
    }
}

// ---------------------------------------------------------------------------
// Vault handle
// ---------------------------------------------------------------------------

/// Backend handle to one vault on an [`InMemoryChain`].
pub struct InMemoryVault {
    cell: Arc<VaultCell>,
}

impl InMemoryVault {
    fn record_signature(&self, hash: &ActionHash, account: &Address) -> Result<(), BackendError> {
        let mut state = self.cell.state.write();

        if !state.owners.contains(account) {
            return Err(BackendError::NotAnOwner { account: *account });
        }

        let action = state
            .actions
            .get_mut(hash)
            .ok_or(BackendError::UnknownAction { hash: *hash })?;

        action.record_signature(*account).map_err(|e| match e {
            ActionError::DuplicateSigner { account } => {
                BackendError::DuplicateSignature { account }
            }
            ActionError::NotPending { .. } => BackendError::ActionClosed,
        })
    }

    /// Applies an executed action to the vault state. Returns `Err` with a
    /// revert reason when the action no longer makes sense against the
    /// current state.
    fn apply(state: &mut VaultState, kind: &ActionKind) -> Result<(), String> {
        match kind {
            ActionKind::AddOwner { owner } => {
                if state.owners.contains(owner) {
                    return Err(format!("{} is already an owner", owner));
                }
                state.owners.push(*owner);
            }
            ActionKind::RemoveOwner { owner } => {
                let position = state
                    .owners
                    .iter()
                    .position(|o| o == owner)
                    .ok_or_else(|| format!("{} is not an owner", owner))?;
                if state.owners.len() == 1 {
                    return Err("cannot remove the last owner".to_string());
                }
                state.owners.remove(position);
                // The collaborator this stands in for takes a replacement
                // threshold with every removal; clamping is the
                // deterministic equivalent.
                state.threshold = state.threshold.min(state.owners.len());
            }
            ActionKind::ChangeThreshold { threshold } => {
                if *threshold < MIN_THRESHOLD || *threshold > state.owners.len() {
                    return Err(format!(
                        "threshold {} out of range for {} owner(s)",
                        threshold,
                        state.owners.len()
                    ));
                }
                state.threshold = *threshold;
            }
            ActionKind::Transfer { to, amount } => {
                if *amount > state.balance {
                    return Err(format!(
                        "insufficient funds: balance {}, transfer {} to {}",
                        state.balance, amount, to
                    ));
                }
                state.balance -= amount;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VaultBackend for InMemoryVault {
    async fn owners(&self) -> Result<Vec<Address>, BackendError> {
        Ok(self.cell.state.read().owners.clone())
    }

    async fn threshold(&self) -> Result<usize, BackendError> {
        Ok(self.cell.state.read().threshold)
    }

    async fn address(&self) -> Result<Address, BackendError> {
        Ok(self.cell.address)
    }

    async fn propose(&self, kind: ActionKind) -> Result<PendingAction, BackendError> {
        let mut state = self.cell.state.write();

        // Proposal-time sanity against current state. Execution re-checks,
        // because the state can change while signatures are collected.
        let refusal = match &kind {
            ActionKind::AddOwner { owner } if state.owners.contains(owner) => {
                Some(format!("{} is already an owner", owner))
            }
            ActionKind::RemoveOwner { owner } if !state.owners.contains(owner) => {
                Some(format!("{} is not an owner", owner))
            }
            ActionKind::RemoveOwner { .. } if state.owners.len() == 1 => {
                Some("cannot remove the last owner".to_string())
            }
            ActionKind::ChangeThreshold { threshold }
                if *threshold < MIN_THRESHOLD || *threshold > state.owners.len() =>
            {
                Some(format!(
                    "threshold {} out of range for {} owner(s)",
                    threshold,
                    state.owners.len()
                ))
            }
            _ => None,
        };
        if let Some(reason) = refusal {
            return Err(BackendError::InvalidProposal { reason });
        }

        let action = PendingAction::propose(&self.cell.address, kind);
        state.actions.insert(action.hash, action.clone());
        Ok(action)
    }

    async fn sign(&self, hash: &ActionHash, signer: &Address) -> Result<(), BackendError> {
        self.record_signature(hash, signer)
    }

    async fn approve(&self, hash: &ActionHash, approver: &Address) -> Result<(), BackendError> {
        self.record_signature(hash, approver)
    }

    async fn execute(
        &self,
        hash: &ActionHash,
        executor: &Address,
    ) -> Result<ExecutionOutcome, BackendError> {
        let mut state = self.cell.state.write();

        if !state.owners.contains(executor) {
            return Err(BackendError::NotAnOwner { account: *executor });
        }

        let (have, kind) = {
            let action = state
                .actions
                .get(hash)
                .ok_or(BackendError::UnknownAction { hash: *hash })?;
            if !action.is_pending() {
                return Err(BackendError::ActionClosed);
            }
            (action.signers.len(), action.kind)
        };

        let need = state.threshold;
        if have < need {
            return Err(BackendError::ThresholdNotReached { have, need });
        }

        if let Some(reason) = state.revert_next.take() {
            return Ok(ExecutionOutcome::Reverted { reason });
        }

        if let Err(reason) = Self::apply(&mut state, &kind) {
            return Ok(ExecutionOutcome::Reverted { reason });
        }

        let action = state
            .actions
            .get_mut(hash)
            .expect("action presence checked above");
        action
            .mark_executed()
            .expect("pending status checked above");

        Ok(ExecutionOutcome::Committed)
    }

    async fn signers_of(&self, hash: &ActionHash) -> Result<Vec<Address>, BackendError> {
        let state = self.cell.state.read();
        let action = state
            .actions
            .get(hash)
            .ok_or(BackendError::UnknownAction { hash: *hash })?;
        Ok(action.signers.as_slice().to_vec())
    }
}
