//! # Vault Session
//!
//! The explicit session object that owns everything the UI layer used to
//! keep in ambient state: the cached owner roster and threshold, the
//! acting-account cell, and the set of tracked pending actions. Callers
//! hold one session per connected vault and pass it by reference; nothing
//! in this crate reads vault state from anywhere else.
//!
//! ## Flow
//!
//! A mutating intent (add owner, remove owner, change threshold, transfer)
//! goes through four stages:
//!
//! 1. **Validate** — address shape, duplicates, threshold range. Rejected
//!    locally, before any external call.
//! 2. **Authorize** — the acting account must be a current owner
//!    ([`crate::guard::ensure_owner`], cache read only).
//! 3. **Decide** — the engine ([`crate::engine::decide`]) maps the live
//!    signer list and the latest acting account to one step.
//! 4. **Carry out** — the step is performed against the vault backend,
//!    and on a committed execution the owner set and threshold are
//!    re-fetched from the backend. The session never updates them from
//!    local arithmetic; a reverted execution leaves the signer list
//!    untouched so the action stays resumable.
//!
//! ## Identity hazards
//!
//! The acting account can change between any two external calls. Every
//! flow captures an [`AccountSnapshot`] up front and re-checks it at each
//! suspend point; a mismatch fails the flow with
//! [`SessionError::IdentityChanged`] instead of proceeding with the wrong
//! identity. A network switch invalidates the session outright — tracked
//! actions are discarded and every subsequent operation asks the caller
//! to reconnect.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{network_name, MIN_THRESHOLD};
use crate::engine::{decide, Decision, RejectReason};
use crate::guard::{ensure_owner, AuthorizationError};
use crate::identity::{
    AccountCell, AccountSnapshot, Address, AddressError, IdentityError, IdentityEvent,
    IdentityProvider,
};
use crate::vault::{
    ActionHash, ActionKind, ActionStatus, BackendError, ExecutionOutcome, OwnerRoster,
    PendingAction, RosterError, SignerList, VaultBackend, VaultConnector,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything a session operation can fail with. `Display` renders the
/// short human-readable message shown to the user; [`SessionError::class`]
/// gives the coarse category.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An address-shaped input failed the strict hex check.
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    /// A create-vault call with no approvers at all.
    #[error("add at least one approver")]
    NoApprovers,

    /// The same address appears twice in a create-vault owner list.
    #[error("duplicate owner {account} in the approver list")]
    DuplicateOwner {
        /// The repeated address.
        account: Address,
    },

    /// A threshold outside `1..=owner count`.
    #[error("threshold {threshold} is out of range for {owners} owner(s)")]
    ThresholdOutOfRange {
        /// The requested threshold.
        threshold: usize,
        /// The number of owners it was checked against.
        owners: usize,
    },

    /// The identity provider could not supply an acting account.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The acting account is not an owner.
    #[error(transparent)]
    Unauthorized(#[from] AuthorizationError),

    /// The roster rejected an owner list or nickname operation.
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// The decision engine rejected the step.
    #[error(transparent)]
    Rejected(RejectReason),

    /// The hash does not name an action this session tracks.
    #[error("unknown action {hash}")]
    UnknownAction {
        /// The unrecognized hash.
        hash: ActionHash,
    },

    /// The acting account changed while the operation was in flight.
    #[error("the acting account changed mid-operation; retry as the new account")]
    IdentityChanged,

    /// The network changed; everything this session cached is stale.
    #[error("the network changed; reconnect the vault session")]
    SessionInvalidated,

    /// The vault collaborator failed; its reason is passed through.
    #[error(transparent)]
    External(#[from] BackendError),

    /// Execution reached the vault and the vault said no. The action's
    /// signer list is untouched and the action stays resumable.
    #[error("execution reverted: {reason}")]
    ExecutionReverted {
        /// Vault-supplied revert reason.
        reason: String,
    },
}

/// Coarse failure category, mirroring where in the pipeline the failure
/// was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorClass {
    /// Malformed input; rejected before any external call.
    Validation,
    /// The acting account may not perform the operation.
    Authorization,
    /// The step conflicts with signatures or identity changes already
    /// in place.
    Concurrency,
    /// The external collaborator failed or reverted.
    External,
}

impl SessionError {
    /// Classifies this error for display and logging.
    pub fn class(&self) -> ErrorClass {
        match self {
            SessionError::InvalidAddress(_)
            | SessionError::NoApprovers
            | SessionError::DuplicateOwner { .. }
            | SessionError::ThresholdOutOfRange { .. }
            | SessionError::Roster(_)
            | SessionError::UnknownAction { .. } => ErrorClass::Validation,
            SessionError::Identity(_) | SessionError::Unauthorized(_) => ErrorClass::Authorization,
            SessionError::Rejected(_)
            | SessionError::IdentityChanged
            | SessionError::SessionInvalidated => ErrorClass::Concurrency,
            SessionError::External(_) | SessionError::ExecutionReverted { .. } => {
                ErrorClass::External
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs / outputs
// ---------------------------------------------------------------------------

/// One approver row from a create-vault form: raw address input plus an
/// optional display name.
#[derive(Debug, Clone)]
pub struct ApproverEntry {
    /// Address as typed; validated before anything else happens.
    pub address: String,
    /// Optional nickname. Empty strings count as absent.
    pub name: Option<String>,
}

impl ApproverEntry {
    /// Entry without a nickname.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    /// Entry with a nickname.
    pub fn named(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }
}

/// What one session step did to an action — returned to the UI layer
/// after every propose/advance call.
#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    /// The action's hash.
    pub hash: ActionHash,
    /// What the action does.
    pub kind: ActionKind,
    /// The decision that was carried out.
    pub decision: Decision,
    /// Signatures recorded after this step.
    pub signatures: usize,
    /// The vault's threshold at decision time.
    pub threshold: usize,
    /// Action lifecycle state after this step.
    pub status: ActionStatus,
}

// ---------------------------------------------------------------------------
// VaultSession
// ---------------------------------------------------------------------------

/// A live session against one vault.
pub struct VaultSession {
    backend: Arc<dyn VaultBackend>,
    vault_address: Address,
    roster: OwnerRoster,
    threshold: usize,
    account: Arc<AccountCell>,
    pending: HashMap<ActionHash, PendingAction>,
    pending_nicknames: HashMap<ActionHash, String>,
    invalidated: bool,
}

impl VaultSession {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Connects to an existing vault.
    ///
    /// The address input is validated locally first; nothing reaches the
    /// connector unless it is a well-formed address.
    pub async fn connect(
        connector: &dyn VaultConnector,
        provider: &dyn IdentityProvider,
        address_input: &str,
    ) -> Result<Self, SessionError> {
        let vault_address = Address::parse(address_input)?;
        let account = provider.current_identity().await?;
        let backend = connector.connect_vault(&vault_address).await?;

        let session = Self::load(backend, account).await?;
        info!(
            vault = %session.vault_address,
            owners = session.roster.len(),
            threshold = session.threshold,
            account = %account.short(),
            "connected to vault"
        );
        Ok(session)
    }

    /// Deploys a new vault and opens a session on it.
    ///
    /// Every approver address is validated, duplicates and out-of-range
    /// thresholds are rejected — all before the connector is contacted.
    pub async fn create(
        connector: &dyn VaultConnector,
        provider: &dyn IdentityProvider,
        approvers: &[ApproverEntry],
        threshold: usize,
    ) -> Result<Self, SessionError> {
        if approvers.is_empty() {
            return Err(SessionError::NoApprovers);
        }

        let mut owners = Vec::with_capacity(approvers.len());
        let mut names: HashMap<Address, String> = HashMap::new();
        let mut seen = HashSet::new();
        for entry in approvers {
            let owner = Address::parse(&entry.address)?;
            if !seen.insert(owner) {
                return Err(SessionError::DuplicateOwner { account: owner });
            }
            owners.push(owner);
            if let Some(name) = entry.name.as_deref().filter(|n| !n.trim().is_empty()) {
                names.insert(owner, name.trim().to_string());
            }
        }
        if threshold < MIN_THRESHOLD || threshold > owners.len() {
            return Err(SessionError::ThresholdOutOfRange {
                threshold,
                owners: owners.len(),
            });
        }

        let account = provider.current_identity().await?;
        let backend = connector.create_vault(&owners, threshold).await?;
        let mut session = Self::load(backend, account).await?;

        // Names attach by address, so whatever order the vault reports
        // its owners in, each one gets the label it was created with.
        for (owner, name) in names {
            if let Err(e) = session.roster.set_nickname(&owner, name) {
                warn!(owner = %owner, error = %e, "vault did not report a created owner");
            }
        }

        info!(
            vault = %session.vault_address,
            owners = session.roster.len(),
            threshold = session.threshold,
            "created new vault"
        );
        Ok(session)
    }

    /// Loads ground truth from a freshly obtained backend handle.
    async fn load(
        backend: Arc<dyn VaultBackend>,
        account: Address,
    ) -> Result<Self, SessionError> {
        let vault_address = backend.address().await?;
        let owners = backend.owners().await?;
        let threshold = backend.threshold().await?;
        let roster = OwnerRoster::from_owners(owners)?;

        Ok(Self {
            backend,
            vault_address,
            roster,
            threshold,
            account: Arc::new(AccountCell::new(Some(account))),
            pending: HashMap::new(),
            pending_nicknames: HashMap::new(),
            invalidated: false,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The vault's address.
    pub fn vault_address(&self) -> &Address {
        &self.vault_address
    }

    /// The cached owner roster.
    pub fn roster(&self) -> &OwnerRoster {
        &self.roster
    }

    /// The cached approval threshold.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// The latest acting account.
    pub fn current_account(&self) -> Option<Address> {
        self.account.current()
    }

    /// The acting-account cell, for wiring an identity subscription task.
    /// The identity-change handler must be the cell's only writer.
    pub fn account_cell(&self) -> Arc<AccountCell> {
        Arc::clone(&self.account)
    }

    /// Actions this session is tracking, in no particular order.
    pub fn pending_actions(&self) -> impl Iterator<Item = &PendingAction> {
        self.pending.values()
    }

    /// Whether a network switch has invalidated this session.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    // -----------------------------------------------------------------------
    // Identity / network events
    // -----------------------------------------------------------------------

    /// Routes an identity-provider event to the right handler.
    pub fn apply_event(&mut self, event: IdentityEvent) {
        match event {
            IdentityEvent::AccountChanged(account) => self.handle_identity_change(account),
            IdentityEvent::NetworkChanged(chain_id) => self.handle_network_change(chain_id),
        }
    }

    /// The external wallet switched accounts. This is the only path that
    /// changes the acting account after construction.
    pub fn handle_identity_change(&self, account: Address) {
        debug!(account = %account.short(), "acting account changed");
        self.account.set(Some(account));
    }

    /// The external wallet switched chains. Every cached decision is for
    /// the wrong vault now: tracked actions are discarded and the session
    /// refuses further work until the caller reconnects.
    pub fn handle_network_change(&mut self, chain_id: u64) {
        warn!(
            network = %network_name(chain_id),
            discarded = self.pending.len(),
            "network changed; session invalidated"
        );
        for action in self.pending.values_mut() {
            let _ = action.discard();
        }
        self.pending.clear();
        self.pending_nicknames.clear();
        self.account.invalidate();
        self.invalidated = true;
    }

    // -----------------------------------------------------------------------
    // Mutating intents
    // -----------------------------------------------------------------------

    /// Proposes adding an owner, with an optional nickname applied once
    /// the addition actually executes.
    pub async fn propose_add_owner(
        &mut self,
        address_input: &str,
        nickname: Option<String>,
    ) -> Result<ActionReport, SessionError> {
        let owner = Address::parse(address_input)?;
        self.propose(ActionKind::AddOwner { owner }, nickname).await
    }

    /// Proposes removing a current owner.
    pub async fn propose_remove_owner(
        &mut self,
        owner: &Address,
    ) -> Result<ActionReport, SessionError> {
        self.propose(ActionKind::RemoveOwner { owner: *owner }, None)
            .await
    }

    /// Proposes changing the approval threshold. The new value is checked
    /// against the cached owner count before anything external happens.
    pub async fn propose_change_threshold(
        &mut self,
        threshold: usize,
    ) -> Result<ActionReport, SessionError> {
        if threshold < MIN_THRESHOLD || threshold > self.roster.len() {
            return Err(SessionError::ThresholdOutOfRange {
                threshold,
                owners: self.roster.len(),
            });
        }
        self.propose(ActionKind::ChangeThreshold { threshold }, None)
            .await
    }

    /// Proposes moving funds out of the vault.
    pub async fn propose_transfer(
        &mut self,
        to_input: &str,
        amount: u64,
    ) -> Result<ActionReport, SessionError> {
        let to = Address::parse(to_input)?;
        self.propose(ActionKind::Transfer { to, amount }, None).await
    }

    /// Shared propose path: guard, backend proposal, then one immediate
    /// engine step for the acting account.
    async fn propose(
        &mut self,
        kind: ActionKind,
        nickname: Option<String>,
    ) -> Result<ActionReport, SessionError> {
        self.ensure_live()?;
        let snap = self.account.snapshot();
        let account = snap.account.ok_or(IdentityError::NoAccount)?;
        ensure_owner(&self.roster, &account)?;

        let action = self.backend.propose(kind).await?;

        // Track the proposal before anything can fail: if the identity
        // switched while the proposal was in flight, the action still
        // exists on the vault and must stay advanceable.
        let hash = action.hash;
        debug!(action = %hash, kind = %action.kind, "action proposed");
        if let Some(name) = nickname.filter(|n| !n.trim().is_empty()) {
            self.pending_nicknames.insert(hash, name.trim().to_string());
        }
        self.pending.insert(hash, action);
        self.ensure_fresh(&snap)?;

        self.advance(hash).await
    }

    /// Computes and carries out the next step for the acting account on a
    /// tracked action.
    ///
    /// The signer list is fetched live from the backend and the acting
    /// account is re-read at decision time — never values captured when
    /// the user intent began.
    pub async fn advance(&mut self, hash: ActionHash) -> Result<ActionReport, SessionError> {
        self.ensure_live()?;
        if !self.pending.contains_key(&hash) {
            return Err(SessionError::UnknownAction { hash });
        }

        let snap = self.account.snapshot();
        let account = snap.account.ok_or(IdentityError::NoAccount)?;
        ensure_owner(&self.roster, &account)?;

        let signers: SignerList = self.backend.signers_of(&hash).await?.into_iter().collect();
        self.ensure_fresh(&snap)?;
        self.sync_mirror(hash, &signers);

        let decision = decide(self.threshold, &signers, &account, &self.roster);
        debug!(
            action = %hash,
            account = %account.short(),
            signatures = signers.len(),
            threshold = self.threshold,
            decision = ?decision,
            "decision computed"
        );

        match decision.clone() {
            Decision::Reject(reason) => Err(SessionError::Rejected(reason)),
            Decision::Sign => {
                self.backend.sign(&hash, &account).await?;
                self.record_local(hash, account);
                Ok(self.report(hash, decision))
            }
            Decision::Approve => {
                self.backend.approve(&hash, &account).await?;
                self.record_local(hash, account);
                Ok(self.report(hash, decision))
            }
            Decision::SignAndExecute => {
                self.backend.sign(&hash, &account).await?;
                self.record_local(hash, account);
                // The identity can switch between the signature landing
                // and the execution going out; executing as the wrong
                // account is exactly the race this check closes.
                self.ensure_fresh(&snap)?;
                self.execute_action(hash, &account, decision).await
            }
            Decision::Execute => self.execute_action(hash, &account, decision).await,
        }
    }

    /// Previews the engine's decision for the acting account without
    /// touching the backend. Uses the session's mirror of the signer
    /// list, so it is a hint for UI affordances, not a commitment.
    pub fn preview(&self, hash: &ActionHash) -> Result<Decision, SessionError> {
        let action = self
            .pending
            .get(hash)
            .ok_or(SessionError::UnknownAction { hash: *hash })?;
        let account = self
            .account
            .current()
            .ok_or(SessionError::Identity(IdentityError::NoAccount))?;
        Ok(decide(self.threshold, &action.signers, &account, &self.roster))
    }

    /// Abandons a tracked action.
    pub fn discard_action(&mut self, hash: &ActionHash) -> Result<(), SessionError> {
        let mut action = self
            .pending
            .remove(hash)
            .ok_or(SessionError::UnknownAction { hash: *hash })?;
        let _ = action.discard();
        self.pending_nicknames.remove(hash);
        debug!(action = %hash, "action discarded");
        Ok(())
    }

    /// Edits an owner's nickname in the cached roster.
    pub fn set_nickname(
        &mut self,
        owner: &Address,
        nickname: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.roster.set_nickname(owner, nickname)?;
        Ok(())
    }

    /// Re-fetches the owner set and threshold from the backend. The only
    /// way cached vault state changes after load.
    pub async fn refresh(&mut self) -> Result<(), SessionError> {
        let owners = self.backend.owners().await?;
        let threshold = self.backend.threshold().await?;
        self.roster.reconcile(owners)?;
        self.threshold = threshold;
        debug!(
            owners = self.roster.len(),
            threshold = self.threshold,
            "vault state refreshed"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn execute_action(
        &mut self,
        hash: ActionHash,
        executor: &Address,
        decision: Decision,
    ) -> Result<ActionReport, SessionError> {
        match self.backend.execute(&hash, executor).await? {
            ExecutionOutcome::Committed => {
                if let Some(action) = self.pending.get_mut(&hash) {
                    let _ = action.mark_executed();
                }
                info!(
                    vault = %self.vault_address,
                    action = %hash,
                    executor = %executor.short(),
                    "action executed"
                );

                self.refresh().await?;
                self.apply_pending_nickname(hash);

                let report = self.report(hash, decision);
                self.pending.remove(&hash);
                Ok(report)
            }
            ExecutionOutcome::Reverted { reason } => {
                warn!(
                    vault = %self.vault_address,
                    action = %hash,
                    reason = %reason,
                    "execution reverted; action remains resumable"
                );
                Err(SessionError::ExecutionReverted { reason })
            }
        }
    }

    /// Applies the nickname registered for an add-owner action, now that
    /// the owner actually exists in the refreshed roster.
    fn apply_pending_nickname(&mut self, hash: ActionHash) {
        let Some(name) = self.pending_nicknames.remove(&hash) else {
            return;
        };
        let Some(action) = self.pending.get(&hash) else {
            return;
        };
        if let ActionKind::AddOwner { owner } = action.kind {
            if let Err(e) = self.roster.set_nickname(&owner, name) {
                warn!(owner = %owner, error = %e, "added owner missing from refreshed roster");
            }
        }
    }

    /// Replaces the mirror's signer list with backend ground truth.
    fn sync_mirror(&mut self, hash: ActionHash, signers: &SignerList) {
        if let Some(action) = self.pending.get_mut(&hash) {
            action.signers = signers.clone();
        }
    }

    /// Appends the acting account's fresh signature to the mirror.
    fn record_local(&mut self, hash: ActionHash, account: Address) {
        if let Some(action) = self.pending.get_mut(&hash) {
            let _ = action.record_signature(account);
        }
    }

    fn report(&self, hash: ActionHash, decision: Decision) -> ActionReport {
        let action = &self.pending[&hash];
        ActionReport {
            hash,
            kind: action.kind,
            decision,
            signatures: action.signers.len(),
            threshold: self.threshold,
            status: action.status,
        }
    }

    fn ensure_live(&self) -> Result<(), SessionError> {
        if self.invalidated {
            return Err(SessionError::SessionInvalidated);
        }
        Ok(())
    }

    /// Fails the flow when the acting account (or the epoch behind it)
    /// moved since the snapshot was taken.
    fn ensure_fresh(&self, snap: &AccountSnapshot) -> Result<(), SessionError> {
        if self.invalidated {
            return Err(SessionError::SessionInvalidated);
        }
        if !snap.is_current(&self.account) {
            return Err(SessionError::IdentityChanged);
        }
        Ok(())
    }
}
