//! End-to-end approval flow tests for the Covault core.
//!
//! These tests exercise full action lifecycles across module boundaries:
//! session construction, boundary validation, the decision engine's
//! step-by-step chain under account switches, executor canonicalization,
//! revert resumability, and the roster/nickname invariants after refresh.
//!
//! Each test stands alone with its own in-memory chain. No shared state,
//! no test ordering dependencies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;

use covault_core::identity::{AccountCell, LocalIdentityProvider};
use covault_core::session::{ApproverEntry, SessionError, VaultSession};
use covault_core::vault::action::{ActionHash, ActionKind, PendingAction};
use covault_core::{
    ActionStatus, Address, BackendError, Decision, ExecutionOutcome, InMemoryChain, RejectReason,
    VaultBackend, VaultConnector,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

fn hex_addr(byte: u8) -> String {
    format!("0x{}", hex::encode([byte; 20]))
}

/// Deploys a vault with single-byte-pattern owners and opens a session as
/// `acting`.
async fn create_session(
    chain: &InMemoryChain,
    owners: &[u8],
    threshold: usize,
    acting: u8,
) -> VaultSession {
    let provider = LocalIdentityProvider::new(Some(addr(acting)));
    let entries: Vec<ApproverEntry> = owners
        .iter()
        .map(|b| ApproverEntry::new(hex_addr(*b)))
        .collect();
    VaultSession::create(chain, &provider, &entries, threshold)
        .await
        .expect("vault deploys")
}

// ---------------------------------------------------------------------------
// 1. Full add-owner lifecycle across account switches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_owner_two_of_three_lifecycle() {
    let chain = InMemoryChain::new();
    let mut session = create_session(&chain, &[1, 2, 3], 2, 1).await;

    // Owner 1 proposes and signs.
    let report = session
        .propose_add_owner(&hex_addr(4), Some("dana".into()))
        .await
        .unwrap();
    assert_eq!(report.decision, Decision::Sign);
    assert_eq!(report.signatures, 1);
    assert_eq!(report.status, ActionStatus::Pending);
    let hash = report.hash;

    // Owner 2 is one short of the threshold: sign and execute in one call.
    session.handle_identity_change(addr(2));
    let report = session.advance(hash).await.unwrap();
    assert_eq!(report.decision, Decision::SignAndExecute);
    assert_eq!(report.status, ActionStatus::Executed);

    // The roster was re-fetched from the chain, not locally patched.
    assert_eq!(
        session.roster().owners(),
        &[addr(1), addr(2), addr(3), addr(4)]
    );
    assert_eq!(session.roster().nickname(&addr(4)), Some("dana"));
    assert_eq!(session.pending_actions().count(), 0);

    // A fresh session sees the same ground truth.
    let provider = LocalIdentityProvider::new(Some(addr(4)));
    let vault = session.vault_address().to_string();
    let reconnected = VaultSession::connect(&chain, &provider, &vault)
        .await
        .unwrap();
    assert_eq!(reconnected.roster().len(), 4);
    assert_eq!(reconnected.threshold(), 2);
}

// ---------------------------------------------------------------------------
// 2. Three-of-three chain: sign, approve, sign-and-execute
// ---------------------------------------------------------------------------

#[tokio::test]
async fn threshold_three_full_chain() {
    let chain = InMemoryChain::new();
    let mut session = create_session(&chain, &[1, 2, 3], 3, 1).await;

    let report = session.propose_change_threshold(2).await.unwrap();
    assert_eq!(report.decision, Decision::Sign);
    let hash = report.hash;

    // Second signer only approves — one more is still needed after them.
    session.handle_identity_change(addr(2));
    let report = session.advance(hash).await.unwrap();
    assert_eq!(report.decision, Decision::Approve);
    assert_eq!(report.signatures, 2);

    // Third signer closes the threshold and executes.
    session.handle_identity_change(addr(3));
    let report = session.advance(hash).await.unwrap();
    assert_eq!(report.decision, Decision::SignAndExecute);
    assert_eq!(report.status, ActionStatus::Executed);
    assert_eq!(session.threshold(), 2);
}

// ---------------------------------------------------------------------------
// 3. Canonical executor after a revert
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_the_last_signer_may_finalize() {
    let chain = InMemoryChain::new();
    let mut session = create_session(&chain, &[1, 2, 3], 2, 1).await;
    let vault = *session.vault_address();

    let hash = session.propose_change_threshold(3).await.unwrap().hash;

    // Owner 2's signature lands, but the execution reverts, leaving a
    // fully approved, unexecuted action.
    chain.revert_next_execution(&vault, "base fee spiked").unwrap();
    session.handle_identity_change(addr(2));
    let result = session.advance(hash).await;
    assert!(matches!(result, Err(SessionError::ExecutionReverted { .. })));

    // Owners 1 and 3 are both redirected to owner 2 by name.
    for stray in [1u8, 3u8] {
        session.handle_identity_change(addr(stray));
        match session.advance(hash).await {
            Err(SessionError::Rejected(RejectReason::WrongExecutor { expected })) => {
                assert_eq!(expected, addr(2));
            }
            other => panic!("expected WrongExecutor, got {:?}", other.map(|r| r.decision)),
        }
    }

    // Owner 2 resumes and finalizes; nothing was lost to the revert.
    session.handle_identity_change(addr(2));
    let report = session.advance(hash).await.unwrap();
    assert_eq!(report.decision, Decision::Execute);
    assert_eq!(session.threshold(), 3);
}

// ---------------------------------------------------------------------------
// 4. Identity switch between sign and execute
// ---------------------------------------------------------------------------

/// Connector that wraps every vault handle in a [`SwitchingVault`].
struct SwitchingConnector {
    inner: Arc<InMemoryChain>,
    cell: Arc<OnceLock<Arc<AccountCell>>>,
    armed: Arc<AtomicBool>,
    switch_to: Address,
}

/// Backend wrapper that flips the acting account right after a signature
/// lands — the wallet-switched-mid-flow hazard, made deterministic.
struct SwitchingVault {
    inner: Arc<dyn VaultBackend>,
    cell: Arc<OnceLock<Arc<AccountCell>>>,
    armed: Arc<AtomicBool>,
    switch_to: Address,
}

#[async_trait]
impl VaultConnector for SwitchingConnector {
    async fn create_vault(
        &self,
        owners: &[Address],
        threshold: usize,
    ) -> Result<Arc<dyn VaultBackend>, BackendError> {
        let inner = self.inner.create_vault(owners, threshold).await?;
        Ok(Arc::new(SwitchingVault {
            inner,
            cell: Arc::clone(&self.cell),
            armed: Arc::clone(&self.armed),
            switch_to: self.switch_to,
        }))
    }

    async fn connect_vault(
        &self,
        address: &Address,
    ) -> Result<Arc<dyn VaultBackend>, BackendError> {
        let inner = self.inner.connect_vault(address).await?;
        Ok(Arc::new(SwitchingVault {
            inner,
            cell: Arc::clone(&self.cell),
            armed: Arc::clone(&self.armed),
            switch_to: self.switch_to,
        }))
    }
}

#[async_trait]
impl VaultBackend for SwitchingVault {
    async fn owners(&self) -> Result<Vec<Address>, BackendError> {
        self.inner.owners().await
    }

    async fn threshold(&self) -> Result<usize, BackendError> {
        self.inner.threshold().await
    }

    async fn address(&self) -> Result<Address, BackendError> {
        self.inner.address().await
    }

    async fn propose(&self, kind: ActionKind) -> Result<PendingAction, BackendError> {
        self.inner.propose(kind).await
    }

    async fn sign(&self, hash: &ActionHash, signer: &Address) -> Result<(), BackendError> {
        self.inner.sign(hash, signer).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            if let Some(cell) = self.cell.get() {
                cell.set(Some(self.switch_to));
            }
        }
        Ok(())
    }

    async fn approve(&self, hash: &ActionHash, approver: &Address) -> Result<(), BackendError> {
        self.inner.approve(hash, approver).await
    }

    async fn execute(
        &self,
        hash: &ActionHash,
        executor: &Address,
    ) -> Result<ExecutionOutcome, BackendError> {
        self.inner.execute(hash, executor).await
    }

    async fn signers_of(&self, hash: &ActionHash) -> Result<Vec<Address>, BackendError> {
        self.inner.signers_of(hash).await
    }
}

#[tokio::test]
async fn identity_switch_between_sign_and_execute_fails_the_flow() {
    let chain = Arc::new(InMemoryChain::new());
    let cell: Arc<OnceLock<Arc<AccountCell>>> = Arc::new(OnceLock::new());
    let armed = Arc::new(AtomicBool::new(false));
    let connector = SwitchingConnector {
        inner: Arc::clone(&chain),
        cell: Arc::clone(&cell),
        armed: Arc::clone(&armed),
        switch_to: addr(1),
    };

    let provider = LocalIdentityProvider::new(Some(addr(1)));
    let entries = vec![
        ApproverEntry::new(hex_addr(1)),
        ApproverEntry::new(hex_addr(2)),
    ];
    let mut session = VaultSession::create(&connector, &provider, &entries, 2)
        .await
        .unwrap();
    cell.set(session.account_cell()).ok().unwrap();

    // Owner 1 signs first, unarmed.
    let hash = session.propose_change_threshold(1).await.unwrap().hash;

    // Owner 2 would sign and execute — but the wallet flips back to
    // owner 1 the instant the signature lands. The flow must fail
    // between the two calls rather than execute as a mismatched identity.
    session.handle_identity_change(addr(2));
    armed.store(true, Ordering::SeqCst);
    let result = session.advance(hash).await;
    assert!(matches!(result, Err(SessionError::IdentityChanged)));

    // The signature was accepted before the switch; the threshold is
    // untouched because execution never went out.
    assert_eq!(session.threshold(), 2);

    // Owner 2 (the final slot holder) resumes and finalizes cleanly.
    session.handle_identity_change(addr(2));
    let report = session.advance(hash).await.unwrap();
    assert_eq!(report.decision, Decision::Execute);
    assert_eq!(session.threshold(), 1);
}

// ---------------------------------------------------------------------------
// 5. Transfers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transfer_flow_under_threshold_two() {
    let chain = InMemoryChain::new();
    let mut session = create_session(&chain, &[1, 2], 2, 1).await;
    chain.deposit(session.vault_address(), 10_000).unwrap();

    let report = session.propose_transfer(&hex_addr(9), 2_500).await.unwrap();
    assert_eq!(report.decision, Decision::Sign);
    let hash = report.hash;

    session.handle_identity_change(addr(2));
    let report = session.advance(hash).await.unwrap();
    assert_eq!(report.decision, Decision::SignAndExecute);
    assert_eq!(report.status, ActionStatus::Executed);
}

#[tokio::test]
async fn overdrawn_transfer_reverts_and_stays_resumable() {
    let chain = InMemoryChain::new();
    let mut session = create_session(&chain, &[1, 2], 2, 1).await;
    chain.deposit(session.vault_address(), 100).unwrap();

    let hash = session.propose_transfer(&hex_addr(9), 500).await.unwrap().hash;

    session.handle_identity_change(addr(2));
    let result = session.advance(hash).await;
    assert!(matches!(result, Err(SessionError::ExecutionReverted { .. })));

    // Funding the vault makes the same action executable by the same
    // canonical executor — no re-signing required.
    chain.deposit(session.vault_address(), 1_000).unwrap();
    let report = session.advance(hash).await.unwrap();
    assert_eq!(report.decision, Decision::Execute);
    assert_eq!(report.status, ActionStatus::Executed);
}

// ---------------------------------------------------------------------------
// 6. Roster and nickname invariants
// ---------------------------------------------------------------------------

#[tokio::test]
async fn nickname_map_tracks_owner_set_through_add_and_remove() {
    let chain = InMemoryChain::new();
    let provider = LocalIdentityProvider::new(Some(addr(1)));
    let entries = vec![
        ApproverEntry::named(hex_addr(1), "alice"),
        ApproverEntry::named(hex_addr(2), "bob"),
    ];
    let mut session = VaultSession::create(&chain, &provider, &entries, 1)
        .await
        .unwrap();

    // Threshold 1: each mutation is a one-call sign-and-execute.
    session.propose_add_owner(&hex_addr(3), None).await.unwrap();
    assert_eq!(session.roster().len(), 3);
    // The newcomer got a positional default.
    assert_eq!(session.roster().nickname(&addr(3)), Some("owner 1"));

    session.propose_remove_owner(&addr(2)).await.unwrap();
    assert_eq!(session.roster().owners(), &[addr(1), addr(3)]);
    assert!(session.roster().nickname(&addr(2)).is_none());

    // Key set equals owner set exactly, survivors keep their labels.
    assert_eq!(
        session.roster().nicknames().len(),
        session.roster().owners().len()
    );
    assert_eq!(session.roster().nickname(&addr(1)), Some("alice"));
}

// ---------------------------------------------------------------------------
// 7. Validation stays local
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_inputs_never_reach_the_chain() {
    let chain = InMemoryChain::new();
    let provider = LocalIdentityProvider::new(Some(addr(1)));

    // Malformed vault address on connect.
    assert!(matches!(
        VaultSession::connect(&chain, &provider, "0xZZZ").await,
        Err(SessionError::InvalidAddress(_))
    ));

    // Malformed new-owner address on an established session.
    let mut session = create_session(&chain, &[1], 1, 1).await;
    assert!(matches!(
        session.propose_add_owner("not-an-address", None).await,
        Err(SessionError::InvalidAddress(_))
    ));
    assert_eq!(session.pending_actions().count(), 0);
}
