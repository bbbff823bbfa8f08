//! # Acting Account Cell
//!
//! The identity presently driving a vault session changes asynchronously —
//! the wallet can switch accounts between the moment a user triggers an
//! action and the moment a decision is computed. Treating that window
//! casually is how funds get moved by the wrong identity.
//!
//! The model here is a single-writer, many-reader cell:
//!
//! - [`AccountCell`] holds the current account behind a `tokio::sync::watch`
//!   channel. The identity-change handler is the only writer.
//! - Every write bumps an **epoch** counter. A flow that spans external
//!   await points captures an [`AccountSnapshot`] up front and re-checks it
//!   against the cell before each call; a mismatch means the identity (or
//!   the network) changed mid-flight and the flow must fail rather than
//!   proceed.
//!
//! [`IdentityProvider`] is the contract for the external wallet
//! collaborator; [`LocalIdentityProvider`] is the in-process implementation
//! used by tests and the console.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, watch};

use super::address::Address;

/// Broadcast capacity for identity events. Identity switches are rare and
/// human-paced; a small buffer absorbs any burst.
const IDENTITY_EVENT_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by an identity provider.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// The wallet has no connected account.
    #[error("no account is connected; connect a wallet first")]
    NoAccount,

    /// The provider itself failed.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Notifications emitted by the external wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityEvent {
    /// The wallet switched to a different account.
    AccountChanged(Address),
    /// The wallet switched chains. All in-progress decisions for the old
    /// chain are stale the instant this fires.
    NetworkChanged(u64),
}

// ---------------------------------------------------------------------------
// AccountCell
// ---------------------------------------------------------------------------

/// Internal cell state: the account plus a monotonically increasing epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    /// The current acting account, if any wallet is connected.
    pub account: Option<Address>,
    /// Bumped on every mutation, including same-account invalidations.
    pub epoch: u64,
}

/// Single-writer holder of the current acting account.
///
/// Readers never block the writer and always observe the latest value;
/// there is no way to read a cached account without also reading the epoch
/// that validates it.
#[derive(Debug)]
pub struct AccountCell {
    tx: watch::Sender<AccountState>,
}

impl AccountCell {
    /// Creates a cell with the given initial account at epoch 0.
    pub fn new(account: Option<Address>) -> Self {
        let (tx, _rx) = watch::channel(AccountState { account, epoch: 0 });
        Self { tx }
    }

    /// Replaces the acting account. This is the only mutation path outside
    /// of [`invalidate`](Self::invalidate); it must be driven by the
    /// external identity-change notification, never by flow-local guesses.
    pub fn set(&self, account: Option<Address>) {
        self.tx.send_modify(|state| {
            state.account = account;
            state.epoch += 1;
        });
    }

    /// Bumps the epoch without changing the account, failing every
    /// in-flight snapshot. Used on network switches, where the account may
    /// be unchanged but every pending decision is stale.
    pub fn invalidate(&self) {
        self.tx.send_modify(|state| {
            state.epoch += 1;
        });
    }

    /// Returns the latest acting account.
    pub fn current(&self) -> Option<Address> {
        self.tx.borrow().account
    }

    /// Captures the account and epoch for a flow about to cross an
    /// external call boundary.
    pub fn snapshot(&self) -> AccountSnapshot {
        let state = self.tx.borrow();
        AccountSnapshot {
            account: state.account,
            epoch: state.epoch,
        }
    }

    /// Subscribes to account changes.
    pub fn subscribe(&self) -> watch::Receiver<AccountState> {
        self.tx.subscribe()
    }
}

/// A point-in-time read of the [`AccountCell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSnapshot {
    /// The account observed at capture time.
    pub account: Option<Address>,
    /// The epoch observed at capture time.
    pub epoch: u64,
}

impl AccountSnapshot {
    /// Returns `true` when the cell still holds exactly this snapshot.
    /// A flow whose snapshot is no longer current must abort.
    pub fn is_current(&self, cell: &AccountCell) -> bool {
        let state = cell.tx.borrow();
        state.epoch == self.epoch && state.account == self.account
    }
}

// ---------------------------------------------------------------------------
// IdentityProvider
// ---------------------------------------------------------------------------

/// Contract for the external wallet collaborator.
///
/// The provider answers "who is acting right now" and pushes change
/// notifications. It never exposes key material — signing happens inside
/// the vault backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the currently connected account.
    ///
    /// # Errors
    ///
    /// [`IdentityError::NoAccount`] when no wallet is connected.
    async fn current_identity(&self) -> Result<Address, IdentityError>;

    /// Subscribes to account and network change notifications.
    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent>;
}

// ---------------------------------------------------------------------------
// LocalIdentityProvider
// ---------------------------------------------------------------------------

/// In-process identity provider.
///
/// Stands in for the browser wallet in tests and the console demo: the
/// harness switches accounts and networks explicitly, and subscribers see
/// the same events a real wallet would emit.
pub struct LocalIdentityProvider {
    current: RwLock<Option<Address>>,
    events: broadcast::Sender<IdentityEvent>,
}

impl LocalIdentityProvider {
    /// Creates a provider with an optional initially connected account.
    pub fn new(initial: Option<Address>) -> Self {
        let (events, _rx) = broadcast::channel(IDENTITY_EVENT_CAPACITY);
        Self {
            current: RwLock::new(initial),
            events,
        }
    }

    /// Switches the connected account and notifies subscribers.
    pub fn switch_account(&self, account: Address) {
        *self.current.write() = Some(account);
        let _ = self.events.send(IdentityEvent::AccountChanged(account));
    }

    /// Switches chains and notifies subscribers. The connected account is
    /// left as-is — chains share account namespaces.
    pub fn switch_network(&self, chain_id: u64) {
        let _ = self.events.send(IdentityEvent::NetworkChanged(chain_id));
    }

    /// Disconnects the wallet.
    pub fn disconnect(&self) {
        *self.current.write() = None;
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn current_identity(&self) -> Result<Address, IdentityError> {
        self.current.read().ok_or(IdentityError::NoAccount)
    }

    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        self.events.subscribe()
    }
}
