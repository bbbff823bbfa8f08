// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Covault — Core Library
//!
//! Coordination logic for co-owned vaults: a shared account whose every
//! state-changing action (add an owner, remove an owner, change the
//! approval threshold, move funds) requires a configurable number of
//! distinct owner approvals before it takes effect.
//!
//! The heart of the crate is small and deliberate: a pure decision engine
//! that, given a pending action, the owners who already signed it, the
//! threshold, and whoever is acting right now, says exactly what that
//! account should do — sign, approve, execute, or step aside. Everything
//! else exists to feed that function honest inputs and carry its output
//! out safely.
//!
//! ## Architecture
//!
//! - **identity** — Address parsing and the acting-account cell. The
//!   account driving a session changes asynchronously; reads carry an
//!   epoch so a stale one can never slip through an await point.
//! - **vault** — The cached owner roster and nickname map, pending
//!   actions with their ordered signer lists, and the collaborator
//!   contracts (plus an in-memory reference chain for tests and demos).
//! - **engine** — The approval decision engine. Pure, deterministic,
//!   tested against every branch of its decision table.
//! - **guard** — Owner check that runs before any intent goes external.
//! - **session** — The explicit session object tying it all together:
//!   validate, authorize, decide, carry out, re-fetch ground truth.
//! - **config** — Protocol constants.
//!
//! ## Design Philosophy
//!
//! 1. The cache mirrors the vault; it never predicts it. After an
//!    execution commits, owners and threshold are re-fetched — a
//!    signature that landed before a revert must stay visible.
//! 2. Signer order is sacred. The last signer is the one canonical
//!    executor; reordering would turn finalization into a race.
//! 3. Failures are messages, not states. Every rejection renders a short
//!    human-readable reason, and no failure poisons the session — each
//!    attempt is independently retryable.

pub mod config;
pub mod engine;
pub mod guard;
pub mod identity;
pub mod session;
pub mod vault;

pub use engine::{decide, Decision, RejectReason};
pub use guard::{ensure_owner, AuthorizationError};
pub use identity::{Address, AddressError, IdentityEvent, IdentityProvider};
pub use session::{ActionReport, ApproverEntry, ErrorClass, SessionError, VaultSession};
pub use vault::{
    ActionHash, ActionKind, ActionStatus, BackendError, ExecutionOutcome, InMemoryChain,
    OwnerRoster, PendingAction, SignerList, VaultBackend, VaultConnector,
};
