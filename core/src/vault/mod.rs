//! # Vault Module
//!
//! Everything a session knows about one vault, plus the contracts it uses
//! to talk to the external vault collaborator.
//!
//! ```text
//! roster.rs  — cached owner set + nickname map, rebuilt from ground truth
//! action.rs  — pending actions and their ordered signer lists
//! backend.rs — collaborator contracts: VaultBackend / VaultConnector
//! memory.rs  — deterministic in-memory chain for tests and the console
//! ```
//!
//! ## Design Decisions
//!
//! - The roster is a mirror, never a source: after any executed mutation
//!   the owner set and threshold are re-fetched from the backend. A
//!   partial failure (signature accepted, execution reverted) must surface
//!   as-is instead of being papered over by a local guess.
//! - Signer lists are append-only and keep submission order; the decision
//!   engine's executor selection depends on it.
//! - The backend traits are object-safe and carry identities only — key
//!   material never crosses this seam.

pub mod action;
pub mod backend;
pub mod memory;
pub mod roster;

pub use action::{ActionError, ActionHash, ActionKind, ActionStatus, PendingAction, SignerList};
pub use backend::{BackendError, ExecutionOutcome, VaultBackend, VaultConnector};
pub use memory::{InMemoryChain, InMemoryVault};
pub use roster::{OwnerRoster, RosterError};
