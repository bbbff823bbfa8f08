//! # Identity Module
//!
//! Who is acting, and how we find out when that changes.
//!
//! ```text
//! address.rs — 20-byte address type with strict hex parsing
//! account.rs — single-writer acting-account cell, identity provider contract
//! ```
//!
//! The acting account is the one piece of session state that mutates from
//! the outside at arbitrary times. Everything here exists to make a stale
//! read of it impossible to miss: reads carry an epoch, and flows that span
//! external calls verify the epoch at every boundary.

pub mod account;
pub mod address;

pub use account::{
    AccountCell, AccountSnapshot, AccountState, IdentityError, IdentityEvent, IdentityProvider,
    LocalIdentityProvider,
};
pub use address::{Address, AddressError};
