//! # Protocol Constants
//!
//! Every magic number in Covault lives here. The address geometry matches
//! the 20-byte account format used by the vault collaborator; the chain
//! identifiers cover the networks the console ships presets for.

// ---------------------------------------------------------------------------
// Address Geometry
// ---------------------------------------------------------------------------

/// Raw byte length of an account or vault address.
pub const ADDRESS_BYTE_LENGTH: usize = 20;

/// Hex-digit length of an address, excluding any prefix. Inputs that are
/// not exactly this many hex digits are rejected before any external call.
pub const ADDRESS_HEX_LENGTH: usize = 40;

/// Optional prefix marker accepted (and always emitted) on addresses.
pub const HEX_PREFIX: &str = "0x";

// ---------------------------------------------------------------------------
// Approval Policy
// ---------------------------------------------------------------------------

/// The smallest permitted approval threshold. A vault with threshold 0
/// would execute actions nobody approved, so this is a floor, not a tunable.
pub const MIN_THRESHOLD: usize = 1;

/// Prefix used for positional default nicknames (`owner 1`, `owner 2`, ...).
pub const NICKNAME_PREFIX: &str = "owner";

// ---------------------------------------------------------------------------
// Chain Identifiers
// ---------------------------------------------------------------------------

/// Ethereum mainnet.
pub const CHAIN_ID_MAINNET: u64 = 1;

/// Goerli test network — where the original deployment of this tooling ran.
pub const CHAIN_ID_GOERLI: u64 = 5;

/// Local development chain id, as used by most local node stacks.
pub const CHAIN_ID_LOCAL: u64 = 1337;

/// Returns a friendly name for a chain id, mainly for logging.
/// Unknown chains get the raw id back because we don't guess.
pub fn network_name(chain_id: u64) -> String {
    match chain_id {
        CHAIN_ID_MAINNET => "mainnet".to_string(),
        CHAIN_ID_GOERLI => "goerli".to_string(),
        CHAIN_ID_LOCAL => "local".to_string(),
        other => format!("chain({})", other),
    }
}
