//! # Approval Decision Engine
//!
//! The one function in this crate that decides anything: given the vault's
//! threshold, the ordered signer list of a pending action, and the acting
//! account, [`decide`] determines what that account should do next —
//! sign, approve, execute, or be told why not.
//!
//! ## Decision table
//!
//! `T` = threshold, `k` = signatures collected, `C` = acting account.
//!
//! ```text
//! C not an owner                          → Reject(NotAnOwner)
//! T == 1                                  → SignAndExecute      (fast path)
//! C ∉ signers, k == 0                     → Sign
//! C ∉ signers, T − k > 1                  → Approve
//! C ∉ signers, T − k == 1                 → SignAndExecute
//! C ∉ signers, T − k ≤ 0                  → Reject(WrongExecutor)
//! C ∈ signers, T − k ≤ 0, C is last       → Execute
//! C ∈ signers, T − k ≤ 0, C is not last   → Reject(WrongExecutor)
//! C ∈ signers, T − k > 0                  → Reject(AlreadySigned)
//! ```
//!
//! Two rules are deliberate policy, not accident:
//!
//! - **The last signer executes.** A fully approved action has exactly one
//!   canonical executor — the owner holding the final approval slot. Every
//!   other owner is rejected with the executor's identity, which turns a
//!   double-execution race into a clear instruction.
//! - **Threshold 1 is its own branch.** The general algorithm assumes an
//!   approval step happens before execution is reachable; with a single
//!   required signature there is no such step, so the acting owner signs
//!   and executes in one call regardless of signer-list state.
//!
//! The function is pure: same inputs, same decision, no hidden state.
//! Repeating a rejected call with unchanged inputs yields the same
//! rejection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Address;
use crate::vault::action::SignerList;
use crate::vault::roster::OwnerRoster;

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// What the acting account should do with a pending action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Provide the first signature.
    Sign,
    /// Add an approval; more signers are still needed afterwards.
    Approve,
    /// Provide the final required signature and immediately execute.
    SignAndExecute,
    /// The action is fully approved and this account holds the final
    /// approval slot — finalize it.
    Execute,
    /// No step is available to this account; the reason says why.
    Reject(RejectReason),
}

impl Decision {
    /// Whether carrying this decision out ends in an execution attempt.
    pub fn executes(&self) -> bool {
        matches!(self, Decision::SignAndExecute | Decision::Execute)
    }
}

/// Why an account was rejected. Doubles as the user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RejectReason {
    /// The acting account is not in the vault's owner set.
    #[error("current account {account} is not an owner of this vault")]
    NotAnOwner {
        /// The rejected account.
        account: Address,
    },

    /// The account already signed and the action still needs others.
    #[error("current account {account} has already signed this action")]
    AlreadySigned {
        /// The account whose signature is already recorded.
        account: Address,
    },

    /// The action is fully approved, but only the holder of the final
    /// approval slot may execute it.
    #[error("action is fully approved; switch to {expected}, which holds the final approval slot")]
    WrongExecutor {
        /// The owner whose call will finalize the action.
        expected: Address,
    },
}

// ---------------------------------------------------------------------------
// decide
// ---------------------------------------------------------------------------

/// Computes the next step for `current` on an action with the given
/// signer list, under the vault's `threshold` and owner `roster`.
///
/// The signer list is read in submission order and never reordered; the
/// caller must pass the latest list fetched from the vault collaborator,
/// and the latest acting account — a stale read of either is a
/// correctness bug upstream of this function.
pub fn decide(
    threshold: usize,
    signers: &SignerList,
    current: &Address,
    roster: &OwnerRoster,
) -> Decision {
    if !roster.contains(current) {
        return Decision::Reject(RejectReason::NotAnOwner { account: *current });
    }

    // Single-signature vaults never collect approvals: sign and execute
    // in the same call. This is an explicit branch because the general
    // path below assumes an approval step precedes execution.
    if threshold <= 1 {
        return Decision::SignAndExecute;
    }

    let collected = signers.len();
    let outstanding = threshold.saturating_sub(collected);

    if !signers.contains(current) {
        return match outstanding {
            0 => {
                // Fully approved without this account's help. The final
                // approval slot still names the executor.
                let expected = signers
                    .last()
                    .copied()
                    .expect("threshold >= 2 reached, signer list cannot be empty");
                Decision::Reject(RejectReason::WrongExecutor { expected })
            }
            1 => Decision::SignAndExecute,
            _ if collected == 0 => Decision::Sign,
            _ => Decision::Approve,
        };
    }

    // The account already signed.
    if outstanding == 0 {
        match signers.last() {
            Some(last) if last == current => Decision::Execute,
            Some(last) => Decision::Reject(RejectReason::WrongExecutor { expected: *last }),
            // Unreachable with threshold >= 2, kept total for safety.
            None => Decision::Reject(RejectReason::AlreadySigned { account: *current }),
        }
    } else {
        Decision::Reject(RejectReason::AlreadySigned { account: *current })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn roster(bytes: &[u8]) -> OwnerRoster {
        OwnerRoster::from_owners(bytes.iter().map(|b| addr(*b)).collect()).unwrap()
    }

    fn signers(bytes: &[u8]) -> SignerList {
        bytes.iter().map(|b| addr(*b)).collect()
    }

    // -----------------------------------------------------------------------
    // Ownership gate
    // -----------------------------------------------------------------------

    #[test]
    fn non_owner_is_rejected() {
        let r = roster(&[1, 2, 3]);
        let d = decide(2, &signers(&[]), &addr(9), &r);
        assert_eq!(
            d,
            Decision::Reject(RejectReason::NotAnOwner { account: addr(9) })
        );
    }

    #[test]
    fn non_owner_is_rejected_even_under_threshold_one() {
        let r = roster(&[1]);
        let d = decide(1, &signers(&[]), &addr(9), &r);
        assert!(matches!(
            d,
            Decision::Reject(RejectReason::NotAnOwner { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Threshold-1 fast path
    // -----------------------------------------------------------------------

    #[test]
    fn threshold_one_signs_and_executes_in_one_step() {
        let r = roster(&[1, 2]);
        assert_eq!(decide(1, &signers(&[]), &addr(1), &r), Decision::SignAndExecute);
    }

    #[test]
    fn threshold_one_ignores_signer_list_state() {
        // Regardless of who already signed, a single-signature vault
        // resolves in one call.
        let r = roster(&[1, 2]);
        assert_eq!(
            decide(1, &signers(&[2]), &addr(1), &r),
            Decision::SignAndExecute
        );
        assert_eq!(
            decide(1, &signers(&[1]), &addr(1), &r),
            Decision::SignAndExecute
        );
    }

    // -----------------------------------------------------------------------
    // Fresh signer paths
    // -----------------------------------------------------------------------

    #[test]
    fn first_signer_signs() {
        let r = roster(&[1, 2, 3]);
        assert_eq!(decide(3, &signers(&[]), &addr(1), &r), Decision::Sign);
    }

    #[test]
    fn intermediate_signer_approves() {
        // T=3, k=1: two more needed, so the next signer only approves.
        let r = roster(&[1, 2, 3]);
        assert_eq!(decide(3, &signers(&[1]), &addr(2), &r), Decision::Approve);
    }

    #[test]
    fn final_signer_signs_and_executes() {
        // T=3, k=2: the acting account is the last required signature.
        let r = roster(&[1, 2, 3]);
        assert_eq!(
            decide(3, &signers(&[1, 2]), &addr(3), &r),
            Decision::SignAndExecute
        );
    }

    #[test]
    fn fully_approved_action_rejects_non_signer_owner() {
        // T=2 already met by [1, 2]; owner 3 never signed and may not
        // execute either — the final slot belongs to 2.
        let r = roster(&[1, 2, 3]);
        assert_eq!(
            decide(2, &signers(&[1, 2]), &addr(3), &r),
            Decision::Reject(RejectReason::WrongExecutor { expected: addr(2) })
        );
    }

    // -----------------------------------------------------------------------
    // Already-signed paths
    // -----------------------------------------------------------------------

    #[test]
    fn repeat_signer_is_rejected_while_collecting() {
        let r = roster(&[1, 2, 3]);
        assert_eq!(
            decide(3, &signers(&[1]), &addr(1), &r),
            Decision::Reject(RejectReason::AlreadySigned { account: addr(1) })
        );
    }

    #[test]
    fn last_signer_of_fully_approved_action_executes() {
        let r = roster(&[1, 2, 3]);
        assert_eq!(decide(2, &signers(&[1, 2]), &addr(2), &r), Decision::Execute);
    }

    #[test]
    fn earlier_signer_of_fully_approved_action_is_redirected() {
        let r = roster(&[1, 2, 3]);
        assert_eq!(
            decide(2, &signers(&[1, 2]), &addr(1), &r),
            Decision::Reject(RejectReason::WrongExecutor { expected: addr(2) })
        );
    }

    // -----------------------------------------------------------------------
    // Ordering and determinism
    // -----------------------------------------------------------------------

    #[test]
    fn executor_follows_submission_order_not_roster_order() {
        // Roster order [1, 2, 3], but 3 signed first and 1 signed last:
        // the executor is 1, the last to sign.
        let r = roster(&[1, 2, 3]);
        assert_eq!(decide(2, &signers(&[3, 1]), &addr(1), &r), Decision::Execute);
        assert_eq!(
            decide(2, &signers(&[3, 1]), &addr(3), &r),
            Decision::Reject(RejectReason::WrongExecutor { expected: addr(1) })
        );
    }

    #[test]
    fn rejections_are_idempotent() {
        let r = roster(&[1, 2, 3]);
        let s = signers(&[1]);
        let first = decide(3, &s, &addr(1), &r);
        let second = decide(3, &s, &addr(1), &r);
        assert_eq!(first, second);
        assert!(matches!(first, Decision::Reject(_)));
    }

    // -----------------------------------------------------------------------
    // Multi-owner walkthroughs
    // -----------------------------------------------------------------------

    #[test]
    fn two_of_three_removal_walkthrough() {
        // owners=[A,B,C], threshold=2. A signs; B is then one short of the
        // threshold and resolves the action in a single call.
        let r = roster(&[0xA1, 0xB1, 0xC1]);
        assert_eq!(decide(2, &signers(&[]), &addr(0xA1), &r), Decision::Sign);
        assert_eq!(
            decide(2, &signers(&[0xA1]), &addr(0xB1), &r),
            Decision::SignAndExecute
        );
    }

    #[test]
    fn three_of_three_chain_with_late_stray_signer() {
        // threshold=3, owners=[A,B,C]: A signs, B approves, C signs and
        // executes. A returning afterwards is redirected to C.
        let r = roster(&[0xA1, 0xB1, 0xC1]);
        assert_eq!(decide(3, &signers(&[]), &addr(0xA1), &r), Decision::Sign);
        assert_eq!(
            decide(3, &signers(&[0xA1]), &addr(0xB1), &r),
            Decision::Approve
        );
        assert_eq!(
            decide(3, &signers(&[0xA1, 0xB1]), &addr(0xC1), &r),
            Decision::SignAndExecute
        );
        assert_eq!(
            decide(3, &signers(&[0xA1, 0xB1, 0xC1]), &addr(0xA1), &r),
            Decision::Reject(RejectReason::WrongExecutor {
                expected: addr(0xC1)
            })
        );
    }

    #[test]
    fn mid_list_signer_is_pointed_at_the_final_slot_holder() {
        // threshold=3, signatures landed in the order [A, C, B]. C signed
        // second, so once the action is fully approved C's retry is
        // rejected with B — the holder of the final approval slot.
        let r = roster(&[0xA1, 0xB1, 0xC1]);
        assert_eq!(
            decide(3, &signers(&[0xA1, 0xC1, 0xB1]), &addr(0xC1), &r),
            Decision::Reject(RejectReason::WrongExecutor {
                expected: addr(0xB1)
            })
        );
    }

    #[test]
    fn reject_reasons_render_human_messages() {
        let reason = RejectReason::AlreadySigned { account: addr(1) };
        assert!(reason.to_string().contains("already signed"));

        let reason = RejectReason::WrongExecutor { expected: addr(2) };
        assert!(reason.to_string().contains("final approval slot"));
    }
}
