//! # Transaction
//!
//! One break / privileged call / restore cycle. Restore is issued exactly once on every path that
//! got past the break, including unwinding out of the privileged call.

use log::{error, info, trace, warn};

use crate::address::KernelAddress;
use crate::elevate::Elevation;
use crate::patcher::{PatchError, PatchGuard, Patcher};
use crate::strategy::StrategyResult;

/// Where a transaction is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Nothing has been written
    Idle,
    /// The backend accepted the break
    Patched,
    /// The privileged call returned
    Verified,
    /// The restore was issued
    Reverted,
}

/// Outcome of [`PatchTransaction::execute`]
#[derive(Debug)]
pub struct TransactionReport {
    /// Success if and only if the privileged call succeeded
    pub result: StrategyResult,
    /// State the transaction finished in
    pub state: TransactionState,
    /// Restore failure. Recorded only, it never changes `result`.
    pub restore_error: Option<PatchError>,
}

/// A single patch cycle against one target
#[derive(Debug)]
pub struct PatchTransaction {
    /// Location handed to the patcher
    target: KernelAddress,
    /// Current state
    state: TransactionState,
}

impl PatchTransaction {
    /// Creates an idle transaction for `target`
    pub fn new(target: KernelAddress) -> Self {
        Self {
            target,
            state: TransactionState::Idle,
        }
    }

    /// Moves to `next`
    fn transition(&mut self, next: TransactionState) {
        trace!("{}: {:?} -> {next:?}", self.target, self.state);
        self.state = next;
    }

    /// Breaks the target, issues `elevation` and restores the target.
    ///
    /// # Safety
    ///
    /// `target` must satisfy the safety contract of `patcher`'s [`Patcher::patch`].
    pub unsafe fn execute<P, E>(mut self, patcher: &mut P, elevation: &mut E) -> TransactionReport
    where
        P: Patcher,
        E: Elevation + ?Sized,
    {
        let name = patcher.name();
        let guard = match patcher.patch(self.target) {
            Ok(guard) => guard,
            Err(e) => {
                warn!("{name}: failed to patch {}: {e}", self.target);
                return TransactionReport {
                    result: StrategyResult::FailedToPatch,
                    state: self.state,
                    restore_error: None,
                };
            }
        };
        self.transition(TransactionState::Patched);

        // a panic in here still restores through the guard's drop
        let elevated = elevation.elevate();
        self.transition(TransactionState::Verified);

        let restore_error = guard.restore().err();
        self.transition(TransactionState::Reverted);
        if let Some(e) = &restore_error {
            error!("{name}: failed to restore {}: {e}", self.target);
        }

        let result = match elevated {
            Ok(()) => {
                info!("{name}: privileged call succeeded");
                StrategyResult::Succeeded
            }
            Err(e) => {
                warn!("{name}: privileged call failed: {e}");
                StrategyResult::FailedPrivilegeCall
            }
        };
        TransactionReport {
            result,
            state: self.state,
            restore_error,
        }
    }
}
