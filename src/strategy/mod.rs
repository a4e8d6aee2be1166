//! # Strategy
//!
//! This module covers the exploit strategies the orchestrator falls back across. Each one owns its
//! collaborators and every resource it opens for the duration of a single attempt.

use crate::address::KernelAddress;
use crate::elevate::Elevation;
use crate::patcher::Patcher;
use crate::transaction::PatchTransaction;

pub mod device;
pub mod window;

pub use self::device::DeviceStrategy;
pub use self::window::MemoryWindowStrategy;

/// Outcome of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyResult {
    /// The privileged call succeeded while the patch was live
    Succeeded,
    /// Nothing was patched: no address, no mapping or the break was rejected
    FailedToPatch,
    /// The patch was applied but the privileged call still failed
    FailedPrivilegeCall,
}

impl StrategyResult {
    /// Whether the attempt elevated the process
    pub fn is_success(self) -> bool {
        self == StrategyResult::Succeeded
    }
}

/// A way of elevating privilege, tried in priority order
pub trait Strategy {
    /// Short name used in diagnostics
    fn name(&self) -> &'static str;
    /// Makes one attempt, restoring anything it patched before returning
    fn attempt(&mut self) -> StrategyResult;
}

/// Runs one transaction with `patcher` against `target`
///
/// # Safety
///
/// `target` must satisfy the safety contract of `patcher`'s [`Patcher::patch`].
unsafe fn run_transaction<P, E>(patcher: &mut P, target: KernelAddress, elevation: &mut E) -> StrategyResult
where
    P: Patcher,
    E: Elevation,
{
    PatchTransaction::new(target).execute(patcher, elevation).result
}
