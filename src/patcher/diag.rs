//! This module contains the diagnostic-channel patcher
//!
//! The diagnostic facility writes a 16-bit value to an arbitrary kernel address. Flipping the
//! condition of the branch at `target + 0x42` from `bne` to `beq` skips the permission check.

use log::{debug, error};

use crate::address::KernelAddress;

use super::{BackendError, PatchError, PatchGuard, PatchRecord, Patcher};

/// Distance from the start of the routine to the branch whose condition is flipped
pub const DIAG_PATCH_OFFSET: u64 = 0x42;

/// Condition bits of the branch encoding that skips the check
pub const BEQ: [u8; 2] = [0x00, 0x0a];

/// Condition bits of the branch encoding compiled into the routine
pub const BNE: [u8; 2] = [0x00, 0x1a];

/// One write request for the diagnostic facility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagValue {
    /// Where to write
    pub address: KernelAddress,
    /// Value stored in the low two bytes at `address`
    pub value: u16,
}

impl DiagValue {
    /// Builds a request writing `bytes` in memory order
    pub fn new(address: KernelAddress, bytes: [u8; 2]) -> Self {
        Self {
            address,
            value: u16::from(bytes[0]) | (u16::from(bytes[1]) << 8),
        }
    }
}

/// External diagnostic injection facility
pub trait DiagInjector {
    /// Writes every value in `values`, succeeding only if the facility acknowledged all of them
    fn inject(&mut self, values: &[DiagValue]) -> Result<(), BackendError>;
}

/// Patcher that flips a branch condition through a [`DiagInjector`]
pub struct DiagPatcher<I> {
    /// Facility performing the writes
    injector: I,
}

impl<I: DiagInjector> DiagPatcher<I> {
    /// Creates a new [`DiagPatcher`]
    pub fn new(injector: I) -> Self {
        Self { injector }
    }

    /// Facility backing this patcher
    pub fn injector(&self) -> &I {
        &self.injector
    }
}

unsafe impl<I: DiagInjector> Patcher for DiagPatcher<I> {
    type Guard<'a> = DiagPatchGuard<'a, I> where Self: 'a;

    fn name(&self) -> &'static str {
        "diag"
    }

    unsafe fn patch<'a>(&'a mut self, target: KernelAddress) -> Result<Self::Guard<'a>, PatchError> {
        let record = PatchRecord {
            address: target + DIAG_PATCH_OFFSET,
            original: BNE,
            patched: BEQ,
        };
        debug!("injecting {:02x?} at {}", record.patched, record.address);
        self.injector
            .inject(&[DiagValue::new(record.address, record.patched)])?;
        Ok(DiagPatchGuard {
            injector: &mut self.injector,
            record,
            restored: false,
        })
    }
}

/// Guard for diagnostic-channel patches
pub struct DiagPatchGuard<'a, I: DiagInjector> {
    /// Facility that performed the break
    injector: &'a mut I,
    /// What was written and what to put back
    record: PatchRecord<2>,
    /// Set once the restore request has been sent
    restored: bool,
}

impl<I: DiagInjector> DiagPatchGuard<'_, I> {
    /// Sends the inverse encoding to the same address
    fn revert(&mut self) -> Result<(), PatchError> {
        self.restored = true;
        self.injector
            .inject(&[DiagValue::new(self.record.address, self.record.original)])?;
        Ok(())
    }
}

unsafe impl<I: DiagInjector> PatchGuard for DiagPatchGuard<'_, I> {
    fn restore(mut self) -> Result<(), PatchError> {
        self.revert()
    }
}

impl<I: DiagInjector> Drop for DiagPatchGuard<'_, I> {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(e) = self.revert() {
                error!(
                    "failed to restore {}, left as {:02x?}: {e}",
                    self.record.address, self.record.patched
                );
            }
        }
    }
}
