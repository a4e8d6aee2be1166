//! This module contains the comparison patcher used over a mapped kernel window

use log::{error, trace, warn};

use crate::address::KernelAddress;
use crate::window::MappedWindow;

use super::{PatchError, PatchGuard, PatchRecord, Patcher};

/// `cmp r0, #0`, the check guarding the privileged path
pub const CMP_R0_IMM0: u32 = 0xe350_0000;

/// Little-endian encoding of [`CMP_R0_IMM0`] as it appears in the image
pub const CMP_PATTERN: [u8; 4] = CMP_R0_IMM0.to_le_bytes();

/// Patcher that bumps the immediate of a `cmp r0, #0` by one, so an "equal" check compares
/// against the adjacent value instead.
///
/// The patch is refused unless the target still holds [`CMP_PATTERN`]. That the routine is compiled
/// with this comparison is an assumption about the kernel build, not something we can verify.
pub struct CmpPatcher<'w, 'm> {
    /// Window the target lives in
    window: &'w mut MappedWindow<'m>,
}

impl<'w, 'm> CmpPatcher<'w, 'm> {
    /// Creates a new [`CmpPatcher`] over `window`
    pub fn new(window: &'w mut MappedWindow<'m>) -> Self {
        Self { window }
    }
}

unsafe impl<'w, 'm> Patcher for CmpPatcher<'w, 'm> {
    type Guard<'a> = CmpPatchGuard<'a, 'm> where Self: 'a;

    fn name(&self) -> &'static str {
        "memory-window"
    }

    unsafe fn patch<'a>(&'a mut self, target: KernelAddress) -> Result<Self::Guard<'a>, PatchError> {
        let original = self.window.read::<4>(target)?;
        if original != CMP_PATTERN {
            return Err(PatchError::UnexpectedInstruction {
                address: target,
                found: original,
            });
        }

        let mut patched = original;
        patched[0] = patched[0].wrapping_add(1);
        self.window.write(target, &patched)?;
        trace!("{target}: {original:02x?} -> {patched:02x?}");

        Ok(CmpPatchGuard {
            window: &mut *self.window,
            record: PatchRecord {
                address: target,
                original,
                patched,
            },
            restored: false,
        })
    }
}

/// Guard for comparison patches
///
/// See [`CmpPatcher`].
pub struct CmpPatchGuard<'a, 'm> {
    /// Window holding the patch
    window: &'a mut MappedWindow<'m>,
    /// What was written and what to put back
    record: PatchRecord<4>,
    /// Set once the original bytes have been written back
    restored: bool,
}

impl CmpPatchGuard<'_, '_> {
    /// Writes the original encoding back, whatever the location holds now
    fn revert(&mut self) -> Result<(), PatchError> {
        self.restored = true;
        let current = self.window.read::<4>(self.record.address)?;
        if current != self.record.patched {
            warn!(
                "{}: expected {:02x?}, found {:02x?}",
                self.record.address, self.record.patched, current
            );
        }
        self.window.write(self.record.address, &self.record.original)?;
        Ok(())
    }
}

unsafe impl PatchGuard for CmpPatchGuard<'_, '_> {
    fn restore(mut self) -> Result<(), PatchError> {
        self.revert()
    }
}

impl Drop for CmpPatchGuard<'_, '_> {
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
