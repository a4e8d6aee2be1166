//! This module contains the side-channel patcher
//!
//! The primitive itself is external; it exposes symmetrical break and restore operations for the
//! routine at an address and is treated as opaque.

use log::error;

use crate::address::KernelAddress;

use super::{BackendError, PatchError, PatchGuard, Patcher};

/// External primitive able to corrupt and revert a routine
pub trait SideChannelPrimitive {
    /// Corrupts the routine at `address`
    fn break_at(&mut self, address: KernelAddress) -> Result<(), BackendError>;
    /// Reverts what [`SideChannelPrimitive::break_at`] did to `address`
    fn restore_at(&mut self, address: KernelAddress) -> Result<(), BackendError>;
}

/// Patcher delegating to a [`SideChannelPrimitive`]
pub struct SideChannelPatcher<P> {
    /// Primitive doing the work
    primitive: P,
}

impl<P: SideChannelPrimitive> SideChannelPatcher<P> {
    /// Creates a new [`SideChannelPatcher`]
    pub fn new(primitive: P) -> Self {
        Self { primitive }
    }

    /// Primitive backing this patcher
    pub fn primitive(&self) -> &P {
        &self.primitive
    }
}

unsafe impl<P: SideChannelPrimitive> Patcher for SideChannelPatcher<P> {
    type Guard<'a> = SideChannelPatchGuard<'a, P> where Self: 'a;

    fn name(&self) -> &'static str {
        "side-channel"
    }

    unsafe fn patch<'a>(&'a mut self, target: KernelAddress) -> Result<Self::Guard<'a>, PatchError> {
        self.primitive.break_at(target)?;
        Ok(SideChannelPatchGuard {
            primitive: &mut self.primitive,
            target,
            restored: false,
        })
    }
}

/// Guard for side-channel patches
pub struct SideChannelPatchGuard<'a, P: SideChannelPrimitive> {
    /// Primitive that performed the break
    primitive: &'a mut P,
    /// Routine that was broken
    target: KernelAddress,
    /// Set once restore has been requested
    restored: bool,
}

impl<P: SideChannelPrimitive> SideChannelPatchGuard<'_, P> {
    /// Asks the primitive to undo the break
    fn revert(&mut self) -> Result<(), PatchError> {
        self.restored = true;
        self.primitive.restore_at(self.target)?;
        Ok(())
    }
}

unsafe impl<P: SideChannelPrimitive> PatchGuard for SideChannelPatchGuard<'_, P> {
    fn restore(mut self) -> Result<(), PatchError> {
        self.revert()
    }
}

impl<P: SideChannelPrimitive> Drop for SideChannelPatchGuard<'_, P> {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(e) = self.revert() {
                error!("failed to restore {}: {e}", self.target);
            }
        }
    }
}
