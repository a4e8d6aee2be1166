//! # Patcher
//!
//! This module covers patch backends, which corrupt one instruction of a kernel routine and
//! restore it on-command

use thiserror::Error;

use crate::address::KernelAddress;
use crate::window::WindowError;

pub mod cmp;
pub mod diag;
pub mod side_channel;

/// Errors reported by an external patching facility
#[derive(Debug, Error)]
pub enum BackendError {
    /// The facility is not present in this build or on this device
    #[error("backend is not available")]
    Unavailable,
    /// The facility refused the request
    #[error("{0} rejected the request")]
    Rejected(&'static str),
}

/// Errors when breaking or restoring a routine
#[derive(Debug, Error)]
pub enum PatchError {
    /// Error from the underlying facility
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Error accessing the mapped kernel window
    #[error(transparent)]
    Window(#[from] WindowError),
    /// The bytes at the target are not the instruction the patch was built for
    #[error("unexpected instruction {found:02x?} at {address}")]
    UnexpectedInstruction {
        /// Location that was checked
        address: KernelAddress,
        /// Bytes found there
        found: [u8; 4],
    },
}

/// One write and the bytes needed to undo it.
///
/// Created right before the write and consumed by the restore of the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRecord<const N: usize> {
    /// Location of the patch
    pub address: KernelAddress,
    /// Bytes present before the patch
    pub original: [u8; N],
    /// Bytes written by the patch
    pub patched: [u8; N],
}

/// All patchers can break a routine and hand back a guard that reverts it
///
/// # Safety
///
/// Patchers write to the live kernel. The implementor must document which instruction its patch
/// expects at the target and must never write outside the bytes described by its [`PatchRecord`].
pub unsafe trait Patcher {
    /// Guard type for the patcher. When this guard is dropped, the location should be restored.
    type Guard<'a>: PatchGuard + 'a
    where
        Self: 'a;

    /// Short name used in diagnostics
    fn name(&self) -> &'static str;

    /// Breaks the routine at `target`.
    ///
    /// Nothing has been changed when this returns an error, so there is nothing to restore.
    ///
    /// # Safety
    ///
    /// `target` must be the address this patcher's technique was designed for on the running
    /// kernel. Patching any other location corrupts arbitrary kernel code.
    unsafe fn patch<'a>(&'a mut self, target: KernelAddress) -> Result<Self::Guard<'a>, PatchError>;
}

/// Guard for a live patch
///
/// # Safety
///
/// Guard must fully unpatch the location when dropped, even if `restore` is not called, and
/// must never unpatch twice.
pub unsafe trait PatchGuard: Sized {
    /// Restores the original instruction, reporting whether the facility accepted it
    fn restore(self) -> Result<(), PatchError>;
}
