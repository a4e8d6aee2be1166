//! Kernel virtual addresses

use std::fmt;
use std::ops::Add;

/// A kernel virtual address.
///
/// Only meaningful while the image it was resolved from is running. It is never dereferenced
/// directly; reads and writes go through [`MappedWindow`](crate::window::MappedWindow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KernelAddress(u64);

impl KernelAddress {
    /// Wraps a raw address, treating zero as "not found"
    pub fn new(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    /// Raw value of the address
    pub fn get(self) -> u64 {
        self.0
    }

    /// Offset of `self` from `base`, if `self` is not below it
    pub fn offset_from(self, base: KernelAddress) -> Option<u64> {
        self.0.checked_sub(base.0)
    }
}

impl Add<u64> for KernelAddress {
    type Output = KernelAddress;

    fn add(self, rhs: u64) -> Self::Output {
        KernelAddress(self.0.wrapping_add(rhs))
    }
}

impl fmt::Display for KernelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::LowerHex for KernelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
