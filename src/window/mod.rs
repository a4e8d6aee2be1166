//! # Window
//!
//! This module covers the mapped kernel image window, the only place raw memory is touched.
//! Everything above it addresses memory through [`KernelAddress`]es that are bounds-checked and
//! translated into the mapping here.

use std::marker::PhantomData;
use std::ops::Range;
use std::{ptr, slice};

use region::Protection;
use thiserror::Error;

use crate::address::KernelAddress;
use crate::patcher::BackendError;
use crate::strategy::StrategyResult;

/// Errors when accessing the mapped window
#[derive(Debug, Error)]
pub enum WindowError {
    /// Address or range falls outside the mapping
    #[error("{address}+{len:#x} is outside the mapped window {start}..{end}")]
    OutOfBounds {
        /// First address of the access
        address: KernelAddress,
        /// Length of the access
        len: usize,
        /// First kernel address covered by the window
        start: KernelAddress,
        /// First kernel address past the window
        end: KernelAddress,
    },
    /// Mapping has no pages
    #[error("mapped window is empty")]
    Empty,
    /// Part of the mapping is not readable and writable
    #[error("mapped window is not read-write ({0:?})")]
    NotWritable(Protection),
    /// Error when querying memory protections
    #[error("error querying mapping protections")]
    Region(#[from] region::Error),
}

/// A bounded, process-mapped view of kernel memory.
///
/// Offset zero of the mapping corresponds to `kernel_base`. All accesses are checked against the
/// mapping length before any pointer arithmetic happens.
pub struct MappedWindow<'m> {
    /// Start of the mapping in our address space
    data: *mut u8,
    /// Length of the mapping
    len: usize,
    /// Kernel virtual address mapped at `data`
    kernel_base: KernelAddress,
    /// Ties the window to the mapping that backs it
    _mapping: PhantomData<&'m mut [u8]>,
}

impl<'m> MappedWindow<'m> {
    /// Wraps an existing mapping.
    ///
    /// # Safety
    ///
    /// `data` must point to a live mapping of at least `len` bytes that stays mapped for `'m`, and
    /// nothing else may create references into it while the window exists.
    pub unsafe fn from_raw_parts(
        data: *mut u8,
        len: usize,
        kernel_base: KernelAddress,
    ) -> Result<Self, WindowError> {
        if len == 0 {
            return Err(WindowError::Empty);
        }
        for region in region::query_range(data as *const u8, len)? {
            let protection = region?.protection();
            if !protection.contains(Protection::READ_WRITE) {
                return Err(WindowError::NotWritable(protection));
            }
        }
        Ok(Self {
            data,
            len,
            kernel_base,
            _mapping: PhantomData,
        })
    }

    /// Kernel address mapped at offset zero
    pub fn kernel_base(&self) -> KernelAddress {
        self.kernel_base
    }

    /// Length of the mapping in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping is empty. Never true for a constructed window.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of `address` inside the mapping
    pub fn translate(&self, address: KernelAddress) -> Result<usize, WindowError> {
        self.range(address, 1).map(|range| range.start)
    }

    /// Clamps an access of `len` bytes at `address` to the end of the mapping
    pub fn clamp_len(&self, address: KernelAddress, len: usize) -> Result<usize, WindowError> {
        let start = self.translate(address)?;
        Ok(len.min(self.len - start))
    }

    /// Bytes `address..address + len`
    pub fn slice(&self, address: KernelAddress, len: usize) -> Result<&[u8], WindowError> {
        let range = self.range(address, len)?;
        // Safety: `range` lies within the mapping, which outlives `self`
        Ok(unsafe { slice::from_raw_parts(self.data.add(range.start), range.len()) })
    }

    /// Copies `N` bytes out of the mapping
    pub fn read<const N: usize>(&self, address: KernelAddress) -> Result<[u8; N], WindowError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.slice(address, N)?);
        Ok(out)
    }

    /// Copies `bytes` into the mapping at `address`
    pub fn write(&mut self, address: KernelAddress, bytes: &[u8]) -> Result<(), WindowError> {
        let range = self.range(address, bytes.len())?;
        // Safety: `range` lies within the mapping and was checked to be writable on construction
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.data.add(range.start), range.len());
        }
        Ok(())
    }

    /// Checks `address..address + len` against the mapping
    fn range(&self, address: KernelAddress, len: usize) -> Result<Range<usize>, WindowError> {
        let out_of_bounds = || WindowError::OutOfBounds {
            address,
            len,
            start: self.kernel_base,
            end: self.kernel_base + self.len as u64,
        };
        let start = address
            .offset_from(self.kernel_base)
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|&offset| offset < self.len)
            .ok_or_else(out_of_bounds)?;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.len)
            .ok_or_else(out_of_bounds)?;
        Ok(start..end)
    }
}

/// Maps a window of the running kernel image into the process.
///
/// The mapping lives only for the duration of the callback and is released before
/// [`ImageMapper::with_mapped_image`] returns.
pub trait ImageMapper {
    /// Maps `window_size` bytes of the kernel image and runs `callback` over them
    fn with_mapped_image(
        &mut self,
        window_size: usize,
        callback: &mut dyn FnMut(&mut MappedWindow<'_>) -> StrategyResult,
    ) -> Result<StrategyResult, BackendError>;
}
