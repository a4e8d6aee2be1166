//! Recording fakes for every external collaborator

#![allow(clippy::missing_docs_in_private_items)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::io;
use std::ptr;
use std::rc::Rc;

use crate::address::KernelAddress;
use crate::elevate::Elevation;
use crate::patcher::diag::{DiagInjector, DiagValue};
use crate::patcher::side_channel::SideChannelPrimitive;
use crate::patcher::{BackendError, PatchError, PatchGuard, Patcher};
use crate::resolver::registry::DeviceId;
use crate::resolver::{DeviceDetector, SymbolTable, SymbolTableOpener};
use crate::strategy::{Strategy, StrategyResult};
use crate::window::{ImageMapper, MappedWindow};

/// Kernel address the fake image is mapped at
const FAKE_KERNEL_BASE: u64 = 0xc000_8000;

/// Anonymous read-write mapping standing in for a kernel image
pub struct FakeImage {
    /// Backing mapping
    map: mmap::MemoryMap,
    /// Requested length
    len: usize,
    /// Kernel address of offset zero
    kernel_base: KernelAddress,
}

impl FakeImage {
    pub fn new(len: usize) -> Self {
        let map = mmap::MemoryMap::new(
            len,
            &[mmap::MapOption::MapReadable, mmap::MapOption::MapWritable],
        )
        .unwrap();
        Self {
            map,
            len,
            kernel_base: KernelAddress::new(FAKE_KERNEL_BASE).unwrap(),
        }
    }

    pub fn kernel_base(&self) -> KernelAddress {
        self.kernel_base
    }

    fn offset(&self, address: KernelAddress, len: usize) -> usize {
        let offset = address.offset_from(self.kernel_base).unwrap() as usize;
        assert!(offset + len <= self.len);
        offset
    }

    pub fn write(&mut self, address: KernelAddress, bytes: &[u8]) {
        let offset = self.offset(address, bytes.len());
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), self.map.data().add(offset), bytes.len()) };
    }

    pub fn window(&mut self) -> MappedWindow<'_> {
        unsafe { MappedWindow::from_raw_parts(self.map.data(), self.len, self.kernel_base).unwrap() }
    }

    /// Access that outlives borrows of the image, for checking or clobbering bytes mid-patch
    pub fn watch(&self, address: KernelAddress, len: usize) -> Watch {
        let offset = self.offset(address, len);
        Watch {
            data: unsafe { self.map.data().add(offset) },
            len,
        }
    }
}

impl ImageMapper for FakeImage {
    fn with_mapped_image(
        &mut self,
        _window_size: usize,
        callback: &mut dyn FnMut(&mut MappedWindow<'_>) -> StrategyResult,
    ) -> Result<StrategyResult, BackendError> {
        let mut window = self.window();
        Ok(callback(&mut window))
    }
}

/// Raw view into a [`FakeImage`]. Only valid while the image is alive.
pub struct Watch {
    data: *mut u8,
    len: usize,
}

impl Watch {
    pub fn read(&self) -> Vec<u8> {
        (0..self.len)
            .map(|i| unsafe { ptr::read_volatile(self.data.add(i)) })
            .collect()
    }

    pub fn write(&self, bytes: &[u8]) {
        assert!(bytes.len() <= self.len);
        for (i, &byte) in bytes.iter().enumerate() {
            unsafe { ptr::write_volatile(self.data.add(i), byte) };
        }
    }
}

/// Symbol table backed by a map, counting lookups across clones
#[derive(Clone, Default)]
pub struct FakeSymbols {
    symbols: HashMap<String, u64>,
    lookups: Rc<Cell<usize>>,
}

impl FakeSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, address: u64) -> Self {
        self.symbols.insert(name.to_owned(), address);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }
}

impl SymbolTable for FakeSymbols {
    fn lookup(&self, name: &str) -> Option<KernelAddress> {
        self.lookups.set(self.lookups.get() + 1);
        self.symbols.get(name).copied().and_then(KernelAddress::new)
    }
}

impl SymbolTableOpener for FakeSymbols {
    type Table = FakeSymbols;

    fn open(&self, _window: &MappedWindow<'_>) -> Option<Self::Table> {
        Some(self.clone())
    }
}

/// Detector returning a fixed identity
#[derive(Clone)]
pub struct FakeDetector {
    identity: Option<DeviceId>,
}

impl FakeDetector {
    pub fn new(identity: Option<DeviceId>) -> Self {
        Self { identity }
    }
}

impl DeviceDetector for FakeDetector {
    fn detect(&self) -> Option<DeviceId> {
        self.identity.clone()
    }
}

#[derive(Default)]
struct InjectorState {
    accept: bool,
    requests: Vec<DiagValue>,
    memory: HashMap<KernelAddress, [u8; 2]>,
}

/// Diagnostic facility writing into a map of two-byte cells
#[derive(Clone)]
pub struct FakeInjector(Rc<RefCell<InjectorState>>);

impl FakeInjector {
    pub fn with_memory(address: KernelAddress, bytes: [u8; 2]) -> Self {
        let mut state = InjectorState {
            accept: true,
            ..Default::default()
        };
        state.memory.insert(address, bytes);
        Self(Rc::new(RefCell::new(state)))
    }

    pub fn rejecting() -> Self {
        Self(Rc::new(RefCell::new(InjectorState::default())))
    }

    pub fn requests(&self) -> Vec<DiagValue> {
        self.0.borrow().requests.clone()
    }

    pub fn memory(&self, address: KernelAddress) -> Option<[u8; 2]> {
        self.0.borrow().memory.get(&address).copied()
    }
}

impl DiagInjector for FakeInjector {
    fn inject(&mut self, values: &[DiagValue]) -> Result<(), BackendError> {
        let mut state = self.0.borrow_mut();
        state.requests.extend_from_slice(values);
        if !state.accept {
            return Err(BackendError::Rejected("diag"));
        }
        for value in values {
            state.memory.insert(value.address, value.value.to_le_bytes());
        }
        Ok(())
    }
}

#[derive(Default)]
struct SideChannelState {
    accept: bool,
    broken: HashSet<KernelAddress>,
    breaks: usize,
    restores: usize,
}

/// Side-channel primitive tracking which routines are broken
#[derive(Clone)]
pub struct FakeSideChannel(Rc<RefCell<SideChannelState>>);

impl FakeSideChannel {
    pub fn accepting() -> Self {
        Self(Rc::new(RefCell::new(SideChannelState {
            accept: true,
            ..Default::default()
        })))
    }

    pub fn rejecting() -> Self {
        Self(Rc::new(RefCell::new(SideChannelState::default())))
    }

    pub fn is_broken(&self, address: KernelAddress) -> bool {
        self.0.borrow().broken.contains(&address)
    }

    pub fn breaks(&self) -> usize {
        self.0.borrow().breaks
    }

    pub fn restores(&self) -> usize {
        self.0.borrow().restores
    }
}

impl SideChannelPrimitive for FakeSideChannel {
    fn break_at(&mut self, address: KernelAddress) -> Result<(), BackendError> {
        let mut state = self.0.borrow_mut();
        state.breaks += 1;
        if !state.accept {
            return Err(BackendError::Rejected("side-channel"));
        }
        state.broken.insert(address);
        Ok(())
    }

    fn restore_at(&mut self, address: KernelAddress) -> Result<(), BackendError> {
        let mut state = self.0.borrow_mut();
        state.restores += 1;
        state.broken.remove(&address);
        Ok(())
    }
}

/// Privileged call answering through a closure
pub struct FakeElevation {
    calls: Rc<Cell<usize>>,
    respond: Box<dyn FnMut() -> io::Result<()>>,
}

impl FakeElevation {
    pub fn new(respond: impl FnMut() -> io::Result<()> + 'static) -> Self {
        Self {
            calls: Rc::default(),
            respond: Box::new(respond),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(|| Ok(()))
    }

    pub fn failing() -> Self {
        Self::new(|| Err(io::Error::from_raw_os_error(libc::EPERM)))
    }

    /// Shared call counter
    pub fn calls(&self) -> Rc<Cell<usize>> {
        self.calls.clone()
    }
}

impl Elevation for FakeElevation {
    fn elevate(&mut self) -> io::Result<()> {
        self.calls.set(self.calls.get() + 1);
        (self.respond)()
    }
}

/// Patcher counting breaks and restores
#[derive(Default)]
pub struct RecordingPatcher {
    pub reject_patch: bool,
    pub reject_restore: bool,
    pub patches: usize,
    pub restores: usize,
    pub live: bool,
}

unsafe impl Patcher for RecordingPatcher {
    type Guard<'a> = RecordingGuard<'a> where Self: 'a;

    fn name(&self) -> &'static str {
        "recording"
    }

    unsafe fn patch<'a>(&'a mut self, _target: KernelAddress) -> Result<Self::Guard<'a>, PatchError> {
        self.patches += 1;
        if self.reject_patch {
            return Err(BackendError::Rejected("recording").into());
        }
        self.live = true;
        Ok(RecordingGuard {
            patcher: self,
            restored: false,
        })
    }
}

pub struct RecordingGuard<'a> {
    patcher: &'a mut RecordingPatcher,
    restored: bool,
}

impl RecordingGuard<'_> {
    fn revert(&mut self) -> Result<(), PatchError> {
        self.restored = true;
        self.patcher.restores += 1;
        if self.patcher.reject_restore {
            return Err(BackendError::Rejected("recording").into());
        }
        self.patcher.live = false;
        Ok(())
    }
}

unsafe impl PatchGuard for RecordingGuard<'_> {
    fn restore(mut self) -> Result<(), PatchError> {
        self.revert()
    }
}

impl Drop for RecordingGuard<'_> {
    fn drop(&mut self) {
        if !self.restored {
            let _ = self.revert();
        }
    }
}

/// Strategy with a fixed outcome, counting attempts
pub struct FakeStrategy {
    name: &'static str,
    result: StrategyResult,
    attempts: Rc<Cell<usize>>,
}

impl FakeStrategy {
    pub fn new(name: &'static str, result: StrategyResult) -> Self {
        Self {
            name,
            result,
            attempts: Rc::default(),
        }
    }

    pub fn attempts(&self) -> Rc<Cell<usize>> {
        self.attempts.clone()
    }
}

impl Strategy for FakeStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn attempt(&mut self) -> StrategyResult {
        self.attempts.set(self.attempts.get() + 1);
        self.result
    }
}
