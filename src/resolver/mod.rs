//! # Resolver
//!
//! This module covers address resolution for the target routine: the static device registry, the
//! running kernel's exported-symbol listing and the in-window comparison scan.

use log::{info, warn};

use crate::address::KernelAddress;
use crate::window::MappedWindow;

pub mod build_prop;
pub mod kallsyms;
pub mod registry;
pub mod scan;

use self::registry::{DeviceId, DeviceRegistry};

/// Identifies the device the process runs on
pub trait DeviceDetector {
    /// Identity of this device, or `None` if it cannot be determined
    fn detect(&self) -> Option<DeviceId>;
}

/// A live mapping from exported routine names to addresses
pub trait SymbolTable {
    /// Address of `name`, or `None` if it is not exported or hidden
    fn lookup(&self, name: &str) -> Option<KernelAddress>;
}

impl<T: SymbolTable + ?Sized> SymbolTable for &T {
    fn lookup(&self, name: &str) -> Option<KernelAddress> {
        (**self).lookup(name)
    }
}

/// Opens a [`SymbolTable`] over a mapped kernel image
pub trait SymbolTableOpener {
    /// Table handle, owned by the attempt that opened it
    type Table: SymbolTable;

    /// Opens the table for the image in `window`
    fn open(&self, window: &MappedWindow<'_>) -> Option<Self::Table>;
}

/// Resolves the target routine from the device registry, falling back to a live listing
pub struct AddressResolver<D, S> {
    /// Known devices and their routine addresses
    registry: DeviceRegistry,
    /// Identity source
    detector: D,
    /// Live listing used when the registry has no match
    symbols: S,
    /// Name of the routine in the live listing
    symbol: String,
}

impl<D: DeviceDetector, S: SymbolTable> AddressResolver<D, S> {
    /// Creates a resolver for `symbol`
    pub fn new(registry: DeviceRegistry, detector: D, symbols: S, symbol: impl Into<String>) -> Self {
        Self {
            registry,
            detector,
            symbols,
            symbol: symbol.into(),
        }
    }

    /// Detects the device and resolves the routine for it
    pub fn resolve(&self) -> Option<KernelAddress> {
        let identity = self.detector.detect();
        self.resolve_identity(identity.as_ref())
    }

    /// Resolves the routine for `identity`.
    ///
    /// A registry hit never touches the live listing.
    pub fn resolve_identity(&self, identity: Option<&DeviceId>) -> Option<KernelAddress> {
        match identity {
            Some(identity) => {
                if let Some(profile) = self.registry.lookup(identity) {
                    info!("{identity}: {} at {}", self.symbol, profile.known_address);
                    return Some(profile.known_address);
                }
                warn!("{identity} is not a supported device");
            }
            None => warn!("could not identify this device"),
        }

        info!("attempting to detect {} from the live symbol listing", self.symbol);
        let address = self.symbols.lookup(&self.symbol);
        match address {
            Some(address) => info!("{} at {address}", self.symbol),
            None => warn!("{} not found in the live symbol listing", self.symbol),
        }
        address
    }
}
