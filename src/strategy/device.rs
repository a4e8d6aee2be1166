//! Strategy patching a routine resolved from the device registry or the live listing

use log::{info, warn};

use crate::elevate::Elevation;
use crate::patcher::diag::{DiagInjector, DiagPatcher};
use crate::patcher::side_channel::{SideChannelPatcher, SideChannelPrimitive};
use crate::resolver::{AddressResolver, DeviceDetector, SymbolTable};

use super::{run_transaction, Strategy, StrategyResult};

/// Resolves the routine once, then tries the side-channel backend followed by the diagnostic
/// backend against the same address.
///
/// When both fail, [`StrategyResult::FailedPrivilegeCall`] is reported if either backend got as far
/// as the privileged call.
pub struct DeviceStrategy<D, S, C, I, E> {
    /// Registry lookup with live fallback
    resolver: AddressResolver<D, S>,
    /// First backend
    side_channel: SideChannelPatcher<C>,
    /// Second backend
    diag: DiagPatcher<I>,
    /// Privileged call
    elevation: E,
}

impl<D, S, C, I, E> DeviceStrategy<D, S, C, I, E>
where
    D: DeviceDetector,
    S: SymbolTable,
    C: SideChannelPrimitive,
    I: DiagInjector,
    E: Elevation,
{
    /// Creates a new [`DeviceStrategy`]
    pub fn new(resolver: AddressResolver<D, S>, side_channel: C, diag: I, elevation: E) -> Self {
        Self {
            resolver,
            side_channel: SideChannelPatcher::new(side_channel),
            diag: DiagPatcher::new(diag),
            elevation,
        }
    }
}

impl<D, S, C, I, E> Strategy for DeviceStrategy<D, S, C, I, E>
where
    D: DeviceDetector,
    S: SymbolTable,
    C: SideChannelPrimitive,
    I: DiagInjector,
    E: Elevation,
{
    fn name(&self) -> &'static str {
        "device"
    }

    fn attempt(&mut self) -> StrategyResult {
        let Some(target) = self.resolver.resolve() else {
            warn!("could not resolve the target routine");
            return StrategyResult::FailedToPatch;
        };

        info!("attempting side-channel patch at {target}");
        // Safety: both backends' techniques are built for the start of the resolved routine
        let first = unsafe { run_transaction(&mut self.side_channel, target, &mut self.elevation) };
        if first.is_success() {
            return first;
        }

        info!("attempting diag patch at {target}");
        match unsafe { run_transaction(&mut self.diag, target, &mut self.elevation) } {
            StrategyResult::FailedToPatch => first,
            second => second,
        }
    }
}
