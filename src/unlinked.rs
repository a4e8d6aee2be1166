//! Stand-in for collaborators that are not linked into this build
//!
//! Every backend operation reports [`BackendError::Unavailable`], so a strategy built on
//! [`Unlinked`] fails cleanly and the orchestrator moves on to the next one.

use log::debug;

use crate::address::KernelAddress;
use crate::neutralizer::{PluginRegistry, SecurityCheckPlugin};
use crate::patcher::diag::{DiagInjector, DiagValue};
use crate::patcher::side_channel::SideChannelPrimitive;
use crate::patcher::BackendError;
use crate::strategy::StrategyResult;
use crate::window::{ImageMapper, MappedWindow};

/// A collaborator with no implementation behind it
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlinked;

impl DiagInjector for Unlinked {
    fn inject(&mut self, _values: &[DiagValue]) -> Result<(), BackendError> {
        debug!("diagnostic injection is not linked");
        Err(BackendError::Unavailable)
    }
}

impl SideChannelPrimitive for Unlinked {
    fn break_at(&mut self, _address: KernelAddress) -> Result<(), BackendError> {
        debug!("side-channel primitive is not linked");
        Err(BackendError::Unavailable)
    }

    fn restore_at(&mut self, _address: KernelAddress) -> Result<(), BackendError> {
        Err(BackendError::Unavailable)
    }
}

impl ImageMapper for Unlinked {
    fn with_mapped_image(
        &mut self,
        _window_size: usize,
        _callback: &mut dyn FnMut(&mut MappedWindow<'_>) -> StrategyResult,
    ) -> Result<StrategyResult, BackendError> {
        debug!("kernel image mapping is not linked");
        Err(BackendError::Unavailable)
    }
}

/// No plugins are linked, which is not a registration failure
impl PluginRegistry for Unlinked {
    fn register_static(&self) -> Option<Vec<Box<dyn SecurityCheckPlugin>>> {
        Some(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use crate::address::KernelAddress;
    use crate::patcher::diag::{DiagInjector, DiagValue, BEQ};
    use crate::patcher::side_channel::SideChannelPrimitive;
    use crate::patcher::BackendError;

    use super::Unlinked;

    #[test]
    fn backends_are_unavailable() {
        let address = KernelAddress::new(0x1000).unwrap();
        assert!(matches!(Unlinked.break_at(address), Err(BackendError::Unavailable)));
        assert!(matches!(
            Unlinked.inject(&[DiagValue::new(address, BEQ)]),
            Err(BackendError::Unavailable)
        ));
    }
}
