//! # Neutralizer
//!
//! Best-effort removal of unrelated in-kernel security checks through externally registered
//! plugins. Its outcome is logged and never decides whether a strategy succeeded.

use log::{debug, info, warn};

use crate::patcher::PatchError;
use crate::resolver::SymbolTable;
use crate::window::MappedWindow;

/// A patch for one security check, supplied by an external plugin
pub trait SecurityCheckPlugin {
    /// Short name used in diagnostics
    fn name(&self) -> &str;
    /// Resolves the symbols the plugin patches. Returns `false` if they are absent from this kernel.
    fn resolve_symbols(&mut self, table: &dyn SymbolTable) -> bool;
    /// Applies the patch through the mapped window
    fn neutralize(&mut self, window: &mut MappedWindow<'_>) -> Result<(), PatchError>;
}

/// Source of the statically linked plugins
pub trait PluginRegistry {
    /// Fresh plugin instances for one attempt, or `None` if registration failed
    fn register_static(&self) -> Option<Vec<Box<dyn SecurityCheckPlugin>>>;
}

/// Tally of one [`SecurityCheckNeutralizer::neutralize`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeutralizeSummary {
    /// Plugins whose patch went in
    pub applied: usize,
    /// Plugins whose symbols were not found
    pub skipped: usize,
    /// Plugins whose patch failed
    pub failed: usize,
}

/// The plugins registered for one strategy attempt. Dropped with the attempt.
pub struct SecurityCheckNeutralizer {
    /// Registered plugins and whether their symbols resolved
    plugins: Vec<(Box<dyn SecurityCheckPlugin>, bool)>,
}

impl SecurityCheckNeutralizer {
    /// Registers the plugins of `registry`
    pub fn register<R: PluginRegistry + ?Sized>(registry: &R) -> Option<Self> {
        let plugins = registry.register_static()?;
        debug!("registered {} security check plugins", plugins.len());
        Some(Self {
            plugins: plugins.into_iter().map(|plugin| (plugin, false)).collect(),
        })
    }

    /// Resolves every plugin's symbols against `table`
    pub fn resolve_symbols(&mut self, table: &dyn SymbolTable) {
        for (plugin, resolved) in &mut self.plugins {
            *resolved = plugin.resolve_symbols(table);
            if !*resolved {
                debug!("{}: symbols not found", plugin.name());
            }
        }
    }

    /// Applies every resolved plugin
    pub fn neutralize(&mut self, window: &mut MappedWindow<'_>) -> NeutralizeSummary {
        let mut summary = NeutralizeSummary::default();
        for (plugin, resolved) in &mut self.plugins {
            if !*resolved {
                summary.skipped += 1;
                continue;
            }
            match plugin.neutralize(window) {
                Ok(()) => {
                    info!("{}: security check disabled", plugin.name());
                    summary.applied += 1;
                }
                Err(e) => {
                    warn!("{}: failed to disable security check: {e}", plugin.name());
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}
