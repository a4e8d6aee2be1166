//! Locating the comparison instruction inside a mapped routine

use log::warn;
use memchr::memmem;

use crate::address::KernelAddress;
use crate::patcher::cmp::CMP_PATTERN;
use crate::window::MappedWindow;

use super::SymbolTable;

/// Finds the first [`CMP_PATTERN`] within `scan_len` bytes of `routine`.
///
/// The scan stops at the end of the window.
pub fn find_cmp(window: &MappedWindow<'_>, routine: KernelAddress, scan_len: usize) -> Option<KernelAddress> {
    let code = window
        .clamp_len(routine, scan_len)
        .and_then(|len| window.slice(routine, len));
    let code = match code {
        Ok(code) => code,
        Err(e) => {
            warn!("cannot scan {routine}: {e}");
            return None;
        }
    };
    memmem::find(code, &CMP_PATTERN).map(|offset| routine + offset as u64)
}

/// Resolves `symbol` through `table` and finds the comparison inside it
pub fn locate_cmp<T: SymbolTable>(
    table: &T,
    window: &MappedWindow<'_>,
    symbol: &str,
    scan_len: usize,
) -> Option<KernelAddress> {
    let Some(routine) = table.lookup(symbol) else {
        warn!("failed to get {symbol} address from the live symbol table");
        return None;
    };
    let cmp = find_cmp(window, routine, scan_len);
    if cmp.is_none() {
        warn!("no comparison found within {scan_len:#x} bytes of {symbol} at {routine}");
    }
    cmp
}
