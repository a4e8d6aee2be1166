//! Exported-symbol listing of the running kernel

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use log::{debug, warn};

use crate::address::KernelAddress;
use crate::window::MappedWindow;

use super::{SymbolTable, SymbolTableOpener};

/// A `/proc/kallsyms`-style listing: `<hex address> <type> <name> [module]` per line.
///
/// Every lookup rescans the file. A zero address means the kernel hides pointers from us and is
/// reported as not found.
#[derive(Debug, Clone)]
pub struct KallsymsFile {
    /// Location of the listing
    path: PathBuf,
}

impl KallsymsFile {
    /// Creates a listing reader for `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SymbolTable for KallsymsFile {
    fn lookup(&self, name: &str) -> Option<KernelAddress> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                warn!("failed to open {}: {e}", self.path.display());
                return None;
            }
        };

        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("failed to read {}: {e}", self.path.display());
                    return None;
                }
            };
            let mut fields = line.split_whitespace();
            let (Some(address), Some(_kind), Some(symbol)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            if symbol == name {
                let address = u64::from_str_radix(address, 16).ok().and_then(KernelAddress::new);
                if address.is_none() {
                    debug!("{name} is listed without an address");
                }
                return address;
            }
        }
        None
    }
}

/// The listing doubles as the live table for a mapped image when no in-memory parser is linked
impl SymbolTableOpener for KallsymsFile {
    type Table = KallsymsFile;

    fn open(&self, _window: &MappedWindow<'_>) -> Option<Self::Table> {
        match File::open(&self.path) {
            Ok(_) => Some(self.clone()),
            Err(e) => {
                warn!("failed to open {}: {e}", self.path.display());
                None
            }
        }
    }
}
