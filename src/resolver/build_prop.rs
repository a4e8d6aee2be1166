//! Device identification from the system build properties

use std::fs;
use std::path::PathBuf;

use log::{debug, warn};

use super::registry::DeviceId;
use super::DeviceDetector;

/// Property holding the model name
const MODEL_KEY: &str = "ro.product.model";
/// Property holding the build number
const BUILD_KEY: &str = "ro.build.display.id";

/// Reads the device identity out of a `key=value` property file
#[derive(Debug, Clone)]
pub struct BuildPropDetector {
    /// Location of the property file
    path: PathBuf,
}

impl BuildPropDetector {
    /// Creates a detector reading `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Value of `key` in property file `contents`
fn property<'a>(contents: &'a str, key: &str) -> Option<&'a str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
}

impl DeviceDetector for BuildPropDetector {
    fn detect(&self) -> Option<DeviceId> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("failed to read {}: {e}", self.path.display());
                return None;
            }
        };
        let model = property(&contents, MODEL_KEY)?;
        let build = property(&contents, BUILD_KEY)?;
        let identity = DeviceId::new(model, build);
        debug!("detected {identity}");
        Some(identity)
    }
}
