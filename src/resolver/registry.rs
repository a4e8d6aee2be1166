//! Static registry of supported devices

use std::collections::HashSet;
use std::fmt;

use lazy_static::lazy_static;
use log::error;
use thiserror::Error;

use crate::address::KernelAddress;

/// Errors building a [`DeviceRegistry`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two profiles share an identity
    #[error("device {0} is registered more than once")]
    DuplicateIdentity(DeviceId),
    /// A profile records the null address
    #[error("device {0} has no address")]
    NullAddress(DeviceId),
}

/// Opaque device identifier: model name plus build number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId {
    /// `ro.product.model`
    model: String,
    /// `ro.build.display.id`
    build: String,
}

impl DeviceId {
    /// Creates an identifier from a model and a build
    pub fn new(model: impl Into<String>, build: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            build: build.into(),
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.model, self.build)
    }
}

/// A device and the address of the target routine on its kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Device identity
    pub identity: DeviceId,
    /// Kernel virtual address of the target routine
    pub known_address: KernelAddress,
}

impl DeviceProfile {
    /// Creates a profile, refusing a zero address
    pub fn new(identity: DeviceId, known_address: u64) -> Result<Self, RegistryError> {
        match KernelAddress::new(known_address) {
            Some(known_address) => Ok(Self {
                identity,
                known_address,
            }),
            None => Err(RegistryError::NullAddress(identity)),
        }
    }
}

/// Read-only table of [`DeviceProfile`]s with unique identities
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    /// Profiles in registration order
    profiles: Vec<DeviceProfile>,
}

impl DeviceRegistry {
    /// Creates a registry, checking that identities are unique
    pub fn new(profiles: Vec<DeviceProfile>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::with_capacity(profiles.len());
        for profile in &profiles {
            if !seen.insert(&profile.identity) {
                return Err(RegistryError::DuplicateIdentity(profile.identity.clone()));
            }
        }
        Ok(Self { profiles })
    }

    /// The registry of devices known to ship a patchable kernel
    pub fn builtin() -> &'static DeviceRegistry {
        &SUPPORTED_DEVICES
    }

    /// Profile registered for `identity`
    pub fn lookup(&self, identity: &DeviceId) -> Option<&DeviceProfile> {
        self.profiles.iter().find(|profile| &profile.identity == identity)
    }

    /// All profiles
    pub fn profiles(&self) -> &[DeviceProfile] {
        &self.profiles
    }
}

/// `(model, build, sys_setresuid)` for each supported device
const BUILTIN_DEVICES: [(&str, &str, u64); 9] = [
    ("F-03D", "V24R33Cc", 0xc00e838c),
    ("F-11D", "V21R36A", 0xc00fda10),
    ("F-11D", "V24R40A", 0xc00fda0c),
    ("F-11D", "V26R42B", 0xc00fd9c8),
    ("F-12C", "V21", 0xc00e5a90),
    ("IS11N", "GRJ90", 0xc00f0a04),
    ("IS17SH", "01.00.03", 0xc01b82a4),
    ("ISW11K", "145.0.0002", 0xc010ae18),
    ("ISW12K", "010.0.3000", 0xc0176d40),
];

/// Builds a registry from `(model, build, address)` entries. Entries with a null address or an
/// identity seen earlier are logged and left out.
fn registry_from(entries: &[(&str, &str, u64)]) -> DeviceRegistry {
    let mut profiles: Vec<DeviceProfile> = Vec::with_capacity(entries.len());
    for &(model, build, address) in entries {
        let profile = match DeviceProfile::new(DeviceId::new(model, build), address) {
            Ok(profile) => profile,
            Err(e) => {
                error!("skipping device entry: {e}");
                continue;
            }
        };
        if profiles.iter().any(|seen| seen.identity == profile.identity) {
            error!("skipping device entry: {}", RegistryError::DuplicateIdentity(profile.identity));
            continue;
        }
        profiles.push(profile);
    }
    DeviceRegistry { profiles }
}

lazy_static! {
    static ref SUPPORTED_DEVICES: DeviceRegistry = registry_from(&BUILTIN_DEVICES);
}

#[cfg(test)]
mod tests {
    use super::{registry_from, DeviceId, DeviceProfile, DeviceRegistry, RegistryError, BUILTIN_DEVICES};

    #[test]
    fn builtin_registry_is_valid() {
        let builtin = DeviceRegistry::builtin();
        assert_eq!(builtin.profiles().len(), BUILTIN_DEVICES.len());
        assert!(DeviceRegistry::new(builtin.profiles().to_vec()).is_ok());

        let profile = builtin.lookup(&DeviceId::new("F-11D", "V24R40A")).unwrap();
        assert_eq!(profile.known_address.get(), 0xc00fda0c);
        assert!(builtin.lookup(&DeviceId::new("F-11D", "V99")).is_none());
    }

    #[test]
    fn duplicate_identities_are_rejected() {
        let profiles = vec![
            DeviceProfile::new(DeviceId::new("D1", "B1"), 0x1000).unwrap(),
            DeviceProfile::new(DeviceId::new("D1", "B1"), 0x2000).unwrap(),
        ];
        assert_eq!(
            DeviceRegistry::new(profiles).unwrap_err(),
            RegistryError::DuplicateIdentity(DeviceId::new("D1", "B1"))
        );
    }

    #[test]
    fn null_address_is_rejected() {
        assert_eq!(
            DeviceProfile::new(DeviceId::new("D1", "B1"), 0).unwrap_err(),
            RegistryError::NullAddress(DeviceId::new("D1", "B1"))
        );
    }

    #[test]
    fn bad_entries_are_left_out() {
        let registry = registry_from(&[
            ("D1", "B1", 0x1000),
            ("D2", "B2", 0),
            ("D1", "B1", 0x2000),
            ("D3", "B3", 0x3000),
        ]);

        assert_eq!(registry.profiles().len(), 2);
        // first registration of an identity wins
        assert_eq!(registry.lookup(&DeviceId::new("D1", "B1")).unwrap().known_address.get(), 0x1000);
        assert!(registry.lookup(&DeviceId::new("D2", "B2")).is_none());
        assert!(DeviceRegistry::new(registry.profiles().to_vec()).is_ok());
    }
}
