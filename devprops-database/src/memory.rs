use std::collections::BTreeMap;

use devprops_core::device_path::DevicePath;
use devprops_core::ucs2::Ucs2String;

use crate::{DatabaseError, PropertyDatabase, Removal};

/// In-memory property database.
///
/// Keyed structurally, so textual respellings of a device path hit the same
/// slot. Operations are infallible; this is the substitutable double for
/// driver tests and a reasonable store for one-shot runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryDatabase {
    devices: BTreeMap<DevicePath, BTreeMap<Ucs2String, Vec<u8>>>,
}

impl MemoryDatabase {
    pub fn new() -> MemoryDatabase {
        MemoryDatabase::default()
    }

    /// Iterate all devices and their properties, in key order.
    pub fn devices(
        &self,
    ) -> impl Iterator<Item = (&DevicePath, &BTreeMap<Ucs2String, Vec<u8>>)> {
        self.devices.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.values().all(|props| props.is_empty())
    }
}

impl PropertyDatabase for MemoryDatabase {
    fn remove(&mut self, path: &DevicePath, name: &Ucs2String) -> Result<Removal, DatabaseError> {
        match self.devices.get_mut(path) {
            Some(props) if props.contains_key(name) => {
                props.remove(name);
                Ok(Removal::Removed)
            }
            _ => Ok(Removal::Missing),
        }
    }

    fn get(
        &self,
        path: &DevicePath,
        name: &Ucs2String,
    ) -> Result<Option<Vec<u8>>, DatabaseError> {
        Ok(self
            .devices
            .get(path)
            .and_then(|props| props.get(name))
            .cloned())
    }

    fn set(
        &mut self,
        path: &DevicePath,
        name: &Ucs2String,
        value: &[u8],
    ) -> Result<(), DatabaseError> {
        self.devices
            .entry(path.clone())
            .or_default()
            .insert(name.clone(), value.to_vec());
        Ok(())
    }
}
