//! The patch driver: the two configuration passes.
//!
//! The block pass removes configured properties; the add pass inserts
//! configured values where nothing meaningful is present yet. A property
//! that already holds a nonzero-size value is never overwritten, which is
//! what makes re-running the same configuration safe: the first run
//! populates, later runs leave the database alone.
//!
//! Failures never propagate outward. A device path that does not resolve
//! skips its entry; a property name that does not encode skips that
//! property; a database operation that fails is logged as a warning and
//! processing moves on to the sibling. The driver's only output besides the
//! database mutations is the [`Summary`].

use devprops_core::config::{AddEntry, BlockEntry, DeviceProperties};
use devprops_core::ucs2::Ucs2String;
use devprops_database::{Presence, PropertyDatabase, Removal};

use crate::resolver::resolve_device_path;

/// Counters for one driver run, reported by the CLI and asserted on by
/// tests. `warnings` counts database operations that failed; skips caused
/// by unusable configuration text are counted separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub removed: u64,
    pub already_absent: u64,
    pub set: u64,
    /// Add-pass properties left untouched because a nonzero-size value was
    /// already present.
    pub preserved: u64,
    /// Device entries skipped because their path text did not resolve.
    pub skipped_entries: u64,
    /// Properties skipped because their name did not encode.
    pub skipped_properties: u64,
    pub warnings: u64,
}

/// The patch driver, constructed over the database it mutates.
pub struct PatchDriver<'db, D: PropertyDatabase + ?Sized> {
    db: &'db mut D,
}

impl<'db, D: PropertyDatabase + ?Sized> PatchDriver<'db, D> {
    pub fn new(db: &'db mut D) -> PatchDriver<'db, D> {
        PatchDriver { db }
    }

    /// Process the whole configuration: block pass first, then add pass, each
    /// list in configuration order.
    pub fn run(&mut self, config: &DeviceProperties) -> Summary {
        let mut summary = Summary::default();
        self.block_pass(&config.block, &mut summary);
        self.add_pass(&config.add, &mut summary);
        summary
    }

    pub fn block_pass(&mut self, entries: &[BlockEntry], summary: &mut Summary) {
        let _span = tracing::info_span!("block_pass").entered();
        for entry in entries {
            let path = match resolve_device_path(&entry.device) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("Failed to resolve {} device path: {}", entry.device, e);
                    summary.skipped_entries += 1;
                    continue;
                }
            };
            for property in &entry.properties {
                let name = match Ucs2String::encode(property) {
                    Ok(name) => name,
                    Err(e) => {
                        tracing::warn!("Failed to convert {} property: {}", property, e);
                        summary.skipped_properties += 1;
                        continue;
                    }
                };
                match self.db.remove(&path, &name) {
                    Ok(Removal::Removed) => {
                        tracing::debug!("Removing devprop {}:{} - removed", entry.device, property);
                        summary.removed += 1;
                    }
                    Ok(Removal::Missing) => {
                        tracing::debug!(
                            "Removing devprop {}:{} - already absent",
                            entry.device,
                            property
                        );
                        summary.already_absent += 1;
                    }
                    Err(e) => {
                        tracing::warn!("Removing devprop {}:{} - {}", entry.device, property, e);
                        summary.warnings += 1;
                    }
                }
            }
        }
    }

    pub fn add_pass(&mut self, entries: &[AddEntry], summary: &mut Summary) {
        let _span = tracing::info_span!("add_pass").entered();
        for entry in entries {
            let path = match resolve_device_path(&entry.device) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("Failed to resolve {} device path: {}", entry.device, e);
                    summary.skipped_entries += 1;
                    continue;
                }
            };
            for assignment in &entry.properties {
                let name = match Ucs2String::encode(&assignment.name) {
                    Ok(name) => name,
                    Err(e) => {
                        tracing::warn!("Failed to convert {} property: {}", assignment.name, e);
                        summary.skipped_properties += 1;
                        continue;
                    }
                };
                let presence = match self.db.probe(&path, &name) {
                    Ok(presence) => presence,
                    Err(e) => {
                        // An unreadable slot is diagnosed, then treated as
                        // absent: the configured value is still attempted.
                        tracing::warn!(
                            "Getting devprop {}:{} - {}",
                            entry.device,
                            assignment.name,
                            e
                        );
                        summary.warnings += 1;
                        Presence::Absent
                    }
                };
                if presence == Presence::NonEmpty {
                    tracing::debug!(
                        "Skipping devprop {}:{} - a value is already present",
                        entry.device,
                        assignment.name
                    );
                    summary.preserved += 1;
                    continue;
                }
                // Presence::Empty falls through: a zero-size value is
                // populated exactly like an absent one.
                match self.db.set(&path, &name, &assignment.value) {
                    Ok(()) => {
                        tracing::debug!(
                            "Setting devprop {}:{} ({} bytes)",
                            entry.device,
                            assignment.name,
                            assignment.value.len()
                        );
                        summary.set += 1;
                    }
                    Err(e) => {
                        tracing::warn!("Setting devprop {}:{} - {}", entry.device, assignment.name, e);
                        summary.warnings += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devprops_core::config::PropertyAssignment;
    use devprops_core::device_path::DevicePath;
    use devprops_database::{DatabaseError, MemoryDatabase};

    const DEVICE: &str = "PciRoot(0x0)/Pci(0x1,0x0)";

    fn path(s: &str) -> DevicePath {
        s.parse().unwrap()
    }

    fn name(s: &str) -> Ucs2String {
        Ucs2String::encode(s).unwrap()
    }

    fn block(device: &str, properties: &[&str]) -> BlockEntry {
        BlockEntry {
            device: device.to_string(),
            properties: properties.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn add(device: &str, properties: &[(&str, &[u8])]) -> AddEntry {
        AddEntry {
            device: device.to_string(),
            properties: properties
                .iter()
                .map(|(n, v)| PropertyAssignment {
                    name: n.to_string(),
                    value: v.to_vec(),
                })
                .collect(),
        }
    }

    /// Database double that fails selected operations, for the warning
    /// paths. Failed operations leave the inner store untouched.
    #[derive(Default)]
    struct FlakyDatabase {
        inner: MemoryDatabase,
        fail_remove: bool,
        fail_probe: bool,
        fail_set: bool,
    }

    fn injected() -> DatabaseError {
        DatabaseError(anyhow::anyhow!("injected failure"))
    }

    impl PropertyDatabase for FlakyDatabase {
        fn remove(
            &mut self,
            path: &DevicePath,
            name: &Ucs2String,
        ) -> Result<Removal, DatabaseError> {
            if self.fail_remove {
                return Err(injected());
            }
            self.inner.remove(path, name)
        }

        fn get(
            &self,
            path: &DevicePath,
            name: &Ucs2String,
        ) -> Result<Option<Vec<u8>>, DatabaseError> {
            if self.fail_probe {
                return Err(injected());
            }
            self.inner.get(path, name)
        }

        fn set(
            &mut self,
            path: &DevicePath,
            name: &Ucs2String,
            value: &[u8],
        ) -> Result<(), DatabaseError> {
            if self.fail_set {
                return Err(injected());
            }
            self.inner.set(path, name, value)
        }
    }

    #[test]
    fn block_removes_configured_property() {
        let mut db = MemoryDatabase::new();
        db.set(&path(DEVICE), &name("built-in"), &[0]).unwrap();

        let config = DeviceProperties {
            block: vec![block(DEVICE, &["built-in"])],
            add: vec![],
        };
        let summary = PatchDriver::new(&mut db).run(&config);

        assert_eq!(db.get(&path(DEVICE), &name("built-in")).unwrap(), None);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.warnings, 0);
    }

    #[test]
    fn remove_of_absent_property_is_benign() {
        let mut db = MemoryDatabase::new();
        let config = DeviceProperties {
            block: vec![block(DEVICE, &["built-in"])],
            add: vec![],
        };
        let summary = PatchDriver::new(&mut db).run(&config);
        assert_eq!(summary.already_absent, 1);
        assert_eq!(summary.warnings, 0);
    }

    #[test]
    fn add_inserts_absent_property() {
        let mut db = MemoryDatabase::new();
        let config = DeviceProperties {
            block: vec![],
            add: vec![add(DEVICE, &[("device-id", &[0xAB])])],
        };
        let summary = PatchDriver::new(&mut db).run(&config);
        assert_eq!(
            db.get(&path(DEVICE), &name("device-id")).unwrap(),
            Some(vec![0xAB])
        );
        assert_eq!(summary.set, 1);
    }

    #[test]
    fn add_preserves_existing_nonzero_value() {
        let mut db = MemoryDatabase::new();
        db.set(&path(DEVICE), &name("device-id"), &[0xCD]).unwrap();

        let config = DeviceProperties {
            block: vec![],
            add: vec![add(DEVICE, &[("device-id", &[0xAB])])],
        };
        let summary = PatchDriver::new(&mut db).run(&config);

        assert_eq!(
            db.get(&path(DEVICE), &name("device-id")).unwrap(),
            Some(vec![0xCD])
        );
        assert_eq!(summary.preserved, 1);
        assert_eq!(summary.set, 0);
    }

    #[test]
    fn add_populates_zero_size_value() {
        let mut db = MemoryDatabase::new();
        db.set(&path(DEVICE), &name("device-id"), &[]).unwrap();

        let config = DeviceProperties {
            block: vec![],
            add: vec![add(DEVICE, &[("device-id", &[0xAB])])],
        };
        let summary = PatchDriver::new(&mut db).run(&config);

        assert_eq!(
            db.get(&path(DEVICE), &name("device-id")).unwrap(),
            Some(vec![0xAB])
        );
        assert_eq!(summary.set, 1);
        assert_eq!(summary.preserved, 0);
    }

    #[test]
    fn block_runs_before_add_for_the_same_key() {
        let mut db = MemoryDatabase::new();
        db.set(&path(DEVICE), &name("device-id"), &[0xCD]).unwrap();

        // If the order were reversed, the add pass would see the old
        // nonzero value and skip, and the block pass would then delete it.
        let config = DeviceProperties {
            block: vec![block(DEVICE, &["device-id"])],
            add: vec![add(DEVICE, &[("device-id", &[0xAB])])],
        };
        let summary = PatchDriver::new(&mut db).run(&config);

        assert_eq!(
            db.get(&path(DEVICE), &name("device-id")).unwrap(),
            Some(vec![0xAB])
        );
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.set, 1);
    }

    #[test]
    fn add_pass_is_idempotent() {
        let mut db = MemoryDatabase::new();
        let config = DeviceProperties {
            block: vec![],
            add: vec![add(
                DEVICE,
                &[("device-id", &[0xAB]), ("subsystem-id", &[0x12, 0x34])],
            )],
        };

        let first = PatchDriver::new(&mut db).run(&config);
        let after_first = db.clone();
        let second = PatchDriver::new(&mut db).run(&config);

        assert_eq!(db, after_first);
        assert_eq!(first.set, 2);
        assert_eq!(second.set, 0);
        assert_eq!(second.preserved, 2);
    }

    #[test]
    fn unresolvable_entry_does_not_stop_later_entries() {
        let mut db = MemoryDatabase::new();
        db.set(&path(DEVICE), &name("built-in"), &[0]).unwrap();

        let config = DeviceProperties {
            block: vec![
                block("PciRoot(0x0", &["built-in"]), // malformed
                block(DEVICE, &["built-in"]),
            ],
            add: vec![],
        };
        let summary = PatchDriver::new(&mut db).run(&config);

        assert_eq!(summary.skipped_entries, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(db.get(&path(DEVICE), &name("built-in")).unwrap(), None);
    }

    #[test]
    fn unencodable_device_text_skips_the_entry() {
        let mut db = MemoryDatabase::new();
        let config = DeviceProperties {
            block: vec![],
            add: vec![add("PciRoot(0x0)\u{1F600}", &[("device-id", &[1])])],
        };
        let summary = PatchDriver::new(&mut db).run(&config);
        assert_eq!(summary.skipped_entries, 1);
        assert!(db.is_empty());
    }

    #[test]
    fn unencodable_property_name_skips_only_that_property() {
        let mut db = MemoryDatabase::new();
        db.set(&path(DEVICE), &name("good"), &[0]).unwrap();

        let config = DeviceProperties {
            block: vec![block(DEVICE, &["bad\u{1F600}", "good"])],
            add: vec![],
        };
        let summary = PatchDriver::new(&mut db).run(&config);

        assert_eq!(summary.skipped_properties, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(db.get(&path(DEVICE), &name("good")).unwrap(), None);
    }

    #[test]
    fn remove_failure_warns_and_continues() {
        let mut db = FlakyDatabase {
            fail_remove: true,
            ..FlakyDatabase::default()
        };
        let config = DeviceProperties {
            block: vec![block(DEVICE, &["a", "b"])],
            add: vec![],
        };
        let summary = PatchDriver::new(&mut db).run(&config);
        // both siblings were attempted despite the first failure
        assert_eq!(summary.warnings, 2);
    }

    #[test]
    fn probe_failure_still_attempts_the_set() {
        let mut db = FlakyDatabase {
            fail_probe: true,
            ..FlakyDatabase::default()
        };
        let config = DeviceProperties {
            block: vec![],
            add: vec![add(DEVICE, &[("device-id", &[0xAB])])],
        };
        let summary = PatchDriver::new(&mut db).run(&config);

        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.set, 1);
        assert_eq!(
            db.inner.get(&path(DEVICE), &name("device-id")).unwrap(),
            Some(vec![0xAB])
        );
    }

    #[test]
    fn set_failure_warns_and_continues() {
        let mut db = FlakyDatabase {
            fail_set: true,
            ..FlakyDatabase::default()
        };
        let config = DeviceProperties {
            block: vec![],
            add: vec![add(DEVICE, &[("a", &[1]), ("b", &[2])])],
        };
        let summary = PatchDriver::new(&mut db).run(&config);
        assert_eq!(summary.warnings, 2);
        assert_eq!(summary.set, 0);
    }

    #[test]
    fn empty_configuration_is_a_no_op() {
        let mut db = MemoryDatabase::new();
        let summary = PatchDriver::new(&mut db).run(&DeviceProperties::default());
        assert_eq!(summary, Summary::default());
        assert!(db.is_empty());
    }
}
