//! The property database interface.
//!
//! The patch driver never talks to a concrete store; it is constructed over
//! any [`PropertyDatabase`], which is what makes the driver testable against
//! [`MemoryDatabase`] and lets deployments swap in the file-backed provider
//! from `devprops-database-local`.
//!
//! The three mutating/query operations mirror the wire contract of a device
//! property store: `remove` (absent keys are a benign [`Removal::Missing`],
//! not an error), `probe` (an explicit presence tri-state; see below), and
//! `set`. `get` is the full read used by state dumps and tests; `probe` has
//! a default implementation in terms of it.

mod memory;
pub use memory::MemoryDatabase;

use devprops_core::device_path::DevicePath;
use devprops_core::ucs2::Ucs2String;

/// Outcome of a remove operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    /// The property was already absent. Expected during re-runs; callers
    /// must not treat this as a failure.
    Missing,
}

/// Presence of a property at a (device path, name) key.
///
/// `Empty` is deliberately distinct from `Absent`: the add pass only
/// preserves values of nonzero size, so the two non-`NonEmpty` states lead
/// to the same action but are reported differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Absent,
    Empty,
    NonEmpty,
}

/// A database operation failed in the backing store.
#[derive(Debug, thiserror::Error)]
#[error("property database operation failed: {0}")]
pub struct DatabaseError(pub anyhow::Error);

impl From<anyhow::Error> for DatabaseError {
    fn from(e: anyhow::Error) -> DatabaseError {
        DatabaseError(e)
    }
}

pub trait PropertyDatabase {
    /// Remove the property at `(path, name)`.
    fn remove(&mut self, path: &DevicePath, name: &Ucs2String) -> Result<Removal, DatabaseError>;

    /// Read the property value at `(path, name)`, `None` if absent.
    fn get(
        &self,
        path: &DevicePath,
        name: &Ucs2String,
    ) -> Result<Option<Vec<u8>>, DatabaseError>;

    /// Insert or replace the property at `(path, name)`.
    fn set(
        &mut self,
        path: &DevicePath,
        name: &Ucs2String,
        value: &[u8],
    ) -> Result<(), DatabaseError>;

    /// Report whether a property exists and whether it has a nonzero size.
    /// Implementations that can answer this without materializing the value
    /// should override the default.
    fn probe(&self, path: &DevicePath, name: &Ucs2String) -> Result<Presence, DatabaseError> {
        Ok(match self.get(path, name)? {
            None => Presence::Absent,
            Some(value) if value.is_empty() => Presence::Empty,
            Some(_) => Presence::NonEmpty,
        })
    }
}
