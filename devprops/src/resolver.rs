//! Device path resolution: configuration text to database handle.

use devprops_core::device_path::{DevicePath, ParseError};
use devprops_core::ucs2::{EncodeError, Ucs2String};

/// Why a device path text could not be resolved. Either way the
/// configuration entry is skipped and diagnosed; neither case is fatal to
/// the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("device path text cannot be encoded for the property database: {0}")]
    Encoding(#[from] EncodeError),
    #[error("invalid device path: {0}")]
    Parse(#[from] ParseError),
}

/// Convert device path text into the structural handle the database keys on.
///
/// The text is first converted to the database-native wide encoding, which
/// is what the parser consumes; the wide intermediate is only needed during
/// parsing and is dropped before returning. The caller owns the handle for
/// the duration of one configuration entry.
pub fn resolve_device_path(text: &str) -> Result<DevicePath, ResolveError> {
    let wide = Ucs2String::encode(text)?;
    let path = DevicePath::parse_wide(&wide)?;
    Ok(path)
}
