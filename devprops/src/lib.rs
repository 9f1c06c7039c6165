//! The devprops patch engine.
//!
//! Two components, consumed in sequence: the [`resolver`] turns device path
//! text into the structural handle the database keys on, and the [`driver`]
//! walks the configuration in two passes (block, then add) issuing
//! remove/probe/set operations against an injected
//! [`devprops_database::PropertyDatabase`].
//!
//! The binary in this crate wraps the engine in a CLI; the engine itself
//! performs no I/O beyond the database interface and emits diagnostics
//! through `tracing`.

pub mod driver;
pub mod resolver;
