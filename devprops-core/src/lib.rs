//! Shared data model for the devprops workspace.
//!
//! This crate has no I/O. It defines the declarative configuration schema
//! (`config`), the structural device path representation and its text parser
//! (`device_path`), and the UCS-2 string encoding that property databases
//! key on (`ucs2`). The patch driver and the database implementations both
//! build on these types, which keeps the coupling between them down to plain
//! data.

pub mod config;
pub mod device_path;
pub mod ucs2;
