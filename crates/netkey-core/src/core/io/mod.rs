//! Input/output functionality for topology archives.
//!
//! The canonical-key computation itself performs no I/O; this module holds
//! the text-format archive of named topologies and its atomic persistence.

pub mod archive;
