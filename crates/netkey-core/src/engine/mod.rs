//! The canonical-key machinery.
//!
//! Stages, in pipeline order: [`equilibrium`] places vertices exactly,
//! [`translations`] reduces to the translational primitive cell,
//! [`symmetry`] and [`partition`] classify vertices, [`candidates`]
//! enumerates basis candidates, [`key`] relabels and emits edge lists, and
//! [`basis`] normalizes the winning list to integer offsets.

pub mod basis;
pub mod candidates;
pub mod config;
pub mod equilibrium;
pub mod error;
pub mod key;
pub mod partition;
pub mod symmetry;
pub mod translations;
