//! # netkey Core Library
//!
//! A library for computing canonical, representation-independent identifiers
//! ("topological genomes") of the periodic graphs underlying crystalline
//! frameworks, and for recognizing them against archives of named topologies.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a
//! clear separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models
//!   (`CrystalNet`, `PeriodicGraph3D`, `Cell`), exact rational arithmetic,
//!   and archive I/O utilities.
//!
//! - **[`engine`]: The Logic Core.** The canonical-key machinery: equilibrium
//!   placement, symmetry detection, primitive-cell reduction, vertex
//!   partitioning, candidate-basis enumeration and the minimal-key search.
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer.
//!   It ties `engine` and `core` together into complete procedures: computing
//!   a topological genome and looking it up in an archive.

pub mod core;
pub mod engine;
pub mod workflows;
