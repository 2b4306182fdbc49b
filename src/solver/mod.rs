//! Installability testing and migration-order solving.
//!
//! This module holds the interned package universe, the SAT-style
//! installability tester that decides whether a package can be installed
//! from the current candidate set, and the migration solver that derives a
//! linearized schedule (with strongly connected components collapsed into
//! atomic groups) for a batch of candidate migrations.

mod order;
mod tester;
mod universe;

pub use order::{InstallabilitySolver, MigrationGroup};
pub use tester::InstallabilityTester;
pub use universe::{PkgId, Universe, UniverseBuilder};
