//! Rust toolkit for testing installability and scheduling package
//! migrations between archive suites.
//!
//! This crate provides the decision core of a suite-migration engine: an
//! installability tester that decides whether a package can be installed
//! from a hypothetical suite content, a migration solver that schedules
//! batches of candidate migrations (collapsing mutually dependent items
//! into atomic groups), the mutable suite tables with a transactional undo
//! log, and the age and RC-bug policy gates that pre-filter candidates.
//!
//! # Overview
//!
//! - **Universe and tester**: intern every `(name, version, arch)` tuple,
//!   then ask [`InstallabilityTester::is_installable`] against the current
//!   candidate set. Verdicts are cached and the caches survive exactly the
//!   mutations they may survive.
//! - **Migration solver**: [`InstallabilitySolver::solve_groups`] turns a
//!   batch of `(item, adds, removals)` groups into a linearized schedule
//!   of atomic groups.
//! - **Suite tables and undo**: [`apply_migration`] mutates the target
//!   suite and records every prior value; [`undo_changes`] rolls back in
//!   four phases.
//! - **Policy gates**: [`AgePolicy`](policy::AgePolicy) and
//!   [`RcBugPolicy`](policy::RcBugPolicy) classify candidates before they
//!   reach the solver.
//!
//! # Examples
//!
//! ## Testing installability
//!
//! ```
//! use migration_toolkit::{InstallabilityTester, PackageTuple, UniverseBuilder};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let editor = PackageTuple::new("editor", "2.0", "amd64");
//! let libtext = PackageTuple::new("libtext", "1.4", "amd64");
//!
//! let mut builder = UniverseBuilder::new();
//! builder.add_package(&editor, &[vec![libtext.clone()]], &[], false);
//! builder.add_package(&libtext, &[], &[], false);
//!
//! let mut tester = InstallabilityTester::new(builder.build());
//! tester.add_candidate_binary(&editor)?;
//! tester.add_candidate_binary(&libtext)?;
//! assert!(tester.is_installable(&editor)?);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Scheduling migrations
//!
//! ```
//! use migration_toolkit::{
//!     InstallabilitySolver, InstallabilityTester, MigrationGroup, MigrationItem,
//!     PackageTuple, UniverseBuilder,
//! };
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let lib_new = PackageTuple::new("libfoo", "2.0", "amd64");
//! let app_new = PackageTuple::new("app", "2.0", "amd64");
//! let mut builder = UniverseBuilder::new();
//! builder.add_package(&lib_new, &[], &[], false);
//! builder.add_package(&app_new, &[vec![lib_new.clone()]], &[], false);
//!
//! let solver = InstallabilitySolver::new(InstallabilityTester::new(builder.build()));
//! let schedule = solver.solve_groups(&[
//!     MigrationGroup {
//!         item: MigrationItem::parse_versioned("app/2.0"),
//!         adds: vec![app_new],
//!         rms: vec![],
//!     },
//!     MigrationGroup {
//!         item: MigrationItem::parse_versioned("libfoo/2.0"),
//!         adds: vec![lib_new],
//!         rms: vec![],
//!     },
//! ])?;
//! // libfoo supplies what app needs, so it is scheduled first.
//! assert_eq!(schedule.len(), 2);
//! assert_eq!(schedule[0][0].to_string(), "libfoo/2.0");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod archive;
pub mod env;
pub mod error;
pub mod hints;
pub mod policy;
pub mod report;
pub mod solver;
pub mod types;
pub mod version;

/// Prelude module for convenient imports.
///
/// This module re-exports commonly used types and functions, allowing you
/// to import everything you need with a single
/// `use migration_toolkit::prelude::*;`.
pub mod prelude;

// Re-export commonly used types
pub use error::{MigrationToolkitError as Error, Result};
pub use types::{BinaryRecord, MigrationItem, PackageTuple, SourceRecord};

pub use archive::{
    SuiteTables, UndoEntry, apply_migration, compute_reverse_tree, register_reverses,
    undo_changes,
};
pub use hints::{Hint, HintCollection};
pub use policy::{AgePolicy, Policy, PolicyInfo, PolicyVerdict, RcBugPolicy};
pub use solver::{
    InstallabilitySolver, InstallabilityTester, MigrationGroup, Universe, UniverseBuilder,
};
