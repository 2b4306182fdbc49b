//! Mutable suite tables, reverse-dependency analysis and the undo log.
//!
//! This module owns the string-keyed package-universe data model: per-suite
//! source tables and per-architecture binary/provides tables, the
//! reverse-relation registration that keeps `rdeps`/`rcons` symmetric, the
//! breadth-first reverse-dependency closure used to scope installability
//! re-checks, and the transactional undo log that lets a driver try a
//! migration and roll the tables back if it breaks the target suite.

mod migrate;
mod reverse;
mod tables;
mod undo;

pub use migrate::apply_migration;
pub use reverse::compute_reverse_tree;
pub use tables::{ArchTables, BinaryTable, ProvidesTable, SourceTable, SuiteTables, register_reverses};
pub use undo::{UndoEntry, undo_changes};
