//! Core data types for suite contents and migration items.
//!
//! This module contains the plain data types shared by the archive tables,
//! the installability tester and the migration solver: package tuples,
//! source and binary records, and migration items.

pub mod item;
pub mod package;

pub use item::{MigrationItem, make_migration_item};
pub use package::{BinaryRecord, PackageTuple, SOURCE_SUITE, SourceRecord, TARGET_SUITE};
