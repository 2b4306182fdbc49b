//! Convenient re-exports of the crate's commonly used items.
//!
//! # Example
//!
//! ```
//! use migration_toolkit::prelude::*;
//!
//! let tuple = PackageTuple::new("editor", "2.0", "amd64");
//! assert_eq!(tuple.to_string(), "editor/2.0/amd64");
//! ```

pub use crate::archive::{
    ArchTables, SuiteTables, UndoEntry, apply_migration, compute_reverse_tree,
    register_reverses, undo_changes,
};
pub use crate::error::{MigrationToolkitError, Result};
pub use crate::hints::{Hint, HintCollection};
pub use crate::policy::{AgePolicy, Policy, PolicyInfo, PolicyVerdict, RcBugPolicy};
pub use crate::solver::{
    InstallabilitySolver, InstallabilityTester, MigrationGroup, Universe, UniverseBuilder,
};
pub use crate::types::{
    BinaryRecord, MigrationItem, PackageTuple, SOURCE_SUITE, SourceRecord, TARGET_SUITE,
};
pub use crate::version::compare_versions;
