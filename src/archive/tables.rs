//! Per-suite source, binary and provides tables.

use crate::types::{BinaryRecord, SourceRecord};
use std::collections::HashMap;

/// Source table for one suite, keyed by source package name.
pub type SourceTable = HashMap<String, SourceRecord>;

/// Binary table for one suite and architecture, keyed by binary name.
pub type BinaryTable = HashMap<String, BinaryRecord>;

/// Provides table for one suite and architecture: virtual package name to
/// the names of the binaries providing it.
pub type ProvidesTable = HashMap<String, Vec<String>>;

/// Binary and provides tables for one architecture of a suite.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchTables {
    /// Real binary packages on this architecture.
    pub packages: BinaryTable,
    /// Virtual package providers on this architecture.
    pub provides: ProvidesTable,
}

/// All suite tables of one migration run.
///
/// Built once at startup from archive metadata, then mutated in place by
/// speculative migrations (with every prior value recorded in an
/// [`UndoEntry`](crate::archive::UndoEntry)).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SuiteTables {
    /// Source tables keyed by suite name.
    pub sources: HashMap<String, SourceTable>,
    /// Binary/provides tables keyed by suite name, then architecture.
    pub binaries: HashMap<String, HashMap<String, ArchTables>>,
}

impl SuiteTables {
    /// Create empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// What: Insert a source record, creating the suite table if needed.
    ///
    /// Inputs:
    /// - `suite`: Suite name.
    /// - `name`: Source package name.
    /// - `record`: Record to insert.
    ///
    /// Output: None
    pub fn add_source(&mut self, suite: &str, name: &str, record: SourceRecord) {
        self.sources
            .entry(suite.to_string())
            .or_default()
            .insert(name.to_string(), record);
    }

    /// What: Insert a binary record, creating suite/arch tables if needed.
    ///
    /// Inputs:
    /// - `suite`: Suite name.
    /// - `arch`: Architecture.
    /// - `name`: Binary package name.
    /// - `record`: Record to insert.
    ///
    /// Output: None
    ///
    /// Details:
    /// - The record's provides list is registered in the architecture's
    ///   provides table.
    pub fn add_binary(&mut self, suite: &str, arch: &str, name: &str, record: BinaryRecord) {
        let tables = self
            .binaries
            .entry(suite.to_string())
            .or_default()
            .entry(arch.to_string())
            .or_default();
        for virt in &record.provides {
            let providers = tables.provides.entry(virt.clone()).or_default();
            if !providers.contains(&name.to_string()) {
                providers.push(name.to_string());
            }
        }
        tables.packages.insert(name.to_string(), record);
    }

    /// Source table of a suite, when present.
    #[must_use]
    pub fn suite_sources(&self, suite: &str) -> Option<&SourceTable> {
        self.sources.get(suite)
    }

    /// Binary/provides tables of a suite and architecture, when present.
    #[must_use]
    pub fn arch_tables(&self, suite: &str, arch: &str) -> Option<&ArchTables> {
        self.binaries.get(suite).and_then(|suite| suite.get(arch))
    }

    /// Mutable binary/provides tables of a suite and architecture, created
    /// on demand.
    pub fn arch_tables_mut(&mut self, suite: &str, arch: &str) -> &mut ArchTables {
        self.binaries
            .entry(suite.to_string())
            .or_default()
            .entry(arch.to_string())
            .or_default()
    }
}

/// What: Register reverse dependencies and conflicts for a set of packages.
///
/// Inputs:
/// - `packages`: Binary table whose `rdeps`/`rcons` lists are updated.
/// - `provides`: Provides table used to resolve virtual dependency names.
/// - `iterator`: Names of the packages whose relations should be walked;
///   `None` walks every package in the table.
/// - `check_doubles`: Whether to suppress duplicate registrations.
///
/// Output: None
///
/// Details:
/// - For every dependency literal naming a real package, the depending
///   package is appended to that target's `rdeps`; literals naming a
///   virtual package register against every provider instead. Conflicts
///   update `rcons` the same way.
/// - With `check_doubles` the operation is idempotent for a given
///   `(package, target)` pair.
pub fn register_reverses(
    packages: &mut BinaryTable,
    provides: &ProvidesTable,
    iterator: Option<&[String]>,
    check_doubles: bool,
) {
    let names: Vec<String> = match iterator {
        Some(names) => names
            .iter()
            .filter(|name| packages.contains_key(*name))
            .cloned()
            .collect(),
        None => {
            let mut names: Vec<String> = packages.keys().cloned().collect();
            names.sort_unstable();
            names
        }
    };

    for pkg in names {
        let Some(record) = packages.get(&pkg) else {
            continue;
        };
        let depends = record.depends.clone();
        let conflicts = record.conflicts.clone();

        for group in &depends {
            for dep in group {
                register_one(packages, provides, dep, &pkg, check_doubles, Relation::Depends);
            }
        }
        for con in &conflicts {
            register_one(packages, provides, con, &pkg, check_doubles, Relation::Conflicts);
        }
    }
}

/// Which reverse-relation list a registration targets.
#[derive(Clone, Copy)]
enum Relation {
    /// Register into `rdeps`.
    Depends,
    /// Register into `rcons`.
    Conflicts,
}

/// Register `pkg` on the reverse list of `target`, resolving virtual names.
fn register_one(
    packages: &mut BinaryTable,
    provides: &ProvidesTable,
    target: &str,
    pkg: &str,
    check_doubles: bool,
    relation: Relation,
) {
    let mut push = |packages: &mut BinaryTable, name: &str| {
        if let Some(entry) = packages.get_mut(name) {
            let list = match relation {
                Relation::Depends => &mut entry.rdeps,
                Relation::Conflicts => &mut entry.rcons,
            };
            if !check_doubles || !list.contains(&pkg.to_string()) {
                list.push(pkg.to_string());
            }
        }
    };

    // Real package, then any providers of the same name.
    push(packages, target);
    if let Some(providers) = provides.get(target) {
        for provider in providers.clone() {
            push(packages, &provider);
        }
    }
}
