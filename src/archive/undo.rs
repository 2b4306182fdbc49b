//! Transactional undo log for speculative migrations.
//!
//! Every speculative application of a migration group records the prior
//! state of the suite tables before mutating them. Rolling back replays the
//! recorded state in four phases, each phase fully completed across all
//! undo entries before the next begins. The phase discipline matters:
//! interleaving them can present the same binary to the installability
//! tester twice under different provides state and corrupt its caches.

use crate::archive::tables::SuiteTables;
use crate::error::Result;
use crate::solver::InstallabilityTester;
use crate::types::{MigrationItem, PackageTuple, TARGET_SUITE};

/// Recorded prior state of one speculative migration.
///
/// Map values of `None` mean "the entry did not exist before; delete it on
/// rollback", `Some(record)` means "restore this value on rollback".
#[derive(Clone, Debug, Default)]
pub struct UndoEntry {
    /// Prior target-suite source records, keyed by source name.
    pub sources: std::collections::HashMap<String, Option<crate::types::SourceRecord>>,
    /// Prior target-suite binary records, keyed by `(arch, name)`.
    pub binaries: std::collections::HashMap<(String, String), Option<crate::types::BinaryRecord>>,
    /// Prior provides entries, keyed by `(arch, virtual name)`.
    pub virtuals: std::collections::HashMap<(String, String), Option<Vec<String>>>,
    /// Provides entries newly created by the migration, keyed by
    /// `(arch, virtual name)`; deleted outright on rollback.
    pub new_virtuals: std::collections::HashSet<(String, String)>,
}

/// What: Undo one or more speculative migrations.
///
/// Inputs:
/// - `lundo`: Undo entries paired with the migration item that produced
///   them, in application order.
/// - `tester`: Installability tester whose candidate set is kept in sync.
/// - `tables`: Suite tables to restore.
///
/// Output:
/// - Returns `Ok(())` once the target-suite tables and the tester's
///   candidate set match their pre-migration state.
///
/// Details:
/// - Rollback runs in four phases, each completed across *all* undo entries
///   before the next starts:
///   1. restore source records;
///   2. drop the binaries the migrated sources brought in;
///   3. restore all other binary records, re-registering each restored
///      binary with the tester (remove first, then add, to flush stale
///      state);
///   4. restore provides entries (new entries deleted, changed entries
///      restored).
///
/// # Errors
///
/// Returns `MigrationToolkitError::NotInUniverse` when a recorded binary is
/// unknown to the tester's universe, which indicates the tables and the
/// universe were built from different data.
pub fn undo_changes(
    lundo: &[(UndoEntry, MigrationItem)],
    tester: &mut InstallabilityTester,
    tables: &mut SuiteTables,
) -> Result<()> {
    tracing::debug!("Undoing {} migration(s)", lundo.len());

    // Phase 1: source records.
    for (undo, _) in lundo {
        let target = tables.sources.entry(TARGET_SUITE.to_string()).or_default();
        let mut names: Vec<&String> = undo.sources.keys().collect();
        names.sort_unstable();
        for name in names {
            match &undo.sources[name] {
                Some(record) => {
                    target.insert(name.clone(), record.clone());
                }
                None => {
                    target.remove(name);
                }
            }
        }
    }

    // Phase 2: binaries brought in by the migrated sources.
    for (_, item) in lundo {
        if item.is_removal() {
            continue;
        }
        let Some(source) = tables
            .sources
            .get(item.suite())
            .and_then(|table| table.get(item.package()))
        else {
            continue;
        };
        let binaries = source.binaries.clone();
        for (bin_name, bin_arch) in binaries {
            if item.architecture() != "source" && item.architecture() != bin_arch {
                continue;
            }
            let arch_tables = tables.arch_tables_mut(TARGET_SUITE, &bin_arch);
            if let Some(record) = arch_tables.packages.remove(&bin_name) {
                tester.remove_candidate_binary(&PackageTuple::new(
                    &bin_name,
                    &record.version,
                    &bin_arch,
                ))?;
            }
        }
    }

    // Phase 3: all other binary changes.
    for (undo, _) in lundo {
        let mut keys: Vec<&(String, String)> = undo.binaries.keys().collect();
        keys.sort_unstable();
        for key in keys {
            let (arch, name) = key;
            let arch_tables = tables.arch_tables_mut(TARGET_SUITE, arch);
            match &undo.binaries[key] {
                Some(record) => {
                    let tuple = PackageTuple::new(name, &record.version, arch);
                    arch_tables.packages.insert(name.clone(), record.clone());
                    tester.remove_candidate_binary(&tuple)?;
                    tester.add_candidate_binary(&tuple)?;
                }
                None => {
                    if let Some(record) = arch_tables.packages.remove(name) {
                        tester.remove_candidate_binary(&PackageTuple::new(
                            name,
                            &record.version,
                            arch,
                        ))?;
                    }
                }
            }
        }
    }

    // Phase 4: provides entries.
    for (undo, _) in lundo {
        for (arch, name) in &undo.new_virtuals {
            tables
                .arch_tables_mut(TARGET_SUITE, arch)
                .provides
                .remove(name);
        }
        let mut keys: Vec<&(String, String)> = undo.virtuals.keys().collect();
        keys.sort_unstable();
        for key in keys {
            let (arch, name) = key;
            let provides = &mut tables.arch_tables_mut(TARGET_SUITE, arch).provides;
            match &undo.virtuals[key] {
                Some(providers) => {
                    provides.insert(name.clone(), providers.clone());
                }
                None => {
                    provides.remove(name);
                }
            }
        }
    }

    Ok(())
}
