//! Speculative application of a migration group.
//!
//! Applying a migration copies the migrating source and its binaries from
//! the source-suite tables into the target-suite tables (and drops the
//! outgoing binaries), keeping the installability tester's candidate set in
//! sync. Every prior value is recorded in an [`UndoEntry`] *before* the
//! mutation, so [`undo_changes`](crate::archive::undo_changes) can restore
//! the exact pre-migration state if the attempt breaks the target suite.

use crate::archive::tables::{ProvidesTable, SuiteTables};
use crate::archive::undo::UndoEntry;
use crate::error::{MigrationToolkitError, Result};
use crate::solver::InstallabilityTester;
use crate::types::{MigrationItem, PackageTuple, TARGET_SUITE};

/// What: Apply one migration group to the target suite, recording undo state.
///
/// Inputs:
/// - `tables`: Suite tables to mutate.
/// - `tester`: Installability tester whose candidate set is kept in sync.
/// - `item`: The migrating item.
/// - `adds`: Tuples entering the target suite.
/// - `rms`: Tuples leaving the target suite.
///
/// Output:
/// - Returns the `UndoEntry` that restores the pre-migration state when
///   replayed through `undo_changes`.
///
/// Details:
/// - For a removal item the target-suite source record is dropped; for a
///   regular item the source-suite record is copied over the target one.
/// - Outgoing binaries are removed first, then incoming binaries are copied
///   from the item's suite, so a swap records the outgoing record as the
///   prior value of its name.
/// - Provides lists are maintained alongside: entries newly created by the
///   migration are tracked separately from changed ones.
///
/// # Errors
///
/// Returns `MigrationToolkitError::MissingRecord` when the item's suite
/// lacks the source record or a binary record named in `adds`, and
/// `MigrationToolkitError::NotInUniverse` when a tuple is unknown to the
/// tester's universe.
pub fn apply_migration(
    tables: &mut SuiteTables,
    tester: &mut InstallabilityTester,
    item: &MigrationItem,
    adds: &[PackageTuple],
    rms: &[PackageTuple],
) -> Result<UndoEntry> {
    tracing::debug!(
        "Applying {} ({} incoming, {} outgoing)",
        item,
        adds.len(),
        rms.len()
    );
    let mut undo = UndoEntry::default();

    // Source record.
    if item.is_removal() {
        let target = tables.sources.entry(TARGET_SUITE.to_string()).or_default();
        if let Some(prior) = target.remove(item.package()) {
            undo.sources.insert(item.package().to_string(), Some(prior));
        }
    } else {
        let record = tables
            .sources
            .get(item.suite())
            .and_then(|table| table.get(item.package()))
            .cloned()
            .ok_or_else(|| MigrationToolkitError::MissingRecord {
                kind: "source",
                name: item.package().to_string(),
                suite: item.suite().to_string(),
            })?;
        let target = tables.sources.entry(TARGET_SUITE.to_string()).or_default();
        let prior = target.insert(item.package().to_string(), record);
        undo.sources.insert(item.package().to_string(), prior);
    }

    // Outgoing binaries.
    for tuple in rms {
        let arch_tables = tables.arch_tables_mut(TARGET_SUITE, &tuple.arch);
        if let Some(record) = arch_tables.packages.remove(&tuple.name) {
            undo.binaries
                .entry((tuple.arch.clone(), tuple.name.clone()))
                .or_insert_with(|| Some(record.clone()));
            for virt in &record.provides {
                record_provides_prior(&mut undo, &arch_tables.provides, &tuple.arch, virt);
                if let Some(providers) = arch_tables.provides.get_mut(virt) {
                    providers.retain(|name| name != &tuple.name);
                    if providers.is_empty() {
                        arch_tables.provides.remove(virt);
                    }
                }
            }
        }
        tester.remove_candidate_binary(tuple)?;
    }

    // Incoming binaries.
    for tuple in adds {
        let record = tables
            .arch_tables(item.suite(), &tuple.arch)
            .and_then(|arch_tables| arch_tables.packages.get(&tuple.name))
            .cloned()
            .ok_or_else(|| MigrationToolkitError::MissingRecord {
                kind: "binary",
                name: tuple.name.clone(),
                suite: item.suite().to_string(),
            })?;
        let arch_tables = tables.arch_tables_mut(TARGET_SUITE, &tuple.arch);
        let prior = arch_tables.packages.insert(tuple.name.clone(), record.clone());
        undo.binaries
            .entry((tuple.arch.clone(), tuple.name.clone()))
            .or_insert(prior);
        for virt in &record.provides {
            if arch_tables.provides.contains_key(virt) {
                record_provides_prior(&mut undo, &arch_tables.provides, &tuple.arch, virt);
                let providers = arch_tables.provides.entry(virt.clone()).or_default();
                if !providers.contains(&tuple.name) {
                    providers.push(tuple.name.clone());
                }
            } else {
                undo.new_virtuals.insert((tuple.arch.clone(), virt.clone()));
                arch_tables
                    .provides
                    .insert(virt.clone(), vec![tuple.name.clone()]);
            }
        }
        tester.add_candidate_binary(tuple)?;
    }

    Ok(undo)
}

/// Record the prior providers list for `(arch, virt)` unless the entry is
/// already tracked by this undo record.
fn record_provides_prior(
    undo: &mut UndoEntry,
    provides: &ProvidesTable,
    arch: &str,
    virt: &str,
) {
    let key = (arch.to_string(), virt.to_string());
    if undo.new_virtuals.contains(&key) || undo.virtuals.contains_key(&key) {
        return;
    }
    undo.virtuals.insert(key, provides.get(virt).cloned());
}
