//! Interned package universe for the installability tester.
//!
//! Tuple comparisons dominate solver runtime, so every
//! `(name, version, arch)` tuple is interned to a dense integer id at load
//! time and all solver sets are keyed by id. The public string API exists
//! only at the boundary.

use crate::types::PackageTuple;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Dense integer id of an interned package tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PkgId(u32);

impl PkgId {
    /// Index of this id into the universe's entry tables.
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dependency and conflict data of one interned package.
#[derive(Clone, Debug, Default)]
struct UniverseEntry {
    /// Dependency groups: conjunction of disjunctions, literals by id.
    deps: Vec<Vec<PkgId>>,
    /// Conflicting package ids.
    cons: Vec<PkgId>,
    /// Packages whose dependency groups mention this one.
    rdeps: Vec<PkgId>,
    /// Packages that conflict with this one.
    rcons: Vec<PkgId>,
}

/// Immutable-after-build map from package tuples to their dependencies,
/// conflicts and reverse relations.
#[derive(Clone, Debug, Default)]
pub struct Universe {
    /// Tuple to id lookup.
    ids: HashMap<PackageTuple, PkgId>,
    /// Id to tuple lookup.
    tuples: Vec<PackageTuple>,
    /// Per-id relation data.
    entries: Vec<UniverseEntry>,
    /// Ids flagged essential.
    essentials: HashSet<PkgId>,
    /// Ids with no conflicts whose dependencies only reach other safe ids.
    safe_set: HashSet<PkgId>,
}

impl Universe {
    /// Id of a tuple, when the tuple is known.
    #[must_use]
    pub fn id(&self, tuple: &PackageTuple) -> Option<PkgId> {
        self.ids.get(tuple).copied()
    }

    /// Tuple of an id.
    #[must_use]
    pub fn tuple(&self, id: PkgId) -> &PackageTuple {
        &self.tuples[id.index()]
    }

    /// Number of interned tuples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    /// Whether the universe is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Dependency groups of an id.
    #[must_use]
    pub(crate) fn deps(&self, id: PkgId) -> &[Vec<PkgId>] {
        &self.entries[id.index()].deps
    }

    /// Conflicts of an id.
    #[must_use]
    pub(crate) fn cons(&self, id: PkgId) -> &[PkgId] {
        &self.entries[id.index()].cons
    }

    /// Reverse dependencies of an id.
    #[must_use]
    pub(crate) fn rdeps(&self, id: PkgId) -> &[PkgId] {
        &self.entries[id.index()].rdeps
    }

    /// Reverse conflicts of an id.
    #[must_use]
    pub(crate) fn rcons(&self, id: PkgId) -> &[PkgId] {
        &self.entries[id.index()].rcons
    }

    /// Whether an id carries any reverse relation.
    #[must_use]
    pub(crate) fn has_reverse_relations(&self, id: PkgId) -> bool {
        let entry = &self.entries[id.index()];
        !entry.rdeps.is_empty() || !entry.rcons.is_empty()
    }

    /// Whether an id is flagged essential.
    #[must_use]
    pub fn is_essential(&self, id: PkgId) -> bool {
        self.essentials.contains(&id)
    }

    /// Ids flagged essential.
    #[must_use]
    pub(crate) fn essentials(&self) -> &HashSet<PkgId> {
        &self.essentials
    }

    /// Whether an id is in the safe set (no conflicts, dependencies only
    /// reach other safe ids).
    #[must_use]
    pub fn is_safe(&self, id: PkgId) -> bool {
        self.safe_set.contains(&id)
    }
}

/// Builder assembling a [`Universe`] from per-package relation data.
///
/// Dependency and conflict literals are interned as they are added; a
/// literal that never gets its own `add_package` call behaves as a
/// relation-free leaf.
#[derive(Debug, Default)]
pub struct UniverseBuilder {
    /// Tuple to id lookup.
    ids: HashMap<PackageTuple, PkgId>,
    /// Id to tuple lookup.
    tuples: Vec<PackageTuple>,
    /// Per-id relation data (reverse relations filled in by `build`).
    entries: Vec<UniverseEntry>,
    /// Ids flagged essential.
    essentials: HashSet<PkgId>,
}

impl UniverseBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a tuple, creating a relation-free entry on first sight.
    fn intern(&mut self, tuple: &PackageTuple) -> PkgId {
        if let Some(id) = self.ids.get(tuple) {
            return *id;
        }
        let id = PkgId(u32::try_from(self.tuples.len()).unwrap_or(u32::MAX));
        self.ids.insert(tuple.clone(), id);
        self.tuples.push(tuple.clone());
        self.entries.push(UniverseEntry::default());
        id
    }

    /// What: Add a package with its dependency groups and conflicts.
    ///
    /// Inputs:
    /// - `tuple`: The package tuple being described.
    /// - `deps`: Dependency groups; the outer slice is a conjunction, each
    ///   inner slice a disjunction of alternative tuples.
    /// - `conflicts`: Tuples this package conflicts with.
    /// - `essential`: Whether the package is flagged essential.
    ///
    /// Output:
    /// - Returns the id assigned to `tuple`.
    ///
    /// Details:
    /// - Literal tuples are interned immediately; re-adding a package
    ///   replaces its relation data.
    pub fn add_package(
        &mut self,
        tuple: &PackageTuple,
        deps: &[Vec<PackageTuple>],
        conflicts: &[PackageTuple],
        essential: bool,
    ) -> PkgId {
        let id = self.intern(tuple);
        let dep_ids: Vec<Vec<PkgId>> = deps
            .iter()
            .map(|group| group.iter().map(|dep| self.intern(dep)).collect())
            .collect();
        let con_ids: Vec<PkgId> = conflicts.iter().map(|con| self.intern(con)).collect();

        let entry = &mut self.entries[id.index()];
        entry.deps = dep_ids;
        entry.cons = con_ids;
        if essential {
            self.essentials.insert(id);
        } else {
            self.essentials.remove(&id);
        }
        id
    }

    /// What: Finish the build, computing reverse relations and the safe set.
    ///
    /// Inputs: None
    ///
    /// Output:
    /// - Returns the finished `Universe`.
    ///
    /// Details:
    /// - Reverse relations are registered symmetrically for every
    ///   dependency literal and conflict.
    /// - The safe set is the greatest fixed point of "no conflicts and
    ///   every dependency literal is safe"; it lets the tester resolve
    ///   choices over safe alternatives without speculation.
    #[must_use]
    pub fn build(mut self) -> Universe {
        // Reverse relations, from the declared relations.
        for index in 0..self.entries.len() {
            let id = PkgId(u32::try_from(index).unwrap_or(u32::MAX));
            let deps = self.entries[index].deps.clone();
            let cons = self.entries[index].cons.clone();
            for group in &deps {
                for dep in group {
                    let rdeps = &mut self.entries[dep.index()].rdeps;
                    if !rdeps.contains(&id) {
                        rdeps.push(id);
                    }
                }
            }
            for con in &cons {
                let rcons = &mut self.entries[con.index()].rcons;
                if !rcons.contains(&id) {
                    rcons.push(id);
                }
            }
        }

        // A conflict excludes both endpoints from any common install, so
        // the solver's conflict sets are closed symmetrically: the tester
        // must see the clause no matter which endpoint it propagates first.
        for index in 0..self.entries.len() {
            let id = PkgId(u32::try_from(index).unwrap_or(u32::MAX));
            for con in self.entries[index].cons.clone() {
                let peer = &mut self.entries[con.index()].cons;
                if !peer.contains(&id) {
                    peer.push(id);
                }
            }
        }

        // Safe set fixed point: start from every conflict-free id and drop
        // ids whose dependency groups reach a non-safe literal.
        let mut safe: HashSet<PkgId> = (0..self.entries.len())
            .map(|index| PkgId(u32::try_from(index).unwrap_or(u32::MAX)))
            .filter(|id| self.entries[id.index()].cons.is_empty())
            .collect();
        loop {
            let unsafe_ids: Vec<PkgId> = safe
                .iter()
                .filter(|id| {
                    self.entries[id.index()]
                        .deps
                        .iter()
                        .any(|group| group.iter().any(|dep| !safe.contains(dep)))
                })
                .copied()
                .collect();
            if unsafe_ids.is_empty() {
                break;
            }
            for id in unsafe_ids {
                safe.remove(&id);
            }
        }

        Universe {
            ids: self.ids,
            tuples: self.tuples,
            entries: self.entries,
            essentials: self.essentials,
            safe_set: safe,
        }
    }
}
