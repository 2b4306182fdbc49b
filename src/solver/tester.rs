//! SAT-style installability tester over the candidate set.
//!
//! The tester answers "is package P installable from the current candidate
//! set?" using unit propagation over forced dependencies, conflict
//! tracking, deferred choices and bounded backtracking. Verdicts are
//! cached aggressively; the candidate-set mutation API keeps the caches
//! consistent.
//!
//! The speculative part of the search runs on an explicit stack of frames,
//! each owning copies of the mutable sets, so pathological dependency
//! graphs cannot exhaust the call stack. All iteration is id-ordered, so
//! verdicts and cache contents are reproducible run to run.

use crate::error::{MigrationToolkitError, Result};
use crate::solver::universe::{PkgId, Universe};
use crate::types::PackageTuple;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// A frozen, still-unresolved dependency group (literals id-ordered).
type Choice = BTreeSet<PkgId>;

/// Mutable sets of one search: what must be installed, what can never be
/// chosen, the deferred choices, and the propagation worklist.
struct SearchState {
    /// Packages that must be installed together with the target.
    musts: HashSet<PkgId>,
    /// Packages that can never be chosen (conflicts).
    never: HashSet<PkgId>,
    /// Dependency groups not resolved yet.
    choices: BTreeSet<Choice>,
    /// Members of `musts` whose relations have not been propagated.
    check: Vec<PkgId>,
}

/// Progress of a speculation over one deferred choice group.
struct Speculation {
    /// Literals still to try, in id order.
    remaining: VecDeque<PkgId>,
    /// Literal reserved for the optimistic commit.
    last: PkgId,
    /// Literal whose speculative check is currently in flight.
    tried: Option<PkgId>,
}

/// One search frame; child frames own copies of the parent's sets.
struct Frame {
    /// Package whose installability this frame decides.
    target: PkgId,
    /// The frame's mutable search sets.
    state: SearchState,
    /// Speculation in progress, if any.
    speculation: Option<Speculation>,
}

/// Outcome of driving a frame until it blocks or finishes.
enum Step {
    /// The frame reached a verdict.
    Done(bool),
    /// The frame needs a speculative child check.
    Recurse(Frame),
}

/// Outcome of one choice-resolution pass.
enum Pick {
    /// Some group has no alternatives left.
    Unsat,
    /// Choices were pruned or resolved; propagation may continue.
    Progress,
    /// A group must be resolved by speculation.
    Speculate(Speculation),
}

/// Installability tester over an interned package universe.
///
/// The tester owns the candidate set and all verdict caches; every
/// candidate-set mutation must funnel through
/// [`add_candidate_binary`](Self::add_candidate_binary) and
/// [`remove_candidate_binary`](Self::remove_candidate_binary) so the cache
/// invariants hold.
pub struct InstallabilityTester {
    /// Interned package universe.
    universe: Universe,
    /// Current hypothetical content of the target suite.
    testing: HashSet<PkgId>,
    /// Packages known to be uninstallable regardless of candidate-set
    /// composition changes.
    broken: HashSet<PkgId>,
    /// Packages proven installable under the current candidate set.
    cache_inst: HashSet<PkgId>,
    /// Packages proven uninstallable under the current candidate set.
    /// Distinct from `broken`: members are re-admitted to the candidate
    /// set whenever it grows.
    cache_broken: HashSet<PkgId>,
    /// Per-architecture pseudo-essential set and its conflict closure.
    cache_ess: HashMap<String, (BTreeSet<PkgId>, BTreeSet<PkgId>)>,
}

impl InstallabilityTester {
    /// Create a tester with an empty candidate set.
    #[must_use]
    pub fn new(universe: Universe) -> Self {
        Self {
            universe,
            testing: HashSet::new(),
            broken: HashSet::new(),
            cache_inst: HashSet::new(),
            cache_broken: HashSet::new(),
            cache_ess: HashMap::new(),
        }
    }

    /// The interned universe this tester operates on.
    #[must_use]
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Candidate-set ids, for the migration solver.
    #[must_use]
    pub(crate) fn testing_ids(&self) -> &HashSet<PkgId> {
        &self.testing
    }

    /// Resolve a tuple to its id.
    fn lookup(&self, tuple: &PackageTuple) -> Result<PkgId> {
        self.universe
            .id(tuple)
            .ok_or_else(|| MigrationToolkitError::NotInUniverse(tuple.to_string()))
    }

    /// What: Add a binary package to the candidate set.
    ///
    /// Inputs:
    /// - `tuple`: Package to add.
    ///
    /// Output:
    /// - Returns `Ok(())` once the package is in the candidate set.
    ///
    /// Details:
    /// - Adding a package known to be in the broken set does not disturb
    ///   the caches (it stays broken regardless).
    /// - Otherwise the installable cache is dropped entirely, packages in
    ///   the per-composition broken cache are re-admitted to the candidate
    ///   set (they may be installable now), and the pseudo-essential cache
    ///   of the package's architecture is invalidated when the package is
    ///   essential.
    ///
    /// # Errors
    ///
    /// Returns `MigrationToolkitError::NotInUniverse` when the tuple is
    /// unknown.
    pub fn add_candidate_binary(&mut self, tuple: &PackageTuple) -> Result<()> {
        let id = self.lookup(tuple)?;

        if self.broken.contains(&id) {
            self.testing.insert(id);
        } else if !self.testing.contains(&id) {
            self.testing.insert(id);
            self.cache_inst.clear();
            if !self.cache_broken.is_empty() {
                // Re-add broken packages as some of them may now be installable.
                self.testing.extend(self.cache_broken.drain());
            }
            if self.universe.is_essential(id) {
                self.cache_ess.remove(&tuple.arch);
            }
        }
        Ok(())
    }

    /// What: Remove a binary package from the candidate set.
    ///
    /// Inputs:
    /// - `tuple`: Package to remove.
    ///
    /// Output:
    /// - Returns `Ok(())` once the package is out of the candidate set.
    ///
    /// Details:
    /// - The package is dropped from the per-composition broken cache.
    /// - Removing a member of its architecture's pseudo-essential set
    ///   invalidates that cache.
    /// - The installable cache survives unless the package has reverse
    ///   relations and a cached installable verdict (a downstream package
    ///   may have relied on it).
    ///
    /// # Errors
    ///
    /// Returns `MigrationToolkitError::NotInUniverse` when the tuple is
    /// unknown.
    pub fn remove_candidate_binary(&mut self, tuple: &PackageTuple) -> Result<()> {
        let id = self.lookup(tuple)?;

        self.cache_broken.remove(&id);

        if self.testing.remove(&id) {
            if let Some((pseudo_ess, _)) = self.cache_ess.get(&tuple.arch)
                && pseudo_ess.contains(&id)
            {
                self.cache_ess.remove(&tuple.arch);
            }
            if !self.universe.has_reverse_relations(id) {
                // No reverse relations: nothing can have relied on it.
                return Ok(());
            }
            if !self.broken.contains(&id) && self.cache_inst.contains(&id) {
                self.cache_inst.clear();
            }
        }
        Ok(())
    }

    /// What: Mark a package as intrinsically broken.
    ///
    /// Inputs:
    /// - `tuple`: Package whose verdict is pinned to uninstallable.
    ///
    /// Output:
    /// - Returns `Ok(())` once recorded.
    ///
    /// Details:
    /// - Unlike the per-composition broken cache, this set survives
    ///   candidate-set growth; membership is supplied by the driver from
    ///   earlier runs.
    ///
    /// # Errors
    ///
    /// Returns `MigrationToolkitError::NotInUniverse` when the tuple is
    /// unknown.
    pub fn mark_broken(&mut self, tuple: &PackageTuple) -> Result<()> {
        let id = self.lookup(tuple)?;
        self.broken.insert(id);
        Ok(())
    }

    /// Whether a package is currently in the candidate set.
    #[must_use]
    pub fn is_candidate(&self, tuple: &PackageTuple) -> bool {
        self.universe
            .id(tuple)
            .is_some_and(|id| self.testing.contains(&id))
    }

    /// Whether a package has a cached installable verdict.
    #[must_use]
    pub fn is_cached_installable(&self, tuple: &PackageTuple) -> bool {
        self.universe
            .id(tuple)
            .is_some_and(|id| self.cache_inst.contains(&id))
    }

    /// Whether a package has a cached uninstallable verdict under the
    /// current candidate-set composition.
    #[must_use]
    pub fn is_cached_uninstallable(&self, tuple: &PackageTuple) -> bool {
        self.universe
            .id(tuple)
            .is_some_and(|id| self.cache_broken.contains(&id))
    }

    /// Candidate-set tuples, id-ordered.
    #[must_use]
    pub fn candidate_tuples(&self) -> Vec<PackageTuple> {
        let mut ids: Vec<PkgId> = self.testing.iter().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .map(|id| self.universe.tuple(id).clone())
            .collect()
    }

    /// What: Test whether a package is installable from the candidate set.
    ///
    /// Inputs:
    /// - `tuple`: Package to test; only candidate-set members can satisfy
    ///   its relations.
    ///
    /// Output:
    /// - Returns `Ok(true)` iff a conflict-free, dependency-closed subset
    ///   of the candidate set containing the package exists.
    ///
    /// Details:
    /// - Packages outside the candidate set or in the broken set are
    ///   uninstallable by definition.
    /// - Cached verdicts short-circuit the search; a successful search
    ///   caches every package it had to pull in.
    ///
    /// # Errors
    ///
    /// Returns `MigrationToolkitError::NotInUniverse` when the tuple is
    /// unknown.
    pub fn is_installable(&mut self, tuple: &PackageTuple) -> Result<bool> {
        let id = self.lookup(tuple)?;

        if !self.testing.contains(&id) || self.broken.contains(&id) {
            return Ok(false);
        }
        if self.cache_inst.contains(&id) {
            return Ok(true);
        }
        Ok(self.check_inst(id))
    }

    /// What: Pre-compute installability for every candidate-set member.
    ///
    /// Inputs: None
    ///
    /// Output: None
    ///
    /// Details:
    /// - Warms the verdict caches so later `is_installable` queries are
    ///   cheap; members with cached verdicts are skipped.
    pub fn compute_candidate_installability(&mut self) {
        let mut todo: Vec<PkgId> = self.testing.iter().copied().collect();
        todo.sort_unstable();
        for id in todo {
            if self.cache_inst.contains(&id)
                || self.cache_broken.contains(&id)
                || !self.testing.contains(&id)
            {
                continue;
            }
            self.check_inst(id);
        }
    }

    /// Run the full search for one target id.
    fn check_inst(&mut self, target: PkgId) -> bool {
        let Some(root) = self.new_root_frame(target) else {
            return false;
        };
        self.run(root)
    }

    /// Build the root frame for a target, seeded with the pseudo-essential
    /// set of its architecture. Returns `None` when the target conflicts
    /// with that set (the target is promoted to the broken cache).
    fn new_root_frame(&mut self, target: PkgId) -> Option<Frame> {
        let arch = self.universe.tuple(target).arch.clone();
        let (pseudo_ess, ess_never) = self.min_pseudo_ess_set(&arch);

        if ess_never.contains(&target) {
            // The target conflicts with the essential closure; no candidate
            // set containing the essentials can install it.
            self.cache_broken.insert(target);
            self.testing.remove(&target);
            return None;
        }

        let mut musts: HashSet<PkgId> = pseudo_ess.into_iter().collect();
        musts.insert(target);
        Some(Frame {
            target,
            state: SearchState {
                musts,
                never: ess_never.into_iter().collect(),
                choices: BTreeSet::new(),
                check: vec![target],
            },
            speculation: None,
        })
    }

    /// Drive the frame stack to a verdict.
    ///
    /// A child frame succeeding proves the whole ancestor chain installable
    /// (the child's sets are supersets of every ancestor's), so success
    /// unwinds the entire stack. A child failing prunes the literal it was
    /// speculating on into its parent's `never` set and resumes the parent.
    fn run(&mut self, root: Frame) -> bool {
        let mut stack: Vec<Frame> = vec![root];
        let mut failed_child = false;

        loop {
            let Some(frame) = stack.last_mut() else {
                return false;
            };

            if failed_child {
                failed_child = false;
                if let Some(spec) = frame.speculation.as_mut()
                    && let Some(tried) = spec.tried.take()
                {
                    // The literal cannot satisfy the choice here; pretend
                    // to conflict with it to prune later choices.
                    frame.state.never.insert(tried);
                }
            }

            match self.step(frame) {
                Step::Done(verdict) => {
                    let Some(frame) = stack.pop() else {
                        return false;
                    };
                    if verdict {
                        // Everything in musts is simultaneously installable.
                        self.cache_inst.extend(frame.state.musts.iter().copied());
                        return true;
                    }
                    if stack.is_empty() {
                        return false;
                    }
                    failed_child = true;
                }
                Step::Recurse(child) => {
                    // The installable cache applies only when no conflicts
                    // restrict this subtree and the child satisfies every
                    // remaining choice by itself.
                    if self.cache_inst.contains(&child.target)
                        && child.state.never.is_empty()
                        && child.state.choices.iter().all(|c| c.contains(&child.target))
                    {
                        return true;
                    }
                    stack.push(child);
                }
            }
        }
    }

    /// Drive one frame until it reaches a verdict or needs a speculative
    /// child check.
    fn step(&mut self, frame: &mut Frame) -> Step {
        loop {
            if let Some(spec) = frame.speculation.as_mut() {
                if let Some(next) = spec.remaining.pop_front() {
                    spec.tried = Some(next);
                    let mut musts = frame.state.musts.clone();
                    musts.insert(next);
                    return Step::Recurse(Frame {
                        target: next,
                        state: SearchState {
                            musts,
                            never: frame.state.never.clone(),
                            choices: frame.state.choices.clone(),
                            check: vec![next],
                        },
                        speculation: None,
                    });
                }
                // Every alternative failed; commit the reserved literal
                // without a recursive check. If it cannot work either, the
                // next propagation round hits the inconsistency.
                let last = spec.last;
                frame.speculation = None;
                frame.state.musts.insert(last);
                frame.state.check.push(last);
            }

            while !frame.state.check.is_empty() {
                if !self.check_loop(&mut frame.state) {
                    return Step::Done(false);
                }
                if !frame.state.choices.is_empty() {
                    match self.pick_choice(&mut frame.state) {
                        Pick::Unsat => return Step::Done(false),
                        Pick::Progress => {}
                        Pick::Speculate(spec) => {
                            frame.speculation = Some(spec);
                            break;
                        }
                    }
                }
            }

            if frame.speculation.is_some() {
                continue;
            }
            return Step::Done(true);
        }
    }

    /// Propagate all guaranteed dependencies on the worklist.
    ///
    /// Returns `false` when the target is uninstallable; `true` once the
    /// worklist is drained (which proves installability only if no choices
    /// remain).
    fn check_loop(&mut self, state: &mut SearchState) -> bool {
        while let Some(cur) = state.check.pop() {
            let cons = self.universe.cons(cur);
            if !cons.is_empty() {
                if state.never.contains(&cur) {
                    // Two conflicting packages can both reach the worklist
                    // before either is propagated.
                    return false;
                }
                let excluded: Vec<PkgId> = cons
                    .iter()
                    .copied()
                    .filter(|c| self.testing.contains(c))
                    .collect();
                state.never.extend(excluded);
            }

            let groups = self.universe.deps(cur).to_vec();
            for group in groups {
                if group.iter().any(|dep| state.musts.contains(dep)) {
                    continue;
                }
                let candidates: Choice = group
                    .iter()
                    .copied()
                    .filter(|dep| {
                        self.testing.contains(dep)
                            && !state.never.contains(dep)
                            && !self.cache_broken.contains(dep)
                    })
                    .collect();

                if candidates.is_empty() {
                    if !self.cache_broken.contains(&cur)
                        && group.iter().all(|dep| !state.never.contains(dep))
                    {
                        // The group fails even with an empty never set, so
                        // the failure is intrinsic to the candidate set.
                        self.cache_broken.insert(cur);
                        self.testing.remove(&cur);
                    }
                    return false;
                }
                if candidates.len() == 1 {
                    if let Some(&dep) = candidates.first()
                        && state.musts.insert(dep)
                    {
                        state.check.push(dep);
                    }
                } else {
                    state.choices.insert(candidates);
                }
            }
        }
        true
    }

    /// Prune the deferred choices and, when propagation cannot make more
    /// progress, pick one group to resolve by speculation.
    fn pick_choice(&mut self, state: &mut SearchState) -> Pick {
        let choices = std::mem::take(&mut state.choices);
        let mut rebuild: BTreeSet<Choice> = BTreeSet::new();

        for choice in &choices {
            if choice.iter().any(|dep| state.musts.contains(dep)) {
                continue;
            }
            let mut remain: Choice = choice
                .iter()
                .copied()
                .filter(|dep| !state.never.contains(dep) && !self.cache_broken.contains(dep))
                .collect();
            if remain.is_empty() {
                // Every alternative would violate a conflict.
                return Pick::Unsat;
            }

            if remain.len() > 1 && remain.iter().any(|r| self.universe.is_safe(*r)) {
                let safe: Vec<PkgId> = remain
                    .iter()
                    .copied()
                    .filter(|r| self.universe.is_safe(*r))
                    .collect();
                let mut found = None;
                for candidate in safe {
                    // Safe packages are conflict-free and only reach other
                    // safe packages, so a standalone check settles them.
                    if self.cache_inst.contains(&candidate) || self.check_inst(candidate) {
                        found = Some(candidate);
                        break;
                    }
                }
                if let Some(candidate) = found {
                    if state.musts.insert(candidate) {
                        state.check.push(candidate);
                    }
                    continue;
                }
                // No safe alternative is installable; drop them all.
                remain.retain(|r| !self.universe.is_safe(*r));
                if remain.is_empty() {
                    return Pick::Unsat;
                }
            }

            if remain.len() == 1 {
                if let Some(&dep) = remain.first()
                    && state.musts.insert(dep)
                {
                    state.check.push(dep);
                }
                continue;
            }
            rebuild.insert(remain);
        }

        if !state.check.is_empty() || rebuild.is_empty() {
            state.choices = rebuild;
            return Pick::Progress;
        }

        // Propagation is stuck; resolve the first remaining group by
        // speculation, reserving its smallest literal for the optimistic
        // commit.
        let Some(group) = rebuild.pop_first() else {
            return Pick::Progress;
        };
        state.choices = rebuild;
        let mut literals = group.into_iter();
        let Some(last) = literals.next() else {
            return Pick::Unsat;
        };
        Pick::Speculate(Speculation {
            remaining: literals.collect(),
            last,
            tried: None,
        })
    }

    /// Pseudo-essential set of an architecture: the essentials in the
    /// candidate set plus their forced closure, with the conflicts the
    /// closure excludes. Computed on demand and cached until the
    /// essentials of the architecture change.
    fn min_pseudo_ess_set(&mut self, arch: &str) -> (BTreeSet<PkgId>, BTreeSet<PkgId>) {
        if let Some(cached) = self.cache_ess.get(arch) {
            return cached.clone();
        }

        let mut base: Vec<PkgId> = self
            .universe
            .essentials()
            .iter()
            .copied()
            .filter(|id| self.universe.tuple(*id).arch == arch && self.testing.contains(id))
            .collect();
        base.sort_unstable();

        let mut state = SearchState {
            musts: base.iter().copied().collect(),
            never: HashSet::new(),
            choices: BTreeSet::new(),
            check: base,
        };

        while !state.check.is_empty() {
            // Verdicts are irrelevant here; the closure is best-effort.
            let _ = self.check_loop(&mut state);
            if state.choices.is_empty() {
                break;
            }
            // Break choices where possible: an alternative whose conflicts
            // are all excluded already and whose dependency groups are all
            // satisfied can be propagated without committing to it.
            let choices = std::mem::take(&mut state.choices);
            let mut kept: BTreeSet<Choice> = BTreeSet::new();
            for choice in choices {
                if choice.iter().any(|dep| state.musts.contains(dep)) {
                    continue;
                }
                let mut broke = false;
                for &candidate in &choice {
                    let cons_excluded = self
                        .universe
                        .cons(candidate)
                        .iter()
                        .all(|c| state.never.contains(c));
                    let deps_satisfied = self
                        .universe
                        .deps(candidate)
                        .iter()
                        .all(|group| group.iter().any(|dep| state.musts.contains(dep)));
                    if cons_excluded && deps_satisfied {
                        state.check.push(candidate);
                        broke = true;
                        break;
                    }
                }
                if !broke {
                    kept.insert(choice);
                }
            }
            state.choices = kept;
        }

        let mut never: BTreeSet<PkgId> = state.never.iter().copied().collect();
        for &id in &state.musts {
            never.extend(self.universe.cons(id).iter().copied());
        }
        let pseudo_ess: BTreeSet<PkgId> = state.musts.iter().copied().collect();
        self.cache_ess
            .insert(arch.to_string(), (pseudo_ess.clone(), never.clone()));
        (pseudo_ess, never)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::universe::UniverseBuilder;

    fn tuple(name: &str) -> PackageTuple {
        PackageTuple::new(name, "1", "amd64")
    }

    /// Builder wrapper so tests read as relation tables.
    fn pkg(
        builder: &mut UniverseBuilder,
        name: &str,
        deps: &[&[&str]],
        cons: &[&str],
    ) -> PackageTuple {
        let t = tuple(name);
        let dep_groups: Vec<Vec<PackageTuple>> = deps
            .iter()
            .map(|group| group.iter().map(|dep| tuple(dep)).collect())
            .collect();
        let conflicts: Vec<PackageTuple> = cons.iter().map(|con| tuple(con)).collect();
        builder.add_package(&t, &dep_groups, &conflicts, false);
        t
    }

    fn tester_with(universe: Universe, candidates: &[&PackageTuple]) -> InstallabilityTester {
        let mut tester = InstallabilityTester::new(universe);
        for candidate in candidates {
            tester
                .add_candidate_binary(candidate)
                .expect("candidate should be in universe");
        }
        tester
    }

    #[test]
    fn test_unknown_tuple_is_an_error() {
        let mut tester = InstallabilityTester::new(UniverseBuilder::new().build());
        assert!(tester.is_installable(&tuple("ghost")).is_err());
        assert!(tester.add_candidate_binary(&tuple("ghost")).is_err());
    }

    #[test]
    fn test_simple_install_caches_musts() {
        let mut builder = UniverseBuilder::new();
        let a = pkg(&mut builder, "a", &[&["b"]], &[]);
        let b = pkg(&mut builder, "b", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&a, &b]);

        assert!(tester.is_installable(&a).expect("known tuple"));
        // Everything pulled in alongside the target is cached too.
        assert!(tester.is_cached_installable(&a));
        assert!(tester.is_cached_installable(&b));
    }

    #[test]
    fn test_not_a_candidate_is_uninstallable() {
        let mut builder = UniverseBuilder::new();
        let a = pkg(&mut builder, "a", &[], &[]);
        let mut tester = tester_with(builder.build(), &[]);

        assert!(!tester.is_installable(&a).expect("known tuple"));
    }

    #[test]
    fn test_broken_candidate_is_uninstallable() {
        let mut builder = UniverseBuilder::new();
        let a = pkg(&mut builder, "a", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&a]);
        tester.mark_broken(&a).expect("known tuple");

        assert!(tester.is_candidate(&a));
        assert!(!tester.is_installable(&a).expect("known tuple"));
    }

    #[test]
    fn test_conflict_rejection() {
        // d depends on both a and c; a pulls in b, which c conflicts with.
        let mut builder = UniverseBuilder::new();
        let a = pkg(&mut builder, "a", &[&["b"]], &[]);
        let b = pkg(&mut builder, "b", &[], &[]);
        let c = pkg(&mut builder, "c", &[], &["b"]);
        let d = pkg(&mut builder, "d", &[&["a"], &["c"]], &[]);
        let mut tester = tester_with(builder.build(), &[&a, &b, &c, &d]);

        assert!(!tester.is_installable(&d).expect("known tuple"));
        // a, b and c are installable on their own.
        assert!(tester.is_installable(&a).expect("known tuple"));
        assert!(tester.is_installable(&c).expect("known tuple"));
    }

    #[test]
    fn test_choice_resolved_by_forced_literal() {
        // The ({f1, f2}) group is settled by the ({f1}) singleton; no
        // speculation is needed and f2 is never pulled in.
        let mut builder = UniverseBuilder::new();
        let e = pkg(&mut builder, "e", &[&["f1", "f2"], &["f1"]], &[]);
        let f1 = pkg(&mut builder, "f1", &[], &[]);
        let f2 = pkg(&mut builder, "f2", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&e, &f1, &f2]);

        assert!(tester.is_installable(&e).expect("known tuple"));
        assert!(tester.is_cached_installable(&f1));
        assert!(!tester.is_cached_installable(&f2));
    }

    #[test]
    fn test_single_survivor_group_needs_no_choice() {
        // g2 is not a candidate, so the ({g1, g2}) group collapses to g1.
        let mut builder = UniverseBuilder::new();
        let e = pkg(&mut builder, "e", &[&["g1", "g2"]], &[]);
        let g1 = pkg(&mut builder, "g1", &[], &[]);
        let _g2 = pkg(&mut builder, "g2", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&e, &g1]);

        assert!(tester.is_installable(&e).expect("known tuple"));
        assert!(tester.is_cached_installable(&g1));
    }

    #[test]
    fn test_unsatisfiable_dependency_promotes_to_broken_cache() {
        let mut builder = UniverseBuilder::new();
        let h = pkg(&mut builder, "h", &[&["missing"]], &[]);
        let _missing = pkg(&mut builder, "missing", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&h]);

        assert!(!tester.is_installable(&h).expect("known tuple"));
        assert!(tester.is_cached_uninstallable(&h));
        // Promotion drops the package from the candidate set.
        assert!(!tester.is_candidate(&h));
    }

    #[test]
    fn test_broken_satisfier_cascades() {
        // h is intrinsically broken; i's only satisfier is h, so testing i
        // promotes it too.
        let mut builder = UniverseBuilder::new();
        let h = pkg(&mut builder, "h", &[&["missing"]], &[]);
        let _missing = pkg(&mut builder, "missing", &[], &[]);
        let i = pkg(&mut builder, "i", &[&["h"]], &[]);
        let mut tester = tester_with(builder.build(), &[&h, &i]);

        assert!(!tester.is_installable(&h).expect("known tuple"));
        assert!(!tester.is_installable(&i).expect("known tuple"));
        assert!(tester.is_cached_uninstallable(&i));
    }

    #[test]
    fn test_speculation_prunes_and_optimistic_commit_fails() {
        // x depends on ({p, q}); n conflicts with x, p needs n, and q needs
        // a package that is not a candidate. Both alternatives fail: q by
        // speculation, p by the optimistic commit hitting the conflict.
        let mut builder = UniverseBuilder::new();
        let x = pkg(&mut builder, "x", &[&["p", "q"]], &[]);
        let p = pkg(&mut builder, "p", &[&["n"]], &[]);
        let q = pkg(&mut builder, "q", &[&["m"]], &["z"]);
        let n = pkg(&mut builder, "n", &[], &["x"]);
        let _m = pkg(&mut builder, "m", &[], &[]);
        let _z = pkg(&mut builder, "z", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&x, &p, &q, &n]);

        assert!(!tester.is_installable(&x).expect("known tuple"));
        // q failed intrinsically (its dependency is no candidate).
        assert!(tester.is_cached_uninstallable(&q));
        // p failed only because of the conflict, so it is not condemned.
        assert!(!tester.is_cached_uninstallable(&p));
    }

    #[test]
    fn test_speculation_succeeds_on_viable_alternative() {
        // x depends on ({p, q}); p conflicts with x (via n), q is fine.
        let mut builder = UniverseBuilder::new();
        let x = pkg(&mut builder, "x", &[&["p", "q"]], &[]);
        let p = pkg(&mut builder, "p", &[&["n"]], &["w"]);
        let q = pkg(&mut builder, "q", &[], &["z"]);
        let n = pkg(&mut builder, "n", &[], &["x"]);
        let _w = pkg(&mut builder, "w", &[], &[]);
        let _z = pkg(&mut builder, "z", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&x, &p, &q, &n]);

        assert!(tester.is_installable(&x).expect("known tuple"));
        assert!(tester.is_cached_installable(&x));
    }

    #[test]
    fn test_safe_alternative_resolves_choice() {
        // Both alternatives are safe; the probe commits the first
        // installable one without speculation.
        let mut builder = UniverseBuilder::new();
        let x = pkg(&mut builder, "x", &[&["s1", "s2"]], &["noise"]);
        let s1 = pkg(&mut builder, "s1", &[], &[]);
        let s2 = pkg(&mut builder, "s2", &[], &[]);
        let _noise = pkg(&mut builder, "noise", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&x, &s1, &s2]);

        assert!(tester.is_installable(&x).expect("known tuple"));
        assert!(tester.is_cached_installable(&s1) || tester.is_cached_installable(&s2));
    }

    #[test]
    fn test_add_invalidates_installable_cache() {
        let mut builder = UniverseBuilder::new();
        let a = pkg(&mut builder, "a", &[], &[]);
        let b = pkg(&mut builder, "b", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&a]);

        assert!(tester.is_installable(&a).expect("known tuple"));
        assert!(tester.is_cached_installable(&a));

        tester.add_candidate_binary(&b).expect("known tuple");
        assert!(!tester.is_cached_installable(&a));
        assert!(tester.is_installable(&a).expect("known tuple"));
    }

    #[test]
    fn test_add_readmits_broken_cache_members() {
        let mut builder = UniverseBuilder::new();
        let h = pkg(&mut builder, "h", &[&["missing"]], &[]);
        let missing = pkg(&mut builder, "missing", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&h]);

        assert!(!tester.is_installable(&h).expect("known tuple"));
        assert!(!tester.is_candidate(&h));

        // Adding the missing dependency re-admits h, which is now fine.
        tester.add_candidate_binary(&missing).expect("known tuple");
        assert!(tester.is_candidate(&h));
        assert!(!tester.is_cached_uninstallable(&h));
        assert!(tester.is_installable(&h).expect("known tuple"));
    }

    #[test]
    fn test_add_of_broken_package_keeps_caches() {
        let mut builder = UniverseBuilder::new();
        let a = pkg(&mut builder, "a", &[], &[]);
        let b = pkg(&mut builder, "b", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&a]);
        tester.mark_broken(&b).expect("known tuple");

        assert!(tester.is_installable(&a).expect("known tuple"));
        tester.add_candidate_binary(&b).expect("known tuple");
        // Adding a known-broken package does not disturb the caches.
        assert!(tester.is_cached_installable(&a));
        assert!(!tester.is_installable(&b).expect("known tuple"));
    }

    #[test]
    fn test_remove_without_reverse_relations_keeps_cache() {
        let mut builder = UniverseBuilder::new();
        let a = pkg(&mut builder, "a", &[], &[]);
        let b = pkg(&mut builder, "b", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&a, &b]);

        assert!(tester.is_installable(&a).expect("known tuple"));
        assert!(tester.is_installable(&b).expect("known tuple"));
        tester.remove_candidate_binary(&b).expect("known tuple");
        assert!(tester.is_cached_installable(&a));
    }

    #[test]
    fn test_remove_of_relied_upon_package_drops_cache() {
        let mut builder = UniverseBuilder::new();
        let a = pkg(&mut builder, "a", &[&["b"]], &[]);
        let b = pkg(&mut builder, "b", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&a, &b]);

        assert!(tester.is_installable(&a).expect("known tuple"));
        tester.remove_candidate_binary(&b).expect("known tuple");
        assert!(!tester.is_cached_installable(&a));
        assert!(!tester.is_installable(&a).expect("known tuple"));
    }

    #[test]
    fn test_add_remove_round_trip_restores_candidate_set() {
        let mut builder = UniverseBuilder::new();
        let a = pkg(&mut builder, "a", &[&["b"]], &[]);
        let b = pkg(&mut builder, "b", &[], &[]);
        let c = pkg(&mut builder, "c", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&a, &b]);

        let before = tester.candidate_tuples();
        tester.add_candidate_binary(&c).expect("known tuple");
        tester.remove_candidate_binary(&c).expect("known tuple");
        assert_eq!(tester.candidate_tuples(), before);
    }

    #[test]
    fn test_essential_conflict_is_fatal() {
        let mut builder = UniverseBuilder::new();
        let x = pkg(&mut builder, "x", &[], &["ess"]);
        let ess = tuple("ess");
        builder.add_package(&ess, &[], &[], true);
        let mut tester = tester_with(builder.build(), &[&x, &ess]);

        assert!(!tester.is_installable(&x).expect("known tuple"));
        assert!(tester.is_cached_uninstallable(&x));
        assert!(!tester.is_candidate(&x));
    }

    #[test]
    fn test_pseudo_essential_closure_includes_forced_deps() {
        // The essential package forces lib in, so anything conflicting
        // with lib is uninstallable on this architecture.
        let mut builder = UniverseBuilder::new();
        let ess = tuple("ess");
        builder.add_package(&ess, &[vec![tuple("lib")]], &[], true);
        let lib = pkg(&mut builder, "lib", &[], &[]);
        let x = pkg(&mut builder, "x", &[], &["lib"]);
        let ok = pkg(&mut builder, "ok", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&ess, &lib, &x, &ok]);

        assert!(!tester.is_installable(&x).expect("known tuple"));
        assert!(tester.is_installable(&ok).expect("known tuple"));
    }

    #[test]
    fn test_compute_candidate_installability_warms_caches() {
        let mut builder = UniverseBuilder::new();
        let a = pkg(&mut builder, "a", &[&["b"]], &[]);
        let b = pkg(&mut builder, "b", &[], &[]);
        let h = pkg(&mut builder, "h", &[&["missing"]], &[]);
        let _missing = pkg(&mut builder, "missing", &[], &[]);
        let mut tester = tester_with(builder.build(), &[&a, &b, &h]);

        tester.compute_candidate_installability();
        assert!(tester.is_cached_installable(&a));
        assert!(tester.is_cached_installable(&b));
        assert!(tester.is_cached_uninstallable(&h));
    }
}
