//! Migration ordering: partial order derivation, SCC collapse and
//! linearization.
//!
//! For a batch of candidate migrations the solver derives ordering
//! constraints from the dependencies and conflicts their binaries add and
//! remove, collapses cyclic constraints into strongly connected components
//! (groups that must migrate together), and emits a linearized schedule.
//!
//! Set `BRITNEY_DEBUG` to a non-zero value to trace every derived edge,
//! component and emission step.

use crate::env;
use crate::error::{MigrationToolkitError, Result};
use crate::solver::tester::InstallabilityTester;
use crate::solver::universe::PkgId;
use crate::types::{MigrationItem, PackageTuple};
use std::collections::{BTreeSet, HashMap, HashSet};

/// One migration with the tuples it would add to and remove from the
/// candidate set.
#[derive(Clone, Debug)]
pub struct MigrationGroup {
    /// The migrating item.
    pub item: MigrationItem,
    /// Tuples entering the candidate set if the item migrates.
    pub adds: Vec<PackageTuple>,
    /// Tuples leaving the candidate set if the item migrates.
    pub rms: Vec<PackageTuple>,
}

/// Ordering constraints of one item: the items it must precede and the
/// items that must precede it.
#[derive(Clone, Debug, Default)]
struct OrderConstraints {
    /// Items this one migrates before.
    before: BTreeSet<String>,
    /// Items this one migrates after.
    after: BTreeSet<String>,
}

/// Migration solver on top of an [`InstallabilityTester`].
///
/// The solver only reads the tester's universe and candidate set; the
/// tester stays available through the accessors for the apply/check/
/// rollback cycle that consumes the solver's schedule.
pub struct InstallabilitySolver {
    /// The tester whose universe and candidate set drive the ordering.
    tester: InstallabilityTester,
}

impl InstallabilitySolver {
    /// Wrap a tester in a solver.
    #[must_use]
    pub fn new(tester: InstallabilityTester) -> Self {
        Self { tester }
    }

    /// The underlying installability tester.
    #[must_use]
    pub fn tester(&self) -> &InstallabilityTester {
        &self.tester
    }

    /// Mutable access to the underlying installability tester.
    pub fn tester_mut(&mut self) -> &mut InstallabilityTester {
        &mut self.tester
    }

    /// Unwrap the solver into its tester.
    #[must_use]
    pub fn into_tester(self) -> InstallabilityTester {
        self.tester
    }

    /// What: Derive a migration schedule for a batch of groups.
    ///
    /// Inputs:
    /// - `groups`: Migration groups with the tuples they add and remove.
    ///
    /// Output:
    /// - Returns an ordered list of lists: each inner list is one strongly
    ///   connected component (items that must migrate together), and the
    ///   outer order is a topological order of the collapsed constraint
    ///   graph.
    ///
    /// Details:
    /// - Three constraint rules apply per group: conflicts cleared by the
    ///   removals suggest migrating first; dependency groups of reverse
    ///   dependencies that the removals would break require the dependent
    ///   item to go first; dependency groups of the additions order the
    ///   supplying items first and the removing items later. A swap (the
    ///   same item both adds and removes a satisfier) produces no edge.
    /// - Cycles are collapsed with an iterative Tarjan pass; each
    ///   component becomes one atomic output group.
    ///
    /// # Errors
    ///
    /// Returns `MigrationToolkitError::NotInUniverse` when a group names a
    /// tuple the universe does not know.
    pub fn solve_groups(&self, groups: &[MigrationGroup]) -> Result<Vec<Vec<MigrationItem>>> {
        let debug = env::solver_debug() > 0;
        let universe = self.tester.universe();
        let testing = self.tester.testing_ids();

        let mut order: HashMap<String, OrderConstraints> = HashMap::new();
        let mut key_items: HashMap<String, MigrationItem> = HashMap::new();
        let mut ptable: HashMap<PkgId, String> = HashMap::new();
        let mut going_in: HashSet<PkgId> = HashSet::new();
        let mut going_out: HashSet<PkgId> = HashSet::new();

        // Build the tables.
        let mut resolved: Vec<(String, Vec<PkgId>, Vec<PkgId>)> = Vec::new();
        for group in groups {
            let key = group.item.to_string();
            let lookup = |tuple: &PackageTuple| {
                universe
                    .id(tuple)
                    .ok_or_else(|| MigrationToolkitError::NotInUniverse(tuple.to_string()))
            };
            let adds: Vec<PkgId> = group.adds.iter().map(lookup).collect::<Result<_>>()?;
            let rms: Vec<PkgId> = group.rms.iter().map(lookup).collect::<Result<_>>()?;

            key_items.insert(key.clone(), group.item.clone());
            order.insert(key.clone(), OrderConstraints::default());
            going_in.extend(adds.iter().copied());
            going_out.extend(rms.iter().copied());
            for &id in adds.iter().chain(rms.iter()) {
                ptable.insert(id, key.clone());
            }
            resolved.push((key, adds, rms));
        }

        // Derive the ordering constraints.
        for (key, adds, rms) in &resolved {
            // Conflicts that this item's removals clear: migrating it first
            // clears the path for the item introducing the conflict.
            let mut oldcons: HashSet<PkgId> = rms
                .iter()
                .flat_map(|&r| universe.cons(r).iter().copied())
                .collect();
            let newcons: HashSet<PkgId> = adds
                .iter()
                .flat_map(|&a| universe.cons(a).iter().copied())
                .collect();
            oldcons.retain(|c| !newcons.contains(c));
            let mut cleared: Vec<PkgId> = oldcons.into_iter().collect();
            cleared.sort_unstable();
            for id in cleared {
                if let Some(other) = ptable.get(&id) {
                    if other == key {
                        // Self-conflicts carry no ordering information.
                        continue;
                    }
                    add_edge(&mut order, key, other, "conflict", debug);
                }
            }

            // Reverse dependencies of the removals: if a dependency group
            // of a dependent would go unsatisfied, the dependent's own
            // migration must happen first.
            for &r in rms {
                for &rdep in universe.rdeps(r) {
                    for group in universe.deps(rdep) {
                        let rigid: Vec<PkgId> = group
                            .iter()
                            .copied()
                            .filter(|d| !going_out.contains(d))
                            .collect();
                        if rigid.iter().any(|d| testing.contains(d)) {
                            // (Partly) satisfied by the candidate set.
                            continue;
                        }
                        if let Some(other) = ptable.get(&rdep) {
                            if other == key {
                                continue;
                            }
                            add_edge(&mut order, other, key, "removal", debug);
                        }
                    }
                }
            }

            // Dependency groups of the additions: items supplying a needed
            // binary go first, items removing one go after. A swap within
            // one item cancels out.
            for &a in adds {
                for group in universe.deps(a) {
                    let rigid: Vec<PkgId> = group
                        .iter()
                        .copied()
                        .filter(|d| !going_out.contains(d))
                        .collect();
                    if rigid.iter().any(|d| testing.contains(d)) {
                        continue;
                    }
                    let mut other_adds: BTreeSet<String> = BTreeSet::new();
                    let mut other_rms: BTreeSet<String> = BTreeSet::new();
                    for d in group {
                        if let Some(other) = ptable.get(d) {
                            if going_in.contains(d) {
                                other_adds.insert(other.clone());
                            } else {
                                other_rms.insert(other.clone());
                            }
                        }
                    }
                    for other in other_adds.difference(&other_rms) {
                        add_edge(&mut order, other, key, "dependency (add)", debug);
                    }
                    let cloned_rms: Vec<String> =
                        other_rms.difference(&other_adds).cloned().collect();
                    for other in cloned_rms {
                        add_edge(&mut order, key, &other, "dependency (remove)", debug);
                    }
                }
            }
        }

        // Collapse cycles: every strongly connected component of size > 1
        // becomes an atomic group represented by its first member.
        let comps = compute_scc(&order);
        let mut merged: HashMap<String, String> = HashMap::new();
        let mut scc: HashMap<String, Vec<String>> = HashMap::new();
        for com in &comps {
            let scc_id = com[0].clone();
            scc.insert(scc_id.clone(), com.clone());
            merged.insert(scc_id.clone(), scc_id.clone());
            if com.len() > 1 {
                for member in com.iter().skip(1) {
                    if let Some(constraints) = order.remove(member) {
                        if let Some(rep) = order.get_mut(&scc_id) {
                            rep.before.extend(constraints.before);
                            rep.after.extend(constraints.after);
                        }
                    }
                    merged.insert(member.clone(), scc_id.clone());
                }
                if debug {
                    tracing::debug!("SCC: {} -- {:?}", scc_id, com);
                }
            }
        }

        // Remap edges onto the representatives and drop self-loops caused
        // by the merging.
        for com in &comps {
            let node = &com[0];
            let Some(constraints) = order.get(node) else {
                continue;
            };
            let mut before: BTreeSet<String> = constraints
                .before
                .iter()
                .filter_map(|b| merged.get(b).cloned())
                .collect();
            let mut after: BTreeSet<String> = constraints
                .after
                .iter()
                .filter_map(|a| merged.get(a).cloned())
                .collect();
            before.remove(node);
            after.remove(node);
            if let Some(constraints) = order.get_mut(node) {
                constraints.before = before;
                constraints.after = after;
            }
        }

        // Linearize: emit every component whose predecessors have all been
        // emitted; a component popped too early re-enters when one of its
        // predecessors is emitted.
        let mut check: BTreeSet<String> = order
            .iter()
            .filter(|(_, constraints)| constraints.after.is_empty())
            .map(|(key, _)| key.clone())
            .collect();
        let mut emitted: HashSet<String> = HashSet::new();
        let mut result: Vec<Vec<MigrationItem>> = Vec::new();

        while let Some(cur) = check.pop_first() {
            let Some(constraints) = order.get(&cur) else {
                continue;
            };
            if !constraints.after.iter().all(|a| emitted.contains(a)) {
                continue;
            }
            if debug {
                tracing::debug!("emitting {} -- {:?}", cur, scc.get(&cur));
            }
            emitted.insert(cur.clone());
            if let Some(members) = scc.get(&cur) {
                result.push(
                    members
                        .iter()
                        .filter_map(|key| key_items.get(key).cloned())
                        .collect(),
                );
            }
            for successor in &constraints.before {
                if !emitted.contains(successor) {
                    check.insert(successor.clone());
                }
            }
        }

        Ok(result)
    }
}

/// Record that `first` must migrate before `then`.
fn add_edge(
    order: &mut HashMap<String, OrderConstraints>,
    first: &str,
    then: &str,
    reason: &str,
    debug: bool,
) {
    if let Some(constraints) = order.get_mut(first) {
        let newly = constraints.before.insert(then.to_string());
        if debug && newly {
            tracing::debug!("{} induced order: {} before {}", reason, first, then);
        }
    }
    if let Some(constraints) = order.get_mut(then) {
        constraints.after.insert(first.to_string());
    }
}

/// Work item of the iterative Tarjan walk.
enum Visit {
    /// First visit of a node.
    Enter(String),
    /// All successors handled; compute the low-link and maybe emit.
    Exit(String, usize, usize),
}

/// Strongly connected components of the `before` graph, iteratively.
///
/// Members of an emitted component get a sentinel low-link larger than any
/// assignable index so they are never revisited and never pull a later
/// component's low-link down.
fn compute_scc(order: &HashMap<String, OrderConstraints>) -> Vec<Vec<String>> {
    let mut result: Vec<Vec<String>> = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut low: HashMap<String, usize> = HashMap::new();

    let mut nodes: Vec<&String> = order.keys().collect();
    nodes.sort_unstable();

    for root in nodes {
        if low.contains_key(root) {
            continue;
        }
        let mut work: Vec<Visit> = vec![Visit::Enter(root.clone())];
        while let Some(visit) = work.pop() {
            match visit {
                Visit::Enter(node) => {
                    if low.contains_key(&node) {
                        continue;
                    }
                    let num = low.len();
                    low.insert(node.clone(), num);
                    let stack_pos = stack.len();
                    stack.push(node.clone());
                    work.push(Visit::Exit(node.clone(), num, stack_pos));
                    if let Some(constraints) = order.get(&node) {
                        for successor in constraints.before.iter().rev() {
                            work.push(Visit::Enter(successor.clone()));
                        }
                    }
                }
                Visit::Exit(node, num, stack_pos) => {
                    let mut lowest = num;
                    if let Some(constraints) = order.get(&node) {
                        for successor in &constraints.before {
                            if let Some(&slow) = low.get(successor) {
                                lowest = lowest.min(slow);
                            }
                        }
                    }
                    low.insert(node.clone(), lowest);
                    if num == lowest {
                        let component: Vec<String> = stack.split_off(stack_pos);
                        for member in &component {
                            low.insert(member.clone(), usize::MAX);
                        }
                        result.push(component);
                    }
                }
            }
        }
    }
    result
}
