//! Reverse dependency closure for installability re-check scoping.
//!
//! Removing or replacing a binary can only affect the installability of
//! packages that (transitively) depend on it. This module computes that
//! transitive set with a breadth-first walk over the registered `rdeps`
//! lists, so drivers can limit re-checks to the affected slice instead of
//! re-testing the whole suite.

use crate::archive::tables::BinaryTable;
use std::collections::{HashSet, VecDeque};

/// What: Compute the full reverse-dependency tree of a package.
///
/// Inputs:
/// - `binaries`: Binary table of the suite and architecture to walk.
/// - `pkg`: Package whose reverse tree is requested.
/// - `arch`: Architecture paired with every returned name.
///
/// Output:
/// - Returns the set of `(name, arch)` pairs reachable over `rdeps`,
///   including `(pkg, arch)` itself; empty when `pkg` is not in the table.
///
/// Details:
/// - Performs a breadth-first closure: the result is the least fixed point
///   of "include `x` if `x` is a reverse dependency of an included
///   package".
/// - A seen-set guarantees each package is visited once; reverse
///   dependencies without a table entry are skipped.
/// - No ordering of the returned set is promised.
#[must_use]
pub fn compute_reverse_tree(
    binaries: &BinaryTable,
    pkg: &str,
    arch: &str,
) -> HashSet<(String, String)> {
    if !binaries.contains_key(pkg) {
        return HashSet::new();
    }

    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(pkg.to_string());
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(pkg.to_string());

    while let Some(current) = queue.pop_front() {
        let Some(record) = binaries.get(&current) else {
            continue;
        };
        for rdep in &record.rdeps {
            if seen.insert(rdep.clone()) {
                queue.push_back(rdep.clone());
            }
        }
    }

    seen.into_iter()
        .map(|name| (name, arch.to_string()))
        .collect()
}
