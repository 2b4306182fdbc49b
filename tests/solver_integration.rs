//! Integration tests for the installability tester and migration solver.
//!
//! These tests exercise the public API end to end: building a universe,
//! testing installability against a candidate set, and deriving migration
//! schedules for batches of items.

use migration_toolkit::error::Result;
use migration_toolkit::{
    InstallabilitySolver, InstallabilityTester, MigrationGroup, MigrationItem, PackageTuple,
    UniverseBuilder,
};
use std::collections::BTreeSet;

fn tuple(name: &str, version: &str) -> PackageTuple {
    PackageTuple::new(name, version, "amd64")
}

/// Test a straightforward dependency chain: everything resolves by unit
/// propagation and the whole chain ends up cached.
#[test]
fn test_dependency_chain_installs() -> Result<()> {
    let mut builder = UniverseBuilder::new();
    let app = tuple("app", "1.0");
    let libui = tuple("libui", "1.0");
    let libcore = tuple("libcore", "1.0");
    builder.add_package(&app, &[vec![libui.clone()]], &[], false);
    builder.add_package(&libui, &[vec![libcore.clone()]], &[], false);
    builder.add_package(&libcore, &[], &[], false);

    let mut tester = InstallabilityTester::new(builder.build());
    for t in [&app, &libui, &libcore] {
        tester.add_candidate_binary(t)?;
    }

    assert!(tester.is_installable(&app)?);
    assert!(tester.is_cached_installable(&libui));
    assert!(tester.is_cached_installable(&libcore));
    Ok(())
}

/// Test that a conflict reached through two dependency branches is
/// detected: one branch forces a package the other branch conflicts with.
#[test]
fn test_conflicting_branches_are_uninstallable() -> Result<()> {
    let mut builder = UniverseBuilder::new();
    let a = tuple("a", "1.0");
    let b = tuple("b", "1.0");
    let c = tuple("c", "1.0");
    let d = tuple("d", "1.0");
    builder.add_package(&a, &[vec![b.clone()]], &[], false);
    builder.add_package(&b, &[], &[], false);
    builder.add_package(&c, &[], &[b.clone()], false);
    builder.add_package(&d, &[vec![a.clone()], vec![c.clone()]], &[], false);

    let mut tester = InstallabilityTester::new(builder.build());
    for t in [&a, &b, &c, &d] {
        tester.add_candidate_binary(t)?;
    }

    assert!(!tester.is_installable(&d)?);
    // Each branch works on its own; only the combination is impossible.
    assert!(tester.is_installable(&a)?);
    assert!(tester.is_installable(&c)?);
    Ok(())
}

/// Test that alternatives are tried until a viable one is found, and that
/// candidates depending on the broken alternative are condemned with it.
#[test]
fn test_alternatives_with_broken_candidate() -> Result<()> {
    let mut builder = UniverseBuilder::new();
    let mail = tuple("mail-reader", "1.0");
    let exim = tuple("exim", "4.97");
    let postfix = tuple("postfix", "3.8");
    let missing = tuple("libsasl", "2.1");
    // exim needs a library that is not a candidate; postfix works.
    builder.add_package(&mail, &[vec![exim.clone(), postfix.clone()]], &[], false);
    builder.add_package(&exim, &[vec![missing.clone()]], &[tuple("postfix", "3.8")], false);
    builder.add_package(&postfix, &[], &[], false);
    builder.add_package(&missing, &[], &[], false);

    let mut tester = InstallabilityTester::new(builder.build());
    for t in [&mail, &exim, &postfix] {
        tester.add_candidate_binary(t)?;
    }

    assert!(tester.is_installable(&mail)?);
    assert!(!tester.is_installable(&exim)?);
    assert!(tester.is_cached_uninstallable(&exim));
    Ok(())
}

/// Test the full mutate-and-recheck cycle: removing a relied-upon package
/// flips a cached verdict after the caches are invalidated.
#[test]
fn test_mutation_invalidates_verdicts() -> Result<()> {
    let mut builder = UniverseBuilder::new();
    let app = tuple("app", "1.0");
    let lib = tuple("lib", "1.0");
    builder.add_package(&app, &[vec![lib.clone()]], &[], false);
    builder.add_package(&lib, &[], &[], false);

    let mut tester = InstallabilityTester::new(builder.build());
    tester.add_candidate_binary(&app)?;
    tester.add_candidate_binary(&lib)?;
    assert!(tester.is_installable(&app)?);

    tester.remove_candidate_binary(&lib)?;
    assert!(!tester.is_installable(&app)?);

    tester.add_candidate_binary(&lib)?;
    assert!(tester.is_installable(&app)?);
    Ok(())
}

/// Test that mutually dependent migrations come out as one atomic group
/// while an independent migration schedules separately.
#[test]
fn test_schedule_mixes_sccs_and_singletons() -> Result<()> {
    let mut builder = UniverseBuilder::new();
    // x/2 and y/2 need each other; z/2 is independent.
    builder.add_package(&tuple("x", "2"), &[vec![tuple("y", "2")]], &[], false);
    builder.add_package(&tuple("y", "2"), &[vec![tuple("x", "2")]], &[], false);
    builder.add_package(&tuple("z", "2"), &[], &[], false);
    for name in ["x", "y", "z"] {
        builder.add_package(&tuple(name, "1"), &[], &[], false);
    }

    let mut tester = InstallabilityTester::new(builder.build());
    for name in ["x", "y", "z"] {
        tester.add_candidate_binary(&tuple(name, "1"))?;
    }
    let solver = InstallabilitySolver::new(tester);

    let groups: Vec<MigrationGroup> = ["x", "y", "z"]
        .iter()
        .map(|name| MigrationGroup {
            item: MigrationItem::parse_versioned(&format!("{name}/2")),
            adds: vec![tuple(name, "2")],
            rms: vec![tuple(name, "1")],
        })
        .collect();
    let schedule = solver.solve_groups(&groups)?;

    assert_eq!(schedule.len(), 2);
    let sizes: BTreeSet<usize> = schedule.iter().map(Vec::len).collect();
    assert_eq!(sizes, BTreeSet::from([1, 2]));
    let pair: BTreeSet<String> = schedule
        .iter()
        .find(|group| group.len() == 2)
        .expect("one atomic pair")
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(pair, BTreeSet::from(["x/2".to_string(), "y/2".to_string()]));
    Ok(())
}

/// Test that the schedule respects dependency direction across several
/// migrations: suppliers come out before consumers, removals last.
#[test]
fn test_schedule_is_a_topological_order() -> Result<()> {
    let mut builder = UniverseBuilder::new();
    builder.add_package(&tuple("base", "2"), &[], &[], false);
    builder.add_package(&tuple("mid", "2"), &[vec![tuple("base", "2")]], &[], false);
    builder.add_package(&tuple("top", "2"), &[vec![tuple("mid", "2")]], &[], false);
    for name in ["base", "mid", "top"] {
        builder.add_package(&tuple(name, "1"), &[], &[], false);
    }

    let mut tester = InstallabilityTester::new(builder.build());
    for name in ["base", "mid", "top"] {
        tester.add_candidate_binary(&tuple(name, "1"))?;
    }
    let solver = InstallabilitySolver::new(tester);

    let groups: Vec<MigrationGroup> = ["top", "base", "mid"]
        .iter()
        .map(|name| MigrationGroup {
            item: MigrationItem::parse_versioned(&format!("{name}/2")),
            adds: vec![tuple(name, "2")],
            rms: vec![tuple(name, "1")],
        })
        .collect();
    let schedule = solver.solve_groups(&groups)?;

    let flat: Vec<String> = schedule
        .iter()
        .flat_map(|group| group.iter().map(ToString::to_string))
        .collect();
    assert_eq!(
        flat,
        vec!["base/2".to_string(), "mid/2".to_string(), "top/2".to_string()]
    );
    Ok(())
}
