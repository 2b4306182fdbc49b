//! Readers and writers for the run's state and result files.
//!
//! This module covers the non-installable report (`nuninst`), the final
//! suite listing (`HeidiResult`) and the old-library summary, plus the
//! helpers that compare two non-installability statistics.

use crate::archive::{ArchTables, SourceTable};
use crate::error::Result;
use crate::types::MigrationItem;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

/// Non-installability statistic: architecture to the names of its
/// uninstallable packages.
pub type Nuninst = BTreeMap<String, BTreeSet<String>>;

/// Timestamp format used in the non-installable report header.
const NUNINST_TIME_FORMAT: &str = "%Y.%m.%d %H:%M:%S %z";

/// What: Write the non-installable report.
///
/// Inputs:
/// - `path`: Destination file.
/// - `nuninst`: Statistic to write.
///
/// Output:
/// - Returns `Ok(())` once the report is on disk.
///
/// Details:
/// - The first two lines carry `Built on:` and `Last update:` UTC
///   timestamps, followed by a blank line and one `<arch>: <pkg> ...`
///   line per architecture.
///
/// # Errors
///
/// Returns `MigrationToolkitError::Io` when the file cannot be written.
pub fn write_nuninst(path: &Path, nuninst: &Nuninst) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    let now = Utc::now().format(NUNINST_TIME_FORMAT);
    writeln!(file, "Built on: {now}")?;
    writeln!(file, "Last update: {now}")?;
    writeln!(file)?;
    for (arch, packages) in nuninst {
        let names: Vec<&str> = packages.iter().map(String::as_str).collect();
        writeln!(file, "{arch}: {}", names.join(" "))?;
    }
    Ok(())
}

/// What: Read a non-installable report.
///
/// Inputs:
/// - `path`: Report file to read.
/// - `architectures`: Allow-list of architectures to retain.
///
/// Output:
/// - Returns the statistic keyed by the architecture field as written
///   (variant suffixes like `amd64+all` are kept in the key).
///
/// Details:
/// - Lines without a `:` are skipped; the architecture is matched against
///   the allow-list after splitting off any `+variant` suffix.
///
/// # Errors
///
/// Returns `MigrationToolkitError::Io` when the file cannot be read.
pub fn read_nuninst(path: &Path, architectures: &[String]) -> Result<Nuninst> {
    let mut nuninst = Nuninst::new();
    let content = std::fs::read_to_string(path)?;
    for line in content.lines() {
        let Some((arch, packages)) = line.split_once(':') else {
            continue;
        };
        let arch = arch.trim();
        let base = arch.split('+').next().unwrap_or(arch);
        if !architectures.iter().any(|allowed| allowed == base) {
            continue;
        }
        nuninst.insert(
            arch.to_string(),
            packages.split_whitespace().map(ToString::to_string).collect(),
        );
    }
    Ok(nuninst)
}

/// What: Keep only the newly uninstallable packages of a statistic.
///
/// Inputs:
/// - `old`: Statistic before the change.
/// - `new`: Statistic after the change.
///
/// Output:
/// - Returns, per architecture present in both statistics, the packages
///   uninstallable in `new` but not in `old`.
#[must_use]
pub fn newly_uninst(old: &Nuninst, new: &Nuninst) -> Nuninst {
    let mut result = Nuninst::new();
    for (arch, packages) in new {
        if let Some(old_packages) = old.get(arch) {
            result.insert(
                arch.clone(),
                packages.difference(old_packages).cloned().collect(),
            );
        }
    }
    result
}

/// What: Render a statistic as indented per-architecture lines.
///
/// Inputs:
/// - `architectures`: Architectures to include, in output order.
/// - `nuninst`: Statistic to render.
///
/// Output:
/// - Returns lines of the form `    * <arch>: <pkg>, <pkg>`; empty
///   architectures are omitted.
#[must_use]
pub fn eval_uninst(architectures: &[String], nuninst: &Nuninst) -> String {
    let mut out = String::new();
    for arch in architectures {
        if let Some(packages) = nuninst.get(arch)
            && !packages.is_empty()
        {
            let names: Vec<&str> = packages.iter().map(String::as_str).collect();
            out.push_str(&format!("    * {arch}: {}\n", names.join(", ")));
        }
    }
    out
}

/// What: Write the final target-suite listing (HeidiResult).
///
/// Inputs:
/// - `path`: Destination file.
/// - `sources`: Target-suite source table.
/// - `binaries`: Target-suite binary tables per architecture.
///
/// Output:
/// - Returns `Ok(())` once the listing is on disk.
///
/// Details:
/// - Binaries are written first, sorted by architecture then name, as
///   `<bin> <ver> <arch> <section>` (architecture defaults to `all`,
///   section to `faux`); sources follow, sorted by name, as
///   `<src> <ver> source <section>` (section defaults to `unknown`).
///
/// # Errors
///
/// Returns `MigrationToolkitError::Io` when the file cannot be written.
pub fn write_heidi(
    path: &Path,
    sources: &SourceTable,
    binaries: &BTreeMap<String, ArchTables>,
) -> Result<()> {
    let mut file = std::fs::File::create(path)?;

    for tables in binaries.values() {
        let mut names: Vec<&String> = tables.packages.keys().collect();
        names.sort_unstable();
        for name in names {
            let record = &tables.packages[name];
            let arch = record.architecture.as_deref().unwrap_or("all");
            let section = record.section.as_deref().unwrap_or("faux");
            writeln!(file, "{name} {} {arch} {section}", record.version)?;
        }
    }

    let mut names: Vec<&String> = sources.keys().collect();
    names.sort_unstable();
    for name in names {
        let record = &sources[name];
        let section = record.section.as_deref().unwrap_or("unknown");
        writeln!(file, "{name} {} source {section}", record.version)?;
    }
    Ok(())
}

/// What: Render the old-library summary.
///
/// Inputs:
/// - `libraries`: Items identifying leftover libraries, one per
///   architecture occurrence.
///
/// Output:
/// - Returns one `  <pkg>: <arch> <arch> ...` line per package (in first
///   occurrence order) with a trailing newline.
#[must_use]
pub fn old_libraries_format(libraries: &[MigrationItem]) -> String {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for item in libraries {
        let package = item.package();
        if !grouped.contains_key(package) {
            order.push(package);
        }
        grouped.entry(package).or_default().push(item.architecture());
    }
    let mut out = String::new();
    for package in order {
        if let Some(arches) = grouped.get(package) {
            out.push_str(&format!("  {package}: {}\n", arches.join(" ")));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::SuiteTables;
    use crate::types::{BinaryRecord, SourceRecord, TARGET_SUITE};

    fn nuninst_of(entries: &[(&str, &[&str])]) -> Nuninst {
        entries
            .iter()
            .map(|(arch, packages)| {
                (
                    (*arch).to_string(),
                    packages.iter().map(ToString::to_string).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_nuninst_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nuninst");
        let nuninst = nuninst_of(&[("amd64", &["foo", "bar"]), ("i386", &["baz"])]);

        write_nuninst(&path, &nuninst).expect("report written");
        let archs = vec!["amd64".to_string(), "i386".to_string()];
        let reread = read_nuninst(&path, &archs).expect("report read");
        assert_eq!(reread, nuninst);
    }

    #[test]
    fn test_nuninst_report_shape() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nuninst");
        write_nuninst(&path, &nuninst_of(&[("amd64", &["foo"])])).expect("report written");

        let content = std::fs::read_to_string(&path).expect("report readable");
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].starts_with("Built on: "));
        assert!(lines[1].starts_with("Last update: "));
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "amd64: foo");
    }

    #[test]
    fn test_read_nuninst_filters_and_keeps_variants() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nuninst");
        std::fs::write(
            &path,
            "Built on: now\n\namd64: foo\namd64+all: bar\nsparc: baz\nnot a record\n",
        )
        .expect("report written");

        let reread =
            read_nuninst(&path, &["amd64".to_string()]).expect("report read");
        assert_eq!(reread.len(), 2);
        assert!(reread.contains_key("amd64"));
        assert!(reread.contains_key("amd64+all"));
        assert!(!reread.contains_key("sparc"));
    }

    #[test]
    fn test_newly_uninst() {
        let old = nuninst_of(&[("amd64", &["foo"]), ("i386", &[])]);
        let new = nuninst_of(&[("amd64", &["foo", "bar"]), ("armel", &["baz"])]);
        let delta = newly_uninst(&old, &new);
        // armel is not in the old statistic and is skipped.
        assert_eq!(delta, nuninst_of(&[("amd64", &["bar"])]));
    }

    #[test]
    fn test_eval_uninst() {
        let nuninst = nuninst_of(&[("amd64", &["foo", "bar"]), ("i386", &[])]);
        let archs = vec!["amd64".to_string(), "i386".to_string()];
        assert_eq!(eval_uninst(&archs, &nuninst), "    * amd64: bar, foo\n");
    }

    #[test]
    fn test_write_heidi() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("HeidiResult");

        let mut tables = SuiteTables::new();
        tables.add_binary(
            TARGET_SUITE,
            "amd64",
            "zlib",
            BinaryRecord {
                version: "1.3-1".to_string(),
                architecture: Some("amd64".to_string()),
                section: Some("libs".to_string()),
                ..BinaryRecord::default()
            },
        );
        tables.add_binary(
            TARGET_SUITE,
            "amd64",
            "awk",
            BinaryRecord {
                version: "5.2".to_string(),
                ..BinaryRecord::default()
            },
        );
        tables.add_source(
            TARGET_SUITE,
            "zlib",
            SourceRecord {
                version: "1.3-1".to_string(),
                section: Some("libs".to_string()),
                ..SourceRecord::default()
            },
        );
        tables.add_source(
            TARGET_SUITE,
            "awk",
            SourceRecord {
                version: "5.2".to_string(),
                ..SourceRecord::default()
            },
        );

        let binaries: BTreeMap<String, ArchTables> = tables.binaries[TARGET_SUITE]
            .iter()
            .map(|(arch, tables)| (arch.clone(), tables.clone()))
            .collect();
        write_heidi(&path, &tables.sources[TARGET_SUITE], &binaries)
            .expect("listing written");

        let content = std::fs::read_to_string(&path).expect("listing readable");
        assert_eq!(
            content,
            "awk 5.2 all faux\nzlib 1.3-1 amd64 libs\nawk 5.2 source unknown\nzlib 1.3-1 source libs\n"
        );
    }

    #[test]
    fn test_old_libraries_format() {
        let libraries = vec![
            MigrationItem::parse("libold/amd64"),
            MigrationItem::parse("libold/i386"),
            MigrationItem::parse("libother/amd64"),
        ];
        assert_eq!(
            old_libraries_format(&libraries),
            "  libold: amd64 i386\n  libother: amd64\n"
        );
    }
}
