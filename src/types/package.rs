//! Package-related data types for suite contents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Conventional name of the staging suite packages migrate from.
pub const SOURCE_SUITE: &str = "unstable";

/// Conventional name of the released suite packages migrate into.
pub const TARGET_SUITE: &str = "testing";

/// Globally unique identity of a binary package build.
///
/// Tuples use structural equality; `arch:all` packages are expected to be
/// remapped to each concrete architecture at load time, so the solver never
/// has to handle cross-architecture fan-out.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageTuple {
    /// Binary package name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Concrete architecture the package is built for.
    pub arch: String,
}

impl PackageTuple {
    /// Create a new package tuple from its three components.
    #[must_use]
    pub fn new(name: &str, version: &str, arch: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            arch: arch.to_string(),
        }
    }
}

impl fmt::Display for PackageTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.name, self.version, self.arch)
    }
}

/// Source package record as stored in a suite's source table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Source version.
    pub version: String,
    /// Archive section (None when unknown).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Binaries built from this source, as `(name, architecture)` pairs.
    pub binaries: Vec<(String, String)>,
    /// Maintainer field, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
    /// Whether this is a placeholder record synthesized for an orphan binary.
    #[serde(default)]
    pub fake: bool,
}

/// Binary package record as stored in a suite's per-architecture table.
///
/// Dependency groups are pre-parsed lists of alternative package names
/// (control-file parsing happens upstream of this crate); virtual names are
/// resolved against the suite's provides table when reverse relations are
/// registered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryRecord {
    /// Binary version.
    pub version: String,
    /// Archive section (None when unknown).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Architecture field of the package itself (None for `all`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    /// Name of the source package this binary was built from.
    pub source: String,
    /// Version of the source package this binary was built from.
    pub source_version: String,
    /// Dependency groups: the outer list is a conjunction, each inner list a
    /// disjunction of alternative package names.
    #[serde(default)]
    pub depends: Vec<Vec<String>>,
    /// Names this package conflicts with.
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// Virtual package names provided by this binary.
    #[serde(default)]
    pub provides: Vec<String>,
    /// Names of packages whose dependencies mention this package.
    #[serde(default)]
    pub rdeps: Vec<String>,
    /// Names of packages that conflict with this package.
    #[serde(default)]
    pub rcons: Vec<String>,
    /// Whether the package is flagged essential.
    #[serde(default)]
    pub essential: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_tuple_display() {
        let t = PackageTuple::new("libc6", "2.37-12", "amd64");
        assert_eq!(t.to_string(), "libc6/2.37-12/amd64");
    }

    #[test]
    fn test_package_tuple_equality() {
        let a = PackageTuple::new("foo", "1.0", "amd64");
        let b = PackageTuple::new("foo", "1.0", "amd64");
        let c = PackageTuple::new("foo", "1.0", "i386");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
