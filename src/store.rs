// SPDX-License-Identifier: MPL-2.0

//! The seam to the package manager's on-disk cache.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::package::Package;
use crate::type_aliases::Map;
use crate::version::{Version, VersionSpec};

/// Trait that allows the project model to materialize packages.
/// An implementor wraps whatever cache or registry layout the package
/// manager uses; the graph builder only ever asks these two questions.
pub trait PackageStore {
    /// The best installed package named `name` that satisfies `spec`,
    /// or `None` when nothing installed matches.
    fn best_package(&self, name: &str, spec: &VersionSpec) -> Option<Arc<Package>>;

    /// Wraps the local filesystem copy at `path` as a temporary package
    /// bound to `version`, or `None` when the path holds no package.
    fn temporary_package(&self, path: &Path, version: &Version) -> Option<Arc<Package>>;
}

/// A basic in-memory implementation of [PackageStore].
///
/// Versions are ordered by their plain string representation, which is
/// good enough for the graphs exercised in tests and examples; a real
/// package manager orders by the ecosystem's version grammar.
#[derive(Debug, Clone, Default)]
pub struct OfflinePackageStore {
    packages: Map<String, BTreeMap<Version, Arc<Package>>>,
    local: Map<PathBuf, Arc<Package>>,
}

impl OfflinePackageStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an installed package and returns the shared handle.
    pub fn add_package(&mut self, package: Package) -> Arc<Package> {
        let package = Arc::new(package);
        self.packages
            .entry(package.name().to_string())
            .or_default()
            .insert(package.version().clone(), Arc::clone(&package));
        package
    }

    /// Registers a package available through its filesystem path only.
    pub fn add_local_package(&mut self, package: Package) -> Arc<Package> {
        let package = Arc::new(package);
        self.local
            .insert(package.path().to_path_buf(), Arc::clone(&package));
        package
    }

    /// Names of all registered installed packages.
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }
}

impl PackageStore for OfflinePackageStore {
    fn best_package(&self, name: &str, spec: &VersionSpec) -> Option<Arc<Package>> {
        let versions = self.packages.get(name)?;
        if spec.as_str() == "*" {
            return versions.values().next_back().cloned();
        }
        // Selections pin exact versions, so an exact hit is the common case.
        versions.get(&Version::new(spec.as_str())).cloned()
    }

    fn temporary_package(&self, path: &Path, _version: &Version) -> Option<Arc<Package>> {
        self.local.get(path).cloned()
    }
}
