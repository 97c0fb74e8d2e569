// SPDX-License-Identifier: MPL-2.0

//! Project model and build configuration resolution for source-based
//! package managers.
//!
//! A package manager that builds from source needs more than solved
//! version ranges: every package declares named build *configurations*
//! (say `library`, `executable`, `unittest`), each configuration may be
//! restricted to certain platforms, may activate only a subset of the
//! declared dependencies, and may pin the configuration a dependency
//! must be built with. This crate picks exactly one configuration per
//! package so that every constraint across the whole dependency graph
//! is satisfied, then flattens the per-package build settings into a
//! single recipe a generator backend can consume.
//!
//! # The project model
//!
//! A [Project] is opened from a root [Package], a [PackageStore] (the
//! seam to the package manager's cache) and the [SelectedVersions]
//! store holding the versions a range solver pinned earlier:
//!
//! ```
//! # use std::sync::Arc;
//! # use confsolve::{
//! #     Configuration, Dependency, OfflinePackageStore, Package, Platform, Project,
//! #     SelectedVersions,
//! # };
//! let mut store = OfflinePackageStore::new();
//!
//! let mut utils = Package::new("utils", "1.2.0", "/cache/utils-1.2.0");
//! utils.add_configuration(Configuration::new("library"));
//! store.add_package(utils);
//!
//! let mut app = Package::new("app", "0.1.0", "/src/app");
//! app.add_dependency("utils", Dependency::new(">=1.0.0"));
//! app.add_configuration(Configuration::new("library"));
//!
//! let mut selections = SelectedVersions::new();
//! selections.select("utils", "1.2.0");
//!
//! let project = Project::new(Arc::new(app), &store, selections);
//! let platform = Platform::new("linux", "x86_64", "gcc");
//!
//! let configs = project.package_configs(&platform, None, true).unwrap();
//! assert_eq!(configs["app"], "library");
//! assert_eq!(configs["utils"], "library");
//! ```
//!
//! Missing selections and uninstalled packages do not fail the open;
//! they are skipped with a diagnostic and surfaced as pending
//! [Action]s ([Project::pending_actions]) so the front-end can drive
//! its fetch layer and reopen the project afterwards.
//!
//! # Configuration resolution
//!
//! [Project::package_configs] enumerates every `(package,
//! configuration)` pair admissible under the platform, wires an edge
//! wherever a parent configuration permits a child configuration, and
//! eliminates vertices until exactly one survives per package. A vertex
//! survives only while *every* dependee package can still reach it;
//! when several survive for one package, the configuration declared
//! earliest wins. The procedure is deterministic: the same graph, the
//! same platform and the same selections always produce the same map.
//!
//! # Aggregating build settings
//!
//! [Project::add_build_settings] walks the graph parents-first over the
//! edges active under the resolved configuration map and merges every
//! package's settings into one flat [BuildSettings] recipe, expanding
//! `$VAR`, `$PACKAGE_DIR` and `$$` along the way (see [expand_vars]).
//! Target-level fields (`target_type`, `target_name`, ...) are taken
//! from the root package only.
//!
//! # Persistence
//!
//! [SelectedVersions] round-trips through a versioned JSON document
//! (see [FILE_VERSION]); [Project::save] writes it next to the root
//! package. Loads are strict: a document written by an incompatible
//! tool version or failing the schema leaves the store empty and
//! surfaces the error.

#![warn(missing_docs)]

mod action;
mod error;
mod package;
mod platform;
mod project;
mod selections;
mod settings;
mod store;
mod type_aliases;
mod vars;
mod version;

pub use action::{Action, PlacementScope};
pub use error::ProjectError;
pub use package::{Configuration, Dependency, Package};
pub use platform::Platform;
pub use project::{Project, SELECTIONS_FILE};
pub use selections::{Selected, SelectedVersions, FILE_VERSION};
pub use settings::{
    BuildOption, BuildRequirement, BuildSettings, TargetType, ToolRequirement,
    ToolchainRequirements,
};
pub use store::{OfflinePackageStore, PackageStore};
pub use type_aliases::{ConfigMap, Map, Set};
pub use vars::expand_vars;
pub use version::{Version, VersionSpec};

mod internal;
