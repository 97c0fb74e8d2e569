// SPDX-License-Identifier: MPL-2.0

//! The project model: a root package, the materialized dependency
//! graph, and the operations the front-end drives against them.
//!
//! The graph builder is deliberately tolerant: a dependency without a
//! selection, or whose selected version is not installed, is skipped
//! with a diagnostic and surfaced as a pending [Action] so the
//! front-end can drive its fetch layer and reopen the project. The
//! configuration resolver and the settings aggregator are strict about
//! whatever did materialize.

use std::fs;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::json;

use crate::action::{Action, PlacementScope};
use crate::error::ProjectError;
use crate::internal::resolve_configs;
use crate::package::{Dependency, Package};
use crate::platform::Platform;
use crate::selections::SelectedVersions;
use crate::settings::{BuildSettings, TargetType, SPECIAL_COMPILER_FLAGS};
use crate::store::PackageStore;
use crate::type_aliases::{ConfigMap, Map, Set};
use crate::version::VersionSpec;

/// File name of the persisted selections document, relative to the
/// root package path.
pub const SELECTIONS_FILE: &str = "confsolve.selections.json";

const SCRATCH_DIR: &str = ".confsolve";
const SCRATCH_FILE: &str = "state.json";

/// A root package together with its resolved dependency graph.
///
/// Dependency packages are owned by the package store and shared here
/// read-only; the selections store is owned by the project and is the
/// only state the project ever writes back to disk.
#[derive(Debug)]
pub struct Project {
    root: Arc<Package>,
    dependencies: Vec<Arc<Package>>,
    by_name: Map<String, usize>,
    dependees: Map<String, Vec<String>>,
    selections: SelectedVersions,
    actions: Vec<Action>,
}

impl Project {
    /// Opens a project: materializes the dependency graph from the
    /// selections and runs the metadata lints.
    pub fn new(root: Arc<Package>, store: &dyn PackageStore, selections: SelectedVersions) -> Self {
        let mut project = Self {
            root,
            dependencies: Vec::new(),
            by_name: Map::default(),
            dependees: Map::default(),
            selections,
            actions: Vec::new(),
        };
        project.check_scratch_state();
        project.reinit(store);
        project.lint();
        project
    }

    /// The root package.
    pub fn root(&self) -> &Arc<Package> {
        &self.root
    }

    /// All materialized dependencies, in the order they were first
    /// reached from the root.
    pub fn dependencies(&self) -> &[Arc<Package>] {
        &self.dependencies
    }

    /// The selections backing this project.
    pub fn selections(&self) -> &SelectedVersions {
        &self.selections
    }

    /// Mutable access to the selections, for the version-range solver.
    pub fn selections_mut(&mut self) -> &mut SelectedVersions {
        &mut self.selections
    }

    /// The materialized dependency named `name`, if any.
    pub fn dependency(&self, name: &str) -> Option<&Arc<Package>> {
        self.by_name.get(name).map(|i| &self.dependencies[*i])
    }

    /// Like [dependency](Project::dependency), but failing with
    /// [ProjectError::UnknownDependency] when absent.
    pub fn dependency_checked(&self, name: &str) -> Result<&Arc<Package>, ProjectError> {
        self.dependency(name)
            .ok_or_else(|| ProjectError::UnknownDependency {
                name: name.to_string(),
            })
    }

    /// Packages that declare `name` as a dependency. Only populated for
    /// materialized packages; absent names yield an empty slice.
    pub fn dependees_of(&self, name: &str) -> &[String] {
        self.dependees.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when every non-optional declared dependency in the graph
    /// was materialized.
    pub fn has_all_dependencies(&self) -> bool {
        std::iter::once(&self.root)
            .chain(self.dependencies.iter())
            .all(|pack| {
                pack.dependencies().all(|(name, dep)| {
                    dep.optional || name == self.root.name() || self.by_name.contains_key(name)
                })
            })
    }

    /// Actions the fetch layer must carry out before the graph can be
    /// complete: one entry per dependency that could not be
    /// materialized, with every package that requires it as an issuer.
    /// Empty when [has_all_dependencies](Project::has_all_dependencies)
    /// holds. Rebuilt by [reinit](Project::reinit).
    pub fn pending_actions(&self) -> &[Action] {
        &self.actions
    }

    /// Rebuilds the dependency graph from the current selections.
    pub fn reinit(&mut self, store: &dyn PackageStore) {
        self.dependencies.clear();
        self.by_name.clear();
        self.dependees.clear();
        self.actions.clear();
        let root = Arc::clone(&self.root);
        self.collect_dependencies(store, &root);
        info!(
            "resolved {} dependencies for {}",
            self.dependencies.len(),
            self.root
        );
    }

    fn collect_dependencies(&mut self, store: &dyn PackageStore, pack: &Arc<Package>) {
        let declared: Vec<(String, Dependency)> = pack
            .dependencies()
            .map(|(name, dep)| (name.to_string(), dep.clone()))
            .collect();
        for (name, dep) in declared {
            if name == self.root.name() {
                debug!("ignoring dependency of {} on the root package", pack);
                continue;
            }
            if self.by_name.contains_key(&name) {
                continue;
            }
            let Some(selected) = self.selections.selected(&name).cloned() else {
                if dep.optional {
                    debug!("skipping optional dependency {} of {}", name, pack);
                } else {
                    warn!("no version selected for dependency {} of {}, skipping", name, pack);
                    // Without a selection there is nothing to fetch; the
                    // range solver has to run first.
                    self.record_action(Action::Failure {
                        name: name.clone(),
                        scope: PlacementScope::UserWide,
                        dependency: dep.clone(),
                        issuers: vec![pack.name().to_string()],
                    });
                }
                continue;
            };
            let resolved = match &selected.path {
                Some(path) => {
                    // Relative paths are interpreted relative to the
                    // declaring package.
                    let absolute = if path.is_absolute() {
                        path.clone()
                    } else {
                        pack.path().join(path)
                    };
                    store.temporary_package(&absolute, &selected.version)
                }
                None => store.best_package(&name, &VersionSpec::new(selected.version.as_str())),
            };
            let Some(child) = resolved else {
                warn!(
                    "selected version {} of {} is not available, skipping",
                    selected.version, name
                );
                let scope = if selected.path.is_some() {
                    PlacementScope::Local
                } else {
                    PlacementScope::UserWide
                };
                self.record_action(Action::Fetch {
                    name: name.clone(),
                    scope,
                    dependency: Dependency {
                        spec: VersionSpec::new(selected.version.as_str()),
                        optional: dep.optional,
                        path: selected.path.clone(),
                    },
                    issuers: vec![pack.name().to_string()],
                    existing: None,
                });
                continue;
            };
            self.by_name.insert(name.clone(), self.dependencies.len());
            self.dependencies.push(Arc::clone(&child));
            self.dependees
                .entry(name)
                .or_default()
                .push(pack.name().to_string());
            self.collect_dependencies(store, &child);
        }
    }

    /// One action per unmaterialized package; a second requirement for
    /// the same package only adds its issuer.
    fn record_action(&mut self, action: Action) {
        if let Some(existing) = self
            .actions
            .iter_mut()
            .find(|a| a.package_name() == action.package_name())
        {
            if let Some(issuer) = action.issuers().first() {
                existing.push_issuer(issuer);
            }
            return;
        }
        self.actions.push(action);
    }

    fn lint(&self) {
        if self.root.name().chars().any(|c| c.is_ascii_uppercase()) {
            warn!(
                "package names should be lowercase, got {}",
                self.root.name()
            );
        }
        for (name, dep) in self.root.dependencies() {
            if dep.spec.is_branch() && dep.path.is_none() {
                warn!(
                    "dependency {} is pinned to branch {}; prefer a numbered release",
                    name, dep.spec
                );
            }
        }
        for pack in std::iter::once(&self.root).chain(self.dependencies.iter()) {
            for config in pack.configurations() {
                for flag in &config.settings.compiler_flags {
                    if SPECIAL_COMPILER_FLAGS.contains(&flag.as_str()) {
                        warn!(
                            "package {} uses compiler flag {} directly; prefer the matching build option",
                            pack, flag
                        );
                    }
                }
            }
        }
    }

    /// Depth-first traversal over the dependency graph.
    ///
    /// With `children_first` every package is visited after all of its
    /// dependencies, otherwise before them. When `configs` is given,
    /// the edge to a dependency is followed only if the parent's chosen
    /// configuration activates it. The visitor stops the whole
    /// traversal by returning [ControlFlow::Break].
    pub fn traverse<F>(
        &self,
        children_first: bool,
        root: Option<&Arc<Package>>,
        configs: Option<&ConfigMap>,
        visitor: &mut F,
    ) -> ControlFlow<()>
    where
        F: FnMut(&Arc<Package>) -> ControlFlow<()>,
    {
        let start = root.unwrap_or(&self.root);
        // A plain pre-order walk stops being a valid parents-first
        // order once a dependency is shared, so both directions replay
        // a post-order collection. Reversing the sibling order on the
        // way down keeps dependencies in declaration order after the
        // final reversal.
        let mut visited = Set::default();
        let mut order = Vec::new();
        self.post_order(start, configs, !children_first, &mut visited, &mut order);
        if !children_first {
            order.reverse();
        }
        for pack in &order {
            visitor(pack)?;
        }
        ControlFlow::Continue(())
    }

    fn post_order(
        &self,
        pack: &Arc<Package>,
        configs: Option<&ConfigMap>,
        reverse_siblings: bool,
        visited: &mut Set<String>,
        order: &mut Vec<Arc<Package>>,
    ) {
        if !visited.insert(pack.name().to_string()) {
            return;
        }
        let chosen = configs.and_then(|c| c.get(pack.name()).map(String::as_str));
        let mut children: Vec<&str> = pack.dependencies_for(chosen).map(|(name, _)| name).collect();
        if reverse_siblings {
            children.reverse();
        }
        for name in children {
            if let Some(child) = self.dependency(name) {
                let child = Arc::clone(child);
                self.post_order(&child, configs, reverse_siblings, visited, order);
            }
        }
        order.push(Arc::clone(pack));
    }

    /// The packages of the graph in topological order, root included.
    pub fn topological_packages(&self, children_first: bool) -> Vec<Arc<Package>> {
        let mut list = Vec::new();
        let _ = self.traverse(children_first, None, None, &mut |pack| {
            list.push(Arc::clone(pack));
            ControlFlow::Continue(())
        });
        list
    }

    /// True when some other dependency of `parent` already depends,
    /// transitively, on `dependency`.
    pub fn is_redundant_dependency(&self, parent: &Arc<Package>, dependency: &str) -> bool {
        parent
            .dependencies()
            .filter(|(name, _)| *name != dependency)
            .any(|(name, _)| {
                let Some(start) = self.dependency(name) else {
                    return false;
                };
                let start = Arc::clone(start);
                let mut found = false;
                let _ = self.traverse(false, Some(&start), None, &mut |pack| {
                    if pack.name() == dependency {
                        found = true;
                        return ControlFlow::Break(());
                    }
                    ControlFlow::Continue(())
                });
                found
            })
    }

    /// Resolves one build configuration per reachable package.
    ///
    /// `config` forces the root configuration; `allow_non_library`
    /// permits the root to pick configurations producing executables.
    /// The result is a pure function of the inputs and the current
    /// graph; nothing is cached between calls.
    pub fn package_configs(
        &self,
        platform: &Platform,
        config: Option<&str>,
        allow_non_library: bool,
    ) -> Result<ConfigMap, ProjectError> {
        resolve_configs(self, platform, config, allow_non_library)
    }

    /// Aggregates the whole graph's build settings into `dst`.
    ///
    /// Packages are visited parents-first over the edges active under
    /// the resolved configuration map. With `shallow`, dependency
    /// source lists are dropped and only their headers and flags are
    /// kept. `root_package` overrides the traversal root.
    pub fn add_build_settings(
        &self,
        dst: &mut BuildSettings,
        platform: &Platform,
        config: Option<&str>,
        root_package: Option<&Arc<Package>>,
        shallow: bool,
    ) -> Result<(), ProjectError> {
        let configs = self.package_configs(platform, config, true)?;
        let start = root_package
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.root));
        let mut failure = None;
        let _ = self.traverse(false, Some(&start), Some(&configs), &mut |pack| {
            match self.merge_package_settings(dst, pack, &start, &configs, platform, shallow) {
                Ok(()) => ControlFlow::Continue(()),
                Err(err) => {
                    failure = Some(err);
                    ControlFlow::Break(())
                }
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }
        // Version identifiers are merged from every package, even those
        // without a target, so compilation always sees the full set.
        let _ = self.traverse(false, Some(&start), Some(&configs), &mut |pack| {
            if let Some(settings) = configs
                .get(pack.name())
                .and_then(|c| pack.config_settings(platform, c))
            {
                dst.add_version_ids(settings.version_ids.iter().cloned());
                for id in &settings.debug_version_ids {
                    if !dst.debug_version_ids.contains(id) {
                        dst.debug_version_ids.push(id.clone());
                    }
                }
            }
            ControlFlow::Continue(())
        });
        Ok(())
    }

    fn merge_package_settings(
        &self,
        dst: &mut BuildSettings,
        pack: &Arc<Package>,
        start: &Arc<Package>,
        configs: &ConfigMap,
        platform: &Platform,
        shallow: bool,
    ) -> Result<(), ProjectError> {
        dst.add_version_ids([format!("Have_{}", sanitized_ident(pack.name()))]);
        let Some(chosen) = configs.get(pack.name()) else {
            return Ok(());
        };
        let Some(settings) = pack.config_settings(platform, chosen) else {
            return Ok(());
        };
        let is_root = Arc::ptr_eq(pack, start);
        let target_type = settings.target_type.unwrap_or_default();
        if is_root
            && !shallow
            && matches!(target_type, TargetType::None | TargetType::SourceLibrary)
        {
            return Err(ProjectError::EmptyTarget {
                name: pack.name().to_string(),
            });
        }
        if target_type == TargetType::None {
            return Ok(());
        }
        let mut expanded = settings.expanded(pack.path())?;
        if shallow && !is_root {
            expanded.source_files.clear();
        }
        if expanded.import_paths.is_empty() {
            warn!("package {} declares no import paths", pack);
        }
        if is_root
            && target_type == TargetType::Executable
            && expanded.main_source_file.is_none()
        {
            warn!(
                "executable configuration {} of {} has no main source file",
                chosen, pack
            );
        }
        dst.merge(&expanded);
        if is_root {
            dst.target_type = Some(target_type);
            dst.target_path = expanded.target_path.clone();
            dst.target_name = expanded
                .target_name
                .clone()
                .or_else(|| Some(pack.name().to_string()));
            dst.working_directory = expanded.working_directory.clone();
            dst.main_source_file = expanded.main_source_file.clone();
        }
        Ok(())
    }

    /// The project description document for front-end tooling:
    /// `rootPackage`, its deprecated alias `mainPackage`, and one entry
    /// per package, root first, in traversal order.
    pub fn describe(
        &self,
        platform: &Platform,
        config: Option<&str>,
    ) -> Result<serde_json::Value, ProjectError> {
        let configs = self.package_configs(platform, config, true)?;
        let mut packages = Vec::new();
        let _ = self.traverse(false, None, Some(&configs), &mut |pack| {
            let mut desc = pack.describe();
            if let Some(chosen) = configs.get(pack.name()) {
                desc["configuration"] = json!(chosen);
            }
            packages.push(desc);
            ControlFlow::Continue(())
        });
        Ok(json!({
            "rootPackage": self.root.name(),
            "mainPackage": self.root.name(),
            "packages": packages,
        }))
    }

    /// Persists the selections document next to the root package and
    /// refreshes the best-effort project state cache.
    pub fn save(&self) -> Result<(), ProjectError> {
        self.selections
            .save(&self.root.path().join(SELECTIONS_FILE))?;
        self.write_scratch_state();
        Ok(())
    }

    fn scratch_path(&self) -> PathBuf {
        self.root.path().join(SCRATCH_DIR).join(SCRATCH_FILE)
    }

    fn check_scratch_state(&self) {
        let path = self.scratch_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => {
                debug!("no cached project state at {}", path.display());
                return;
            }
        };
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(state) => {
                let recorded = state.get("rootVersion").and_then(|v| v.as_str());
                if recorded != Some(self.root.version().as_str()) {
                    debug!(
                        "cached project state was written for {} {}",
                        self.root.name(),
                        recorded.unwrap_or("<unknown>")
                    );
                }
            }
            Err(err) => warn!(
                "ignoring malformed project state at {}: {}",
                path.display(),
                err
            ),
        }
    }

    fn write_scratch_state(&self) {
        let path = self.scratch_path();
        let state = json!({
            "fileVersion": 1,
            "rootVersion": self.root.version().as_str(),
            "packages": self
                .dependencies
                .iter()
                .map(|p| {
                    (
                        p.name().to_string(),
                        serde_json::Value::from(p.version().as_str()),
                    )
                })
                .collect::<serde_json::Map<String, serde_json::Value>>(),
        });
        let result = match path.parent() {
            Some(parent) => fs::create_dir_all(parent)
                .and_then(|()| fs::write(&path, state.to_string())),
            None => Ok(()),
        };
        if let Err(err) = result {
            warn!("could not write project state to {}: {}", path.display(), err);
        }
    }
}

/// Replaces every character outside `[A-Za-z0-9_]` so the name can be
/// used as a version identifier.
fn sanitized_ident(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
