// SPDX-License-Identifier: MPL-2.0

//! The configuration resolver core.
//!
//! Resolution works on a graph of `(package, configuration)` vertices.
//! Construction enumerates, children before parents, every configuration
//! admissible under the platform and wires an edge wherever a parent
//! configuration permits a child configuration; a subconfiguration pin
//! narrows the permitted set to a single name. Elimination then runs a
//! two-phase fixed point:
//!
//! 1. *Prune*: drop every vertex some parent package can no longer
//!    reach, until a full pass removes nothing.
//! 2. *Collapse*: if a package still has several surviving vertices,
//!    keep the earliest-created one (packages in root-first topological
//!    order, vertices in creation order) and prune again.
//!
//! Vertices live in a plain vector and are addressed by index for the
//! rest of their life; removal flips a bit in a parallel liveness
//! vector instead of renumbering, so indices stay stable. Creation
//! order encodes the tie-break: depth-first package order first,
//! declared configuration order second. Keeping the lowest surviving
//! index therefore prefers configurations declared earlier, and makes
//! the whole procedure deterministic.

use std::sync::Arc;

use log::debug;

use crate::error::ProjectError;
use crate::package::Package;
use crate::platform::Platform;
use crate::project::Project;
use crate::type_aliases::{ConfigMap, Map, Set};

/// A `(package, configuration)` candidate.
#[derive(Debug, Clone)]
struct ConfigVertex {
    package: String,
    config: String,
}

/// "Parent configuration `from` permits child configuration `to`."
/// Both ends are indices into the vertex vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConfigEdge {
    from: usize,
    to: usize,
}

/// Picks one configuration per package reachable from the project root.
/// Fails with [ProjectError::Unresolvable] naming the first package, in
/// topological order, left without a surviving configuration.
pub(crate) fn resolve_configs(
    project: &Project,
    platform: &Platform,
    forced_root: Option<&str>,
    allow_non_library: bool,
) -> Result<ConfigMap, ProjectError> {
    let mut graph = ConfigGraph {
        project,
        platform,
        forced_root,
        allow_non_library,
        vertices: Vec::new(),
        alive: Vec::new(),
        edges: Vec::new(),
        by_package: Map::default(),
        parents: Map::default(),
        visited: Set::default(),
    };
    graph.compute_parents();
    if let Some(forced) = forced_root {
        graph.ensure_vertex(project.root().name(), forced);
    }
    let root = Arc::clone(project.root());
    graph.determine(&root);
    graph.eliminate();
    graph.extract()
}

struct ConfigGraph<'a> {
    project: &'a Project,
    platform: &'a Platform,
    forced_root: Option<&'a str>,
    allow_non_library: bool,
    vertices: Vec<ConfigVertex>,
    /// Liveness bit per vertex, indexed like `vertices`.
    alive: Vec<bool>,
    edges: Vec<ConfigEdge>,
    /// Vertex indices per package, in creation order.
    by_package: Map<String, Vec<usize>>,
    /// Package name to the packages that declare it, restricted to
    /// dependencies materialized in the graph. No entry for the root.
    parents: Map<String, Vec<String>>,
    visited: Set<String>,
}

impl ConfigGraph<'_> {
    fn compute_parents(&mut self) {
        let mut all = vec![Arc::clone(self.project.root())];
        all.extend(self.project.dependencies().iter().cloned());
        for parent in &all {
            for (dep_name, _) in parent.dependencies() {
                if self.project.dependency(dep_name).is_none() {
                    continue;
                }
                let entry = self.parents.entry(dep_name.to_string()).or_default();
                if !entry.iter().any(|p| p == parent.name()) {
                    entry.push(parent.name().to_string());
                }
            }
        }
    }

    /// Enumerates admissible configurations, children before parents, so
    /// that every candidate child vertex exists before its parents wire
    /// edges to it.
    fn determine(&mut self, pack: &Arc<Package>) {
        if !self.visited.insert(pack.name().to_string()) {
            return;
        }
        let children: Vec<Arc<Package>> = pack
            .dependencies()
            .filter_map(|(name, _)| self.project.dependency(name).cloned())
            .collect();
        for child in &children {
            self.determine(child);
        }

        let is_root = pack.name() == self.project.root().name();
        let configs: Vec<String> = match (is_root, self.forced_root) {
            (true, Some(forced)) => vec![forced.to_string()],
            _ => pack
                .platform_configurations(self.platform, !is_root || self.allow_non_library)
                .map(str::to_string)
                .collect(),
        };

        for config in configs {
            let mut feasible = true;
            let mut permitted: Vec<usize> = Vec::new();
            for (dep_name, _) in pack.dependencies() {
                // Dependencies that never materialized are skipped here;
                // the graph builder already warned about them.
                if self.project.dependency(dep_name).is_none() {
                    continue;
                }
                let existing = self
                    .by_package
                    .get(dep_name)
                    .cloned()
                    .unwrap_or_default();
                let candidates: Vec<usize> = match pack.sub_configuration(&config, dep_name) {
                    Some(pin) => existing
                        .into_iter()
                        .filter(|&id| self.vertices[id].config == pin)
                        .collect(),
                    None => existing,
                };
                if candidates.is_empty() {
                    feasible = false;
                    break;
                }
                permitted.extend(candidates);
            }
            if !feasible {
                debug!(
                    "configuration {}/{} has no feasible dependency assignment",
                    pack.name(),
                    config
                );
                continue;
            }
            let from = self.ensure_vertex(pack.name(), &config);
            for to in permitted {
                let edge = ConfigEdge { from, to };
                if !self.edges.contains(&edge) {
                    self.edges.push(edge);
                }
            }
        }
    }

    fn ensure_vertex(&mut self, package: &str, config: &str) -> usize {
        if let Some(ids) = self.by_package.get(package) {
            for &id in ids {
                if self.vertices[id].config == config {
                    return id;
                }
            }
        }
        let id = self.vertices.len();
        self.vertices.push(ConfigVertex {
            package: package.to_string(),
            config: config.to_string(),
        });
        self.alive.push(true);
        self.by_package
            .entry(package.to_string())
            .or_default()
            .push(id);
        id
    }

    fn eliminate(&mut self) {
        loop {
            self.prune();
            if !self.collapse_one() {
                break;
            }
        }
    }

    /// Removes vertices some parent package can no longer reach, until a
    /// full pass removes nothing.
    fn prune(&mut self) {
        loop {
            let mut removed = false;
            for id in 0..self.vertices.len() {
                if !self.alive[id] {
                    continue;
                }
                if !self.reachable_by_all_parents(id) {
                    let vertex = &self.vertices[id];
                    debug!("pruning {}/{}", vertex.package, vertex.config);
                    self.remove_vertex(id);
                    removed = true;
                }
            }
            if !removed {
                return;
            }
        }
    }

    /// True when every parent package keeps at least one configuration
    /// that permits this vertex. The root has no parents to satisfy.
    fn reachable_by_all_parents(&self, id: usize) -> bool {
        let vertex = &self.vertices[id];
        let Some(parents) = self.parents.get(&vertex.package) else {
            return true;
        };
        parents.iter().all(|parent| {
            self.edges
                .iter()
                .any(|e| e.to == id && self.vertices[e.from].package == *parent)
        })
    }

    fn remove_vertex(&mut self, id: usize) {
        self.alive[id] = false;
        self.edges.retain(|e| e.from != id && e.to != id);
    }

    /// Keeps only the earliest-created vertex of the first package, in
    /// root-first topological order, that still has several. Returns
    /// whether anything was collapsed.
    fn collapse_one(&mut self) -> bool {
        for pack in self.project.topological_packages(false) {
            let Some(ids) = self.by_package.get(pack.name()) else {
                continue;
            };
            let surviving: Vec<usize> = ids.iter().copied().filter(|&id| self.alive[id]).collect();
            if surviving.len() > 1 {
                let kept = &self.vertices[surviving[0]];
                debug!("collapsing {} to {}", pack.name(), kept.config);
                for id in surviving.into_iter().skip(1) {
                    self.remove_vertex(id);
                }
                return true;
            }
        }
        false
    }

    fn extract(&self) -> Result<ConfigMap, ProjectError> {
        let mut configs = ConfigMap::default();
        for (id, vertex) in self.vertices.iter().enumerate() {
            if self.alive[id] {
                configs.insert(vertex.package.clone(), vertex.config.clone());
            }
        }
        // Children first, so the deepest starved package is the one
        // named in the error.
        for pack in self.project.topological_packages(true) {
            if !configs.contains_key(pack.name()) {
                return Err(ProjectError::Unresolvable {
                    name: pack.name().to_string(),
                });
            }
        }
        Ok(configs)
    }
}
