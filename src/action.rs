// SPDX-License-Identifier: MPL-2.0

//! Actions handed to the external fetch layer.
//!
//! The project model only emits these (see
//! [Project::pending_actions](crate::Project::pending_actions));
//! carrying them out (downloading, deleting, reporting) is the package
//! manager front-end's business.

use std::fmt::{self, Display};

use crate::package::Dependency;
use crate::version::Version;

/// Where a fetched package is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlacementScope {
    /// Next to the current project.
    Local,
    /// The per-user package cache.
    UserWide,
    /// The system-wide package cache.
    SystemWide,
}

impl Display for PlacementScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementScope::Local => f.write_str("local"),
            PlacementScope::UserWide => f.write_str("user"),
            PlacementScope::SystemWide => f.write_str("system"),
        }
    }
}

/// A single operation the fetch layer should carry out.
#[derive(Debug, Clone)]
pub enum Action {
    /// Download and install a package.
    Fetch {
        /// Package to fetch.
        name: String,
        /// Where to place it.
        scope: PlacementScope,
        /// The dependency declaration that requires it.
        dependency: Dependency,
        /// Names of the packages that caused the requirement.
        issuers: Vec<String>,
        /// An already installed version, when upgrading.
        existing: Option<Version>,
    },
    /// Remove an installed package.
    Remove {
        /// Package to remove.
        name: String,
        /// Where it is installed.
        scope: PlacementScope,
        /// The installed version.
        existing: Version,
    },
    /// Two dependees demand incompatible versions.
    Conflict {
        /// Package with conflicting requirements.
        name: String,
        /// Where it would be placed.
        scope: PlacementScope,
        /// One of the conflicting declarations.
        dependency: Dependency,
        /// Names of the packages that caused the requirement.
        issuers: Vec<String>,
    },
    /// A requirement that cannot be satisfied at all.
    Failure {
        /// Package the failure concerns.
        name: String,
        /// Where it would be placed.
        scope: PlacementScope,
        /// The unsatisfiable declaration.
        dependency: Dependency,
        /// Names of the packages that caused the requirement.
        issuers: Vec<String>,
    },
}

impl Action {
    /// Name of the package the action concerns.
    pub fn package_name(&self) -> &str {
        match self {
            Action::Fetch { name, .. }
            | Action::Remove { name, .. }
            | Action::Conflict { name, .. }
            | Action::Failure { name, .. } => name,
        }
    }

    /// Placement scope of the action.
    pub fn scope(&self) -> PlacementScope {
        match self {
            Action::Fetch { scope, .. }
            | Action::Remove { scope, .. }
            | Action::Conflict { scope, .. }
            | Action::Failure { scope, .. } => *scope,
        }
    }

    /// Names of the packages whose declarations caused this action.
    /// Empty for removals, which have no requiring side.
    pub fn issuers(&self) -> &[String] {
        match self {
            Action::Fetch { issuers, .. }
            | Action::Conflict { issuers, .. }
            | Action::Failure { issuers, .. } => issuers,
            Action::Remove { .. } => &[],
        }
    }

    /// Records another package as a cause of this action. Removals and
    /// already-known issuers are left unchanged.
    pub fn push_issuer(&mut self, issuer: &str) {
        let issuers = match self {
            Action::Fetch { issuers, .. }
            | Action::Conflict { issuers, .. }
            | Action::Failure { issuers, .. } => issuers,
            Action::Remove { .. } => return,
        };
        if !issuers.iter().any(|i| i == issuer) {
            issuers.push(issuer.to_string());
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Fetch {
                name,
                scope,
                dependency,
                ..
            } => write!(f, "fetch {} {} ({})", name, dependency.spec, scope),
            Action::Remove { name, existing, .. } => write!(f, "remove {} {}", name, existing),
            Action::Conflict {
                name, dependency, ..
            } => write!(f, "conflict on {} {}", name, dependency.spec),
            Action::Failure {
                name, dependency, ..
            } => write!(f, "failure on {} {}", name, dependency.spec),
        }
    }
}
