// SPDX-License-Identifier: MPL-2.0

//! Handling project model errors.

use thiserror::Error;

/// Errors that may occur while building the project model,
/// resolving configurations or aggregating build settings.
#[derive(Error, Debug)]
pub enum ProjectError {
    /// A dependency referenced by name has no entry in the selected
    /// versions store.
    #[error("no version selected for dependency {name}")]
    NotSelected {
        /// Name of the dependency without a selection.
        name: String,
    },

    /// A required dependency lookup was made for a package
    /// that is not part of the project.
    #[error("unknown dependency {name}")]
    UnknownDependency {
        /// Name of the missing package.
        name: String,
    },

    /// After elimination, some reachable package was left
    /// without a surviving configuration.
    #[error("could not resolve a build configuration for package {name}")]
    Unresolvable {
        /// Name of the package without a configuration.
        name: String,
    },

    /// The root package does not produce a buildable target.
    #[error("root package {name} has no buildable target")]
    EmptyTarget {
        /// Name of the root package.
        name: String,
    },

    /// A `$NAME` placeholder referenced a variable with no binding.
    #[error("unknown variable ${name}")]
    UnknownVariable {
        /// Name of the unbound variable.
        name: String,
    },

    /// The on-disk selections document was written by an
    /// incompatible tool version.
    #[error("selections file version is {found}, expected {expected}")]
    FileVersionMismatch {
        /// Version found in the document.
        found: i64,
        /// Version this implementation understands.
        expected: u32,
    },

    /// The on-disk selections document does not match the schema.
    #[error("malformed selections document")]
    Malformed(#[source] serde_json::Error),

    /// An underlying filesystem operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
