// SPDX-License-Identifier: MPL-2.0

//! Build platform descriptors and platform specifications.

use std::fmt::{self, Display};

/// The target platform of a build: operating system, processor
/// architecture and compiler family.
///
/// Configurations carry *platform specifications*, dash-separated token
/// lists such as `"linux-x86_64"` or `"windows"`. A specification matches
/// a platform when every token equals one of the three descriptor fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Operating system identifier, e.g. `linux`, `windows`, `macos`.
    pub os: String,
    /// Processor architecture, e.g. `x86_64`, `aarch64`.
    pub architecture: String,
    /// Compiler family identifier.
    pub compiler: String,
}

impl Platform {
    /// Creates a platform descriptor from its three components.
    pub fn new(
        os: impl Into<String>,
        architecture: impl Into<String>,
        compiler: impl Into<String>,
    ) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
            compiler: compiler.into(),
        }
    }

    /// True when every dash-separated token of `spec` names one of this
    /// platform's components. The empty specification matches everything.
    pub fn matches_spec(&self, spec: &str) -> bool {
        spec.split('-')
            .filter(|token| !token.is_empty())
            .all(|token| token == self.os || token == self.architecture || token == self.compiler)
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.os, self.architecture, self.compiler)
    }
}
