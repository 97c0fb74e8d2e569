// SPDX-License-Identifier: MPL-2.0

//! Package records: identity, declared dependencies and configurations.
//!
//! A [Configuration] is a plain capability record looked up with pure
//! functions. The metadata document parsing that produces these records
//! lives outside this crate; here they are already evaluated for
//! everything except the platform predicate.

use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::json;

use crate::platform::Platform;
use crate::settings::{BuildSettings, TargetType, ToolchainRequirements};
use crate::type_aliases::Map;
use crate::version::{Version, VersionSpec};

/// A dependency declaration: version requirement plus the optional
/// flag and optional local path carried by the metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Acceptable versions of the dependency.
    pub spec: VersionSpec,
    /// The build may proceed without this dependency.
    pub optional: bool,
    /// Use a local copy at this path, relative to the declaring package.
    pub path: Option<PathBuf>,
}

impl Dependency {
    /// A plain, required registry dependency.
    pub fn new(spec: impl Into<VersionSpec>) -> Self {
        Self {
            spec: spec.into(),
            optional: false,
            path: None,
        }
    }

    /// A dependency satisfied by a local filesystem copy.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            spec: VersionSpec::any(),
            optional: false,
            path: Some(path.into()),
        }
    }
}

/// One named build variant of a package.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    /// Configuration name, unique within the package.
    pub name: String,
    /// Platform specifications this configuration is admissible on.
    /// Empty means every platform.
    pub platforms: Vec<String>,
    /// Dependencies active under this configuration.
    /// `None` activates every declared dependency.
    pub active_dependencies: Option<Vec<String>>,
    /// Pinned configurations for dependencies: dependency name to the
    /// configuration it must be built with.
    pub sub_configurations: Map<String, String>,
    /// Build settings contributed when this configuration is chosen.
    pub settings: BuildSettings,
}

impl Configuration {
    /// A configuration admissible everywhere, with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The artifact kind this configuration produces.
    pub fn target_type(&self) -> TargetType {
        self.settings.target_type.unwrap_or_default()
    }

    /// True when this configuration may be built on `platform`.
    pub fn matches_platform(&self, platform: &Platform) -> bool {
        self.platforms.is_empty()
            || self.platforms.iter().any(|spec| platform.matches_spec(spec))
    }

    /// True when dependency `name` is active under this configuration.
    pub fn activates_dependency(&self, name: &str) -> bool {
        match &self.active_dependencies {
            None => true,
            Some(active) => active.iter().any(|d| d == name),
        }
    }

    /// The configuration pinned for dependency `name`, if any.
    pub fn sub_configuration(&self, name: &str) -> Option<&str> {
        self.sub_configurations.get(name).map(String::as_str)
    }
}

/// A versioned unit of source with its declared dependencies and
/// configurations. Shared read-only between the project and the
/// package store, so all lookups take `&self`.
#[derive(Debug, Clone)]
pub struct Package {
    name: String,
    version: Version,
    path: PathBuf,
    configurations: Vec<Configuration>,
    dependencies: IndexMap<String, Dependency>,
    toolchain_requirements: ToolchainRequirements,
}

impl Package {
    /// Creates a package with no dependencies and no configurations.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<Version>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            path: path.into(),
            configurations: Vec::new(),
            dependencies: IndexMap::new(),
            toolchain_requirements: ToolchainRequirements::default(),
        }
    }

    /// Package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Filesystem location of the package sources.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declares a dependency. Declaration order is preserved and feeds
    /// the resolver's tie-breaking.
    pub fn add_dependency(&mut self, name: impl Into<String>, dependency: Dependency) -> &mut Self {
        self.dependencies.insert(name.into(), dependency);
        self
    }

    /// Appends a configuration. Declaration order is preserved and feeds
    /// the resolver's tie-breaking.
    pub fn add_configuration(&mut self, configuration: Configuration) -> &mut Self {
        self.configurations.push(configuration);
        self
    }

    /// Replaces the declared toolchain requirements.
    pub fn set_toolchain_requirements(&mut self, requirements: ToolchainRequirements) {
        self.toolchain_requirements = requirements;
    }

    /// The declared toolchain requirements.
    pub fn toolchain_requirements(&self) -> &ToolchainRequirements {
        &self.toolchain_requirements
    }

    /// Declared dependencies in declaration order.
    pub fn dependencies(&self) -> impl Iterator<Item = (&str, &Dependency)> {
        self.dependencies.iter().map(|(n, d)| (n.as_str(), d))
    }

    /// The declaration for dependency `name`, if present.
    pub fn dependency(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.get(name)
    }

    /// Declared dependencies active under `config`. With `None`, or an
    /// unknown configuration name, every dependency is considered active.
    pub fn dependencies_for<'a>(
        &'a self,
        config: Option<&str>,
    ) -> impl Iterator<Item = (&'a str, &'a Dependency)> {
        let configuration = config.and_then(|c| self.configuration(c));
        self.dependencies().filter(move |(name, _)| {
            configuration.map_or(true, |c| c.activates_dependency(name))
        })
    }

    /// All declared configurations in declaration order.
    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    /// The configuration named `name`, if declared.
    pub fn configuration(&self, name: &str) -> Option<&Configuration> {
        self.configurations.iter().find(|c| c.name == name)
    }

    /// Names of the configurations admissible on `platform`, in
    /// declaration order. With `allow_non_library` unset, configurations
    /// producing executables are excluded.
    pub fn platform_configurations<'a>(
        &'a self,
        platform: &'a Platform,
        allow_non_library: bool,
    ) -> impl Iterator<Item = &'a str> {
        self.configurations
            .iter()
            .filter(move |c| c.matches_platform(platform))
            .filter(move |c| allow_non_library || c.target_type().is_library())
            .map(|c| c.name.as_str())
    }

    /// The first configuration admissible on `platform`, if any.
    pub fn default_configuration<'a>(&'a self, platform: &'a Platform) -> Option<&'a str> {
        self.platform_configurations(platform, true).next()
    }

    /// The metadata lens: build settings of `config` on `platform`.
    /// `None` when the configuration is unknown or not admissible.
    pub fn config_settings(&self, platform: &Platform, config: &str) -> Option<&BuildSettings> {
        self.configuration(config)
            .filter(|c| c.matches_platform(platform))
            .map(|c| &c.settings)
    }

    /// The configuration pinned by `config` for dependency `name`.
    pub fn sub_configuration(&self, config: &str, name: &str) -> Option<&str> {
        self.configuration(config)?.sub_configuration(name)
    }

    /// Description document for this package, as consumed by front-end
    /// tooling.
    pub fn describe(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "version": self.version.as_str(),
            "path": self.path.to_string_lossy(),
            "configurations": self
                .configurations
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>(),
            "dependencies": self
                .dependencies
                .iter()
                .map(|(n, d)| (n.clone(), serde_json::Value::String(d.spec.as_str().to_string())))
                .collect::<serde_json::Map<String, serde_json::Value>>(),
        })
    }
}

impl Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform() -> Platform {
        Platform::new("linux", "x86_64", "gcc")
    }

    #[test]
    fn platform_filter_respects_declaration_order() {
        let mut pack = Package::new("demo", "1.0.0", "/demo");
        pack.add_configuration(Configuration {
            name: "winonly".into(),
            platforms: vec!["windows".into()],
            ..Default::default()
        });
        pack.add_configuration(Configuration::new("library"));
        pack.add_configuration(Configuration::new("fallback"));

        let plat = platform();
        let names: Vec<_> = pack.platform_configurations(&plat, true).collect();
        assert_eq!(names, ["library", "fallback"]);
        assert_eq!(pack.default_configuration(&plat), Some("library"));
    }

    #[test]
    fn non_library_configurations_can_be_excluded() {
        let mut pack = Package::new("demo", "1.0.0", "/demo");
        let mut app = Configuration::new("application");
        app.settings.target_type = Some(TargetType::Executable);
        pack.add_configuration(app);
        pack.add_configuration(Configuration::new("library"));

        let plat = platform();
        let all: Vec<_> = pack.platform_configurations(&plat, true).collect();
        assert_eq!(all, ["application", "library"]);
        let libs: Vec<_> = pack.platform_configurations(&plat, false).collect();
        assert_eq!(libs, ["library"]);
    }

    #[test]
    fn config_filtered_dependencies() {
        let mut pack = Package::new("demo", "1.0.0", "/demo");
        pack.add_dependency("a", Dependency::new(">=1.0.0"));
        pack.add_dependency("b", Dependency::new(">=1.0.0"));
        let mut slim = Configuration::new("slim");
        slim.active_dependencies = Some(vec!["b".into()]);
        pack.add_configuration(slim);

        let all: Vec<_> = pack.dependencies_for(None).map(|(n, _)| n).collect();
        assert_eq!(all, ["a", "b"]);
        let slim: Vec<_> = pack.dependencies_for(Some("slim")).map(|(n, _)| n).collect();
        assert_eq!(slim, ["b"]);
    }
}
