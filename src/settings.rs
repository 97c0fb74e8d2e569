// SPDX-License-Identifier: MPL-2.0

//! Build settings accumulators and the target/requirement/option vocabulary.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ProjectError;
use crate::vars::expand_vars;
use crate::version::VersionSpec;

/// The kind of artifact a configuration produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetType {
    /// No artifact at all; the package only contributes version
    /// identifiers to its dependees.
    None,
    /// A runnable program.
    Executable,
    /// A library in the platform's default linkage.
    Library,
    /// A library distributed as source, compiled into its dependees.
    SourceLibrary,
    /// A statically linked library.
    StaticLibrary,
    /// A dynamically linked library.
    DynamicLibrary,
}

impl Default for TargetType {
    fn default() -> Self {
        TargetType::Library
    }
}

impl TargetType {
    /// True for target types a dependency may expose to its dependees.
    pub fn is_library(self) -> bool {
        !matches!(self, TargetType::Executable)
    }
}

/// Restrictions a package puts on how it must be compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildRequirement {
    /// Do not abort the build on compiler warnings.
    AllowWarnings,
    /// Suppress compiler warnings entirely.
    SilenceWarnings,
    /// Abort the build on deprecation notices.
    DisallowDeprecations,
    /// Suppress deprecation notices.
    SilenceDeprecations,
    /// Do not inline calls into this package.
    DisallowInlining,
    /// Do not optimize this package.
    DisallowOptimization,
    /// Keep runtime bounds checks even in release builds.
    RequireBoundsCheck,
    /// Keep contract checks even in release builds.
    RequireContracts,
    /// Start from an empty flag set instead of the toolchain defaults.
    NoDefaultFlags,
}

/// Abstract build options, preferred over raw compiler flags so that
/// generators can translate them per toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildOption {
    /// Compile with debug semantics.
    DebugMode,
    /// Compile with release semantics.
    ReleaseMode,
    /// Emit debug information.
    DebugInfo,
    /// Enable optimizations.
    Optimize,
    /// Allow inlining across compilation units.
    Inline,
    /// Disable runtime bounds checks.
    NoBoundsCheck,
    /// Instrument for coverage analysis.
    Coverage,
    /// Compile unit tests into the target.
    UnitTests,
    /// Verbose compiler output.
    Verbose,
    /// Treat warnings as errors.
    WarningsAsErrors,
}

/// Raw compiler flags that have an abstract [BuildOption] counterpart.
/// Packages using them directly get a lint warning from the graph builder.
pub(crate) const SPECIAL_COMPILER_FLAGS: &[&str] = &[
    "-g",
    "-O",
    "-O1",
    "-O2",
    "-O3",
    "-w",
    "-Werror",
    "--coverage",
    "-cov",
    "-release",
    "-debug",
    "-unittest",
];

/// Flat build recipe accumulated over the dependency graph.
///
/// The list fields are append-only under [merge](BuildSettings::merge);
/// the single-valued target fields are written once, from the root
/// package, by the settings aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildSettings {
    /// Artifact kind. Only meaningful on the root after aggregation.
    pub target_type: Option<TargetType>,
    /// Directory the artifact is written to.
    pub target_path: Option<String>,
    /// Base name of the artifact.
    pub target_name: Option<String>,
    /// Working directory for generate/build commands.
    pub working_directory: Option<String>,
    /// Entry point source file of an executable.
    pub main_source_file: Option<String>,

    /// Flags passed to the compiler verbatim.
    pub compiler_flags: Vec<String>,
    /// Flags passed to the linker verbatim.
    pub linker_flags: Vec<String>,
    /// External libraries to link.
    pub libraries: Vec<String>,
    /// Source files to compile.
    pub source_files: Vec<String>,
    /// Directories searched for imports.
    pub import_paths: Vec<String>,
    /// Directories searched for string imports.
    pub string_import_paths: Vec<String>,
    /// Version identifiers defined during compilation.
    pub version_ids: Vec<String>,
    /// Version identifiers defined for debug builds.
    pub debug_version_ids: Vec<String>,
    /// Commands run before source generation.
    pub pre_generate_commands: Vec<String>,
    /// Commands run after source generation.
    pub post_generate_commands: Vec<String>,
    /// Commands run before the build.
    pub pre_build_commands: Vec<String>,
    /// Commands run after the build.
    pub post_build_commands: Vec<String>,
    /// Build restrictions demanded by the packages.
    pub requirements: Vec<BuildRequirement>,
    /// Abstract build options requested by the packages.
    pub options: Vec<BuildOption>,
}

fn extend_unique<T: PartialEq + Clone>(dst: &mut Vec<T>, src: &[T]) {
    for item in src {
        if !dst.contains(item) {
            dst.push(item.clone());
        }
    }
}

impl BuildSettings {
    /// An empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends another recipe's list fields into this one.
    ///
    /// Compiler/linker flags and commands keep duplicates (repetition is
    /// meaningful there); everything else is deduplicated. Single-valued
    /// target fields are not touched.
    pub fn merge(&mut self, other: &BuildSettings) {
        self.compiler_flags
            .extend(other.compiler_flags.iter().cloned());
        self.linker_flags.extend(other.linker_flags.iter().cloned());
        extend_unique(&mut self.libraries, &other.libraries);
        extend_unique(&mut self.source_files, &other.source_files);
        extend_unique(&mut self.import_paths, &other.import_paths);
        extend_unique(&mut self.string_import_paths, &other.string_import_paths);
        extend_unique(&mut self.version_ids, &other.version_ids);
        extend_unique(&mut self.debug_version_ids, &other.debug_version_ids);
        self.pre_generate_commands
            .extend(other.pre_generate_commands.iter().cloned());
        self.post_generate_commands
            .extend(other.post_generate_commands.iter().cloned());
        self.pre_build_commands
            .extend(other.pre_build_commands.iter().cloned());
        self.post_build_commands
            .extend(other.post_build_commands.iter().cloned());
        extend_unique(&mut self.requirements, &other.requirements);
        extend_unique(&mut self.options, &other.options);
    }

    /// Adds version identifiers, keeping each at most once.
    pub fn add_version_ids<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            if !self.version_ids.contains(&id) {
                self.version_ids.push(id);
            }
        }
    }

    /// Returns a copy with every string field variable-expanded relative
    /// to the declaring package's path. Path-valued fields additionally
    /// get relative results anchored at that path.
    pub fn expanded(&self, package_path: &Path) -> Result<BuildSettings, ProjectError> {
        let plain = |values: &[String]| -> Result<Vec<String>, ProjectError> {
            values
                .iter()
                .map(|v| expand_vars(v, package_path, false))
                .collect()
        };
        let paths = |values: &[String]| -> Result<Vec<String>, ProjectError> {
            values
                .iter()
                .map(|v| expand_vars(v, package_path, true))
                .collect()
        };
        let single = |value: &Option<String>, is_path: bool| -> Result<Option<String>, ProjectError> {
            value
                .as_deref()
                .map(|v| expand_vars(v, package_path, is_path))
                .transpose()
        };
        Ok(BuildSettings {
            target_type: self.target_type,
            target_path: single(&self.target_path, true)?,
            target_name: single(&self.target_name, false)?,
            working_directory: single(&self.working_directory, true)?,
            main_source_file: single(&self.main_source_file, true)?,
            compiler_flags: plain(&self.compiler_flags)?,
            linker_flags: plain(&self.linker_flags)?,
            libraries: plain(&self.libraries)?,
            source_files: paths(&self.source_files)?,
            import_paths: paths(&self.import_paths)?,
            string_import_paths: paths(&self.string_import_paths)?,
            version_ids: self.version_ids.clone(),
            debug_version_ids: self.debug_version_ids.clone(),
            pre_generate_commands: plain(&self.pre_generate_commands)?,
            post_generate_commands: plain(&self.post_generate_commands)?,
            pre_build_commands: plain(&self.pre_build_commands)?,
            post_build_commands: plain(&self.post_build_commands)?,
            requirements: self.requirements.clone(),
            options: self.options.clone(),
        })
    }
}

/// Requirement placed on a single tool of the toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequirement {
    /// The tool must not be used for this package.
    Forbidden,
    /// Acceptable version ranges, any of which satisfies the requirement.
    Ranges(Vec<VersionSpec>),
}

impl Serialize for ToolRequirement {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            ToolRequirement::Forbidden => s.serialize_str("no"),
            ToolRequirement::Ranges(specs) => {
                let joined = specs
                    .iter()
                    .map(VersionSpec::as_str)
                    .collect::<Vec<_>>()
                    .join("|");
                s.serialize_str(&joined)
            }
        }
    }
}

impl<'de> Deserialize<'de> for ToolRequirement {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        if raw == "no" {
            return Ok(ToolRequirement::Forbidden);
        }
        Ok(ToolRequirement::Ranges(
            raw.split('|').map(VersionSpec::new).collect(),
        ))
    }
}

/// Toolchain requirements declared by a package: tool name to requirement.
///
/// Keys name the package manager itself, the language frontend or a
/// compiler family. The core carries these for upstream tooling and
/// round-trips them unchanged; only compilers may be marked forbidden.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolchainRequirements {
    tools: BTreeMap<String, ToolRequirement>,
}

impl ToolchainRequirements {
    /// Records a requirement for `tool`.
    pub fn insert(&mut self, tool: impl Into<String>, requirement: ToolRequirement) {
        self.tools.insert(tool.into(), requirement);
    }

    /// The requirement for `tool`, if any was declared.
    pub fn requirement(&self, tool: &str) -> Option<&ToolRequirement> {
        self.tools.get(tool)
    }

    /// True when `tool` is marked as unusable for this package.
    pub fn is_tool_forbidden(&self, tool: &str) -> bool {
        matches!(self.tools.get(tool), Some(ToolRequirement::Forbidden))
    }

    /// True when no requirement was declared.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
