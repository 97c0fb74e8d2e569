// SPDX-License-Identifier: MPL-2.0

//! The selections store: dependency name to pinned version, persisted
//! as a versioned JSON document.
//!
//! The document is the contract between the version-range solver (which
//! writes selections) and the project model (which reads them back):
//!
//! ```json
//! {
//!     "fileVersion": 1,
//!     "versions": {
//!         "somedep": "1.2.0",
//!         "localdep": { "version": "0.9.0", "path": "../localdep" }
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ProjectError;
use crate::version::Version;

/// Document revision understood by this implementation. Any other value
/// on disk is a hard load failure.
pub const FILE_VERSION: u32 = 1;

/// A single selection: the pinned version, plus the local path when the
/// dependency is satisfied by a filesystem copy instead of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected {
    /// The pinned version.
    pub version: Version,
    /// Local copy to use, relative to the declaring package.
    pub path: Option<PathBuf>,
}

impl Selected {
    /// A plain version selection.
    pub fn version(version: impl Into<Version>) -> Self {
        Self {
            version: version.into(),
            path: None,
        }
    }

    /// A selection satisfied by a local filesystem copy.
    pub fn path(version: impl Into<Version>, path: impl Into<PathBuf>) -> Self {
        Self {
            version: version.into(),
            path: Some(path.into()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Document {
    #[serde(rename = "fileVersion")]
    file_version: i64,
    versions: BTreeMap<String, Entry>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Entry {
    Simple(Version),
    Local { version: Version, path: PathBuf },
}

impl From<Selected> for Entry {
    fn from(selected: Selected) -> Self {
        match selected.path {
            None => Entry::Simple(selected.version),
            Some(path) => Entry::Local {
                version: selected.version,
                path,
            },
        }
    }
}

impl From<Entry> for Selected {
    fn from(entry: Entry) -> Self {
        match entry {
            Entry::Simple(version) => Selected {
                version,
                path: None,
            },
            Entry::Local { version, path } => Selected {
                version,
                path: Some(path),
            },
        }
    }
}

/// In-memory mapping of dependency names to selected versions, with
/// load/save round-tripping through the on-disk document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedVersions {
    selections: BTreeMap<String, Selected>,
}

impl SelectedVersions {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the document at `path`, replacing the current contents.
    ///
    /// Fails with [ProjectError::FileVersionMismatch] when the stored
    /// `fileVersion` is not [FILE_VERSION] and with
    /// [ProjectError::Malformed] on schema errors. After any failure the
    /// store is empty.
    pub fn load(&mut self, path: &Path) -> Result<(), ProjectError> {
        self.selections.clear();
        let text = fs::read_to_string(path)?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(ProjectError::Malformed)?;
        let found = value
            .get("fileVersion")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| {
                ProjectError::Malformed(serde::de::Error::custom("missing integer fileVersion"))
            })?;
        if found != i64::from(FILE_VERSION) {
            return Err(ProjectError::FileVersionMismatch {
                found,
                expected: FILE_VERSION,
            });
        }
        let document: Document =
            serde_json::from_value(value).map_err(ProjectError::Malformed)?;
        self.selections = document
            .versions
            .into_iter()
            .map(|(name, entry)| (name, entry.into()))
            .collect();
        debug!("loaded {} selections from {}", self.selections.len(), path.display());
        Ok(())
    }

    /// Writes the document to `path` through a temporary file so that a
    /// crash mid-write never leaves a truncated document behind.
    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let document = Document {
            file_version: i64::from(FILE_VERSION),
            versions: self
                .selections
                .iter()
                .map(|(name, selected)| (name.clone(), selected.clone().into()))
                .collect(),
        };
        let mut text =
            serde_json::to_string_pretty(&document).map_err(ProjectError::Malformed)?;
        text.push('\n');
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text)?;
        if let Err(err) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }

    /// Pins `name` to `version`, replacing any previous selection.
    pub fn select(&mut self, name: impl Into<String>, version: impl Into<Version>) {
        self.selections
            .insert(name.into(), Selected::version(version));
    }

    /// Pins `name` to a local copy at `path` recorded as `version`.
    pub fn select_path(
        &mut self,
        name: impl Into<String>,
        version: impl Into<Version>,
        path: impl Into<PathBuf>,
    ) {
        self.selections
            .insert(name.into(), Selected::path(version, path));
    }

    /// Removes the selection for `name`, if any.
    pub fn deselect(&mut self, name: &str) {
        self.selections.remove(name);
    }

    /// True when a selection exists for `name`.
    pub fn has_selected(&self, name: &str) -> bool {
        self.selections.contains_key(name)
    }

    /// The full selection for `name`.
    pub fn selected(&self, name: &str) -> Option<&Selected> {
        self.selections.get(name)
    }

    /// The selected version of `name`, failing with
    /// [ProjectError::NotSelected] when absent.
    pub fn selected_version(&self, name: &str) -> Result<&Version, ProjectError> {
        self.selections
            .get(name)
            .map(|s| &s.version)
            .ok_or_else(|| ProjectError::NotSelected {
                name: name.to_string(),
            })
    }

    /// Drops all selections.
    pub fn clear(&mut self) {
        self.selections.clear();
    }

    /// True when no selection is recorded.
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Number of recorded selections.
    pub fn len(&self) -> usize {
        self.selections.len()
    }

    /// Selected names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.selections.keys().map(String::as_str)
    }

    /// All selections in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Selected)> {
        self.selections.iter().map(|(n, s)| (n.as_str(), s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("selections.json");

        let mut store = SelectedVersions::new();
        store.select("alpha", "1.0.0");
        store.select("beta", "~main");
        store.select_path("gamma", "0.2.0", "../gamma");
        store.save(&file).unwrap();

        let mut reloaded = SelectedVersions::new();
        reloaded.load(&file).unwrap();
        assert_eq!(reloaded, store);
    }

    #[test]
    fn file_version_first_and_pretty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("selections.json");
        let mut store = SelectedVersions::new();
        store.select("alpha", "1.0.0");
        store.save(&file).unwrap();

        let text = fs::read_to_string(&file).unwrap();
        let version_at = text.find("fileVersion").unwrap();
        let names_at = text.find("versions").unwrap();
        assert!(version_at < names_at);
        assert!(text.contains('\n'));
    }

    #[test]
    fn version_mismatch_is_fatal_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("selections.json");
        fs::write(&file, r#"{"fileVersion": 99, "versions": {}}"#).unwrap();

        let mut store = SelectedVersions::new();
        store.select("stale", "1.0.0");
        let err = store.load(&file).unwrap_err();
        assert!(matches!(
            err,
            ProjectError::FileVersionMismatch { found: 99, expected: FILE_VERSION }
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn malformed_document_clears() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("selections.json");
        fs::write(&file, r#"{"fileVersion": 1, "versions": 42}"#).unwrap();

        let mut store = SelectedVersions::new();
        store.select("stale", "1.0.0");
        assert!(matches!(
            store.load(&file).unwrap_err(),
            ProjectError::Malformed(_)
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn selected_version_reports_missing_names() {
        let store = SelectedVersions::new();
        assert!(matches!(
            store.selected_version("ghost").unwrap_err(),
            ProjectError::NotSelected { name } if name == "ghost"
        ));
    }
}
