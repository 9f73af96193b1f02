//! Diagram collections
//!
//! A [`Manifest`] is the ordered list of diagrams for one batch. It can be
//! supplied directly, read from a JSON manifest, or collected from a directory
//! of `.puml` files:
//!
//! ```json
//! {
//!   "diagrams": [
//!     { "name": "01_Overview", "source": "@startuml\nA -> B\n@enduml" }
//!   ]
//! }
//! ```

use crate::error::{Error, Result};
use crate::types::DiagramSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// File extension picked up by [`Manifest::from_dir`]
pub const SOURCE_EXTENSION: &str = "puml";

/// Validated, ordered diagram collection
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    diagrams: Vec<DiagramSpec>,
}

impl Manifest {
    /// Wrap caller-supplied specs, checking names and uniqueness
    pub fn new(diagrams: Vec<DiagramSpec>) -> Result<Self> {
        let manifest = Self { diagrams };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read a JSON manifest, keeping the order of its entries
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read manifest {}: {}", path.display(), e),
            key: None,
        })?;
        let manifest: Manifest = serde_json::from_str(&raw)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Collect every `*.puml` file in `dir` (not recursive), sorted by name
    ///
    /// The file stem becomes the diagram name.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut diagrams = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION)
            {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                tracing::warn!(path = %path.display(), "skipping source with non UTF-8 name");
                continue;
            };
            let source = std::fs::read_to_string(&path)?;
            diagrams.push(DiagramSpec::new(name, source));
        }
        diagrams.sort_by(|a, b| a.name.cmp(&b.name));

        if diagrams.is_empty() {
            tracing::warn!(dir = %dir.display(), "no .{} files found", SOURCE_EXTENSION);
        }
        Self::new(diagrams)
    }

    /// Load from `path`, which is either a JSON manifest or a source directory
    pub fn load(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Self::from_json_file(path)
        }
    }

    /// Specs in batch order
    pub fn diagrams(&self) -> &[DiagramSpec] {
        &self.diagrams
    }

    /// Number of diagrams
    pub fn len(&self) -> usize {
        self.diagrams.len()
    }

    /// Whether the manifest has no diagrams
    pub fn is_empty(&self) -> bool {
        self.diagrams.is_empty()
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.diagrams.len());
        for spec in &self.diagrams {
            check_name(spec, &mut seen)?;
        }
        Ok(())
    }
}

/// Check that `spec` has a safe name not already in `seen`, then remember it
pub(crate) fn check_name<'a>(
    spec: &'a DiagramSpec,
    seen: &mut HashSet<&'a str>,
) -> Result<()> {
    spec.validate_name()?;
    if !seen.insert(spec.name.as_str()) {
        return Err(Error::config(
            "diagrams.name",
            format!("duplicate diagram name {:?}", spec.name),
        ));
    }
    Ok(())
}

impl IntoIterator for Manifest {
    type Item = DiagramSpec;
    type IntoIter = std::vec::IntoIter<DiagramSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagrams.into_iter()
    }
}
