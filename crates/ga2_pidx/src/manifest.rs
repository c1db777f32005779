//! The workspace manifest, `list.json`.
//!
//! The manifest records for every ingested container its opaque Table-1 values, the Table-2 file
//! paths and the paths of every named `FSTS` block. Rebuilding reads it to know what goes where.
//!
//! ```json
//! {
//!   "adv.dat": {
//!     "tab1": [0, 0, 0, 0],
//!     "tab2": ["scn/ev01.scn"],
//!     "tab3": { "scn": ["scn/ev01.scn"] }
//!   }
//! }
//! ```

use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    path::{eq_ignore_case, fold_case, normalize_path},
};

/// Manifest entry for a single container
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ArchiveManifest {
    /// The four opaque trailing Table-1 values
    #[serde(default, alias = "Tab1")]
    pub tab1: Vec<u32>,

    /// Paths stored in the directory tree
    #[serde(default, alias = "Tab2")]
    pub tab2: Vec<String>,

    /// Paths stored in each named `FSTS` block
    #[serde(default, alias = "Tab3")]
    pub tab3: IndexMap<String, Vec<String>>,
}

impl ArchiveManifest {
    /// The Table-1 tail, zeroed when fewer than four values are recorded
    pub fn table1_tail(&self) -> [u32; 4] {
        match self.tab1.as_slice() {
            [a, b, c, d, ..] => [*a, *b, *c, *d],
            _ => [0; 4],
        }
    }

    /// Normalized directory tree paths, without blanks or case-insensitive duplicates
    pub fn table2_paths(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tab2
            .iter()
            .map(|path| normalize_path(path))
            .filter(|path| !path.is_empty() && seen.insert(fold_case(path)))
            .collect()
    }

    /// Named blocks with their normalized paths, dropping blocks left without paths
    pub fn blocks(&self) -> Vec<(String, Vec<String>)> {
        self.tab3
            .iter()
            .filter(|(name, _)| !name.trim().is_empty())
            .map(|(name, paths)| {
                let paths: Vec<String> = paths
                    .iter()
                    .map(|path| normalize_path(path))
                    .filter(|path| !path.is_empty())
                    .collect();
                (name.clone(), paths)
            })
            .filter(|(_, paths)| !paths.is_empty())
            .collect()
    }

    /// Every distinct path referenced by this container, ignoring case
    pub fn all_paths(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tab2
            .iter()
            .chain(self.tab3.values().flatten())
            .map(|path| normalize_path(path))
            .filter(|path| !path.is_empty() && seen.insert(fold_case(path)))
            .collect()
    }
}

/// The whole `list.json`, keyed by container file name
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct WorkspaceManifest {
    /// Containers in ingestion order
    pub archives: IndexMap<String, ArchiveManifest>,
}

impl WorkspaceManifest {
    /// Read a manifest from JSON
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write the manifest as indented JSON
    pub fn to_writer(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Load a manifest from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Save the manifest to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Look up a container ignoring case
    pub fn get(&self, name: &str) -> Option<&ArchiveManifest> {
        self.archives.get(name).or_else(|| {
            self.archives
                .iter()
                .find(|(key, _)| eq_ignore_case(key, name))
                .map(|(_, manifest)| manifest)
        })
    }

    /// Every distinct path referenced by any container, ignoring case
    pub fn all_paths(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.archives
            .values()
            .flat_map(ArchiveManifest::all_paths)
            .filter(|path| seen.insert(fold_case(path)))
            .collect()
    }

    /// Number of containers
    pub fn len(&self) -> usize {
        self.archives.len()
    }

    /// Whether no container is listed
    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }
}
