//! Resolution of the bytes stored for each path during a rebuild.
//!
//! Every path comes either from the pristine extracted original or from a replacement in the
//! workspace's `modified/` tree. Replacements are wrapped in an ARZ stream when the original was
//! wrapped, or when there is no original to compare against.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    sync::{atomic::AtomicBool, Arc},
};

use ga2_arz::types::{ArzHeader, HEADER_SIZE};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    path::{fold_case, normalize_path},
    progress::{check_cancelled, Progress},
    workspace::Workspace,
};

/// Converts between the game's AGI images and editable PNG files
///
/// Image conversion lives outside this crate, implement this trait to plug it in.
pub trait ImageTranscoder: Sync {
    /// Encode the PNG at `png_path` into AGI bytes
    fn png_to_agi(&self, png_path: &Path) -> Result<Vec<u8>>;

    /// Decode AGI bytes into a PNG at `png_path`, returning `false` when the image is unsupported
    fn agi_to_png(&self, agi: &[u8], png_path: &Path) -> Result<bool>;
}

/// An [`ImageTranscoder`] that supports no images
///
/// AGI files are extracted unchanged and PNG replacements are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTranscoder;

impl ImageTranscoder for NoTranscoder {
    fn png_to_agi(&self, png_path: &Path) -> Result<Vec<u8>> {
        Err(Error::CustomError(format!(
            "no image transcoder available for {}",
            png_path.display()
        )))
    }

    fn agi_to_png(&self, _agi: &[u8], _png_path: &Path) -> Result<bool> {
        Ok(false)
    }
}

/// Sizes recorded in a file entry for a payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoredSizes {
    /// Bytes written to the container
    pub stored: u64,
    /// Size after decompression
    pub decompressed: u64,
    /// Compressed size, 0 when the payload is stored raw
    pub compressed: u64,
}

#[derive(Debug, Clone)]
enum OriginalData {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

/// Pristine bytes of a path, as extracted from the shipped container
#[derive(Debug, Clone)]
pub struct OriginalSource {
    data: OriginalData,
    stored_size: u64,
    header: Option<ArzHeader>,
}

impl OriginalSource {
    /// Inspect an extracted file without loading it
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        let stored_size = file.metadata()?.len();

        let mut prefix = Vec::with_capacity(HEADER_SIZE);
        file.take(HEADER_SIZE as u64).read_to_end(&mut prefix)?;

        Ok(Self {
            header: ga2_arz::peek_header(&prefix),
            stored_size,
            data: OriginalData::File(path),
        })
    }

    /// Use bytes already in memory
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            header: ga2_arz::peek_header(&bytes),
            stored_size: bytes.len() as u64,
            data: OriginalData::Memory(bytes),
        }
    }

    /// Whether the original is an ARZ stream
    pub fn is_wrapped(&self) -> bool {
        self.header.is_some()
    }

    /// Sizes to record for the original as is
    pub fn sizes(&self) -> StoredSizes {
        match self.header {
            Some(header) => StoredSizes {
                stored: self.stored_size,
                decompressed: header.raw_size as u64,
                compressed: self.stored_size,
            },
            None => StoredSizes {
                stored: self.stored_size,
                decompressed: self.stored_size,
                compressed: 0,
            },
        }
    }

    fn copy_to(&self, writer: &mut dyn Write) -> Result<u64> {
        match &self.data {
            OriginalData::File(path) => {
                let mut file = File::open(path)?;
                Ok(io::copy(&mut file, writer)?)
            }
            OriginalData::Memory(bytes) => {
                writer.write_all(bytes)?;
                Ok(bytes.len() as u64)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Replacement {
    stored: Vec<u8>,
    plain_size: u64,
    wrapped: bool,
}

/// Where the bytes of one path come from
#[derive(Debug, Clone)]
pub struct PathSource {
    path: String,
    original: Option<OriginalSource>,
    replacement: Option<Replacement>,
}

impl PathSource {
    /// Combine an original and plain replacement bytes for `path`
    ///
    /// The replacement is compressed now, unless the original exists and is stored raw. A
    /// replacement too large for an ARZ header is stored raw.
    pub fn new(path: &str, original: Option<OriginalSource>, modified: Option<Vec<u8>>) -> Self {
        let wrap = original.as_ref().map_or(true, OriginalSource::is_wrapped);
        let replacement = modified.map(|plain| {
            let plain_size = plain.len() as u64;
            if !wrap {
                return Replacement {
                    stored: plain,
                    plain_size,
                    wrapped: false,
                };
            }

            match ga2_arz::compress(&plain) {
                Ok(stored) => Replacement {
                    stored,
                    plain_size,
                    wrapped: true,
                },
                Err(err) => {
                    warn!(path, "storing replacement raw: {err}");
                    Replacement {
                        stored: plain,
                        plain_size,
                        wrapped: false,
                    }
                }
            }
        });

        Self {
            path: normalize_path(path),
            original,
            replacement,
        }
    }

    /// The normalized path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The original, if one was found
    pub fn original(&self) -> Option<&OriginalSource> {
        self.original.as_ref()
    }

    /// Whether a replacement will be written instead of the original
    pub fn is_modified(&self) -> bool {
        self.replacement.is_some()
    }

    /// Sizes of the payload that [`PathSource::write_to`] will produce
    pub fn sizes(&self) -> Result<StoredSizes> {
        match (&self.replacement, &self.original) {
            (Some(replacement), _) => {
                let stored = replacement.stored.len() as u64;
                Ok(StoredSizes {
                    stored,
                    decompressed: if replacement.wrapped {
                        replacement.plain_size
                    } else {
                        stored
                    },
                    compressed: if replacement.wrapped { stored } else { 0 },
                })
            }
            (None, Some(original)) => Ok(original.sizes()),
            (None, None) => Err(Error::MissingSource(self.path.clone())),
        }
    }

    /// Write the payload, returning the number of bytes written
    pub fn write_to(&self, writer: &mut dyn Write) -> Result<u64> {
        match (&self.replacement, &self.original) {
            (Some(replacement), _) => {
                writer.write_all(&replacement.stored)?;
                Ok(replacement.stored.len() as u64)
            }
            (None, Some(original)) => original.copy_to(writer),
            (None, None) => Err(Error::MissingSource(self.path.clone())),
        }
    }
}

/// Looks up the [`PathSource`] of a path while laying out a container
pub trait SourceResolver: Sync {
    /// The source for `path`, compared ignoring case
    fn resolve(&self, path: &str) -> Result<&PathSource>;
}

/// Sources resolved up front for every path of a workspace
#[derive(Debug, Default)]
pub struct PathSourceMap {
    sources: HashMap<String, PathSource>,
    failures: HashMap<String, (String, String)>,
}

impl PathSourceMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a source
    pub fn insert(&mut self, source: PathSource) {
        self.failures.remove(&fold_case(source.path()));
        self.sources.insert(fold_case(source.path()), source);
    }

    /// Remember that `path` could not be resolved
    pub fn insert_failure(&mut self, path: &str, reason: String) {
        let path = normalize_path(path);
        self.failures.insert(fold_case(&path), (path, reason));
    }

    /// Number of resolved sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether nothing has been resolved
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Number of sources using a replacement
    pub fn modified_count(&self) -> usize {
        self.sources.values().filter(|s| s.is_modified()).count()
    }

    /// Paths that failed to resolve, with the reason
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.failures
            .values()
            .map(|(path, reason)| (path.as_str(), reason.as_str()))
    }

    /// Resolve `paths` against the `original/` and `modified/` trees of a workspace
    ///
    /// Paths are resolved in parallel. A path whose files cannot be read is recorded as a failure
    /// and only fails the containers that use it. Paths with neither file are left out.
    pub fn from_workspace(
        workspace: &Workspace,
        paths: &[String],
        transcoder: &dyn ImageTranscoder,
        cancel: Option<&AtomicBool>,
        progress: Progress<'_>,
    ) -> Result<Self> {
        let resolved = paths
            .par_iter()
            .map(|path| -> Result<_> {
                check_cancelled(cancel)?;
                let result = resolve_one(workspace, path, transcoder, progress);
                Ok((path.as_str(), result))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut map = Self::new();
        for (path, result) in resolved {
            match result {
                Ok(Some(source)) => map.insert(source),
                Ok(None) => debug!(path, "no original or replacement"),
                Err(err) => {
                    progress.warn(format!("[SRC] failed: {path} : {err}"));
                    map.insert_failure(path, err.to_string());
                }
            }
        }

        Ok(map)
    }
}

impl SourceResolver for PathSourceMap {
    fn resolve(&self, path: &str) -> Result<&PathSource> {
        let key = fold_case(&normalize_path(path));
        if let Some(source) = self.sources.get(&key) {
            return Ok(source);
        }
        match self.failures.get(&key) {
            Some((path, reason)) => Err(Error::SourceFailed {
                path: path.clone(),
                reason: reason.clone(),
            }),
            None => Err(Error::MissingSource(normalize_path(path))),
        }
    }
}

fn is_agi(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("agi"))
}

fn resolve_one(
    workspace: &Workspace,
    path: &str,
    transcoder: &dyn ImageTranscoder,
    progress: Progress<'_>,
) -> Result<Option<PathSource>> {
    let original_path = workspace.original_path(path);
    let original = if original_path.is_file() {
        Some(OriginalSource::from_file(original_path)?)
    } else {
        None
    };

    let modified_path = workspace.modified_path(path);
    let png_path = workspace.modified_path(&format!("{path}.png"));
    let modified = if is_agi(path) && png_path.is_file() {
        let agi = transcoder.png_to_agi(&png_path)?;
        progress.info(format!("[PNG->AGI] {path}.png -> {path}"));
        Some(agi)
    } else if modified_path.is_file() {
        Some(fs::read(&modified_path)?)
    } else {
        None
    };

    if original.is_none() && modified.is_none() {
        return Ok(None);
    }
    Ok(Some(PathSource::new(path, original, modified)))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{OriginalSource, PathSource, PathSourceMap, SourceResolver, StoredSizes};
    use crate::error::{Error, Result};

    fn text() -> Vec<u8> {
        b"the same line of text, again and again. ".repeat(20)
    }

    #[test]
    fn original_wrapped() -> Result<()> {
        let stream = ga2_arz::compress(&text())?;
        let source = PathSource::new("a.scn", Some(OriginalSource::from_bytes(stream.clone())), None);

        assert!(!source.is_modified());
        assert_eq!(
            source.sizes()?,
            StoredSizes {
                stored: stream.len() as u64,
                decompressed: text().len() as u64,
                compressed: stream.len() as u64,
            }
        );

        let mut out = Vec::new();
        assert_eq!(source.write_to(&mut out)?, stream.len() as u64);
        assert_eq!(out, stream);

        Ok(())
    }

    #[test]
    fn original_raw() -> Result<()> {
        let source = PathSource::new("a.bin", Some(OriginalSource::from_bytes(vec![1, 2, 3])), None);
        assert_eq!(
            source.sizes()?,
            StoredSizes {
                stored: 3,
                decompressed: 3,
                compressed: 0,
            }
        );

        Ok(())
    }

    #[test]
    fn replacement_of_wrapped_original_is_compressed() -> Result<()> {
        let original = OriginalSource::from_bytes(ga2_arz::compress(b"old old old old")?);
        let source = PathSource::new("a.tbl", Some(original), Some(text()));
        let sizes = source.sizes()?;

        assert!(source.is_modified());
        assert_eq!(sizes.decompressed, text().len() as u64);
        assert_eq!(sizes.compressed, sizes.stored);

        let mut out = Vec::new();
        source.write_to(&mut out)?;
        assert_eq!(ga2_arz::decompress(&out)?, text());

        Ok(())
    }

    #[test]
    fn replacement_of_raw_original_is_raw() -> Result<()> {
        let original = OriginalSource::from_bytes(b"plain".to_vec());
        let source = PathSource::new("a.txt", Some(original), Some(b"changed".to_vec()));

        assert_eq!(
            source.sizes()?,
            StoredSizes {
                stored: 7,
                decompressed: 7,
                compressed: 0,
            }
        );

        let mut out = Vec::new();
        source.write_to(&mut out)?;
        assert_eq!(out, b"changed");

        Ok(())
    }

    #[test]
    fn new_file_is_compressed() -> Result<()> {
        let source = PathSource::new("new.scn", None, Some(text()));
        let sizes = source.sizes()?;

        assert_ne!(sizes.compressed, 0);
        assert!(sizes.stored < text().len() as u64);

        Ok(())
    }

    #[test]
    fn resolve_ignores_case_and_reports_missing() -> Result<()> {
        let mut map = PathSourceMap::new();
        map.insert(PathSource::new(
            "Scn/Ev01.scn",
            Some(OriginalSource::from_bytes(vec![0])),
            None,
        ));
        map.insert_failure("img/broken.agi", "bad png".to_owned());

        assert_eq!(map.resolve("\\scn\\EV01.SCN")?.path(), "Scn/Ev01.scn");
        assert!(matches!(
            map.resolve("other.tbl"),
            Err(Error::MissingSource(path)) if path == "other.tbl"
        ));
        assert!(matches!(
            map.resolve("img/broken.agi"),
            Err(Error::SourceFailed { reason, .. }) if reason == "bad png"
        ));

        Ok(())
    }
}
