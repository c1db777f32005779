//! The on-disk workspace used to ingest, edit and rebuild containers.
//!
//! ```text
//! <root>/
//! ├── list.json   manifest of every ingested container
//! ├── original/   payloads exactly as stored in the shipped containers
//! ├── modified/   plain replacement files, or `<path>.png` for AGI images
//! ├── extract/    decompressed copies for editing
//! └── packed/     rebuilt containers and the patched idx.dat
//! ```

use std::{
    collections::HashSet,
    fs::{self, File},
    io::{self, BufWriter, Read, Seek, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use bon::Builder;
use rayon::prelude::*;
use tracing::instrument;

use crate::{
    error::Result,
    manifest::{ArchiveManifest, WorkspaceManifest},
    path::{eq_ignore_case, fold_case},
    progress::{check_cancelled, run_on_pool, LogSink, Progress},
    read::{PidxArchive, PidxFileData},
    source::ImageTranscoder,
};

/// Name of the manifest file
pub const MANIFEST_NAME: &str = "list.json";

/// Name of the global index container
pub const INDEX_NAME: &str = "idx.dat";

/// Paths to the parts of a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// A workspace rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the workspace directories if missing
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.original_dir(),
            self.modified_dir(),
            self.packed_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// The workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of pristine payloads
    pub fn original_dir(&self) -> PathBuf {
        self.root.join("original")
    }

    /// Directory of replacement files
    pub fn modified_dir(&self) -> PathBuf {
        self.root.join("modified")
    }

    /// Directory of rebuilt containers
    pub fn packed_dir(&self) -> PathBuf {
        self.root.join("packed")
    }

    /// Directory of decompressed copies
    pub fn extract_dir(&self) -> PathBuf {
        self.root.join("extract")
    }

    /// Location of `list.json`
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_NAME)
    }

    /// Read `list.json`
    pub fn load_manifest(&self) -> Result<WorkspaceManifest> {
        WorkspaceManifest::load(self.manifest_path())
    }

    /// Location of a container path below `original/`
    pub fn original_path(&self, path: &str) -> PathBuf {
        join_relative(&self.original_dir(), path)
    }

    /// Location of a container path below `modified/`
    pub fn modified_path(&self, path: &str) -> PathBuf {
        join_relative(&self.modified_dir(), path)
    }

    /// Location of a container path below `extract/`
    pub fn extract_path(&self, path: &str) -> PathBuf {
        join_relative(&self.extract_dir(), path)
    }

    /// Location of a rebuilt container below `packed/`
    pub fn packed_path(&self, name: &str) -> PathBuf {
        self.packed_dir().join(name.to_lowercase())
    }
}

/// Append the components of a container path, skipping `.` and `..`
fn join_relative(base: &Path, path: &str) -> PathBuf {
    let mut joined = base.to_path_buf();
    for part in path.split(['/', '\\']) {
        if !matches!(part, "" | "." | "..") {
            joined.push(part);
        }
    }
    joined
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// Creates a workspace from shipped containers
///
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
///
/// fn ingest() -> ga2_pidx::error::Result<()> {
///     let mut builder = ga2_pidx::WorkspaceBuilder::new("workspace")?;
///     let reader = BufReader::new(File::open("adv.dat")?);
///     builder.add_archive(reader, "adv.dat")?;
///     builder.save()
/// }
/// ```
#[derive(Debug)]
pub struct WorkspaceBuilder {
    workspace: Workspace,
    manifest: WorkspaceManifest,
    written: HashSet<String>,
}

impl WorkspaceBuilder {
    /// Create the workspace directories below `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let workspace = Workspace::new(root);
        workspace.create_dirs()?;
        Ok(Self {
            workspace,
            manifest: WorkspaceManifest::default(),
            written: HashSet::new(),
        })
    }

    /// The workspace being built
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// The manifest collected so far
    pub fn manifest(&self) -> &WorkspaceManifest {
        &self.manifest
    }

    /// Record a container in the manifest and copy its payloads into `original/`
    ///
    /// A path already copied from an earlier container is not copied again.
    #[instrument(skip(self, reader), err)]
    pub fn add_archive<R: Read + Seek>(&mut self, reader: R, name: &str) -> Result<&ArchiveManifest> {
        let mut archive = PidxArchive::new(reader)?;
        let manifest = archive.manifest();

        let payloads: Vec<PidxFileData> = archive
            .files()
            .cloned()
            .chain(
                archive
                    .blocks()
                    .iter()
                    .filter_map(|block| block.files.as_ref())
                    .flatten()
                    .cloned(),
            )
            .filter(|data| !data.path.is_empty())
            .collect();

        for data in payloads {
            if !self.written.insert(fold_case(&data.path)) {
                continue;
            }

            let destination = self.workspace.original_path(&data.path);
            create_parent(&destination)?;
            let mut output = BufWriter::new(File::create(&destination)?);
            io::copy(&mut archive.open(&data)?, &mut output)?;
            output.flush()?;
        }

        self.manifest.archives.insert(name.to_owned(), manifest);
        Ok(&self.manifest.archives[name])
    }

    /// Copy the global index into `original/` unchanged
    #[instrument(skip_all, err)]
    pub fn add_index<R: Read>(&mut self, mut reader: R) -> Result<u64> {
        let destination = self.workspace.original_path(INDEX_NAME);
        create_parent(&destination)?;
        let mut output = BufWriter::new(File::create(&destination)?);
        let written = io::copy(&mut reader, &mut output)?;
        output.flush()?;
        Ok(written)
    }

    /// Write `list.json`
    pub fn save(&self) -> Result<()> {
        self.manifest.save(self.workspace.manifest_path())
    }
}

fn default_extensions() -> Vec<String> {
    ["tbl", "txt", "scn", "isb", "asb", "dat", "agi"]
        .map(String::from)
        .to_vec()
}

fn default_nested_containers() -> Vec<String> {
    vec!["slg_opdemo.dat".to_owned()]
}

/// Options for [`extract`]
#[derive(Debug, Clone, Builder)]
pub struct ExtractOptions {
    /// Extensions to extract, without the dot
    #[builder(default = default_extensions())]
    pub extensions: Vec<String>,

    /// `.dat` files are nested containers and are skipped unless named here
    #[builder(default = default_nested_containers())]
    pub nested_containers: Vec<String>,

    /// Size of a dedicated worker pool
    pub threads: Option<usize>,

    /// Raised to stop between paths
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ExtractOptions {
    fn selects(&self, path: &str) -> bool {
        let path = Path::new(path);
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        if !self.extensions.iter().any(|e| eq_ignore_case(e, extension)) {
            return false;
        }
        if !extension.eq_ignore_ascii_case("dat") {
            return true;
        }

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        self.nested_containers
            .iter()
            .any(|name| eq_ignore_case(name, file_name))
    }
}

/// Outcome of [`extract`]
#[derive(Debug, Clone, Default)]
pub struct ExtractSummary {
    /// Paths written to `extract/`
    pub ok: usize,
    /// Paths missing from `original/` or failing to write
    pub failed: usize,
    /// Where the files were written
    pub extract_root: PathBuf,
    /// Every progress line
    pub log: Vec<String>,
}

enum Extracted {
    Plain,
    Image,
    ImageKept,
}

fn extract_one(
    workspace: &Workspace,
    path: &str,
    transcoder: &dyn ImageTranscoder,
) -> Result<Option<Extracted>> {
    let source = workspace.original_path(path);
    if !source.is_file() {
        return Ok(None);
    }

    let stored = fs::read(&source)?;
    let content = ga2_arz::decompress_or_raw(&stored);

    let is_agi = Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("agi"));
    if is_agi {
        let png = workspace.extract_path(&format!("{path}.png"));
        create_parent(&png)?;
        if transcoder.agi_to_png(&content, &png)? {
            return Ok(Some(Extracted::Image));
        }
    }

    let destination = workspace.extract_path(path);
    create_parent(&destination)?;
    fs::write(&destination, &content)?;

    Ok(Some(if is_agi {
        Extracted::ImageKept
    } else {
        Extracted::Plain
    }))
}

/// Decompress the selected manifest paths from `original/` into `extract/`
///
/// Payloads that are not valid ARZ streams are copied as they are. AGI images are handed to the
/// transcoder and kept unchanged when it declines them.
#[instrument(skip_all, err)]
pub fn extract(
    workspace: &Workspace,
    transcoder: &dyn ImageTranscoder,
    options: &ExtractOptions,
    log: &LogSink<'_>,
) -> Result<ExtractSummary> {
    let progress = Progress::new(log);
    let manifest = workspace.load_manifest()?;
    let extract_root = workspace.extract_dir();

    let paths: Vec<String> = manifest
        .all_paths()
        .into_iter()
        .filter(|path| options.selects(path))
        .collect();

    if paths.is_empty() {
        return Ok(ExtractSummary {
            extract_root,
            log: vec![progress.info("nothing matched the selected extensions".to_owned())],
            ..Default::default()
        });
    }

    let total = paths.len();
    let ok = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let processed = AtomicUsize::new(0);
    let cancel = options.cancel.as_deref();

    let log = run_on_pool(options.threads, || {
        paths
            .par_iter()
            .map(|path| -> Result<_> {
                check_cancelled(cancel)?;
                let mut lines = Vec::with_capacity(2);

                lines.push(match extract_one(workspace, path, transcoder) {
                    Ok(Some(kind)) => {
                        ok.fetch_add(1, Ordering::Relaxed);
                        progress.info(match kind {
                            Extracted::Plain => format!("[FILE] {path}"),
                            Extracted::Image => format!("[AGI->PNG] {path} -> {path}.png"),
                            Extracted::ImageKept => format!("[AGI] {path}"),
                        })
                    }
                    Ok(None) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        progress.warn(format!("[MISSING] {path}"))
                    }
                    Err(err) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        progress.warn(format!("[FAILED] {path} : {err}"))
                    }
                });

                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % 50 == 0 {
                    lines.push(progress.info(format!("[PROGRESS] {done}/{total}")));
                }

                Ok(lines)
            })
            .collect::<Result<Vec<_>>>()
    })??;

    Ok(ExtractSummary {
        ok: ok.into_inner(),
        failed: failed.into_inner(),
        extract_root,
        log: log.into_iter().flatten().collect(),
    })
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::{join_relative, ExtractOptions, Workspace};

    #[test]
    fn workspace_layout() {
        let workspace = Workspace::new("/ws");

        assert_eq!(workspace.manifest_path(), Path::new("/ws/list.json"));
        assert_eq!(
            workspace.original_path("scn/ev01.scn"),
            Path::new("/ws/original/scn/ev01.scn")
        );
        assert_eq!(workspace.packed_path("ADV.DAT"), Path::new("/ws/packed/adv.dat"));
    }

    #[test]
    fn relative_paths_stay_inside() {
        assert_eq!(
            join_relative(Path::new("/ws"), "../../etc/./passwd"),
            Path::new("/ws/etc/passwd")
        );
        assert_eq!(
            join_relative(Path::new("/ws"), "\\a\\b.txt"),
            Path::new("/ws/a/b.txt")
        );
    }

    #[test]
    fn extension_selection() {
        let options = ExtractOptions::default();

        assert!(options.selects("scn/EV01.SCN"));
        assert!(options.selects("movie/slg_opdemo.dat"));
        assert!(!options.selects("sub/nested.dat"));
        assert!(!options.selects("bgm/track.ogg"));
        assert!(!options.selects("noextension"));

        let options = ExtractOptions::builder()
            .extensions(vec!["ogg".to_owned()])
            .build();
        assert!(options.selects("bgm/track.ogg"));
        assert!(!options.selects("scn/ev01.scn"));
    }
}
