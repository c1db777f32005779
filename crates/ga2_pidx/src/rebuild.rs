//! Rebuilding every container of a workspace.

use std::{
    fs::{self, File},
    io::{self, BufWriter},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use bon::Builder;
use rayon::prelude::*;
use tracing::{instrument, warn};

use crate::{
    error::{Error, Result},
    manifest::ArchiveManifest,
    progress::{check_cancelled, run_on_pool, LogSink, Progress},
    source::{ImageTranscoder, PathSourceMap, SourceResolver},
    workspace::Workspace,
    write::{ContainerPlan, PidxWriter, RebuildStats},
};

/// Options for [`rebuild_all`]
#[derive(Debug, Clone, Default, Builder)]
pub struct RebuildOptions {
    /// Size of a dedicated worker pool
    pub threads: Option<usize>,

    /// Raised to stop between paths and between containers
    pub cancel: Option<Arc<AtomicBool>>,
}

/// A container that could not be rebuilt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFailure {
    /// The container name
    pub name: String,
    /// What went wrong
    pub message: String,
}

/// Outcome of [`rebuild_all`]
#[derive(Debug, Clone, Default)]
pub struct RebuildSummary {
    /// Containers written to `packed/`
    pub archives: usize,
    /// Containers that failed
    pub failures: Vec<ArchiveFailure>,
    /// Sum of the distinct paths of every rebuilt container
    pub total_paths: usize,
    /// Paths written from a replacement
    pub modified: usize,
    /// Paths copied from the original
    pub original: usize,
    /// Where the containers were written
    pub packed_root: PathBuf,
    /// Time spent
    pub elapsed: Duration,
    /// Every progress line
    pub log: Vec<String>,
}

/// Lay out and write a single container to `output`
#[instrument(skip(manifest, resolver), err)]
pub fn rebuild_archive(
    name: &str,
    manifest: &ArchiveManifest,
    resolver: &dyn SourceResolver,
    output: &Path,
) -> Result<RebuildStats> {
    let plan = ContainerPlan::new(name, manifest, resolver)?;
    let file = BufWriter::new(File::create(output)?);
    PidxWriter::new(file)
        .write_plan(&plan)?
        .into_inner()
        .map_err(|err| Error::IOError(err.into_error()))?;
    Ok(plan.stats())
}

/// Rebuild every container listed in `list.json` into `packed/`
///
/// Sources for all paths are resolved once, in parallel, then the containers are written in
/// parallel. A failing container is logged and reported in the summary without stopping the
/// others.
#[instrument(skip_all, err)]
pub fn rebuild_all(
    workspace: &Workspace,
    transcoder: &dyn ImageTranscoder,
    options: &RebuildOptions,
    log: &LogSink<'_>,
) -> Result<RebuildSummary> {
    let started = Instant::now();
    let progress = Progress::new(log);
    let cancel = options.cancel.as_deref();

    let manifest = workspace.load_manifest()?;
    fs::create_dir_all(workspace.packed_dir())?;

    let paths = manifest.all_paths();
    let mut lines = vec![progress.info(format!(
        "[PLAN] {} containers, {} distinct paths",
        manifest.len(),
        paths.len()
    ))];

    let total_paths = AtomicUsize::new(0);
    let modified = AtomicUsize::new(0);
    let original = AtomicUsize::new(0);

    let (sources, outcomes) = run_on_pool(options.threads, || -> Result<_> {
        let sources = PathSourceMap::from_workspace(workspace, &paths, transcoder, cancel, progress)?;

        let outcomes = manifest
            .archives
            .par_iter()
            .map(|(name, archive)| -> Result<_> {
                check_cancelled(cancel)?;
                let output = workspace.packed_path(name);
                let outcome = rebuild_archive(name, archive, &sources, &output);

                Ok(match outcome {
                    Ok(stats) => {
                        total_paths.fetch_add(stats.total_paths, Ordering::Relaxed);
                        modified.fetch_add(stats.modified, Ordering::Relaxed);
                        original.fetch_add(stats.original, Ordering::Relaxed);
                        Ok(progress.info(format!(
                            "[DAT] done: {name}  paths {}, modified {}, original {}",
                            stats.total_paths, stats.modified, stats.original
                        )))
                    }
                    Err(err) => {
                        // A partial container must never reach the index sync
                        if let Err(cleanup) = fs::remove_file(&output) {
                            if cleanup.kind() != io::ErrorKind::NotFound {
                                warn!(path = %output.display(), "unable to remove partial container: {cleanup}");
                            }
                        }
                        let line = progress.warn(format!("[DAT] failed: {name} : {err}"));
                        Err((
                            ArchiveFailure {
                                name: name.clone(),
                                message: err.to_string(),
                            },
                            line,
                        ))
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((sources, outcomes))
    })??;

    let mut summary = RebuildSummary {
        packed_root: workspace.packed_dir(),
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            Ok(line) => {
                summary.archives += 1;
                lines.push(line);
            }
            Err((failure, line)) => {
                summary.failures.push(failure);
                lines.push(line);
            }
        }
    }

    let failed_paths = sources.failures().count();
    if failed_paths > 0 {
        lines.push(progress.warn(format!("[SRC] {failed_paths} paths could not be prepared")));
    }

    summary.total_paths = total_paths.into_inner();
    summary.modified = modified.into_inner();
    summary.original = original.into_inner();
    summary.elapsed = started.elapsed();
    lines.push(progress.info(format!(
        "[DONE] {} containers, {} failed, {:.2?}",
        summary.archives,
        summary.failures.len(),
        summary.elapsed
    )));
    summary.log = lines;

    Ok(summary)
}
