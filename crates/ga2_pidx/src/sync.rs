//! Keeping the global index, `idx.dat`, consistent with rebuilt containers.
//!
//! The game locates files through `idx.dat` rather than through each container's own tables. Its
//! Table-1 lists every container; the name offset of that record is the container's signature,
//! which Table-2 file records of the index carry in their third field. After a rebuild, the
//! offset and sizes of every such record, and the location of every `FSTS` block with a matching
//! name, are copied from the rebuilt container. Nothing else in the index changes.

use std::{
    collections::HashSet,
    fs::{self, File},
    io::{BufReader, Cursor, Read, Seek, SeekFrom, Write},
};

use byteorder::{LittleEndian, WriteBytesExt};
use indexmap::IndexMap;
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    error::{Error, Result},
    path::{eq_ignore_case, fold_case},
    progress::{LogSink, Progress},
    read::{EntryKind, PidxArchive},
    rebuild::ArchiveFailure,
    types::{BlockMeta, Table2Record, TABLE2_RECORD_SIZE},
    workspace::{Workspace, INDEX_NAME},
};

/// Offset of the data offset field inside a Table-2 record
const FILE_FIELDS_OFFSET: u64 = 12;

/// Offset of the `FSTS` offset field inside a block record
const BLOCK_FIELDS_OFFSET: u64 = 8;

/// A difference between a rebuilt container and the index that could not be patched
///
/// Mismatches are reported, never returned as errors.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum IndexMismatch {
    /// the container is not listed in the index
    #[error("{0} is not listed in the index")]
    ArchiveNotIndexed(String),

    /// the index lists a file the rebuilt container lacks
    #[error("{archive}: {path} is indexed but missing from the rebuilt container")]
    FileNotRebuilt {
        /// The container name
        archive: String,
        /// The indexed path
        path: String,
    },

    /// the rebuilt container holds a file the index does not list
    #[error("{archive}: {path} is not listed in the index")]
    FileNotIndexed {
        /// The container name
        archive: String,
        /// The rebuilt path
        path: String,
    },

    /// the rebuilt container holds a block the index does not list
    #[error("{archive}: block {block} is not listed in the index")]
    BlockNotIndexed {
        /// The container name
        archive: String,
        /// The block name
        block: String,
    },
}

/// Outcome of [`sync_index`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// The declared name of the rebuilt container
    pub archive: String,
    /// The signature found in the index
    pub signature: Option<u32>,
    /// Table-2 records patched
    pub patched_files: usize,
    /// Block records patched
    pub patched_blocks: usize,
    /// Everything that could not be matched
    pub mismatches: Vec<IndexMismatch>,
}

/// Copy the locations of a rebuilt container's files and blocks into the global index
///
/// Only the offset and size fields of matching records are written, every other byte of `index`
/// is left untouched. Fails with [`Error::NotAnIndex`] when `index` is a per-container file.
#[instrument(skip_all, err)]
pub fn sync_index<R, I>(rebuilt: R, index: &mut I) -> Result<SyncReport>
where
    R: Read + Seek,
    I: Read + Write + Seek,
{
    let rebuilt = PidxArchive::new(rebuilt)?;
    let archive = rebuilt.name().to_owned();

    let mut files: IndexMap<String, (String, [u32; 3])> = IndexMap::new();
    for entry in rebuilt.table2() {
        if let EntryKind::File {
            data_offset,
            decompressed_size,
            compressed_size,
            ..
        } = entry.kind()
        {
            let path = entry.normalized_path();
            files.entry(fold_case(&path)).or_insert((
                path,
                [data_offset, decompressed_size, compressed_size],
            ));
        }
    }

    let blocks: IndexMap<String, (&str, BlockMeta)> = rebuilt
        .blocks()
        .iter()
        .filter(|block| !block.name.trim().is_empty())
        .map(|block| (fold_case(&block.name), (block.name.as_str(), block.meta)))
        .collect();

    let mut report = SyncReport {
        archive: archive.clone(),
        ..Default::default()
    };
    let mut patches: Vec<(u64, [u32; 3])> = Vec::new();

    {
        let index = PidxArchive::new(&mut *index)?;
        if index.header().table1_count <= 1 {
            return Err(Error::NotAnIndex);
        }

        report.signature = index
            .table1()
            .iter()
            .find(|entry| eq_ignore_case(&entry.name, &archive))
            .map(|entry| entry.record.name_offset());

        let mut matched_files = HashSet::new();
        match report.signature {
            Some(signature) => {
                let table2_offset = index.header().table2_offset as u64;
                for (i, entry) in index.table2().iter().enumerate() {
                    if entry.record.kind != Table2Record::FILE || entry.record.field08 != signature {
                        continue;
                    }

                    let path = entry.normalized_path();
                    let key = fold_case(&path);
                    match files.get(&key) {
                        Some((_, fields)) => {
                            let position =
                                table2_offset + i as u64 * TABLE2_RECORD_SIZE + FILE_FIELDS_OFFSET;
                            patches.push((position, *fields));
                            matched_files.insert(key);
                        }
                        None => report.mismatches.push(IndexMismatch::FileNotRebuilt {
                            archive: archive.clone(),
                            path,
                        }),
                    }
                }
                report.patched_files = patches.len();

                for (key, (path, _)) in &files {
                    if !matched_files.contains(key) {
                        report.mismatches.push(IndexMismatch::FileNotIndexed {
                            archive: archive.clone(),
                            path: path.clone(),
                        });
                    }
                }
            }
            None => report
                .mismatches
                .push(IndexMismatch::ArchiveNotIndexed(archive.clone())),
        }

        let mut matched_blocks = HashSet::new();
        for block in index.blocks() {
            let key = fold_case(&block.name);
            if block.name.trim().is_empty() {
                continue;
            }
            if let Some((_, meta)) = blocks.get(&key) {
                patches.push((
                    block.meta_position + BLOCK_FIELDS_OFFSET,
                    [meta.sub_offset, meta.sub_size, meta.entry_count],
                ));
                matched_blocks.insert(key);
                report.patched_blocks += 1;
            }
        }

        for (key, (name, _)) in &blocks {
            if !matched_blocks.contains(key) {
                report.mismatches.push(IndexMismatch::BlockNotIndexed {
                    archive: archive.clone(),
                    block: name.to_string(),
                });
            }
        }
    }

    for (position, fields) in patches {
        index.seek(SeekFrom::Start(position))?;
        for value in fields {
            index.write_u32::<LittleEndian>(value)?;
        }
    }
    index.flush()?;

    Ok(report)
}

/// Outcome of [`sync_all`]
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    /// One report per synchronized container
    pub reports: Vec<SyncReport>,
    /// Containers that could not be synchronized
    pub failures: Vec<ArchiveFailure>,
    /// Every progress line
    pub log: Vec<String>,
}

/// Write `packed/idx.dat` from `original/idx.dat`, patched for every rebuilt container
///
/// Containers listed in `list.json` without a file in `packed/` are skipped, and nothing is written
/// when the workspace holds no original index.
#[instrument(skip_all, err)]
pub fn sync_all(workspace: &Workspace, log: &LogSink<'_>) -> Result<SyncSummary> {
    let progress = Progress::new(log);
    let manifest = workspace.load_manifest()?;

    let mut summary = SyncSummary::default();

    let original = workspace.original_path(INDEX_NAME);
    if !original.is_file() {
        summary
            .log
            .push(progress.warn(format!("[IDX] original/{INDEX_NAME} is missing, skipping")));
        return Ok(summary);
    }
    let mut index = Cursor::new(fs::read(original)?);

    for name in manifest.archives.keys() {
        if eq_ignore_case(name, INDEX_NAME) {
            continue;
        }

        let packed = workspace.packed_path(name);
        if !packed.is_file() {
            debug!(name, "not rebuilt, skipping");
            continue;
        }

        let outcome = File::open(&packed)
            .map_err(Error::from)
            .and_then(|file| sync_index(BufReader::new(file), &mut index));

        match outcome {
            Ok(report) => {
                for mismatch in &report.mismatches {
                    summary.log.push(progress.warn(format!("[IDX] {mismatch}")));
                }
                summary.log.push(progress.info(format!(
                    "[IDX] {name}: {} files, {} blocks",
                    report.patched_files, report.patched_blocks
                )));
                summary.reports.push(report);
            }
            Err(err) => {
                summary
                    .log
                    .push(progress.warn(format!("[IDX] failed: {name} : {err}")));
                summary.failures.push(ArchiveFailure {
                    name: name.clone(),
                    message: err.to_string(),
                });
            }
        }
    }

    let mut output = File::create(workspace.packed_path(INDEX_NAME))?;
    output.write_all(index.get_ref())?;
    output.flush()?;

    Ok(summary)
}
