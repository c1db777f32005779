//! Types for writing PIDX containers
//!
//! Writing happens in two steps. [`ContainerPlan::new`] lays out every table, string and payload
//! using the sizes reported by a [`SourceResolver`], then [`PidxWriter::write_plan`] streams the
//! container front to back.
//!
//! | Region          | Alignment | Contents                                                    |
//! |-----------------|-----------|-------------------------------------------------------------|
//! | Header          | 0         | [`PidxHeader`]                                              |
//! | Table-1         | 16        | A single record naming the container                        |
//! | Table-2         | 16        | The [`PathTree`] of the directory tree paths                |
//! | Table-3         | 16        | Block count, relative pointers, block records               |
//! | String pool     | 16        | Container name, tree names, block names                     |
//! | Payloads        | 2048      | One per Table-2 file, each on its own sector                |
//! | `FSTS` blocks   | 2048      | Header, entries, path pool, payloads aligned to 16          |

use binrw::BinWrite;
use byteorder::{LittleEndian, WriteBytesExt};
use std::{
    collections::HashSet,
    fmt::{self, Debug},
    io::{self, Read, Seek, Write},
};
use tracing::instrument;

use crate::{
    error::{Error, Result},
    manifest::ArchiveManifest,
    path::fold_case,
    source::{PathSource, SourceResolver, StoredSizes},
    strings::StringPool,
    tree::{PathTree, TreeNodeKind},
    types::{
        BlockMeta, FstsHeader, FstsHeaderTail, FstsRecord, PidxHeader, Table1Record,
        Table2Record, BLOCK_META_SIZE, FSTS_FULL_HEADER_SIZE, FSTS_RECORD_SIZE, HEADER_SIZE,
        TABLE1_RECORD_SIZE, TABLE2_RECORD_SIZE,
    },
};

/// Alignment of tables and string pools
pub const TABLE_ALIGNMENT: u64 = 16;

/// Alignment of payloads and `FSTS` sub-containers
pub const SECTOR_SIZE: u64 = 2048;

/// Round `value` up to a multiple of `alignment`
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) / alignment * alignment
}

fn to_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::ContainerTooLarge(value))
}

/// How many paths a rebuilt container holds and where their bytes come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// Distinct paths across Table-2 and every block, ignoring case
    pub total_paths: usize,
    /// Paths written from a replacement
    pub modified: usize,
    /// Paths copied from the original
    pub original: usize,
}

struct PlannedPayload<'a> {
    offset: u64,
    sizes: StoredSizes,
    source: &'a PathSource,
}

struct PlannedBlock<'a> {
    offset: u64,
    header: FstsHeader,
    tail: FstsHeaderTail,
    records: Vec<FstsRecord>,
    strings: StringPool,
    payloads: Vec<PlannedPayload<'a>>,
}

/// Fully resolved layout of a container
pub struct ContainerPlan<'a> {
    name: String,
    header: PidxHeader,
    table1: Table1Record,
    table2: Vec<Table2Record>,
    block_pointers: Vec<u32>,
    block_metas: Vec<BlockMeta>,
    strings: StringPool,
    payloads: Vec<PlannedPayload<'a>>,
    blocks: Vec<PlannedBlock<'a>>,
    len: u64,
    stats: RebuildStats,
}

impl Debug for ContainerPlan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ContainerPlan")
            .field("name", &self.name)
            .field("header", &self.header)
            .field("len", &self.len)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<'a> ContainerPlan<'a> {
    /// Lay out the container `name` as described by its manifest entry
    ///
    /// The name is stored lowercased. Fails when any path has no usable source.
    pub fn new(
        name: &str,
        manifest: &ArchiveManifest,
        resolver: &'a dyn SourceResolver,
    ) -> Result<Self> {
        let name = name.to_lowercase();
        let tree = PathTree::build(manifest.table2_paths());
        let blocks = manifest.blocks();

        let mut strings = StringPool::new();
        let name_offset = strings.insert(&name);
        let node_names: Vec<u32> = tree
            .nodes()
            .iter()
            .map(|node| strings.insert(&node.name))
            .collect();
        let block_names: Vec<u32> = blocks
            .iter()
            .map(|(block, _)| strings.insert(block))
            .collect();

        let table1_offset = align_up(HEADER_SIZE, TABLE_ALIGNMENT);
        let mut cursor = table1_offset + TABLE1_RECORD_SIZE;

        let table2_offset = align_up(cursor, TABLE_ALIGNMENT);
        if !tree.is_empty() {
            cursor = table2_offset + tree.len() as u64 * TABLE2_RECORD_SIZE;
        }

        let table3_offset = align_up(cursor, TABLE_ALIGNMENT);
        let table3_size = 4 + blocks.len() as u64 * (4 + BLOCK_META_SIZE);
        let string_pool_offset = align_up(table3_offset + table3_size, TABLE_ALIGNMENT);

        let mut len = string_pool_offset + strings.len() as u64;
        cursor = align_up(len, SECTOR_SIZE);

        let mut table2 = Vec::with_capacity(tree.len());
        let mut payloads = Vec::new();
        for (node, name_offset) in tree.nodes().iter().zip(node_names) {
            match &node.kind {
                TreeNodeKind::Directory {
                    child_start,
                    child_count,
                } => table2.push(Table2Record::directory(
                    name_offset,
                    *child_start,
                    *child_count,
                )),
                TreeNodeKind::File { path } => {
                    let source = resolver.resolve(path)?;
                    let sizes = source.sizes()?;
                    table2.push(Table2Record::file(
                        name_offset,
                        to_u32(cursor)?,
                        to_u32(sizes.decompressed)?,
                        to_u32(sizes.compressed)?,
                    ));
                    payloads.push(PlannedPayload {
                        offset: cursor,
                        sizes,
                        source,
                    });
                    len = cursor + sizes.stored;
                    cursor = align_up(len, SECTOR_SIZE);
                }
            }
        }

        let mut block_pointers = Vec::with_capacity(blocks.len());
        let mut block_metas = Vec::with_capacity(blocks.len());
        let mut planned_blocks = Vec::with_capacity(blocks.len());
        let metas_start = 4 + blocks.len() as u64 * 4;

        for (i, ((_, paths), block_name)) in blocks.iter().zip(block_names).enumerate() {
            let offset = align_up(cursor, SECTOR_SIZE);
            let block = Self::plan_block(offset, paths, resolver)?;
            let end = block
                .payloads
                .last()
                .map(|payload| payload.offset + payload.sizes.stored)
                .unwrap_or(offset + FSTS_FULL_HEADER_SIZE);

            block_pointers.push(to_u32(metas_start + i as u64 * BLOCK_META_SIZE)?);
            block_metas.push(BlockMeta {
                name_offset: block_name,
                reserved: 0,
                sub_offset: to_u32(offset)?,
                sub_size: to_u32(end - offset)?,
                entry_count: to_u32(paths.len() as u64)?,
            });
            planned_blocks.push(block);

            len = end;
            cursor = end;
        }
        to_u32(len)?;

        let header = PidxHeader {
            table1_offset: to_u32(table1_offset)?,
            table1_count: 1,
            table2_offset: to_u32(table2_offset)?,
            table2_count: tree.len() as u32,
            root_child_count: tree.root_child_count(),
            table3_offset: to_u32(table3_offset)?,
            table3_size: to_u32(table3_size)?,
            string_pool_offset: to_u32(string_pool_offset)?,
            string_pool_size: to_u32(strings.len() as u64)?,
        };

        let stats = Self::collect_stats(manifest, resolver)?;

        Ok(Self {
            name,
            header,
            table1: Table1Record::new(name_offset, manifest.table1_tail()),
            table2,
            block_pointers,
            block_metas,
            strings,
            payloads,
            blocks: planned_blocks,
            len,
            stats,
        })
    }

    fn plan_block(
        offset: u64,
        paths: &[String],
        resolver: &'a dyn SourceResolver,
    ) -> Result<PlannedBlock<'a>> {
        let mut strings = StringPool::new();
        let name_offsets: Vec<u32> = paths.iter().map(|path| strings.insert(path)).collect();

        let entries_offset = FSTS_FULL_HEADER_SIZE;
        let string_pool_offset = entries_offset + paths.len() as u64 * FSTS_RECORD_SIZE;
        let mut local = align_up(
            offset + string_pool_offset + strings.len() as u64,
            TABLE_ALIGNMENT,
        );

        let mut records = Vec::with_capacity(paths.len());
        let mut payloads = Vec::with_capacity(paths.len());
        for (path, name_offset) in paths.iter().zip(name_offsets) {
            let source = resolver.resolve(path)?;
            let sizes = source.sizes()?;
            local = align_up(local, TABLE_ALIGNMENT);

            records.push(FstsRecord {
                name_offset,
                data_offset: to_u32(local - offset)?,
                decompressed_size: to_u32(sizes.decompressed)?,
                compressed_size: to_u32(sizes.compressed)?,
            });
            payloads.push(PlannedPayload {
                offset: local,
                sizes,
                source,
            });
            local += sizes.stored;
        }

        Ok(PlannedBlock {
            offset,
            header: FstsHeader {
                entry_count: to_u32(paths.len() as u64)?,
                entries_offset: entries_offset as u32,
                string_pool_offset: to_u32(string_pool_offset)?,
            },
            tail: FstsHeaderTail {
                string_pool_size: to_u32(strings.len() as u64)?,
                reserved: [0; 3],
            },
            records,
            strings,
            payloads,
        })
    }

    fn collect_stats(
        manifest: &ArchiveManifest,
        resolver: &'a dyn SourceResolver,
    ) -> Result<RebuildStats> {
        let mut seen = HashSet::new();
        let mut stats = RebuildStats::default();
        let paths = manifest
            .table2_paths()
            .into_iter()
            .chain(manifest.blocks().into_iter().flat_map(|(_, paths)| paths));

        for path in paths {
            if !seen.insert(fold_case(&path)) {
                continue;
            }
            stats.total_paths += 1;
            if resolver.resolve(&path)?.is_modified() {
                stats.modified += 1;
            } else {
                stats.original += 1;
            }
        }

        Ok(stats)
    }

    /// The lowercased container name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The header that will be written
    pub fn header(&self) -> &PidxHeader {
        &self.header
    }

    /// The Table-2 records that will be written
    pub fn table2(&self) -> &[Table2Record] {
        &self.table2
    }

    /// The block records that will be written
    pub fn blocks(&self) -> &[BlockMeta] {
        &self.block_metas
    }

    /// Offsets of the Table-2 payloads, in table order
    pub fn payload_offsets(&self) -> impl Iterator<Item = u64> + '_ {
        self.payloads.iter().map(|payload| payload.offset)
    }

    /// Size of the finished container
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the container holds nothing but its header
    pub fn is_empty(&self) -> bool {
        self.len <= HEADER_SIZE
    }

    /// Counts of the paths in this container
    pub fn stats(&self) -> RebuildStats {
        self.stats
    }
}

/// PIDX container generator
///
/// ```
/// # fn doit() -> ga2_pidx::error::Result<()>
/// # {
/// use ga2_pidx::{ArchiveManifest, ContainerPlan, PathSource, PathSourceMap, PidxWriter};
///
/// let mut sources = PathSourceMap::new();
/// sources.insert(PathSource::new("scn/ev01.scn", None, Some(b"text".to_vec())));
///
/// let manifest = ArchiveManifest {
///     tab2: vec!["scn/ev01.scn".to_owned()],
///     ..Default::default()
/// };
/// let plan = ContainerPlan::new("adv.dat", &manifest, &sources)?;
///
/// // We use a buffer here, though you'd normally use a `File`
/// let buffer = PidxWriter::new(std::io::Cursor::new(Vec::new())).write_plan(&plan)?;
/// assert_eq!(buffer.into_inner().len() as u64, plan.len());
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct PidxWriter<W: Write + Seek> {
    inner: W,
}

impl<W: Write + Seek> PidxWriter<W> {
    /// Write to `inner`, which should be empty
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write every region of `plan` in file order and return the inner writer
    #[instrument(skip_all, fields(name = plan.name()), err)]
    pub fn write_plan(mut self, plan: &ContainerPlan<'_>) -> Result<W> {
        self.inner.rewind()?;
        plan.header.write(&mut self.inner)?;

        self.pad_to(plan.header.table1_offset as u64)?;
        plan.table1.write(&mut self.inner)?;

        if !plan.table2.is_empty() {
            self.pad_to(plan.header.table2_offset as u64)?;
            for record in &plan.table2 {
                record.write(&mut self.inner)?;
            }
        }

        self.pad_to(plan.header.table3_offset as u64)?;
        self.inner
            .write_u32::<LittleEndian>(plan.block_metas.len() as u32)?;
        for pointer in &plan.block_pointers {
            self.inner.write_u32::<LittleEndian>(*pointer)?;
        }
        for meta in &plan.block_metas {
            meta.write(&mut self.inner)?;
        }

        self.pad_to(plan.header.string_pool_offset as u64)?;
        self.inner.write_all(plan.strings.as_bytes())?;

        for payload in &plan.payloads {
            self.write_payload(payload)?;
        }

        for block in &plan.blocks {
            self.pad_to(block.offset)?;
            block.header.write(&mut self.inner)?;
            block.tail.write(&mut self.inner)?;

            self.pad_to(block.offset + block.header.entries_offset as u64)?;
            for record in &block.records {
                record.write(&mut self.inner)?;
            }

            self.pad_to(block.offset + block.header.string_pool_offset as u64)?;
            self.inner.write_all(block.strings.as_bytes())?;

            for payload in &block.payloads {
                self.write_payload(payload)?;
            }
        }

        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_payload(&mut self, payload: &PlannedPayload<'_>) -> Result<()> {
        self.pad_to(payload.offset)?;
        let written = payload.source.write_to(&mut self.inner)?;
        if written != payload.sizes.stored {
            return Err(Error::SourceFailed {
                path: payload.source.path().to_owned(),
                reason: format!(
                    "expected {} bytes but wrote {written}",
                    payload.sizes.stored
                ),
            });
        }
        Ok(())
    }

    fn pad_to(&mut self, offset: u64) -> Result<()> {
        let position = self.inner.stream_position()?;
        if offset < position {
            return Err(Error::CustomError(format!(
                "region at {offset:#x} overlaps data ending at {position:#x}"
            )));
        }
        io::copy(&mut io::repeat(0).take(offset - position), &mut self.inner)?;
        Ok(())
    }
}
