//! Types for reading PIDX containers
//!

use binrw::BinRead;
use indexmap::IndexMap;
use std::{
    borrow::Cow,
    fmt::{self, Debug},
    io::{self, Read, Seek, SeekFrom},
    ops::Range,
    sync::Arc,
};
use tracing::{debug, warn};

use crate::{
    error::{Error, MalformedContainer, Result},
    manifest::ArchiveManifest,
    path::{fold_case, normalize_path},
    strings::StringReader,
    tree::{resolve_paths, TreeLinks},
    types::{
        BlockMeta, FstsHeader, FstsRecord, PidxHeader, Table1Record, Table2Record,
        BLOCK_META_SIZE, FSTS_HEADER_SIZE, FSTS_RECORD_SIZE, HEADER_SIZE, NO_NAME,
        TABLE1_RECORD_SIZE, TABLE2_RECORD_SIZE,
    },
};

/// A struct for reading a payload from a PIDX container
///
/// Reading yields the bytes as stored, use [`PidxFile::read_decompressed`] to unwrap ARZ payloads.
pub struct PidxFile<'a, R: Read + Seek> {
    data: Cow<'a, PidxFileData>,
    reader: io::Take<&'a mut R>,
}

impl<R: Read + Seek> Debug for PidxFile<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PidxFile({:#?})", self.data.as_ref())
    }
}

impl<R: Read + Seek> PidxFile<'_, R> {
    /// Get the normalized path of the file
    ///
    /// # Warnings
    ///
    /// Paths come straight from the container and may contain `..` components. Check them before
    /// using them to write outside of a chosen directory.
    pub fn path(&self) -> &str {
        &self.data.path
    }

    /// Get the number of bytes stored in the container
    pub fn stored_size(&self) -> u64 {
        self.data.stored_size()
    }

    /// Get the size of the file, in bytes, when decompressed
    pub fn size(&self) -> u64 {
        self.data.decompressed_size
    }

    /// Get the starting offset of the data of the file
    pub fn data_start(&self) -> u64 {
        self.data.data_start
    }

    /// Whether the payload is recorded as compressed
    pub fn is_compressed(&self) -> bool {
        self.data.is_compressed()
    }

    /// Read the whole payload, decompressing it when it is a valid ARZ stream
    ///
    /// Payloads that fail to decompress are returned as stored.
    pub fn read_decompressed(mut self) -> Result<Vec<u8>> {
        let mut stored = Vec::with_capacity(self.stored_size() as usize);
        self.read_to_end(&mut stored)?;
        Ok(ga2_arz::decompress_or_raw(&stored).into_owned())
    }
}

impl<R: Read + Seek> Read for PidxFile<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Location and sizes of a payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PidxFileData {
    /// Normalized path of the file
    pub path: Box<str>,
    /// Absolute offset of the payload
    pub data_start: u64,
    /// Size of the payload in the container, 0 when stored raw
    pub compressed_size: u64,
    /// Size of the payload after decompression
    pub decompressed_size: u64,
}

impl PidxFileData {
    /// The number of bytes occupied in the container
    pub fn stored_size(&self) -> u64 {
        if self.compressed_size != 0 {
            self.compressed_size
        } else {
            self.decompressed_size
        }
    }

    /// Whether the payload is recorded as compressed
    pub fn is_compressed(&self) -> bool {
        self.compressed_size != 0
    }
}

/// A typed view of a Table-2 record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory
    Directory {
        /// Index of the first child
        child_start: u32,
        /// Number of children
        child_count: u32,
    },

    /// A file
    File {
        /// Container signature, only set in the global index
        signature: u32,
        /// Offset of the payload
        data_offset: u32,
        /// Size after decompression
        decompressed_size: u32,
        /// Stored size, 0 when stored raw
        compressed_size: u32,
    },
}

impl From<&Table2Record> for EntryKind {
    fn from(record: &Table2Record) -> Self {
        if record.is_directory() {
            EntryKind::Directory {
                child_start: record.field0c,
                child_count: record.field08,
            }
        } else {
            EntryKind::File {
                signature: record.field08,
                data_offset: record.field0c,
                decompressed_size: record.field10,
                compressed_size: record.field14,
            }
        }
    }
}

/// Table-2 record with its resolved name and path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table2Entry {
    /// The record as stored
    pub record: Table2Record,
    /// The entry name
    pub name: String,
    /// The full path, if the entry is reachable from the root
    pub path: Option<String>,
}

impl Table2Entry {
    /// The typed record
    pub fn kind(&self) -> EntryKind {
        EntryKind::from(&self.record)
    }

    /// The normalized path, falling back to the name for unreachable entries
    pub fn normalized_path(&self) -> String {
        normalize_path(self.path.as_deref().unwrap_or(&self.name))
    }
}

impl TreeLinks for Table2Entry {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> Option<Range<u64>> {
        match self.kind() {
            EntryKind::Directory {
                child_start,
                child_count,
            } => Some(child_start as u64..child_start as u64 + child_count as u64),
            EntryKind::File { .. } => None,
        }
    }
}

/// Table-1 record with its resolved name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table1Entry {
    /// The record as stored
    pub record: Table1Record,
    /// The name referenced by slot 0
    pub name: String,
}

/// A Table-3 sub-index block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubIndexBlock {
    /// The block name, empty for unnamed blocks
    pub name: String,
    /// Absolute offset of the block record
    pub meta_position: u64,
    /// The block record as stored
    pub meta: BlockMeta,
    /// The `FSTS` entries, `None` when the sub-container could not be read
    pub files: Option<Vec<PidxFileData>>,
}

#[derive(Debug)]
pub(crate) struct Shared {
    header: PidxHeader,
    len: u64,
    table1: Vec<Table1Entry>,
    table2: Vec<Table2Entry>,
    blocks: Vec<SubIndexBlock>,
    files: IndexMap<String, PidxFileData>,
}

/// PIDX container reader
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_pidx_contents(reader: impl Read + Seek) -> ga2_pidx::error::Result<()> {
///     let mut pidx = ga2_pidx::PidxArchive::new(reader)?;
///
///     for i in 0..pidx.len() {
///         let file = pidx.by_index(i)?;
///         println!("{} ({} bytes)", file.path(), file.size());
///     }
///
///     Ok(())
/// }
/// ```
pub struct PidxArchive<R> {
    reader: R,
    shared: Arc<Shared>,
}

impl<R> PidxArchive<R> {
    /// The container header
    pub fn header(&self) -> &PidxHeader {
        &self.shared.header
    }

    /// Length of the underlying file
    pub fn file_len(&self) -> u64 {
        self.shared.len
    }

    /// The declared name of the container, taken from the first Table-1 record
    pub fn name(&self) -> &str {
        self.shared
            .table1
            .first()
            .map(|entry| entry.name.as_str())
            .unwrap_or_default()
    }

    /// The Table-1 records
    pub fn table1(&self) -> &[Table1Entry] {
        &self.shared.table1
    }

    /// The Table-2 records in table order
    pub fn table2(&self) -> &[Table2Entry] {
        &self.shared.table2
    }

    /// The Table-3 blocks, including those whose sub-container could not be read
    pub fn blocks(&self) -> &[SubIndexBlock] {
        &self.shared.blocks
    }

    /// Number of Table-2 files in this container
    pub fn len(&self) -> usize {
        self.shared.files.len()
    }

    /// Whether this container has no Table-2 files
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over the paths of all Table-2 files
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.shared.files.values().map(|data| data.path.as_ref())
    }

    /// Returns an iterator over all Table-2 files
    pub fn files(&self) -> impl Iterator<Item = &PidxFileData> {
        self.shared.files.values()
    }

    /// Get the index of a Table-2 file by path, ignoring case
    pub fn index_for_name(&self, path: &str) -> Option<usize> {
        self.shared
            .files
            .get_index_of(&fold_case(&normalize_path(path)))
    }

    /// Describe the container as a workspace manifest entry
    ///
    /// Only blocks whose sub-container could be read are listed. Blocks without a name are called
    /// `block_N`, where `N` counts listed blocks.
    pub fn manifest(&self) -> ArchiveManifest {
        let tab1 = self
            .shared
            .table1
            .first()
            .map(|entry| entry.record.tail().to_vec())
            .unwrap_or_else(|| vec![0; 4]);

        let tab2 = self
            .shared
            .table2
            .iter()
            .filter(|entry| matches!(entry.kind(), EntryKind::File { .. }))
            .map(Table2Entry::normalized_path)
            .filter(|path| !path.is_empty())
            .collect();

        let mut tab3 = IndexMap::new();
        let readable = self.shared.blocks.iter().filter_map(|block| {
            block.files.as_ref().map(|files| (block.name.as_str(), files))
        });
        for (i, (name, files)) in readable.enumerate() {
            let name = if name.trim().is_empty() {
                format!("block_{i}")
            } else {
                name.to_owned()
            };
            let paths = files
                .iter()
                .map(|file| file.path.to_string())
                .filter(|path| !path.is_empty())
                .collect();
            tab3.insert(name, paths);
        }

        ArchiveManifest { tab1, tab2, tab3 }
    }
}

impl<R: Read + Seek> PidxArchive<R> {
    /// Read a PIDX container collecting the tables it contains.
    pub fn new(mut reader: R) -> Result<PidxArchive<R>> {
        let shared = Self::get_metadata(&mut reader)?;
        Ok(PidxArchive {
            reader,
            shared: shared.into(),
        })
    }

    /// Search for a Table-2 file by path, ignoring case
    pub fn by_name(&mut self, path: &str) -> Result<PidxFile<'_, R>> {
        let Some(index) = self.index_for_name(path) else {
            return Err(Error::CustomError(format!("{path} is not in the container")));
        };
        self.by_index(index)
    }

    /// Get a Table-2 file by index
    pub fn by_index(&mut self, file_number: usize) -> Result<PidxFile<'_, R>> {
        let (_, data) = self.shared.files.get_index(file_number).ok_or_else(|| {
            Error::CustomError(format!("no file with index {file_number} in the container"))
        })?;

        Self::open_at(&mut self.reader, Cow::Borrowed(data))
    }

    /// Open any payload of this container, such as an `FSTS` entry from [`PidxArchive::blocks`]
    pub fn open(&mut self, data: &PidxFileData) -> Result<PidxFile<'_, R>> {
        Self::open_at(&mut self.reader, Cow::Owned(data.clone()))
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn open_at<'a>(reader: &'a mut R, data: Cow<'a, PidxFileData>) -> Result<PidxFile<'a, R>> {
        reader.seek(SeekFrom::Start(data.data_start))?;
        let stored_size = data.stored_size();
        Ok(PidxFile {
            reader: reader.take(stored_size),
            data,
        })
    }

    fn check_region(table: &'static str, start: u64, size: u64, len: u64) -> Result<()> {
        let end = start.saturating_add(size);
        if end > len {
            return Err(MalformedContainer::OutOfBounds {
                table,
                start,
                end,
                len,
            }
            .into());
        }
        Ok(())
    }

    fn get_header(reader: &mut R, len: u64) -> Result<PidxHeader> {
        if len < HEADER_SIZE {
            return Err(MalformedContainer::TooShort(len).into());
        }

        reader.seek(SeekFrom::Start(0))?;
        PidxHeader::read(reader).map_err(|err| match err {
            binrw::Error::BadMagic { .. } => MalformedContainer::BadMagic.into(),
            err => err.into(),
        })
    }

    fn get_table1(
        reader: &mut R,
        header: &PidxHeader,
        strings: &mut StringReader,
        len: u64,
    ) -> Result<Vec<Table1Entry>> {
        let start = header.table1_offset as u64;
        let count = header.table1_count as u64;
        Self::check_region("table-1", start, count * TABLE1_RECORD_SIZE, len)?;

        let pool = header.string_pool_offset as u64;
        (0..count)
            .map(|i| {
                reader.seek(SeekFrom::Start(start + i * TABLE1_RECORD_SIZE))?;
                let record = Table1Record::read(reader)?;
                let name = strings.read_at(reader, pool + record.name_offset() as u64)?;
                Ok(Table1Entry { record, name })
            })
            .collect()
    }

    fn get_table2(
        reader: &mut R,
        header: &PidxHeader,
        strings: &mut StringReader,
        len: u64,
    ) -> Result<Vec<Table2Entry>> {
        let start = header.table2_offset as u64;
        let count = header.table2_count as u64;
        if count == 0 {
            return Ok(Vec::new());
        }
        Self::check_region("table-2", start, count * TABLE2_RECORD_SIZE, len)?;

        reader.seek(SeekFrom::Start(start))?;
        let records = (0..count)
            .map(|_| Table2Record::read(reader).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        let pool = header.string_pool_offset as u64;
        let mut entries = records
            .into_iter()
            .map(|record| {
                let name = strings.read_at(reader, pool + record.name_offset as u64)?;
                Ok(Table2Entry {
                    record,
                    name,
                    path: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let paths = resolve_paths(&entries, header.root_child_count);
        for (entry, path) in entries.iter_mut().zip(paths) {
            entry.path = path;
        }

        Ok(entries)
    }

    fn get_fsts_entries(
        reader: &mut R,
        meta: &BlockMeta,
        strings: &mut StringReader,
        len: u64,
    ) -> Result<Option<Vec<PidxFileData>>> {
        let base = meta.sub_offset as u64;
        if base + FSTS_HEADER_SIZE > len {
            debug!(offset = base, "FSTS header lies outside the file");
            return Ok(None);
        }

        reader.seek(SeekFrom::Start(base))?;
        let fsts = match FstsHeader::read(reader) {
            Ok(fsts) => fsts,
            Err(binrw::Error::BadMagic { .. }) => {
                debug!(offset = base, "missing FSTS magic");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let entries_start = base + fsts.entries_offset as u64;
        let pool = base + fsts.string_pool_offset as u64;
        let mut files = Vec::with_capacity(fsts.entry_count.min(0x10000) as usize);

        for i in 0..fsts.entry_count as u64 {
            let position = entries_start + i * FSTS_RECORD_SIZE;
            if position + FSTS_RECORD_SIZE > len {
                warn!(offset = base, "FSTS entries run past the end of the file");
                break;
            }

            reader.seek(SeekFrom::Start(position))?;
            let record = FstsRecord::read(reader)?;
            let name = strings.read_at(reader, pool + record.name_offset as u64)?;

            files.push(PidxFileData {
                path: normalize_path(&name).into(),
                data_start: base + record.data_offset as u64,
                compressed_size: record.compressed_size as u64,
                decompressed_size: record.decompressed_size as u64,
            });
        }

        Ok(Some(files))
    }

    fn get_blocks(
        reader: &mut R,
        header: &PidxHeader,
        strings: &mut StringReader,
        len: u64,
    ) -> Result<Vec<SubIndexBlock>> {
        if header.table3_size == 0 {
            return Ok(Vec::new());
        }

        let start = header.table3_offset as u64;
        Self::check_region("table-3", start, 4, len)?;
        reader.seek(SeekFrom::Start(start))?;
        let count = u32::read_le(reader)? as u64;

        Self::check_region("table-3 pointers", start + 4, count * 4, len)?;
        let pointers = (0..count)
            .map(|_| u32::read_le(reader).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        let pool = header.string_pool_offset as u64;
        let mut blocks = Vec::with_capacity(pointers.len());
        for pointer in pointers {
            let meta_position = start + pointer as u64;
            if meta_position + BLOCK_META_SIZE > len {
                warn!(offset = meta_position, "block record lies outside the file");
                continue;
            }

            reader.seek(SeekFrom::Start(meta_position))?;
            let meta = BlockMeta::read(reader)?;
            let name = if meta.name_offset == NO_NAME || pool == 0 {
                String::new()
            } else {
                strings.read_at(reader, pool + meta.name_offset as u64)?
            };
            let files = Self::get_fsts_entries(reader, &meta, strings, len)?;

            blocks.push(SubIndexBlock {
                name,
                meta_position,
                meta,
                files,
            });
        }

        Ok(blocks)
    }

    fn get_metadata(reader: &mut R) -> Result<Shared> {
        let len = reader.seek(SeekFrom::End(0))?;
        let header = Self::get_header(reader, len)?;
        let mut strings = StringReader::new(len);

        let table1 = Self::get_table1(reader, &header, &mut strings, len)?;
        let table2 = Self::get_table2(reader, &header, &mut strings, len)?;
        let blocks = Self::get_blocks(reader, &header, &mut strings, len)?;

        let mut files = IndexMap::new();
        for entry in &table2 {
            let EntryKind::File {
                data_offset,
                decompressed_size,
                compressed_size,
                ..
            } = entry.kind()
            else {
                continue;
            };

            let path = entry.normalized_path();
            if path.is_empty() {
                continue;
            }
            files.entry(fold_case(&path)).or_insert(PidxFileData {
                path: path.into(),
                data_start: data_offset as u64,
                compressed_size: compressed_size as u64,
                decompressed_size: decompressed_size as u64,
            });
        }

        Ok(Shared {
            header,
            len,
            table1,
            table2,
            blocks,
            files,
        })
    }
}
