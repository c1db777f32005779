//! Base types for the structure of a PIDX container.

use binrw::{BinRead, BinWrite};

/// Size of the [`PidxHeader`] including its magic
pub const HEADER_SIZE: u64 = 0x28;

/// Size of a [`Table1Record`]
pub const TABLE1_RECORD_SIZE: u64 = 32;

/// Size of a [`Table2Record`]
pub const TABLE2_RECORD_SIZE: u64 = 24;

/// Size of a [`BlockMeta`]
pub const BLOCK_META_SIZE: u64 = 20;

/// Size of the [`FstsHeader`] fields readers rely on
pub const FSTS_HEADER_SIZE: u64 = 16;

/// Size of the full `FSTS` header written by the rebuilder
pub const FSTS_FULL_HEADER_SIZE: u64 = 0x20;

/// Size of an [`FstsRecord`]
pub const FSTS_RECORD_SIZE: u64 = 16;

/// Name offset marking a block without a name
pub const NO_NAME: u32 = u32::MAX;

/// PIDX container header
///
/// Every container starts with "PIDX" followed by the location of its three tables and its string
/// pool. All data is stored in little endian format.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"PIDX", little)]
pub struct PidxHeader {
    /// The offset of the Table-1 records
    pub table1_offset: u32,

    /// The number of Table-1 records
    pub table1_count: u32,

    /// The offset of the directory tree records
    pub table2_offset: u32,

    /// The number of directory tree records
    pub table2_count: u32,

    /// The number of directory tree records that are children of the root
    pub root_child_count: u32,

    /// The offset of the sub-index region
    pub table3_offset: u32,

    /// The size of the sub-index region
    pub table3_size: u32,

    /// The offset of the string pool
    pub string_pool_offset: u32,

    /// The size of the string pool
    pub string_pool_size: u32,
}

/// Table-1 record
///
/// Slot 0 references the name of a container, slots 4 to 7 are opaque.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Table1Record {
    /// Raw slots
    pub slots: [u32; 8],
}

impl Table1Record {
    /// Create a record naming a container, carrying the opaque tail values
    pub fn new(name_offset: u32, tail: [u32; 4]) -> Self {
        let mut slots = [0u32; 8];
        slots[0] = name_offset;
        slots[4..].copy_from_slice(&tail);
        Self { slots }
    }

    /// String pool offset of the container name
    ///
    /// Inside `idx.dat` this value is also the signature Table-2 files use to point at their
    /// container.
    pub fn name_offset(&self) -> u32 {
        self.slots[0]
    }

    /// The four opaque trailing slots
    pub fn tail(&self) -> [u32; 4] {
        [self.slots[4], self.slots[5], self.slots[6], self.slots[7]]
    }
}

/// Directory tree record
///
/// The meaning of the four trailing fields depends on [`Table2Record::kind`], see
/// [`Table2Record::directory`] and [`Table2Record::file`].
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Table2Record {
    /// 1 for directories, anything else is treated as a file
    pub kind: u32,

    /// The string pool offset of the entry name
    pub name_offset: u32,

    /// Child count, or the container signature for files
    pub field08: u32,

    /// Child start index, or the data offset for files
    pub field0c: u32,

    /// Decompressed size for files
    pub field10: u32,

    /// Compressed size for files, 0 when the payload is stored raw
    pub field14: u32,
}

impl Table2Record {
    /// Type value of directory records
    pub const DIRECTORY: u32 = 1;

    /// Type value of file records
    pub const FILE: u32 = 0;

    /// Create a directory record owning `child_count` records from `child_start`
    pub fn directory(name_offset: u32, child_start: u32, child_count: u32) -> Self {
        Self {
            kind: Self::DIRECTORY,
            name_offset,
            field08: child_count,
            field0c: child_start,
            field10: 0,
            field14: 0,
        }
    }

    /// Create a file record, the signature is left at 0 as in per-container tables
    pub fn file(
        name_offset: u32,
        data_offset: u32,
        decompressed_size: u32,
        compressed_size: u32,
    ) -> Self {
        Self {
            kind: Self::FILE,
            name_offset,
            field08: 0,
            field0c: data_offset,
            field10: decompressed_size,
            field14: compressed_size,
        }
    }

    /// Whether this record is a directory
    pub fn is_directory(&self) -> bool {
        self.kind == Self::DIRECTORY
    }
}

/// Sub-index block record stored in Table-3
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct BlockMeta {
    /// The string pool offset of the block name, [`NO_NAME`] when unnamed
    pub name_offset: u32,

    /// Always zero in known files
    pub reserved: u32,

    /// Offset of the `FSTS` sub-container
    pub sub_offset: u32,

    /// Size of the `FSTS` sub-container
    pub sub_size: u32,

    /// Number of entries in the `FSTS` sub-container
    pub entry_count: u32,
}

/// `FSTS` sub-container header
///
/// Offsets are relative to the start of the sub-container.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"FSTS", little)]
pub struct FstsHeader {
    /// The number of entries
    pub entry_count: u32,

    /// The offset of the first entry
    pub entries_offset: u32,

    /// The offset of the local string pool
    pub string_pool_offset: u32,
}

/// Trailing half of the `FSTS` header, written by the rebuilder but never read by the game
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct FstsHeaderTail {
    /// The size of the local string pool
    pub string_pool_size: u32,

    /// Padding
    pub reserved: [u32; 3],
}

/// `FSTS` entry
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct FstsRecord {
    /// Offset of the entry path inside the local string pool
    pub name_offset: u32,

    /// Offset of the payload from the start of the sub-container
    pub data_offset: u32,

    /// The size of the payload after decompression
    pub decompressed_size: u32,

    /// The stored size of the payload, 0 when stored raw
    pub compressed_size: u32,
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::{BinRead, BinWrite};
    use pretty_assertions::assert_eq;

    use crate::types::{
        BlockMeta, FstsHeader, FstsRecord, PidxHeader, Table1Record, Table2Record,
        HEADER_SIZE,
    };

    #[test]
    fn read_header() {
        #[rustfmt::skip]
        let input = [
            0x50, 0x49, 0x44, 0x58,
            0x30, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x50, 0x00, 0x00, 0x00,
            0x04, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0xB0, 0x00, 0x00, 0x00,
            0x04, 0x00, 0x00, 0x00,
            0xC0, 0x00, 0x00, 0x00,
            0x1C, 0x00, 0x00, 0x00,
        ];

        let header = PidxHeader::read(&mut Cursor::new(input)).unwrap();
        assert_eq!(
            header,
            PidxHeader {
                table1_offset: 0x30,
                table1_count: 1,
                table2_offset: 0x50,
                table2_count: 4,
                root_child_count: 2,
                table3_offset: 0xB0,
                table3_size: 4,
                string_pool_offset: 0xC0,
                string_pool_size: 0x1C,
            }
        );
    }

    #[test]
    fn header_size_matches_layout() {
        let mut writer = Cursor::new(Vec::new());
        PidxHeader::default().write(&mut writer).unwrap();
        assert_eq!(writer.into_inner().len() as u64, HEADER_SIZE);
    }

    #[test]
    fn reject_bad_header_magic() {
        let input = [0u8; 0x28];
        assert!(PidxHeader::read(&mut Cursor::new(input)).is_err());
    }

    #[test]
    fn table1_slots() {
        let record = Table1Record::new(0x10, [1, 2, 3, 4]);
        assert_eq!(record.name_offset(), 0x10);
        assert_eq!(record.tail(), [1, 2, 3, 4]);
        assert_eq!(record.slots, [0x10, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn write_directory_and_file_records() {
        let mut writer = Cursor::new(Vec::new());
        Table2Record::directory(0x0A, 2, 3).write(&mut writer).unwrap();
        Table2Record::file(0x0C, 0x800, 0x40, 0x20).write(&mut writer).unwrap();

        #[rustfmt::skip]
        let expected = vec![
            // Directory
            0x01, 0x00, 0x00, 0x00,
            0x0A, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            // File
            0x00, 0x00, 0x00, 0x00,
            0x0C, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x08, 0x00, 0x00,
            0x40, 0x00, 0x00, 0x00,
            0x20, 0x00, 0x00, 0x00,
        ];

        assert_eq!(writer.into_inner(), expected);
    }

    #[test]
    fn unknown_kinds_are_files() {
        let record = Table2Record {
            kind: 7,
            ..Default::default()
        };
        assert!(!record.is_directory());
    }

    #[test]
    fn read_block_meta_and_fsts() {
        #[rustfmt::skip]
        let input = [
            // Block meta
            0x08, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x10, 0x00, 0x00,
            0x60, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            // FSTS header
            0x46, 0x53, 0x54, 0x53,
            0x02, 0x00, 0x00, 0x00,
            0x20, 0x00, 0x00, 0x00,
            0x40, 0x00, 0x00, 0x00,
            // FSTS record
            0x05, 0x00, 0x00, 0x00,
            0x50, 0x00, 0x00, 0x00,
            0x10, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        let mut reader = Cursor::new(input);
        let meta = BlockMeta::read(&mut reader).unwrap();
        let header = FstsHeader::read(&mut reader).unwrap();
        let record = FstsRecord::read(&mut reader).unwrap();

        assert_eq!(meta.sub_offset, 0x1000);
        assert_eq!(meta.sub_size, 0x60);
        assert_eq!(meta.entry_count, 2);
        assert_eq!(
            header,
            FstsHeader {
                entry_count: 2,
                entries_offset: 0x20,
                string_pool_offset: 0x40,
            }
        );
        assert_eq!(record.data_offset, 0x50);
        assert_eq!(record.decompressed_size, 0x10);
    }
}
