//! This library handles reading, rebuilding and indexing **PIDX** containers used by *Galaxy Angel II*.
//!
//! # PIDX Container Format Documentation
//!
//! The game keeps its localized assets in `.dat` containers. Every container starts with a `PIDX`
//! header and describes its contents twice over: a directory tree (Table-2) and a list of named
//! sub-indices (Table-3), each of which embeds a small `FSTS` file table. A separate `idx.dat`
//! container, using the same layout, indexes every other container and must be kept consistent with
//! them.
//!
//! ## File Structure
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "PIDX"                                            |
//! | 0x0004         | Table-1 Offset         | 4 bytes: Offset of the Table-1 records                     |
//! | 0x0008         | Table-1 Count          | 4 bytes: Number of 32 byte Table-1 records                 |
//! | 0x000C         | Table-2 Offset         | 4 bytes: Offset of the directory tree                      |
//! | 0x0010         | Table-2 Count          | 4 bytes: Number of 24 byte Table-2 records                 |
//! | 0x0014         | Root Child Count       | 4 bytes: Number of Table-2 records at the root             |
//! | 0x0018         | Table-3 Offset         | 4 bytes: Offset of the sub-index region                    |
//! | 0x001C         | Table-3 Size           | 4 bytes: Size of the sub-index region                      |
//! | 0x0020         | String Pool Offset     | 4 bytes: Offset of the string pool                         |
//! | 0x0024         | String Pool Size       | 4 bytes: Size of the string pool                           |
//!
//! ### Table-1
//!
//! Eight 32-bit slots per record. Slot 0 is a string pool reference naming the container, slots 4
//! to 7 hold values whose meaning is unknown and which are carried through rebuilds untouched. A
//! regular container has a single record; `idx.dat` has one per indexed container and the string
//! offset in slot 0 doubles as that container's *signature*.
//!
//! ### Table-2
//!
//! | Offset (bytes) | Directory              | File                                                       |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Type: 1                | Type: 0                                                    |
//! | 0x0004         | Name offset            | Name offset                                                |
//! | 0x0008         | Child count            | Signature (only used by `idx.dat`)                         |
//! | 0x000C         | Child start index      | Data offset                                                |
//! | 0x0010         | Unused                 | Decompressed size                                          |
//! | 0x0014         | Unused                 | Compressed size, 0 when stored raw                         |
//!
//! The children of a directory occupy a contiguous index range. The first **Root Child Count**
//! records are the children of the implicit root.
//!
//! ### Table-3
//!
//! A block count, followed by that many pointers relative to the start of Table-3, each addressing
//! a 20 byte block record: name offset, reserved, `FSTS` offset, `FSTS` size and entry count.
//!
//! An `FSTS` sub-container starts with its magic, an entry count, the offset of its entries and the
//! offset of its string pool, all relative to the sub-container. Entries are 16 bytes: name offset,
//! data offset, decompressed size and compressed size.
//!
//! ### String Pool
//!
//! NUL terminated Shift_JIS strings, referenced by their byte offset from the start of the pool.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.dat`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Alignment**: tables and string pools start on 16 byte boundaries, stored payloads and `FSTS`
//!   sub-containers start on 2048 byte sector boundaries
//! - **Payloads**: usually wrapped in ARZ streams, see the `ga2_arz` crate
//!

pub mod error;
pub mod manifest;
pub mod path;
pub mod progress;
pub mod read;
pub mod rebuild;
pub mod source;
pub mod strings;
pub mod sync;
pub mod tree;
pub mod types;
pub mod workspace;
pub mod write;

pub use manifest::{ArchiveManifest, WorkspaceManifest};
pub use read::PidxArchive;
pub use source::{PathSource, PathSourceMap, SourceResolver};
pub use sync::sync_index;
pub use tree::PathTree;
pub use workspace::{Workspace, WorkspaceBuilder};
pub use write::{ContainerPlan, PidxWriter};
