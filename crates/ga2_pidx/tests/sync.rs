use std::io::{Cursor, Seek, SeekFrom, Write};

use binrw::BinWrite;
use ga2_pidx::{
    error::{Error, Result},
    source::OriginalSource,
    sync::IndexMismatch,
    types::{BlockMeta, PidxHeader, Table1Record, Table2Record},
    ArchiveManifest, ContainerPlan, PathSource, PathSourceMap, PidxArchive, PidxWriter,
};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

/// String pool offset of "adv.dat" in the index, the signature of its files
const ADV_SIGNATURE: u32 = 8;
const SYS_SIGNATURE: u32 = 16;

/// Where the fields of the "x/y.tbl" record start
const Y_FIELDS: usize = 0x88 + 24 + 12;
/// Where the fields of the "list" block record start
const LIST_FIELDS: usize = 0xD0 + 8 + 8;

/// An index listing "idx.dat", "adv.dat" and "sys.dat"
///
/// Its tree holds "x/y.tbl" from adv.dat and "x/z.tbl" from sys.dat, and a single block named
/// "list" whose sub-container lies outside the file.
fn index_bytes() -> Vec<u8> {
    let strings = b"idx.dat\0adv.dat\0sys.dat\0x\0y.tbl\0z.tbl\0list\0";
    let mut writer = Cursor::new(Vec::new());

    PidxHeader {
        table1_offset: 0x28,
        table1_count: 3,
        table2_offset: 0x88,
        table2_count: 3,
        root_child_count: 1,
        table3_offset: 0xD0,
        table3_size: 28,
        string_pool_offset: 0xEC,
        string_pool_size: strings.len() as u32,
    }
    .write(&mut writer)
    .unwrap();

    for (name, tail) in [(0, [1, 2, 3, 4]), (8, [5, 6, 7, 8]), (16, [9, 10, 11, 12])] {
        Table1Record::new(name, tail).write(&mut writer).unwrap();
    }

    Table2Record::directory(24, 1, 2).write(&mut writer).unwrap();
    Table2Record {
        field08: ADV_SIGNATURE,
        ..Table2Record::file(26, 0x9000, 10, 8)
    }
    .write(&mut writer)
    .unwrap();
    Table2Record {
        field08: SYS_SIGNATURE,
        ..Table2Record::file(32, 0xA000, 5, 0)
    }
    .write(&mut writer)
    .unwrap();

    1u32.write_le(&mut writer).unwrap();
    8u32.write_le(&mut writer).unwrap();
    BlockMeta {
        name_offset: 38,
        reserved: 0,
        sub_offset: 0xB000,
        sub_size: 0x40,
        entry_count: 1,
    }
    .write(&mut writer)
    .unwrap();

    assert_eq!(writer.stream_position().unwrap(), 0xEC);
    writer.write_all(strings).unwrap();
    writer.into_inner()
}

/// A container named `name` holding raw `paths`, all of them also listed in a block "list"
fn rebuilt_container(name: &str, paths: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let mut sources = PathSourceMap::new();
    for (path, bytes) in paths {
        sources.insert(PathSource::new(
            path,
            Some(OriginalSource::from_bytes(bytes.to_vec())),
            None,
        ));
    }

    let names: Vec<String> = paths.iter().map(|(path, _)| path.to_string()).collect();
    let mut tab3 = IndexMap::new();
    tab3.insert("list".to_owned(), names.clone());
    let manifest = ArchiveManifest {
        tab1: vec![0, 0, 0, 0],
        tab2: names,
        tab3,
    };

    let plan = ContainerPlan::new(name, &manifest, &sources)?;
    let output = PidxWriter::new(Cursor::new(Vec::new())).write_plan(&plan)?;
    Ok(output.into_inner())
}

fn read_u32s(bytes: &[u8], start: usize) -> [u32; 3] {
    let mut values = [0u32; 3];
    for (i, value) in values.iter_mut().enumerate() {
        let at = start + i * 4;
        *value = u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    }
    values
}

#[test]
fn index_parses() -> Result<()> {
    let index = PidxArchive::new(Cursor::new(index_bytes()))?;

    assert_eq!(index.name(), "idx.dat");
    assert_eq!(index.table1()[1].name, "adv.dat");
    assert_eq!(index.table1()[1].record.name_offset(), ADV_SIGNATURE);
    assert_eq!(index.table2()[1].path.as_deref(), Some("x/y.tbl"));
    assert_eq!(index.blocks()[0].name, "list");
    assert_eq!(index.blocks()[0].meta_position, 0xD8);
    assert_eq!(index.blocks()[0].files, None);
    Ok(())
}

#[traced_test]
#[test]
fn patches_only_matching_fields() -> Result<()> {
    let data = vec![0x41u8; 100];
    let rebuilt = rebuilt_container("ADV.DAT", &[("x/y.tbl", data.as_slice())])?;
    let rebuilt_archive = PidxArchive::new(Cursor::new(rebuilt.clone()))?;
    let block = rebuilt_archive.blocks()[0].meta;

    let original = index_bytes();
    let mut index = Cursor::new(original.clone());
    let report = ga2_pidx::sync_index(Cursor::new(rebuilt), &mut index)?;

    assert_eq!(report.archive, "adv.dat");
    assert_eq!(report.signature, Some(ADV_SIGNATURE));
    assert_eq!(report.patched_files, 1);
    assert_eq!(report.patched_blocks, 1);
    assert!(report.mismatches.is_empty());

    let patched = index.into_inner();
    assert_eq!(patched.len(), original.len());
    assert_eq!(read_u32s(&patched, Y_FIELDS), [0x800, 100, 0]);
    assert_eq!(
        read_u32s(&patched, LIST_FIELDS),
        [block.sub_offset, block.sub_size, block.entry_count]
    );

    for (i, (before, after)) in original.iter().zip(&patched).enumerate() {
        let in_patch = (Y_FIELDS..Y_FIELDS + 12).contains(&i)
            || (LIST_FIELDS..LIST_FIELDS + 12).contains(&i);
        if !in_patch {
            assert_eq!(before, after, "byte {i:#x} changed");
        }
    }

    // Files of other containers keep their location
    assert_eq!(read_u32s(&patched, 0x88 + 48 + 12), [0xA000, 5, 0]);
    Ok(())
}

#[test]
fn reports_unmatched_files() -> Result<()> {
    let rebuilt = rebuilt_container("adv.dat", &[("x/w.tbl", &b"www"[..])])?;
    let original = index_bytes();
    let mut index = Cursor::new(original.clone());

    let report = ga2_pidx::sync_index(Cursor::new(rebuilt), &mut index)?;

    assert_eq!(report.patched_files, 0);
    assert_eq!(report.patched_blocks, 1);
    assert_eq!(
        report.mismatches,
        vec![
            IndexMismatch::FileNotRebuilt {
                archive: "adv.dat".to_owned(),
                path: "x/y.tbl".to_owned(),
            },
            IndexMismatch::FileNotIndexed {
                archive: "adv.dat".to_owned(),
                path: "x/w.tbl".to_owned(),
            },
        ]
    );
    assert_eq!(&index.get_ref()[..Y_FIELDS], &original[..Y_FIELDS]);
    assert_eq!(read_u32s(index.get_ref(), Y_FIELDS), [0x9000, 10, 8]);
    Ok(())
}

#[test]
fn unknown_container_still_patches_blocks() -> Result<()> {
    let rebuilt = rebuilt_container("evt.dat", &[("x/y.tbl", &b"yyyy"[..])])?;
    let mut index = Cursor::new(index_bytes());

    let report = ga2_pidx::sync_index(Cursor::new(rebuilt), &mut index)?;

    assert_eq!(report.signature, None);
    assert_eq!(report.patched_files, 0);
    assert_eq!(report.patched_blocks, 1);
    assert_eq!(
        report.mismatches,
        vec![IndexMismatch::ArchiveNotIndexed("evt.dat".to_owned())]
    );
    assert_eq!(read_u32s(index.get_ref(), Y_FIELDS), [0x9000, 10, 8]);
    Ok(())
}

#[test]
fn refuses_a_container_as_index() -> Result<()> {
    let rebuilt = rebuilt_container("adv.dat", &[("x/y.tbl", &b"yyyy"[..])])?;
    let mut not_an_index = Cursor::new(rebuilt.clone());

    let result = ga2_pidx::sync_index(Cursor::new(rebuilt.clone()), &mut not_an_index);

    assert!(matches!(result, Err(Error::NotAnIndex)));
    not_an_index.seek(SeekFrom::Start(0))?;
    assert_eq!(not_an_index.into_inner(), rebuilt);
    Ok(())
}
