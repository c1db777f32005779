use clap::Args;
use ga2_pidx::{
    read::{EntryKind, SubIndexBlock, Table2Entry},
    PidxArchive,
};
use itertools::Itertools;
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::{
    fmt::Display,
    fs::File,
    io::BufReader,
    path::PathBuf,
};

#[derive(Args)]
pub struct ListArgs {
    /// An input container
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Only print files
    #[arg(long, default_value_t = false)]
    files_only: bool,
}

struct Entry<'a>(&'a Table2Entry);

impl Display for Entry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = self.0.normalized_path();
        match self.0.kind() {
            EntryKind::Directory {
                child_start,
                child_count,
            } => write!(
                f,
                "{}/ {}",
                path.blue(),
                format!("children {child_start}..{}", child_start as u64 + child_count as u64).dimmed()
            ),
            EntryKind::File {
                data_offset,
                decompressed_size,
                compressed_size,
                ..
            } => {
                let stored = if compressed_size != 0 {
                    format!("{compressed_size} -> {decompressed_size} bytes")
                } else {
                    format!("{decompressed_size} bytes raw")
                };
                write!(f, "{path} {} {}", format!("@{data_offset:#x}").dimmed(), stored)
            }
        }
    }
}

struct Block<'a>(&'a SubIndexBlock);

impl Display for Block<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let block = self.0;
        let name = if block.name.is_empty() {
            "(unnamed)"
        } else {
            block.name.as_str()
        };
        write!(
            f,
            "{} {} {} entries",
            name.yellow(),
            format!("@{:#x}+{:#x}", block.meta.sub_offset, block.meta.sub_size).dimmed(),
            block.meta.entry_count
        )?;

        match &block.files {
            Some(files) if !files.is_empty() => {
                let listing = files
                    .iter()
                    .map(|file| format!("  {}", file.path))
                    .join("\n");
                write!(f, "\n{listing}")
            }
            Some(_) => Ok(()),
            None => write!(f, " {}", "(not readable here)".red()),
        }
    }
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let file = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;
        let archive = PidxArchive::new(BufReader::new(file))?;

        println!(
            "{} {} files, {} blocks",
            archive.name().bold(),
            archive.len(),
            archive.blocks().len()
        );

        let entries = archive
            .table2()
            .iter()
            .filter(|entry| !self.files_only || !entry.record.is_directory())
            .sorted_by_key(|entry| entry.normalized_path().to_uppercase());
        for entry in entries {
            println!("{}", Entry(entry));
        }

        if !self.files_only {
            for block in archive.blocks() {
                println!("{}", Block(block));
            }
        }

        Ok(())
    }
}
