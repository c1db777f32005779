use clap::Args;
use ga2_pidx::{path::eq_ignore_case, workspace::INDEX_NAME, WorkspaceBuilder};
use miette::{miette, Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::{fs::File, io::BufReader, path::PathBuf};
use tracing::info;

use super::WorkspaceArgs;

#[derive(Args)]
pub struct IngestArgs {
    #[command(flatten)]
    workspace: WorkspaceArgs,

    /// Containers to add, `idx.dat` is stored as the global index
    #[arg(short, long, value_name = "FILE", num_args = 1.., required = true)]
    input: Vec<PathBuf>,
}

impl IngestArgs {
    pub fn handle(&self) -> Result<()> {
        let mut builder = WorkspaceBuilder::new(self.workspace.workspace().root())?;
        let mut has_index = false;

        for input in &self.input {
            let name = input
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or(miette!("unable to find a file name in {}", input.display()))?;
            let file = File::open(input)
                .into_diagnostic()
                .context(format!("path: {}", input.display()))?;

            if eq_ignore_case(name, INDEX_NAME) {
                let size = builder
                    .add_index(BufReader::new(file))
                    .context(format!("copying {}", input.display()))?;
                info!("stored {name} ({size} bytes)");
                has_index = true;
                continue;
            }

            let manifest = builder
                .add_archive(BufReader::new(file), name)
                .context(format!("reading {}", input.display()))?;
            info!(
                "added {name}: {} files, {} blocks",
                manifest.tab2.len(),
                manifest.tab3.len()
            );
        }

        builder.save()?;

        let manifest = builder.manifest();
        println!(
            "{} {} containers, {} distinct paths",
            "ingested".green(),
            manifest.len(),
            manifest.all_paths().len()
        );
        if !has_index {
            println!(
                "{} no {INDEX_NAME} given, rebuilt containers will not be indexed",
                "warning".yellow()
            );
        }

        Ok(())
    }
}
