use clap::Args;
use ga2_pidx::{
    progress::silent,
    rebuild::{rebuild_all, RebuildOptions},
    source::NoTranscoder,
    sync::sync_all,
};
use itertools::Itertools;
use miette::{miette, Result};
use owo_colors::OwoColorize;

use super::WorkspaceArgs;

#[derive(Args)]
pub struct RebuildArgs {
    #[command(flatten)]
    workspace: WorkspaceArgs,

    /// Leave `packed/idx.dat` alone
    #[arg(long, default_value_t = false)]
    skip_index: bool,
}

impl RebuildArgs {
    pub fn handle(&self) -> Result<()> {
        let workspace = self.workspace.workspace();
        let options = RebuildOptions::builder()
            .maybe_threads(self.workspace.threads)
            .build();

        let summary = rebuild_all(&workspace, &NoTranscoder, &options, &silent)?;
        println!(
            "{} {} containers in {:.2?}: {} paths, {} modified, {} original",
            "rebuilt".green(),
            summary.archives,
            summary.elapsed,
            summary.total_paths,
            summary.modified,
            summary.original
        );

        let mut failed = summary
            .failures
            .iter()
            .map(|failure| format!("{}: {}", failure.name, failure.message))
            .collect_vec();

        if !self.skip_index {
            let synced = sync_all(&workspace, &silent)?;
            let mismatches = synced
                .reports
                .iter()
                .map(|report| report.mismatches.len())
                .sum::<usize>();
            println!(
                "{} {} containers, {} mismatches",
                "indexed".green(),
                synced.reports.len(),
                mismatches
            );
            failed.extend(
                synced
                    .failures
                    .iter()
                    .map(|failure| format!("{}: {}", failure.name, failure.message)),
            );
        }

        if !failed.is_empty() {
            println!("{}\n{}", "failed".red(), failed.iter().join("\n"));
            return Err(miette!("{} containers failed", failed.len()));
        }

        println!("{}", summary.packed_root.display());
        Ok(())
    }
}
