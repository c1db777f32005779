use clap::Args;
use ga2_pidx::{
    progress::silent,
    source::NoTranscoder,
    workspace::{extract, ExtractOptions},
};
use miette::{miette, Result};
use owo_colors::OwoColorize;

use super::WorkspaceArgs;

#[derive(Args)]
pub struct ExtractArgs {
    #[command(flatten)]
    workspace: WorkspaceArgs,

    /// Extensions to extract, without the dot
    #[arg(short, long = "ext", value_name = "EXT", num_args = 1..)]
    extensions: Vec<String>,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let workspace = self.workspace.workspace();
        let options = ExtractOptions::builder()
            .maybe_threads(self.workspace.threads)
            .build();
        let options = if self.extensions.is_empty() {
            options
        } else {
            ExtractOptions {
                extensions: self
                    .extensions
                    .iter()
                    .map(|ext| ext.trim_start_matches('.').to_owned())
                    .collect(),
                ..options
            }
        };

        let summary = extract(&workspace, &NoTranscoder, &options, &silent)?;

        println!(
            "{} {} files, {} failed, into {}",
            "extracted".green(),
            summary.ok,
            summary.failed,
            summary.extract_root.display()
        );
        if summary.failed > 0 {
            return Err(miette!("{} files could not be extracted", summary.failed));
        }

        Ok(())
    }
}
