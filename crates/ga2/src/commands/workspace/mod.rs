pub mod extract;
pub mod ingest;
pub mod rebuild;

use std::path::PathBuf;

use clap::Args;

#[derive(clap::Subcommand)]
pub enum WorkspaceCommands {
    /// Create a workspace from containers and the global index
    Ingest(ingest::IngestArgs),
    /// Decompress the original files for editing
    Extract(extract::ExtractArgs),
    /// Rebuild every container and patch the global index
    Rebuild(rebuild::RebuildArgs),
}

impl WorkspaceCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            WorkspaceCommands::Ingest(ingest) => ingest.handle(),
            WorkspaceCommands::Extract(extract) => extract.handle(),
            WorkspaceCommands::Rebuild(rebuild) => rebuild.handle(),
        }
    }
}

/// Arguments shared by every workspace command
#[derive(Args)]
pub struct WorkspaceArgs {
    /// The workspace directory
    #[arg(short, long, value_name = "DIR", env = "GA2_WORKSPACE")]
    workspace: PathBuf,

    /// Number of worker threads, all cores when unset
    #[arg(long, value_name = "N", env = "GA2_THREADS")]
    threads: Option<usize>,
}

impl WorkspaceArgs {
    pub fn workspace(&self) -> ga2_pidx::Workspace {
        ga2_pidx::Workspace::new(&self.workspace)
    }
}
