pub mod arz;
pub mod pidx;
pub mod workspace;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle ARZ compressed streams
    Arz {
        #[command(subcommand)]
        command: arz::ArzCommands,
    },
    /// Inspect PIDX containers
    Pidx {
        #[command(subcommand)]
        command: pidx::PidxCommands,
    },
    /// Unpack, edit and repack a set of containers
    Workspace {
        #[command(subcommand)]
        command: workspace::WorkspaceCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Arz { command } => command.handle(),
            Commands::Pidx { command } => command.handle(),
            Commands::Workspace { command } => command.handle(),
        }
    }
}
