pub mod extract;
pub mod list;

#[derive(clap::Subcommand)]
pub enum PidxCommands {
    /// Print the tree and blocks of a container
    List(list::ListArgs),
    /// Extract the files of a container into a directory
    Extract(extract::ExtractArgs),
}

impl PidxCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            PidxCommands::List(list) => list.handle(),
            PidxCommands::Extract(extract) => extract.handle(),
        }
    }
}
