pub mod compress;
pub mod decompress;

#[derive(clap::Subcommand)]
pub enum ArzCommands {
    /// Compress a file into an ARZ stream
    Compress(compress::CompressArgs),
    /// Decompress an ARZ stream
    Decompress(decompress::DecompressArgs),
}

impl ArzCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            ArzCommands::Compress(compress) => compress.handle(),
            ArzCommands::Decompress(decompress) => decompress.handle(),
        }
    }
}
