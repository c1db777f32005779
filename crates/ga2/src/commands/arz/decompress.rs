use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{fs, path::PathBuf};
use tracing::{info, warn};

#[derive(Args)]
pub struct DecompressArgs {
    /// An input ARZ stream
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// A target file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Copy the input unchanged when it is not a valid stream
    #[arg(long, default_value_t = false)]
    lenient: bool,
}

impl DecompressArgs {
    pub fn handle(&self) -> Result<()> {
        let stream = fs::read(&self.input)
            .into_diagnostic()
            .context(format!("reading {}", self.input.display()))?;

        let data = if self.lenient {
            let data = ga2_arz::decompress_or_raw(&stream);
            if ga2_arz::peek_header(&stream).is_none() {
                warn!("{} is not an ARZ stream, copying it", self.input.display());
            }
            data.into_owned()
        } else {
            ga2_arz::decompress(&stream)
                .context(format!("decompressing {}", self.input.display()))?
        };
        info!("{} -> {} bytes", stream.len(), data.len());

        fs::write(&self.output, data)
            .into_diagnostic()
            .context(format!("writing {}", self.output.display()))
    }
}
