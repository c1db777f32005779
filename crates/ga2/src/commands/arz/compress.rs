use clap::{Args, ValueEnum};
use ga2_arz::{ArzMode, ArzVariant, CompressOptions};
use miette::{Context, IntoDiagnostic, Result};
use std::{fs, path::PathBuf};
use tracing::info;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Magic {
    /// "ARZ"
    #[default]
    Arz,
    /// " 3;"
    Legacy,
}

impl From<Magic> for ArzVariant {
    fn from(value: Magic) -> Self {
        match value {
            Magic::Arz => ArzVariant::Arz,
            Magic::Legacy => ArzVariant::Legacy,
        }
    }
}

#[derive(Args)]
pub struct CompressArgs {
    /// An input file
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// A target file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// The magic to write
    #[arg(long, value_enum, default_value_t = Magic::Arz)]
    magic: Magic,

    /// Store the payload without LZSS
    #[arg(long, default_value_t = false)]
    stored: bool,
}

impl CompressArgs {
    pub fn handle(&self) -> Result<()> {
        let data = fs::read(&self.input)
            .into_diagnostic()
            .context(format!("reading {}", self.input.display()))?;

        let options = CompressOptions::builder()
            .variant(self.magic.into())
            .mode(if self.stored {
                ArzMode::Stored
            } else {
                ArzMode::Lzss
            })
            .build();
        let stream = ga2_arz::compress_with(&data, options)
            .context(format!("compressing {}", self.input.display()))?;
        info!("{} -> {} bytes", data.len(), stream.len());

        fs::write(&self.output, stream)
            .into_diagnostic()
            .context(format!("writing {}", self.output.display()))
    }
}
