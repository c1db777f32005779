use clap::Args;
use ga2_pidx::{read::PidxFileData, PidxArchive};
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, Write},
    path::{Component, Path, PathBuf},
};
use tracing::{info, warn};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input container
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Write payloads exactly as stored instead of decompressing them
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

/// Join a container path below `root`, dropping components that would leave it
fn contained(root: &Path, path: &str) -> PathBuf {
    Path::new(path)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .fold(root.to_path_buf(), |joined, part| joined.join(part))
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let file = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;
        let mut archive = PidxArchive::new(BufReader::new(file))?;

        // Block entries usually repeat Table-2 files, write each path once
        let mut seen = HashSet::new();
        let payloads: Vec<PidxFileData> = archive
            .files()
            .cloned()
            .chain(
                archive
                    .blocks()
                    .iter()
                    .filter_map(|block| block.files.clone())
                    .flatten(),
            )
            .filter(|data| !data.path.is_empty())
            .filter(|data| seen.insert(data.path.to_uppercase()))
            .collect();

        for data in payloads {
            let p = contained(&self.directory, &data.path);
            if p == self.directory {
                warn!("skipping {}", data.path);
                continue;
            }
            info!("writing {}", p.display());

            let parent = p
                .parent()
                .ok_or(miette!("unable to find parent of {}", p.display()))?;
            std::fs::create_dir_all(parent)
                .into_diagnostic()
                .context(format!("creating {}", parent.display()))?;

            let mut out = if !self.overwrite {
                File::create_new(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            } else {
                File::create(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            };

            let mut payload = archive.open(&data)?;
            if self.raw {
                std::io::copy(&mut payload, &mut out).into_diagnostic()?;
            } else {
                out.write_all(&payload.read_decompressed()?)
                    .into_diagnostic()?;
            }
        }

        Ok(())
    }
}
