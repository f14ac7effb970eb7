use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{io::Write, path::PathBuf};
use tracing::info;

use asura_archive::manifest::{local_path, Manifest, MANIFEST_FILE_NAME};
use asura_archive::AsuraArchive;

use super::{archive_name, create_output};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input Asura archive
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = AsuraArchive::open(&self.file)
            .context(format!("path: {}", &self.file.display()))?;
        let manifest = Manifest::from_archive(&archive_name(&self.file)?, &archive)?;

        for file in &manifest.files {
            let p = local_path(&self.directory, file.export_path());
            info!("writing {}", p.display());

            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)
                    .into_diagnostic()
                    .context(format!("creating {}", parent.display()))?;
            }
            create_output(&p, self.overwrite)?
                .write_all(archive.payload(&file.entry)?)
                .into_diagnostic()
                .context(format!("writing {}", p.display()))?;
        }

        std::fs::create_dir_all(&self.directory)
            .into_diagnostic()
            .context(format!("creating {}", self.directory.display()))?;
        let p = self.directory.join(MANIFEST_FILE_NAME);
        info!("writing {}", p.display());
        manifest.to_writer(create_output(&p, self.overwrite)?)?;

        Ok(())
    }
}
