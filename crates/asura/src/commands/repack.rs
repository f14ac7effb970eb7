use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{io::Write, path::PathBuf};
use tracing::info;

use asura_archive::manifest::Manifest;
use asura_archive::AsuraArchive;

use super::{archive_name, create_output};

#[derive(Args)]
pub struct RepackArgs {
    /// The archive the files were extracted from
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// The manifest written during extraction
    #[arg(value_name = "MANIFEST")]
    manifest: PathBuf,

    /// A directory holding the modified files
    #[arg(value_name = "DIR")]
    directory: PathBuf,

    /// The archive to write
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl RepackArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = AsuraArchive::open(&self.file)
            .context(format!("path: {}", &self.file.display()))?;
        let manifest = Manifest::read(&self.manifest)
            .context(format!("path: {}", &self.manifest.display()))?;
        manifest.verify(&archive_name(&self.file)?, Some(archive.wrapper()))?;

        let replacements = manifest.collect_replacements(&self.directory)?;
        let bytes = archive.repack(&replacements)?;

        info!("writing {}", self.output.display());
        create_output(&self.output, self.overwrite)?
            .write_all(&bytes)
            .into_diagnostic()
            .context(format!("writing {}", self.output.display()))?;
        info!(
            "repacked {} of {} entries",
            replacements.len(),
            archive.len()
        );

        Ok(())
    }
}
