use std::fs::File;
use std::path::Path;

use miette::{miette, Context, IntoDiagnostic, Result};

pub mod extract;
pub mod list;
pub mod patch;
pub mod repack;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// List the entries of an archive
    List(list::ListArgs),
    /// Extract an archive into a directory, alongside a manifest
    Extract(extract::ExtractArgs),
    /// Pack modified files back into a copy of an archive
    Repack(repack::RepackArgs),
    /// Build an archive holding only the modified files
    Patch(patch::PatchArgs),
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::List(list) => list.handle(),
            Commands::Extract(extract) => extract.handle(),
            Commands::Repack(repack) => repack.handle(),
            Commands::Patch(patch) => patch.handle(),
        }
    }
}

/// File name manifests use to identify `path`
pub(crate) fn archive_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| miette!("{} does not name a file", path.display()))
}

/// Create `path`, refusing to replace an existing file unless `overwrite` is set
pub(crate) fn create_output(path: &Path, overwrite: bool) -> Result<File> {
    let file = if overwrite {
        File::create(path)
    } else {
        File::create_new(path)
    };
    file.into_diagnostic()
        .context(format!("creating {}", path.display()))
}
