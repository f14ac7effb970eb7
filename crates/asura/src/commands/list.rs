use clap::Args;
use itertools::Itertools;
use miette::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;

use asura_archive::AsuraArchive;

#[derive(Args)]
pub struct ListArgs {
    /// An input Asura archive
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = AsuraArchive::open(&self.file)
            .context(format!("path: {}", &self.file.display()))?;

        println!(
            "{} ({} envelope, {} layout, {} entries)",
            self.file.display().bold(),
            archive.wrapper().kind(),
            archive.layout().kind(),
            archive.len()
        );

        for entry in archive.entries() {
            println!(
                "{} {:>10}  {}",
                format!("{:#010x}", entry.offset).dimmed(),
                entry.size,
                entry.relative_path
            );
        }

        let extensions = archive
            .entries()
            .counts_by(|entry| {
                entry
                    .relative_path
                    .rsplit_once('.')
                    .map_or(String::new(), |(_, extension)| extension.to_ascii_lowercase())
            })
            .into_iter()
            .sorted()
            .map(|(extension, count)| match extension.as_str() {
                "" => format!("{count} without extension"),
                _ => format!("{count} {extension}"),
            })
            .join(", ");
        if !extensions.is_empty() {
            println!("{}", extensions.green());
        }

        Ok(())
    }
}
