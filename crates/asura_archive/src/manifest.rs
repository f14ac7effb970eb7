//! Extraction manifests describing where the entries of an archive were exported to
//!
//! A manifest is written next to the extracted payloads and read back when modified files are packed into a new
//! archive or a patch.

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::compression::Wrapper;
use crate::error::{Error, Result};
use crate::model::{Entry, Layout};
use crate::read::AsuraArchive;
use crate::write::Replacements;

/// Name of the manifest file inside an extraction directory
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Image formats recognised from the first bytes of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Dds,
    Png,
    Bmp,
    Gif,
    Jpeg,
    Tiff,
}

impl ImageFormat {
    const SIGNATURES: [(&'static [u8], ImageFormat); 7] = [
        (b"DDS ", ImageFormat::Dds),
        (b"\x89PNG\r\n\x1a\n", ImageFormat::Png),
        (b"BM", ImageFormat::Bmp),
        (b"GIF8", ImageFormat::Gif),
        (b"\xFF\xD8\xFF", ImageFormat::Jpeg),
        (b"II*\x00", ImageFormat::Tiff),
        (b"MM\x00*", ImageFormat::Tiff),
    ];

    /// Identify the image format of `payload` from its magic bytes
    pub fn detect(payload: &[u8]) -> Option<ImageFormat> {
        Self::SIGNATURES
            .iter()
            .find(|(magic, _)| payload.starts_with(magic))
            .map(|(_, format)| *format)
    }

    /// File extension, without the leading dot
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Dds => "dds",
            ImageFormat::Png => "png",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Gif => "gif",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Tiff => "tif",
        }
    }
}

/// Path an entry should be exported to when its payload is an image whose extension differs from the stored name.
pub fn export_relative_path(relative_path: &str, payload: &[u8]) -> Option<String> {
    let extension = ImageFormat::detect(payload)?.extension();

    let (directory, file) = match relative_path.rsplit_once('/') {
        Some((directory, file)) => (Some(directory), file),
        None => (None, relative_path),
    };
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => {
            if file[dot + 1..].eq_ignore_ascii_case(extension) {
                return None;
            }
            &file[..dot]
        }
        _ => file,
    };

    Some(match directory {
        Some(directory) => format!("{directory}/{stem}.{extension}"),
        None => format!("{stem}.{extension}"),
    })
}

/// Join a `/` separated relative path onto `base`, dropping components that would leave it.
pub fn local_path(base: &Path, relative_path: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for component in Path::new(relative_path).components() {
        if let Component::Normal(part) = component {
            path.push(part);
        }
    }
    path
}

/// A manifest file entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(flatten)]
    pub entry: Entry,

    /// Where the payload was written, when it differs from the relative path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_path: Option<String>,

    /// Relative path the payload was renamed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
}

impl ManifestEntry {
    /// Relative path the payload was exported to
    pub fn export_path(&self) -> &str {
        self.exported_path
            .as_deref()
            .unwrap_or(&self.entry.relative_path)
    }
}

/// Description of an extracted archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// File name of the archive the entries came from
    pub archive: String,

    #[serde(rename = "rsfl")]
    pub layout: Layout,

    #[serde(default)]
    pub wrapper: Wrapper,

    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    /// Describe every entry of `archive`, resolving export paths from the payloads.
    ///
    /// Fails when two entries would be exported to the same path.
    #[instrument(skip(archive), err)]
    pub fn from_archive(archive_name: &str, archive: &AsuraArchive) -> Result<Manifest> {
        let files = archive
            .entries()
            .map(|entry| {
                let payload = archive.payload(entry)?;
                let exported_path = export_relative_path(&entry.relative_path, payload);
                Ok(ManifestEntry {
                    original_path: exported_path
                        .as_ref()
                        .map(|_| entry.relative_path.to_string()),
                    exported_path,
                    entry: entry.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut exported: HashMap<&str, &str> = HashMap::with_capacity(files.len());
        for file in &files {
            if let Some(first) = exported.insert(file.export_path(), &file.entry.relative_path) {
                return Err(Error::ExportPathCollision {
                    path: file.export_path().to_owned(),
                    first: first.to_owned(),
                    second: file.entry.relative_path.to_string(),
                });
            }
        }

        Ok(Manifest {
            archive: archive_name.to_owned(),
            layout: archive.layout().clone(),
            wrapper: archive.wrapper().clone(),
            files,
        })
    }

    /// Read a manifest from JSON
    pub fn from_reader(reader: impl Read) -> Result<Manifest> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Read the manifest at `path`
    pub fn read(path: impl AsRef<Path>) -> Result<Manifest> {
        Self::from_reader(fs::File::open(path)?)
    }

    /// Write the manifest as indented JSON
    pub fn to_writer(&self, writer: impl Write) -> Result<()> {
        Ok(serde_json::to_writer_pretty(writer, self)?)
    }

    /// Check that the manifest describes the archive named `archive_name`.
    ///
    /// `wrapper` is only compared when given, since a patch does not reuse the envelope of the original.
    pub fn verify(&self, archive_name: &str, wrapper: Option<&Wrapper>) -> Result<()> {
        if self.archive != archive_name {
            return Err(Error::ArchiveMismatch {
                expected: self.archive.clone(),
                actual: archive_name.to_owned(),
            });
        }

        if self.files.is_empty() {
            return Err(Error::EmptyManifest);
        }

        if let Some(wrapper) = wrapper {
            if wrapper.kind() != self.wrapper.kind() {
                return Err(Error::WrapperMismatch {
                    expected: self.wrapper.kind(),
                    actual: wrapper.kind(),
                });
            }
        }

        Ok(())
    }

    /// Read every file of the manifest that exists below `directory`.
    ///
    /// The exported path of an entry is preferred over its relative path.
    #[instrument(skip(self), err)]
    pub fn collect_replacements(&self, directory: &Path) -> Result<Replacements> {
        let mut replacements = Replacements::new();

        for file in &self.files {
            let candidates = file
                .exported_path
                .iter()
                .map(String::as_str)
                .chain([&*file.entry.relative_path]);

            let Some(path) = candidates
                .map(|candidate| local_path(directory, candidate))
                .find(|path| path.is_file())
            else {
                continue;
            };

            debug!(path = %path.display(), entry = %file.entry.relative_path, "found replacement");
            replacements.insert(file.entry.relative_path.to_string(), fs::read(&path)?);
        }

        if replacements.is_empty() {
            return Err(Error::NoReplacements);
        }

        Ok(replacements)
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::Write;
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::manifest::{export_relative_path, local_path, ImageFormat, Manifest};
    use crate::read::AsuraArchive;
    use crate::write::{RscfFileOptions, RscfWriter};
    use crate::Wrapper;

    fn archive() -> Result<AsuraArchive> {
        let mut writer = RscfWriter::new(Vec::new());
        writer.start_file(b"textures\\wolf.tga", RscfFileOptions::default())?;
        writer.write_all(b"DDS |....")?;
        writer.start_file(b"textures\\plain.tga", RscfFileOptions::default())?;
        writer.write_all(b"TRUEVISION")?;
        AsuraArchive::from_bytes(writer.finish()?)
    }

    #[test]
    fn detect_image_formats() {
        assert_eq!(ImageFormat::detect(b"DDS \x7c\0\0\0"), Some(ImageFormat::Dds));
        assert_eq!(ImageFormat::detect(b"\x89PNG\r\n\x1a\n...."), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::detect(b"\xFF\xD8\xFF\xE0"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::detect(b"MM\0*"), Some(ImageFormat::Tiff));
        assert_eq!(ImageFormat::detect(b"\x89PN"), None);
        assert_eq!(ImageFormat::detect(b""), None);
    }

    #[test]
    fn export_paths_follow_payload() {
        assert_eq!(
            export_relative_path("textures/wolf.tga", b"DDS ....").as_deref(),
            Some("textures/wolf.dds")
        );
        assert_eq!(
            export_relative_path("noext", b"BM....").as_deref(),
            Some("noext.bmp")
        );
        assert_eq!(export_relative_path("a/b.DDS", b"DDS ...."), None);
        assert_eq!(export_relative_path("a/b.tga", b"plain data"), None);
    }

    #[test]
    fn local_paths_stay_inside_base() {
        let base = Path::new("out");
        assert_eq!(local_path(base, "a/b.dds"), base.join("a").join("b.dds"));
        assert_eq!(local_path(base, "../../etc/passwd"), base.join("etc").join("passwd"));
    }

    #[test]
    fn manifest_json_round_trip() -> Result<()> {
        let manifest = Manifest::from_archive("wolf.en", &archive()?)?;

        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.files[0].export_path(), "textures/wolf.dds");
        assert_eq!(manifest.files[0].original_path.as_deref(), Some("textures/wolf.tga"));
        assert_eq!(manifest.files[1].export_path(), "textures/plain.tga");
        assert_eq!(manifest.files[1].exported_path, None);

        let mut json = Vec::new();
        manifest.to_writer(&mut json)?;
        let text = String::from_utf8_lossy(&json);
        assert!(text.contains("\"exported_path\": \"textures/wolf.dds\""));
        assert!(text.contains("\"layout\": \"rscf\""));

        let parsed = Manifest::from_reader(json.as_slice())?;
        assert_eq!(parsed.archive, manifest.archive);
        assert_eq!(parsed.layout, manifest.layout);
        assert_eq!(parsed.wrapper, Wrapper::Raw);
        for (parsed, original) in parsed.files.iter().zip(&manifest.files) {
            assert_eq!(parsed.entry.relative_path, original.entry.relative_path);
            assert_eq!(parsed.entry.offset, original.entry.offset);
            assert_eq!(parsed.entry.kind, original.entry.kind);
            assert_eq!(parsed.exported_path, original.exported_path);
        }

        Ok(())
    }

    #[test]
    fn colliding_export_paths_fail() -> Result<()> {
        let mut writer = RscfWriter::new(Vec::new());
        writer.start_file(b"ui\\logo.tga", RscfFileOptions::default())?;
        writer.write_all(b"DDS |....")?;
        writer.start_file(b"ui\\logo.dds", RscfFileOptions::default())?;
        writer.write_all(b"DDS |....")?;
        let archive = AsuraArchive::from_bytes(writer.finish()?)?;

        assert!(matches!(
            Manifest::from_archive("menu.en", &archive),
            Err(Error::ExportPathCollision { path, first, second })
                if path == "ui/logo.dds" && first == "ui/logo.tga" && second == "ui/logo.dds"
        ));

        Ok(())
    }

    #[test]
    fn identity_checks() -> Result<()> {
        let manifest = Manifest::from_archive("wolf.en", &archive()?)?;

        manifest.verify("wolf.en", Some(&Wrapper::Raw))?;
        assert!(matches!(
            manifest.verify("bear.en", None),
            Err(Error::ArchiveMismatch { expected, actual }) if expected == "wolf.en" && actual == "bear.en"
        ));
        assert!(matches!(
            manifest.verify("wolf.en", Some(&Wrapper::Zlb { unknown: 0, expected_size: 0 })),
            Err(Error::WrapperMismatch { expected: "raw", actual: "zlb" })
        ));

        let empty = Manifest {
            files: Vec::new(),
            ..manifest
        };
        assert!(matches!(empty.verify("wolf.en", None), Err(Error::EmptyManifest)));

        Ok(())
    }

    #[test]
    fn replacements_prefer_exported_paths() -> Result<()> {
        let manifest = Manifest::from_archive("wolf.en", &archive()?)?;
        let directory = tempfile::tempdir()?;

        assert!(matches!(
            manifest.collect_replacements(directory.path()),
            Err(Error::NoReplacements)
        ));

        let textures = directory.path().join("textures");
        fs::create_dir_all(&textures)?;
        fs::write(textures.join("wolf.dds"), b"DDS new")?;
        fs::write(textures.join("wolf.tga"), b"ignored")?;
        fs::write(textures.join("plain.tga"), b"plain new")?;

        let replacements = manifest.collect_replacements(directory.path())?;
        assert_eq!(replacements.len(), 2);
        assert_eq!(replacements["textures/wolf.tga"], b"DDS new");
        assert_eq!(replacements["textures/plain.tga"], b"plain new");

        Ok(())
    }
}
