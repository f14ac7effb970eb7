//! Building stand-alone archives that only hold modified entries

use std::io::Write;

use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::model::{Entry, EntryKind, Layout, RscfChunk};
use crate::write::{Replacements, RscfFileOptions, RscfWriter, RsflWriter, RsflWriterOptions};

/// An unwrapped archive holding the modified entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Bytes of the patch archive
    pub bytes: Vec<u8>,

    /// Relative paths of the entries in the patch, in archive order
    pub written: Vec<String>,
}

/// Stored name bytes of `entry`, falling back to its decoded name
fn stored_name(entry: &Entry) -> &[u8] {
    if entry.name_raw.is_empty() {
        entry.name.as_bytes()
    } else {
        &entry.name_raw
    }
}

fn rscf_options(entry: &Entry, chunks: &[RscfChunk]) -> RscfFileOptions {
    let EntryKind::Rscf(rscf) = entry.kind else {
        return RscfFileOptions::default();
    };
    let chunk = chunks.iter().find(|chunk| chunk.offset == rscf.chunk_offset);

    RscfFileOptions::builder()
        .type1(chunk.map_or(0, |chunk| chunk.type1))
        .type2(chunk.map_or(0, |chunk| chunk.type2))
        .version(rscf.header_version)
        .data_offset(rscf.header_data_offset)
        .build()
}

/// Build a patch archive from the entries whose replacement differs from their payload in `original`.
///
/// RSFL archives produce a single fresh LFSR chunk, RSCF archives one chunk per modified entry. Fails with
/// [`Error::NothingToPatch`] when every replacement matches the stored payload.
#[instrument(skip_all, err, fields(layout = layout.kind(), replacements = replacements.len()))]
pub fn build_patch(
    layout: &Layout,
    entries: &[Entry],
    replacements: &Replacements,
    original: &[u8],
) -> Result<Patch> {
    let mut changed: Vec<(&Entry, &[u8])> = entries
        .iter()
        .filter_map(|entry| {
            let payload = replacements.get(&*entry.relative_path)?;
            (original.get(entry.range()) != Some(payload.as_slice()))
                .then_some((entry, payload.as_slice()))
        })
        .collect();
    if changed.is_empty() {
        return Err(Error::NothingToPatch);
    }
    changed.sort_by_key(|(entry, _)| entry.archive_position());

    let bytes = match layout {
        Layout::Rsfl(chunk) => {
            let mut writer = RsflWriter::new(
                Vec::new(),
                RsflWriterOptions::builder()
                    .chunk_type1(chunk.type1)
                    .chunk_type2(chunk.type2)
                    .table_type1(chunk.inner_type1)
                    .table_type2(chunk.inner_type2)
                    .build(),
            );
            for (entry, payload) in &changed {
                let unk = match entry.kind {
                    EntryKind::Rsfl(rsfl) => rsfl.unk,
                    EntryKind::Rscf(_) => 0,
                };
                writer.start_file(stored_name(entry), unk)?;
                writer.write_all(payload)?;
            }
            writer.finish()?
        }
        Layout::Rscf { chunks } => {
            let mut writer = RscfWriter::new(Vec::new());
            for (entry, payload) in &changed {
                writer.start_file(stored_name(entry), rscf_options(entry, chunks))?;
                writer.write_all(payload)?;
            }
            writer.finish()?
        }
    };

    let written: Vec<String> = changed
        .iter()
        .map(|(entry, _)| entry.relative_path.to_string())
        .collect();
    info!(entries = written.len(), size = bytes.len(), "built patch");

    Ok(Patch { bytes, written })
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::model::{EntryKind, Layout};
    use crate::read::AsuraArchive;
    use crate::write::{
        Replacements, RscfFileOptions, RscfWriter, RsflWriter, RsflWriterOptions,
    };

    fn rsfl_archive() -> Result<AsuraArchive> {
        let mut writer = RsflWriter::new(
            Vec::new(),
            RsflWriterOptions::builder()
                .chunk_type1(11)
                .table_type2(22)
                .build(),
        );
        for (name, unk, data) in [
            (&b"gfx\\a.tga"[..], 1, &b"AAAA"[..]),
            (&b"gfx\\b.tga"[..], 2, &b"BBBBBB"[..]),
            (&b"gfx\\c.tga"[..], 3, &b"CC"[..]),
        ] {
            writer.start_file(name, unk)?;
            writer.write_all(data)?;
        }
        AsuraArchive::from_bytes(writer.finish()?)
    }

    fn rscf_archive() -> Result<AsuraArchive> {
        let mut writer = RscfWriter::new(Vec::new());
        writer.start_file(
            b"one.dds",
            RscfFileOptions::builder().type1(5).version(2).build(),
        )?;
        writer.write_all(b"first")?;
        writer.start_file(
            b"two.dds",
            RscfFileOptions::builder().type1(6).version(4).data_offset(0).build(),
        )?;
        writer.write_all(b"second")?;
        AsuraArchive::from_bytes(writer.finish()?)
    }

    fn replacements(items: &[(&str, &[u8])]) -> Replacements {
        items
            .iter()
            .map(|(path, data)| (path.to_string(), data.to_vec()))
            .collect()
    }

    #[test]
    fn rsfl_patch_holds_changed_entries() -> Result<()> {
        let archive = rsfl_archive()?;
        let patch = archive.build_patch(&replacements(&[
            ("gfx/c.tga", b"NEW C"),
            ("gfx/b.tga", b"BBBBBB"),
            ("gfx/a.tga", b"new a"),
        ]))?;

        assert_eq!(patch.written, vec!["gfx/a.tga", "gfx/c.tga"]);

        let patched = AsuraArchive::from_bytes(patch.bytes)?;
        assert_eq!(patched.file_names().collect::<Vec<_>>(), patch.written);
        assert_eq!(patched.payload(patched.by_name("gfx/a.tga")?)?, b"new a");
        assert_eq!(patched.payload(patched.by_name("gfx/c.tga")?)?, b"NEW C");

        let Layout::Rsfl(chunk) = patched.layout() else {
            panic!("expected an RSFL patch");
        };
        assert_eq!(chunk.type1, 11);
        assert_eq!(chunk.inner_type2, 22);
        assert_eq!(chunk.entry_count, 2);

        let EntryKind::Rsfl(rsfl) = patched.by_name("gfx/c.tga")?.kind else {
            panic!("expected an RSFL entry");
        };
        assert_eq!(rsfl.unk, 3);
        assert_eq!(rsfl.offset_anchor, chunk.offset);

        Ok(())
    }

    #[test]
    fn rscf_patch_keeps_chunk_headers() -> Result<()> {
        let archive = rscf_archive()?;
        let patch = archive.build_patch(&replacements(&[("two.dds", b"changed!")]))?;

        assert_eq!(patch.written, vec!["two.dds"]);

        let patched = AsuraArchive::from_bytes(patch.bytes)?;
        assert_eq!(patched.len(), 1);
        let entry = patched.by_index(0)?;
        assert_eq!(patched.payload(entry)?, b"changed!");

        let EntryKind::Rscf(rscf) = entry.kind else {
            panic!("expected an RSCF entry");
        };
        assert_eq!(rscf.header_version, 4);

        let Layout::Rscf { chunks } = patched.layout() else {
            panic!("expected an RSCF patch");
        };
        assert_eq!(chunks[0].type1, 6);

        Ok(())
    }

    #[test]
    fn rscf_patch_of_a_stored_archive_reloads() -> Result<()> {
        let mut data = b"Asura   ".to_vec();
        for (name, payload) in [
            (&b"foo.tga\0"[..], &b"OLD!"[..]),
            (&b"bar.tga\0"[..], &b"KEEP"[..]),
        ] {
            data.extend(b"RSCF");
            data.extend((16 + 12 + name.len() as u32 + payload.len() as u32).to_le_bytes());
            data.extend(3u32.to_le_bytes());
            data.extend(0u32.to_le_bytes());
            data.extend(1u32.to_le_bytes());
            data.extend(0u32.to_le_bytes());
            data.extend((payload.len() as u32).to_le_bytes());
            data.extend(name);
            data.extend(payload);
        }
        let archive = AsuraArchive::from_bytes(data)?;

        let patch = archive.build_patch(&replacements(&[("foo.tga", b"NEW!")]))?;
        assert!(patch.bytes.starts_with(b"Asura   RSCF"));

        let patched = AsuraArchive::from_bytes(patch.bytes)?;
        assert_eq!(patched.file_names().collect::<Vec<_>>(), vec!["foo.tga"]);
        assert_eq!(patched.payload(patched.by_name("foo.tga")?)?, b"NEW!");

        Ok(())
    }

    #[test]
    fn unchanged_replacements_fail() -> Result<()> {
        let archive = rscf_archive()?;

        assert!(matches!(
            archive.build_patch(&replacements(&[("one.dds", b"first")])),
            Err(Error::NothingToPatch)
        ));
        assert!(matches!(
            archive.build_patch(&Replacements::new()),
            Err(Error::NothingToPatch)
        ));

        Ok(())
    }
}
