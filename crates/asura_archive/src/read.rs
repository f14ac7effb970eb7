//! Types for reading Asura archives
//!

use std::borrow::Cow;
use std::fmt::{self, Debug};
use std::io::Read;
use std::path::Path;

use bon::Builder;
use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::compression::{unwrap_container, wrap_container, Wrapper};
use crate::error::{EntryNotFoundError, Error, Result};
use crate::model::{Entry, Layout, RscfChunk};
use crate::patch::{build_patch, Patch};
use crate::rscf::parse_chunk;
use crate::rsfl::parse_table;
use crate::scan::{scan_chunks, ChunkLayout};
use crate::source::ArchiveSource;
use crate::write::{apply_replacements, Replacements};

/// Archives at least this large are memory-mapped unless configured otherwise
pub const DEFAULT_MEMORY_MAP_THRESHOLD: u64 = 256 * 1024 * 1024;

/// Environment variable overriding [`DEFAULT_MEMORY_MAP_THRESHOLD`]
pub const MEMORY_MAP_THRESHOLD_ENV: &str = "ASURA_MEMORY_MAP_THRESHOLD";

fn memory_map_threshold_from_env() -> u64 {
    std::env::var(MEMORY_MAP_THRESHOLD_ENV)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(DEFAULT_MEMORY_MAP_THRESHOLD)
}

/// Options for how an archive should be loaded
#[derive(Debug, Clone, Copy, Builder)]
pub struct LoadOptions {
    /// Files of at least this many bytes are memory-mapped instead of read
    #[builder(default = memory_map_threshold_from_env())]
    pub memory_map_threshold: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions::builder().build()
    }
}

/// Asura archive reader
///
/// ```no_run
/// fn list_contents(path: &str) -> asura_archive::error::Result<()> {
///     let archive = asura_archive::AsuraArchive::open(path)?;
///
///     for i in 0..archive.len() {
///         let entry = archive.by_index(i)?;
///         println!("{} ({} bytes)", entry.relative_path, entry.size);
///     }
///
///     Ok(())
/// }
/// ```
pub struct AsuraArchive {
    buffer: ArchiveSource,
    wrapper: Wrapper,
    layout: Layout,
    files: IndexMap<Box<str>, Entry>,
}

impl Debug for AsuraArchive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AsuraArchive")
            .field("buffer", &self.buffer)
            .field("wrapper", &self.wrapper.kind())
            .field("layout", &self.layout.kind())
            .field("entries", &self.files.len())
            .finish()
    }
}

impl AsuraArchive {
    /// Load the archive at `path` with the default [`LoadOptions`].
    pub fn open(path: impl AsRef<Path>) -> Result<AsuraArchive> {
        Self::open_with(path, &LoadOptions::default())
    }

    /// Load the archive at `path`.
    ///
    /// Wrapped archives are decompressed onto the heap, so a mapping of the compressed file is released before this
    /// returns.
    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn open_with(path: impl AsRef<Path>, options: &LoadOptions) -> Result<AsuraArchive> {
        let source = ArchiveSource::open(path.as_ref(), options.memory_map_threshold)?;
        Self::from_source(source)
    }

    /// Read a whole archive from `reader` into memory.
    pub fn new(mut reader: impl Read) -> Result<AsuraArchive> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Load an archive held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<AsuraArchive> {
        Self::from_source(ArchiveSource::Heap(data))
    }

    fn from_source(source: ArchiveSource) -> Result<AsuraArchive> {
        let (decompressed, wrapper) = match unwrap_container(&source)? {
            (Cow::Owned(data), wrapper) => (Some(data), wrapper),
            (Cow::Borrowed(_), wrapper) => (None, wrapper),
        };
        let buffer = decompressed.map_or(source, ArchiveSource::Heap);

        let (layout, entries) = parse_layout(&buffer)?;

        let mut files = IndexMap::with_capacity(entries.len());
        for entry in entries {
            if files.contains_key(&entry.relative_path) {
                return Err(Error::DuplicateEntry(entry.relative_path.into()));
            }
            files.insert(entry.relative_path.clone(), entry);
        }

        debug!(
            wrapper = wrapper.kind(),
            layout = layout.kind(),
            entries = files.len(),
            mapped = buffer.is_mapped(),
            "loaded archive"
        );

        Ok(AsuraArchive {
            buffer,
            wrapper,
            layout,
            files,
        })
    }

    /// Number of entries contained in this archive.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether this archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over the relative paths of all entries, in archive order.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(|s| s.as_ref())
    }

    /// Returns an iterator over all entries, in archive order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.files.values()
    }

    /// Get the index of an entry by relative path, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.files.get_index_of(name)
    }

    /// Search for an entry by relative path
    pub fn by_name(&self, name: &str) -> Result<&Entry> {
        self.files
            .get(name)
            .ok_or_else(|| EntryNotFoundError::Name(name.to_owned()).into())
    }

    /// Get an entry by index
    pub fn by_index(&self, index: usize) -> Result<&Entry> {
        self.files
            .get_index(index)
            .map(|(_, entry)| entry)
            .ok_or_else(|| EntryNotFoundError::Index(index).into())
    }

    /// Bytes of `entry`'s payload
    pub fn payload(&self, entry: &Entry) -> Result<&[u8]> {
        self.buffer
            .get(entry.range())
            .ok_or_else(|| Error::EntryOutOfBounds {
                name: entry.name.to_string(),
            })
    }

    /// The decompressed archive
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// Whether the decompressed archive is a file mapping
    pub fn is_mapped(&self) -> bool {
        self.buffer.is_mapped()
    }

    /// The outer envelope the archive was stored in
    pub fn wrapper(&self) -> &Wrapper {
        &self.wrapper
    }

    /// How the resources of the archive are laid out
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Apply `replacements` to a private copy of the decompressed archive.
    ///
    /// The loaded archive is left untouched, so the same batch can be applied again.
    pub fn apply_replacements(&self, replacements: &Replacements) -> Result<(Vec<u8>, Vec<Entry>)> {
        let entries: Vec<Entry> = self.files.values().cloned().collect();
        apply_replacements(&self.buffer, &entries, replacements)
    }

    /// Apply `replacements` and wrap the result in the archive's own envelope.
    #[instrument(skip_all, fields(replacements = replacements.len()), err)]
    pub fn repack(&self, replacements: &Replacements) -> Result<Vec<u8>> {
        let (buffer, _) = self.apply_replacements(replacements)?;
        wrap_container(&buffer, &self.wrapper)
    }

    /// Build an unwrapped archive holding only the entries whose replacement differs from the stored payload.
    pub fn build_patch(&self, replacements: &Replacements) -> Result<Patch> {
        let entries: Vec<Entry> = self.files.values().cloned().collect();
        build_patch(&self.layout, &entries, replacements, &self.buffer)
    }
}

/// Locate and parse the resource chunks of a decompressed archive.
#[instrument(skip_all, err)]
pub fn parse_layout(data: &[u8]) -> Result<(Layout, Vec<Entry>)> {
    match scan_chunks(data)? {
        ChunkLayout::Rsfl(chunk) => {
            let (rsfl, entries) = parse_table(data, &chunk)?;
            Ok((Layout::Rsfl(rsfl), entries))
        }
        ChunkLayout::Rscf(chunks) => {
            let parsed = chunks
                .iter()
                .map(|chunk| parse_chunk(data, chunk))
                .collect::<Result<Vec<_>>>()?;
            let (chunks, entries): (Vec<RscfChunk>, Vec<Entry>) = parsed.into_iter().unzip();
            Ok((Layout::Rscf { chunks }, entries))
        }
    }
}
