//! In-memory description of the resources of an archive.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::RscfHeader;

/// A named resource stored in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entry {
    /// Name as stored in the archive, decoded as UTF-8 or Latin-1
    pub name: Box<str>,

    /// Raw name bytes. Written back verbatim when the entry is re-encoded.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub name_raw: Box<[u8]>,

    /// Normalised path: forward slashes, no leading slash
    pub relative_path: Box<str>,

    /// Absolute position of the payload in the decompressed archive
    pub offset: usize,

    /// Size of the payload in bytes
    pub size: usize,

    /// Layout specific addressing information
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: EntryKind,
}

impl Entry {
    /// Byte range of the payload inside the decompressed archive
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.size
    }

    /// Position used to order entries the way they appear in the archive
    pub(crate) fn archive_position(&self) -> usize {
        match &self.kind {
            EntryKind::Rsfl(rsfl) => rsfl.table_offset,
            EntryKind::Rscf(rscf) => rscf.chunk_offset,
        }
    }
}

/// Addressing information that only exists for one of the two layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "layout", rename_all = "lowercase"))]
pub enum EntryKind {
    Rsfl(RsflEntry),
    Rscf(RscfEntry),
}

/// An entry of the shared RSFL table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RsflEntry {
    /// Offset as stored in the table
    pub raw_offset: u32,

    /// Opaque value of the table record
    pub unk: u32,

    /// Position of the 12 byte table record
    pub table_offset: usize,

    /// Absolute position `raw_offset` is measured from
    pub offset_anchor: usize,
}

/// A self-contained RSCF chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RscfEntry {
    pub chunk_offset: usize,

    /// Declared total size of the chunk, header included
    pub chunk_size: u32,

    /// Position of the [`RscfHeader`] inside the chunk
    pub header_offset: usize,

    pub header_version: u32,

    pub header_data_offset: u32,

    /// Kept equal to the entry size
    pub header_data_span: u32,

    /// Absolute payload position when the chunk was parsed
    pub offset_anchor: usize,
}

/// Layout of the resource chunks of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "layout", rename_all = "lowercase"))]
pub enum Layout {
    /// A single LFSR chunk addressing every resource
    Rsfl(RsflChunk),

    /// One RSCF chunk per resource
    Rscf { chunks: Vec<RscfChunk> },
}

impl Layout {
    /// Short name of the layout
    pub fn kind(&self) -> &'static str {
        match self {
            Layout::Rsfl(_) => "rsfl",
            Layout::Rscf { .. } => "rscf",
        }
    }
}

/// The LFSR chunk of an RSFL archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RsflChunk {
    pub offset: usize,
    pub chunk_size: u32,
    pub type1: u32,
    pub type2: u32,
    pub inner_size: u32,
    pub inner_type1: u32,
    pub inner_type2: u32,
    pub entry_count: u32,

    /// Position right after the last table record
    pub table_end: usize,
}

/// One RSCF chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RscfChunk {
    pub offset: usize,
    pub chunk_size: u32,
    pub type1: u32,
    pub type2: u32,
    pub header: RscfHeader,
}
