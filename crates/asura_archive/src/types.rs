//! Base types for the on-disk structures of Asura archives.

use binrw::{BinRead, BinWrite};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Signature of an uncompressed archive
pub const ASURA_MAGIC: &[u8; 8] = b"Asura   ";

/// Signature of an archive compressed as one zlib stream
pub const ASURA_ZLB_MAGIC: &[u8; 8] = b"AsuraZlb";

/// Signature of an archive compressed as a sequence of zlib blocks
pub const ASURA_ZBB_MAGIC: &[u8; 8] = b"AsuraZbb";

/// Tag of the chunk holding a shared RSFL table
pub const RSFL_TAG: &[u8; 4] = b"LFSR";

/// Tag of a self-contained resource chunk
pub const RSCF_TAG: &[u8; 4] = b"RSCF";

/// Magic stored at the start of the RSFL inner header
pub const RSFL_INNER_MAGIC: u32 = 0x5246534C;

/// Top level chunk header
///
/// Every chunk after the archive signature starts with these 16 bytes. `total_size` includes the header itself.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct ChunkHeader {
    /// Four character chunk tag
    pub tag: [u8; 4],

    /// Size of the chunk including this header
    pub total_size: u32,

    /// Opaque type field
    pub type1: u32,

    /// Opaque type field
    pub type2: u32,
}

impl ChunkHeader {
    pub const SIZE: usize = 16;
}

/// Inner header of an LFSR chunk, directly following its [`ChunkHeader`]
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct RsflHeader {
    /// Always [`RSFL_INNER_MAGIC`] for valid tables
    pub magic: u32,

    /// Size of the inner header, table and payload area
    pub inner_size: u32,

    /// Opaque type field
    pub type1: u32,

    /// Opaque type field
    pub type2: u32,

    /// Number of entries in the table that follows
    pub entry_count: u32,
}

impl RsflHeader {
    pub const SIZE: usize = 20;
}

/// Fixed record following every padded name of the RSFL table
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct RsflRecord {
    /// Offset of the payload, relative to the entry's anchor
    pub raw_offset: u32,

    /// Size of the payload
    pub size: u32,

    /// Passed through untouched
    pub unk: u32,
}

impl RsflRecord {
    pub const SIZE: usize = 12;
}

/// Header of an RSCF chunk body, followed by a padded name and the payload
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[brw(little)]
pub struct RscfHeader {
    pub version: u32,

    /// Distance from the end of the name to the payload, as written by most producers
    pub data_offset: u32,

    /// Size of the payload
    pub data_span: u32,
}

impl RscfHeader {
    pub const SIZE: usize = 12;
}

/// Header of an `AsuraZlb` wrapper
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"AsuraZlb", little)]
pub struct ZlbHeader {
    /// Opaque value carried over when the archive is compressed again
    pub unknown: u32,

    pub compressed_size: u32,

    pub uncompressed_size: u32,
}

impl ZlbHeader {
    pub const SIZE: usize = 20;
}

/// Header of an `AsuraZbb` wrapper
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"AsuraZbb", little)]
pub struct ZbbHeader {
    pub total_compressed: u32,

    pub total_size: u32,
}

impl ZbbHeader {
    pub const SIZE: usize = 16;
}

/// Header in front of every zlib block of an `AsuraZbb` wrapper
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct ZbbBlockHeader {
    /// A value of zero terminates the block list
    pub compressed_size: u32,

    pub uncompressed_size: u32,
}

impl ZbbBlockHeader {
    pub const SIZE: usize = 8;
}

/// Read a NUL terminated name padded to a 4 byte boundary.
///
/// Returns the name bytes (without terminator) and the number of bytes consumed including the padding.
pub fn read_padded_name(data: &[u8], offset: usize) -> Result<(Vec<u8>, usize)> {
    let mut cursor = offset;
    loop {
        let Some(block) = data.get(cursor..data.len().min(cursor + 4)) else {
            return Err(Error::UnterminatedName(offset));
        };
        if block.is_empty() {
            return Err(Error::UnterminatedName(offset));
        }
        cursor += 4;
        if block.contains(&0) {
            break;
        }
    }

    let raw = &data[offset..data.len().min(cursor)];
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    Ok((raw[..end].to_vec(), cursor - offset))
}

/// Encode a name the way [`read_padded_name`] expects it
pub fn padded_name(raw: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity((raw.len() + 4) & !3);
    encoded.extend_from_slice(raw);
    encoded.push(0);
    encoded.resize(encoded.len().next_multiple_of(4), 0);
    encoded
}

/// Decode stored name bytes as UTF-8, falling back to Latin-1.
pub fn decode_name(raw: &[u8]) -> Box<str> {
    match std::str::from_utf8(raw) {
        Ok(name) => name.into(),
        Err(_) => raw.iter().map(|b| *b as char).collect::<String>().into(),
    }
}

/// Normalise a stored name into a relative path using forward slashes.
pub fn normalize_relative_path(name: &str) -> Box<str> {
    name.replace('\\', "/").trim_start_matches('/').into()
}
