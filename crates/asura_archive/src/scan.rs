//! Walks the top level chunks of a decompressed archive

use std::io::Cursor;

use binrw::BinRead;
use tracing::{instrument, trace};

use crate::error::{Error, Result};
use crate::types::{ChunkHeader, ASURA_MAGIC, RSCF_TAG, RSFL_TAG};

/// A top level chunk and where it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub offset: usize,
    pub header: ChunkHeader,
}

impl ChunkDescriptor {
    pub fn start(&self) -> usize {
        self.offset
    }

    pub fn end(&self) -> usize {
        self.offset + self.header.total_size as usize
    }
}

/// Resource chunks located by [`scan_chunks`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkLayout {
    Rsfl(ChunkDescriptor),
    Rscf(Vec<ChunkDescriptor>),
}

/// Locate the resource chunks of `data`.
///
/// An LFSR chunk ends the scan immediately and wins over any RSCF chunk seen before it. Chunks with other tags are
/// skipped.
#[instrument(skip_all, err)]
pub fn scan_chunks(data: &[u8]) -> Result<ChunkLayout> {
    if !data.starts_with(ASURA_MAGIC) {
        return Err(Error::NotAnArchive);
    }

    let mut cursor = ASURA_MAGIC.len();
    let mut rscf = Vec::new();

    while cursor + ChunkHeader::SIZE <= data.len() {
        let header = ChunkHeader::read(&mut Cursor::new(&data[cursor..]))?;
        if header.total_size == 0 {
            return Err(Error::ZeroSizedChunk(cursor));
        }

        let chunk = ChunkDescriptor {
            offset: cursor,
            header,
        };
        trace!(
            tag = %String::from_utf8_lossy(&header.tag),
            offset = cursor,
            size = header.total_size,
            "chunk"
        );

        if &header.tag == RSFL_TAG {
            return Ok(ChunkLayout::Rsfl(chunk));
        }
        if &header.tag == RSCF_TAG {
            rscf.push(chunk);
        }

        cursor = chunk.end();
    }

    if rscf.is_empty() {
        return Err(Error::NoResourceChunks);
    }

    Ok(ChunkLayout::Rscf(rscf))
}
