//! Parsing of self-contained RSCF resource chunks

use std::io::Cursor;

use binrw::BinRead;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::model::{Entry, EntryKind, RscfChunk, RscfEntry};
use crate::scan::ChunkDescriptor;
use crate::types::{
    decode_name, normalize_relative_path, read_padded_name, ChunkHeader, RscfHeader,
};

/// Everything needed to guess where the payload of a chunk starts
struct PayloadProbe {
    string_end: usize,
    chunk_end: usize,
    header: RscfHeader,
}

/// Payload positions in the order they are tried
const PAYLOAD_CANDIDATES: [(&str, fn(&PayloadProbe) -> Option<usize>); 3] = [
    ("declared", PayloadProbe::declared),
    ("masked", PayloadProbe::masked),
    ("size_anchored", PayloadProbe::size_anchored),
];

impl PayloadProbe {
    fn declared(&self) -> Option<usize> {
        self.string_end.checked_add(self.header.data_offset as usize)
    }

    /// Some chunks keep flags in the high byte of the data offset
    fn masked(&self) -> Option<usize> {
        self.string_end
            .checked_add((self.header.data_offset & 0x00FF_FFFF) as usize)
    }

    fn size_anchored(&self) -> Option<usize> {
        self.chunk_end.checked_sub(self.header.data_span as usize)
    }

    /// First candidate within `[string_end, min(chunk_end, data_len) - data_span]`
    fn resolve(&self, data_len: usize) -> Option<usize> {
        let last = self
            .chunk_end
            .min(data_len)
            .checked_sub(self.header.data_span as usize)?;

        PAYLOAD_CANDIDATES.iter().find_map(|(kind, candidate)| {
            let offset = candidate(self).filter(|o| (self.string_end..=last).contains(o))?;
            debug!(kind, offset, "resolved RSCF payload");
            Some(offset)
        })
    }
}

/// Parse the RSCF chunk described by `chunk` into its single entry.
#[instrument(skip(data), err)]
pub fn parse_chunk(data: &[u8], chunk: &ChunkDescriptor) -> Result<(RscfChunk, Entry)> {
    let header_offset = chunk.offset + ChunkHeader::SIZE;
    let Some(header_bytes) = data.get(header_offset..header_offset + RscfHeader::SIZE) else {
        return Err(Error::Truncated {
            what: "RSCF chunk header",
            offset: header_offset,
        });
    };
    let header = RscfHeader::read(&mut Cursor::new(header_bytes))?;

    let string_offset = header_offset + RscfHeader::SIZE;
    let (name_raw, consumed) = read_padded_name(data, string_offset)?;
    let name = decode_name(&name_raw);

    let probe = PayloadProbe {
        string_end: string_offset + consumed,
        chunk_end: chunk.end(),
        header,
    };
    let offset = probe
        .resolve(data.len())
        .ok_or_else(|| Error::RscfPayloadOutOfBounds {
            name: name.to_string(),
        })?;

    let entry = Entry {
        relative_path: normalize_relative_path(&name),
        name,
        name_raw: name_raw.into(),
        offset,
        size: header.data_span as usize,
        kind: EntryKind::Rscf(RscfEntry {
            chunk_offset: chunk.offset,
            chunk_size: chunk.header.total_size,
            header_offset,
            header_version: header.version,
            header_data_offset: header.data_offset,
            header_data_span: header.data_span,
            offset_anchor: offset,
        }),
    };

    Ok((
        RscfChunk {
            offset: chunk.offset,
            chunk_size: chunk.header.total_size,
            type1: chunk.header.type1,
            type2: chunk.header.type2,
            header,
        },
        entry,
    ))
}
