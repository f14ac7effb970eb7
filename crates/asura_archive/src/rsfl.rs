//! Parsing of the shared RSFL offset table

use std::io::Cursor;

use binrw::BinRead;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::model::{Entry, EntryKind, RsflChunk, RsflEntry};
use crate::scan::ChunkDescriptor;
use crate::types::{
    decode_name, normalize_relative_path, read_padded_name, ChunkHeader, RsflHeader, RsflRecord,
    RSFL_INNER_MAGIC,
};

/// Where a table offset may be measured from, in the order they are tried
const ANCHORS: [(&str, fn(&ChunkDescriptor) -> usize); 2] = [
    ("chunk_end", ChunkDescriptor::end),
    ("chunk_start", ChunkDescriptor::start),
];

/// Pick the first anchor for which `raw_offset` and `size` stay inside the buffer.
fn resolve_anchor(
    chunk: &ChunkDescriptor,
    raw_offset: u32,
    size: u32,
    data_len: usize,
) -> Option<usize> {
    ANCHORS.iter().find_map(|(kind, anchor)| {
        let base = anchor(chunk);
        let end = base
            .checked_add(raw_offset as usize)?
            .checked_add(size as usize)?;
        if end > data_len {
            return None;
        }
        debug!(kind, base, raw_offset, "resolved table anchor");
        Some(base)
    })
}

/// Parse the LFSR chunk described by `chunk`, returning its layout and entries in table order.
#[instrument(skip(data), err)]
pub fn parse_table(data: &[u8], chunk: &ChunkDescriptor) -> Result<(RsflChunk, Vec<Entry>)> {
    let header_offset = chunk.offset + ChunkHeader::SIZE;
    let Some(header_bytes) = data.get(header_offset..header_offset + RsflHeader::SIZE) else {
        return Err(Error::Truncated {
            what: "RSFL inner header",
            offset: header_offset,
        });
    };

    let header = RsflHeader::read(&mut Cursor::new(header_bytes))?;
    if header.magic != RSFL_INNER_MAGIC {
        return Err(Error::CorruptedRsflHeader(header_offset));
    }

    let mut cursor = header_offset + RsflHeader::SIZE;
    // a table entry takes at least a 4 byte name and its record
    let fits = data.len().saturating_sub(cursor) / (4 + RsflRecord::SIZE);
    let mut entries = Vec::with_capacity(fits.min(header.entry_count as usize));

    for _ in 0..header.entry_count {
        let (name_raw, consumed) = read_padded_name(data, cursor)?;
        cursor += consumed;

        let table_offset = cursor;
        let Some(record_bytes) = data.get(table_offset..table_offset + RsflRecord::SIZE) else {
            return Err(Error::Truncated {
                what: "RSFL table record",
                offset: table_offset,
            });
        };
        let record = RsflRecord::read(&mut Cursor::new(record_bytes))?;
        cursor += RsflRecord::SIZE;

        let name = decode_name(&name_raw);
        let offset_anchor = resolve_anchor(chunk, record.raw_offset, record.size, data.len())
            .ok_or_else(|| Error::EntryOutOfBounds {
                name: name.to_string(),
            })?;

        entries.push(Entry {
            relative_path: normalize_relative_path(&name),
            name,
            name_raw: name_raw.into(),
            offset: offset_anchor + record.raw_offset as usize,
            size: record.size as usize,
            kind: EntryKind::Rsfl(RsflEntry {
                raw_offset: record.raw_offset,
                unk: record.unk,
                table_offset,
                offset_anchor,
            }),
        });
    }

    Ok((
        RsflChunk {
            offset: chunk.offset,
            chunk_size: chunk.header.total_size,
            type1: chunk.header.type1,
            type2: chunk.header.type2,
            inner_size: header.inner_size,
            inner_type1: header.type1,
            inner_type2: header.type2,
            entry_count: header.entry_count,
            table_end: cursor,
        },
        entries,
    ))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::model::EntryKind;
    use crate::rsfl::parse_table;
    use crate::scan::ChunkDescriptor;
    use crate::types::{padded_name, ChunkHeader, RSFL_INNER_MAGIC};

    /// Build an archive holding one LFSR chunk whose payload area follows the table
    fn rsfl_archive(names: &[&[u8]], raw_offsets: &[u32], payload: &[u8]) -> Vec<u8> {
        let mut table = Vec::new();
        for (name, raw_offset) in names.iter().zip(raw_offsets) {
            table.extend(padded_name(name));
            table.extend(raw_offset.to_le_bytes());
            table.extend(4u32.to_le_bytes());
            table.extend(0x77u32.to_le_bytes());
        }

        let chunk_size = 16 + 20 + table.len() + payload.len();
        let mut data = b"Asura   ".to_vec();
        data.extend(b"LFSR");
        data.extend((chunk_size as u32).to_le_bytes());
        data.extend(3u32.to_le_bytes());
        data.extend(4u32.to_le_bytes());
        data.extend(RSFL_INNER_MAGIC.to_le_bytes());
        data.extend(((20 + table.len() + payload.len()) as u32).to_le_bytes());
        data.extend(5u32.to_le_bytes());
        data.extend(6u32.to_le_bytes());
        data.extend((names.len() as u32).to_le_bytes());
        data.extend(table);
        data.extend(payload);
        data
    }

    fn descriptor(data: &[u8]) -> ChunkDescriptor {
        ChunkDescriptor {
            offset: 8,
            header: ChunkHeader {
                tag: *b"LFSR",
                total_size: (data.len() - 8) as u32,
                type1: 3,
                type2: 4,
            },
        }
    }

    #[test]
    fn offsets_relative_to_chunk_start() -> Result<()> {
        // payloads start 16 + 20 + (8 + 12) + (16 + 12) = 84 bytes after the chunk start
        let data = rsfl_archive(
            &[b"a\\one", b"\\dir\\two.tga"],
            &[84, 88],
            b"AAAABBBB",
        );
        let (chunk, entries) = parse_table(&data, &descriptor(&data))?;

        assert_eq!(chunk.entry_count, 2);
        assert_eq!(chunk.inner_type1, 5);
        assert_eq!(chunk.table_end, 92);
        assert_eq!(entries.len(), 2);

        assert_eq!(&*entries[0].relative_path, "a/one");
        assert_eq!(&data[entries[0].range()], b"AAAA");
        assert_eq!(&*entries[1].name, "\\dir\\two.tga");
        assert_eq!(&*entries[1].relative_path, "dir/two.tga");
        assert_eq!(&data[entries[1].range()], b"BBBB");

        let EntryKind::Rsfl(rsfl) = entries[1].kind else {
            panic!("expected an RSFL entry");
        };
        assert_eq!(rsfl.offset_anchor, 8);
        assert_eq!(rsfl.unk, 0x77);
        assert_eq!(rsfl.table_offset, 44 + 8 + 12 + 16);

        Ok(())
    }

    #[test]
    fn offsets_relative_to_chunk_end() -> Result<()> {
        let mut data = rsfl_archive(&[b"tail"], &[4], b"");
        data.extend(b"padsDATA");
        // the chunk does not cover the trailing bytes
        let mut chunk = descriptor(&data);
        chunk.header.total_size -= 8;

        let (_, entries) = parse_table(&data, &chunk)?;
        let EntryKind::Rsfl(rsfl) = entries[0].kind else {
            panic!("expected an RSFL entry");
        };

        assert_eq!(rsfl.offset_anchor, chunk.end());
        assert_eq!(&data[entries[0].range()], b"DATA");

        Ok(())
    }

    #[test]
    fn out_of_bounds_entry_fails() {
        let data = rsfl_archive(&[b"lost"], &[4096], b"AAAA");

        assert!(matches!(
            parse_table(&data, &descriptor(&data)),
            Err(Error::EntryOutOfBounds { name }) if name == "lost"
        ));
    }

    #[test]
    fn corrupted_inner_header_fails() {
        let mut data = rsfl_archive(&[b"name"], &[0], b"AAAA");
        data[24] = b'X';

        assert!(matches!(
            parse_table(&data, &descriptor(&data)),
            Err(Error::CorruptedRsflHeader(24))
        ));
    }

    #[test]
    fn entry_count_beyond_table_fails() {
        let mut data = rsfl_archive(&[b"name"], &[56], b"AAAA");
        data[40..44].copy_from_slice(&u32::MAX.to_le_bytes());

        assert!(matches!(
            parse_table(&data, &descriptor(&data)),
            Err(Error::UnterminatedName(_) | Error::Truncated { .. })
        ));
    }

    #[test]
    fn truncated_record_fails() {
        let mut data = rsfl_archive(&[b"name"], &[0], b"");
        data.truncate(data.len() - 4);

        assert!(matches!(
            parse_table(&data, &descriptor(&data)),
            Err(Error::Truncated { .. })
        ));
    }
}
