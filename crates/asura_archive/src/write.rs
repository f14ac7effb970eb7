//! Types for modifying and writing Asura archives
//!

use std::io::{self, Cursor, Write};
use std::mem;

use binrw::BinWrite;
use bon::Builder;
use byteorder::{ByteOrder, LittleEndian};
use indexmap::IndexMap;
use tracing::{debug, instrument, warn, Level};

use crate::error::{Error, Result};
use crate::model::{Entry, EntryKind, RscfEntry};
use crate::types::{
    decode_name, padded_name, ChunkHeader, RscfHeader, RsflHeader, RsflRecord, ASURA_MAGIC,
    RSCF_TAG, RSFL_INNER_MAGIC, RSFL_TAG,
};

/// New payloads keyed by relative path
pub type Replacements = IndexMap<String, Vec<u8>>;

/// Offset of `offset` from `anchor`, as stored in an RSFL table record.
pub(crate) fn encode_raw_offset(offset: usize, anchor: usize, path: &str) -> Result<u32> {
    let relative = offset
        .checked_sub(anchor)
        .ok_or_else(|| Error::NegativeOffset {
            path: path.to_owned(),
        })?;
    u32::try_from(relative).map_err(|_| Error::OffsetOverflow {
        path: path.to_owned(),
    })
}

fn checked_u32(value: usize, path: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::OffsetOverflow {
        path: path.to_owned(),
    })
}

fn write_u32_at(buffer: &mut [u8], offset: usize, value: u32) -> Result<()> {
    let Some(field) = buffer.get_mut(offset..offset + 4) else {
        return Err(Error::Truncated {
            what: "size field",
            offset,
        });
    };
    LittleEndian::write_u32(field, value);
    Ok(())
}

/// Apply `replacements` to a copy of `buffer`, returning the new buffer and the updated entries.
///
/// Entries are processed in archive order. RSFL payloads that change size are appended to the end of the archive
/// and their table record is rewritten. RSCF payloads are spliced in place, and every chunk after a resized one is
/// shifted before the next replacement is looked at.
#[instrument(skip_all, err, fields(entries = entries.len(), replacements = replacements.len()))]
pub fn apply_replacements(
    buffer: &[u8],
    entries: &[Entry],
    replacements: &Replacements,
) -> Result<(Vec<u8>, Vec<Entry>)> {
    let mut buffer = buffer.to_vec();
    let mut entries = entries.to_vec();

    for path in replacements.keys() {
        if !entries.iter().any(|entry| *entry.relative_path == **path) {
            warn!(path, "replacement does not match any entry, ignoring it");
        }
    }

    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by_key(|&index| entries[index].archive_position());

    for index in order {
        let Some(payload) = replacements.get(&*entries[index].relative_path) else {
            continue;
        };

        if matches!(entries[index].kind, EntryKind::Rsfl(_)) {
            replace_rsfl(&mut buffer, &mut entries[index], payload)?;
        } else {
            replace_rscf(&mut buffer, &mut entries, index, payload)?;
        }
    }

    Ok((buffer, entries))
}

#[instrument(skip_all, err, fields(path = %entry.relative_path, size = payload.len()))]
fn replace_rsfl(buffer: &mut Vec<u8>, entry: &mut Entry, payload: &[u8]) -> Result<()> {
    let EntryKind::Rsfl(mut rsfl) = entry.kind else {
        return Ok(());
    };

    if payload.len() == entry.size {
        let Some(target) = buffer.get_mut(entry.range()) else {
            return Err(Error::EntryOutOfBounds {
                name: entry.name.to_string(),
            });
        };
        target.copy_from_slice(payload);
        return Ok(());
    }

    let padding = (4 - buffer.len() % 4) % 4;
    buffer.resize(buffer.len() + padding, 0);
    let offset = buffer.len();
    buffer.extend_from_slice(payload);

    rsfl.raw_offset = encode_raw_offset(offset, rsfl.offset_anchor, &entry.relative_path)?;
    let record = RsflRecord {
        raw_offset: rsfl.raw_offset,
        size: checked_u32(payload.len(), &entry.relative_path)?,
        unk: rsfl.unk,
    };

    let Some(slot) = buffer.get_mut(rsfl.table_offset..rsfl.table_offset + RsflRecord::SIZE) else {
        return Err(Error::Truncated {
            what: "RSFL table record",
            offset: rsfl.table_offset,
        });
    };
    record.write(&mut Cursor::new(slot))?;
    debug!(offset, raw_offset = rsfl.raw_offset, "appended payload");

    entry.offset = offset;
    entry.size = payload.len();
    entry.kind = EntryKind::Rsfl(rsfl);

    Ok(())
}

#[instrument(skip_all, err, fields(path = %entries[index].relative_path, size = payload.len()))]
fn replace_rscf(
    buffer: &mut Vec<u8>,
    entries: &mut [Entry],
    index: usize,
    payload: &[u8],
) -> Result<()> {
    let entry = &entries[index];
    let EntryKind::Rscf(rscf) = entry.kind else {
        return Ok(());
    };
    let path = entry.relative_path.to_string();
    let range = entry.range();
    if range.end > buffer.len() {
        return Err(Error::EntryOutOfBounds {
            name: entry.name.to_string(),
        });
    }

    let delta = payload.len() as i64 - entry.size as i64;
    let span = checked_u32(payload.len(), &path)?;
    let chunk_size = match i64::from(rscf.chunk_size) + delta {
        size if size <= 0 => return Err(Error::ChunkUnderflow { path }),
        size => u32::try_from(size).map_err(|_| Error::OffsetOverflow { path: path.clone() })?,
    };

    buffer.splice(range, payload.iter().copied());
    write_u32_at(buffer, rscf.header_offset + 8, span)?;
    write_u32_at(buffer, rscf.chunk_offset + 4, chunk_size)?;

    let entry = &mut entries[index];
    entry.size = payload.len();
    entry.kind = EntryKind::Rscf(RscfEntry {
        chunk_size,
        header_data_span: span,
        ..rscf
    });

    if delta == 0 {
        return Ok(());
    }

    let delta = delta as isize;
    let shift = |value: usize| {
        value
            .checked_add_signed(delta)
            .ok_or_else(|| Error::ChunkUnderflow { path: path.clone() })
    };

    for sibling in entries.iter_mut() {
        let EntryKind::Rscf(other) = &mut sibling.kind else {
            continue;
        };
        if other.chunk_offset <= rscf.chunk_offset {
            continue;
        }

        other.chunk_offset = shift(other.chunk_offset)?;
        other.offset_anchor = shift(other.offset_anchor)?;
        other.header_offset = shift(other.header_offset)?;
        sibling.offset = shift(sibling.offset)?;
    }
    debug!(delta, "shifted following chunks");

    Ok(())
}

/// Options for the chunk headers of an RSFL archive
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct RsflWriterOptions {
    /// `type1` of the LFSR chunk header
    #[builder(default)]
    pub chunk_type1: u32,

    /// `type2` of the LFSR chunk header
    #[builder(default)]
    pub chunk_type2: u32,

    /// `type1` of the inner table header
    #[builder(default)]
    pub table_type1: u32,

    /// `type2` of the inner table header
    #[builder(default)]
    pub table_type2: u32,
}

#[derive(Debug, Clone)]
struct RsflPending {
    name: Vec<u8>,
    path: Box<str>,
    unk: u32,
    offset: usize,
    size: usize,
}

/// RSFL archive generator
///
/// Every offset in the table is written relative to the start of the LFSR chunk.
///
/// ```
/// # fn doit() -> asura_archive::error::Result<()>
/// # {
/// use std::io::Write;
/// use asura_archive::write::{RsflWriter, RsflWriterOptions};
///
/// let mut rsfl = RsflWriter::new(Vec::new(), RsflWriterOptions::default());
///
/// rsfl.start_file(b"graphics\\hello.tga", 0)?;
/// rsfl.write_all(b"Hello, World!")?;
///
/// let archive = rsfl.finish()?;
/// assert!(archive.starts_with(b"Asura   LFSR"));
///
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct RsflWriter<W: Write> {
    inner: W,
    options: RsflWriterOptions,
    writing_to_file: bool,
    records: Vec<RsflPending>,
    payload_area: Vec<u8>,
}

impl<W: Write> RsflWriter<W> {
    /// Initializes the archive.
    ///
    /// Before writing to this object, the [`RsflWriter::start_file`] function should be called.
    pub fn new(inner: W, options: RsflWriterOptions) -> RsflWriter<W> {
        RsflWriter {
            inner,
            options,
            writing_to_file: false,
            records: Vec::new(),
            payload_area: Vec::new(),
        }
    }

    /// Returns true if a file is currently open for writing.
    pub const fn is_writing_file(&self) -> bool {
        self.writing_to_file
    }

    /// Start a new file stored under the raw name `name`.
    ///
    /// `unk` is stored verbatim in the table record.
    #[instrument(skip(self, name), err)]
    pub fn start_file(&mut self, name: impl AsRef<[u8]>, unk: u32) -> Result<()> {
        if self.writing_to_file {
            self.finish_file()?;
        }

        let padding = (4 - self.payload_area.len() % 4) % 4;
        self.payload_area
            .resize(self.payload_area.len() + padding, 0);

        self.records.push(RsflPending {
            name: padded_name(name.as_ref()),
            path: decode_name(name.as_ref()),
            unk,
            offset: self.payload_area.len(),
            size: 0,
        });
        self.writing_to_file = true;

        Ok(())
    }

    #[instrument(skip(self), err)]
    fn finish_file(&mut self) -> Result<()> {
        if let Some(record) = self.records.last_mut() {
            record.size = self.payload_area.len() - record.offset;
        }
        self.writing_to_file = false;

        Ok(())
    }

    /// Finish the last file and write the signature, chunk headers, table and payloads.
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<W> {
        if self.writing_to_file {
            self.finish_file()?;
        }

        let table_len: usize = self
            .records
            .iter()
            .map(|record| record.name.len() + RsflRecord::SIZE)
            .sum();
        let payload_base = ChunkHeader::SIZE + RsflHeader::SIZE + table_len;

        let mut table = Cursor::new(Vec::with_capacity(table_len));
        for record in &self.records {
            table.write_all(&record.name)?;
            RsflRecord {
                raw_offset: checked_u32(payload_base + record.offset, &record.path)?,
                size: checked_u32(record.size, &record.path)?,
                unk: record.unk,
            }
            .write(&mut table)?;
        }

        let inner_size = checked_u32(
            RsflHeader::SIZE + table_len + self.payload_area.len(),
            "<rsfl table>",
        )?;
        let chunk = ChunkHeader {
            tag: *RSFL_TAG,
            total_size: checked_u32(ChunkHeader::SIZE + inner_size as usize, "<rsfl table>")?,
            type1: self.options.chunk_type1,
            type2: self.options.chunk_type2,
        };
        let header = RsflHeader {
            magic: RSFL_INNER_MAGIC,
            inner_size,
            type1: self.options.table_type1,
            type2: self.options.table_type2,
            entry_count: checked_u32(self.records.len(), "<rsfl table>")?,
        };

        let mut headers = Cursor::new(Vec::with_capacity(ChunkHeader::SIZE + RsflHeader::SIZE));
        chunk.write(&mut headers)?;
        header.write(&mut headers)?;

        self.inner.write_all(ASURA_MAGIC)?;
        self.inner.write_all(&headers.into_inner())?;
        self.inner.write_all(&table.into_inner())?;
        self.inner.write_all(&self.payload_area)?;

        Ok(self.inner)
    }
}

impl<W: Write> Write for RsflWriter<W> {
    #[instrument(skip_all, err, ret(level = Level::TRACE), fields(size=buf.len()) )]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writing_to_file {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "No file has been started",
            ));
        }
        io::Write::write(&mut self.payload_area, buf)
    }

    #[instrument(skip(self), err)]
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Header values of a single RSCF chunk
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct RscfFileOptions {
    /// `type1` of the chunk header
    #[builder(default)]
    pub type1: u32,

    /// `type2` of the chunk header
    #[builder(default)]
    pub type2: u32,

    #[builder(default)]
    pub version: u32,

    /// Stored verbatim, the payload always follows the name directly
    #[builder(default)]
    pub data_offset: u32,
}

#[derive(Debug)]
struct RscfPending {
    name: Vec<u8>,
    path: Box<str>,
    options: RscfFileOptions,
    data: Vec<u8>,
}

/// RSCF archive generator, writing one self-contained chunk per file
///
/// ```
/// # fn doit() -> asura_archive::error::Result<()>
/// # {
/// use std::io::Write;
/// use asura_archive::write::{RscfFileOptions, RscfWriter};
///
/// let mut rscf = RscfWriter::new(Vec::new());
///
/// rscf.start_file(b"graphics\\hello.tga", RscfFileOptions::builder().version(2).build())?;
/// rscf.write_all(b"Hello, World!")?;
///
/// let archive = rscf.finish()?;
/// assert!(archive.starts_with(b"Asura   RSCF"));
///
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct RscfWriter<W: Write> {
    inner: W,
    chunks: Cursor<Vec<u8>>,
    current: Option<RscfPending>,
}

impl<W: Write> RscfWriter<W> {
    /// Initializes the archive.
    pub fn new(inner: W) -> RscfWriter<W> {
        let mut chunks = Cursor::new(ASURA_MAGIC.to_vec());
        chunks.set_position(ASURA_MAGIC.len() as u64);

        RscfWriter {
            inner,
            chunks,
            current: None,
        }
    }

    /// Returns true if a file is currently open for writing.
    pub const fn is_writing_file(&self) -> bool {
        self.current.is_some()
    }

    /// Start a new chunk for the file stored under the raw name `name`.
    #[instrument(skip(self, name), err)]
    pub fn start_file(&mut self, name: impl AsRef<[u8]>, options: RscfFileOptions) -> Result<()> {
        if self.current.is_some() {
            self.finish_file()?;
        }

        let _ = mem::replace(
            &mut self.current,
            Some(RscfPending {
                name: padded_name(name.as_ref()),
                path: decode_name(name.as_ref()),
                options,
                data: Vec::new(),
            }),
        );

        Ok(())
    }

    #[instrument(skip(self), err)]
    fn finish_file(&mut self) -> Result<()> {
        let Some(file) = self.current.take() else {
            return Ok(());
        };
        let chunk = ChunkHeader {
            tag: *RSCF_TAG,
            total_size: checked_u32(
                ChunkHeader::SIZE + RscfHeader::SIZE + file.name.len() + file.data.len(),
                &file.path,
            )?,
            type1: file.options.type1,
            type2: file.options.type2,
        };
        let header = RscfHeader {
            version: file.options.version,
            data_offset: file.options.data_offset,
            data_span: checked_u32(file.data.len(), &file.path)?,
        };

        chunk.write(&mut self.chunks)?;
        header.write(&mut self.chunks)?;
        self.chunks.write_all(&file.name)?;
        self.chunks.write_all(&file.data)?;

        Ok(())
    }

    /// Finish the last file and write every chunk
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<W> {
        self.finish_file()?;

        self.inner.write_all(self.chunks.get_ref())?;

        Ok(self.inner)
    }
}

impl<W: Write> Write for RscfWriter<W> {
    #[instrument(skip_all, err, ret(level = Level::TRACE), fields(size=buf.len()) )]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(file) = self.current.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "No file has been started",
            ));
        };
        io::Write::write(&mut file.data, buf)
    }

    #[instrument(skip(self), err)]
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
