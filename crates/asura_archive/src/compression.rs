//! Outer compression envelope handling.
//!
//! An archive is either stored as is (`Asura   `), as one zlib stream (`AsuraZlb`) or as a list of independently
//! compressed zlib blocks (`AsuraZbb`). The block boundaries of the latter can't be recovered from the payload, so
//! they are remembered in the [`Wrapper`] and reused as hints when the archive is compressed again.

use std::borrow::Cow;
use std::io::{Cursor, Read, Write};

use binrw::{BinRead, BinWrite};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::{instrument, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{
    ZbbBlockHeader, ZbbHeader, ZlbHeader, ASURA_MAGIC, ASURA_ZBB_MAGIC, ASURA_ZLB_MAGIC,
};

/// Identifies the envelope an archive payload was stored in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "lowercase"))]
pub enum Wrapper {
    /// Stored without compression
    #[default]
    Raw,

    /// Compressed as a single zlib stream
    Zlb {
        /// Opaque header value, written back unchanged
        unknown: u32,

        /// Length of the decompressed payload
        expected_size: u32,
    },

    /// Compressed as a sequence of zlib blocks
    Zbb {
        /// Uncompressed length of each block, in file order
        chunk_sizes: Vec<u32>,

        /// Length of the decompressed payload
        total_size: u32,
    },
}

impl Wrapper {
    /// Short name of the wrapper kind
    pub fn kind(&self) -> &'static str {
        match self {
            Wrapper::Raw => "raw",
            Wrapper::Zlb { .. } => "zlb",
            Wrapper::Zbb { .. } => "zbb",
        }
    }
}

/// Strip the compression envelope from `data`.
///
/// Uncompressed archives are returned borrowed, everything else is inflated into a new buffer.
#[instrument(skip_all, err, fields(size = data.len()))]
pub fn unwrap_container(data: &[u8]) -> Result<(Cow<'_, [u8]>, Wrapper)> {
    let signature = data.get(..8).unwrap_or(data);

    if signature == ASURA_MAGIC {
        return Ok((Cow::Borrowed(data), Wrapper::Raw));
    }

    if signature == ASURA_ZLB_MAGIC {
        return unwrap_zlb(data).map(|(payload, wrapper)| (Cow::Owned(payload), wrapper));
    }

    if signature == ASURA_ZBB_MAGIC {
        return unwrap_zbb(data).map(|(payload, wrapper)| (Cow::Owned(payload), wrapper));
    }

    Err(Error::UnsupportedWrapper(
        String::from_utf8_lossy(signature).into_owned(),
    ))
}

fn unwrap_zlb(data: &[u8]) -> Result<(Vec<u8>, Wrapper)> {
    if data.len() < ZlbHeader::SIZE {
        return Err(Error::Truncated {
            what: "AsuraZlb header",
            offset: 0,
        });
    }

    let header = ZlbHeader::read(&mut Cursor::new(data))?;

    let mut stream = &data[ZlbHeader::SIZE..];
    let compressed_size = header.compressed_size as usize;
    if compressed_size != 0 && compressed_size <= stream.len() {
        stream = &stream[..compressed_size];
    }

    let payload = inflate(stream, "AsuraZlb")?;

    let mut expected_size = header.uncompressed_size;
    if expected_size != 0 && payload.len() != expected_size as usize {
        warn!(
            declared = expected_size,
            actual = payload.len(),
            "decompressed size disagrees with the AsuraZlb header, trusting the stream"
        );
        expected_size = payload.len() as u32;
    }

    Ok((
        payload,
        Wrapper::Zlb {
            unknown: header.unknown,
            expected_size,
        },
    ))
}

fn unwrap_zbb(data: &[u8]) -> Result<(Vec<u8>, Wrapper)> {
    if data.len() < ZbbHeader::SIZE {
        return Err(Error::Truncated {
            what: "AsuraZbb header",
            offset: 0,
        });
    }

    let header = ZbbHeader::read(&mut Cursor::new(data))?;
    let total_size = header.total_size as usize;

    let mut payload = Vec::with_capacity(total_size.min(data.len()));
    let mut chunk_sizes = Vec::new();
    let mut cursor = ZbbHeader::SIZE;

    while cursor + ZbbBlockHeader::SIZE <= data.len() {
        let block = ZbbBlockHeader::read(&mut Cursor::new(&data[cursor..]))?;
        cursor += ZbbBlockHeader::SIZE;
        if block.compressed_size == 0 {
            break;
        }

        let end = cursor + block.compressed_size as usize;
        let Some(stream) = data.get(cursor..end) else {
            return Err(Error::Truncated {
                what: "AsuraZbb block",
                offset: cursor,
            });
        };
        cursor = end;

        let inflated = inflate(stream, "AsuraZbb")?;
        if block.uncompressed_size != 0 && inflated.len() != block.uncompressed_size as usize {
            return Err(Error::BlockSizeMismatch {
                expected: block.uncompressed_size,
                actual: inflated.len(),
            });
        }

        chunk_sizes.push(inflated.len() as u32);
        payload.extend_from_slice(&inflated);

        if total_size != 0 && payload.len() >= total_size {
            break;
        }
    }

    let mut total_size = header.total_size;
    if total_size != 0 && payload.len() != total_size as usize {
        warn!(
            declared = total_size,
            actual = payload.len(),
            "decompressed size disagrees with the AsuraZbb header, trusting the blocks"
        );
        total_size = payload.len() as u32;
    }

    Ok((
        payload,
        Wrapper::Zbb {
            chunk_sizes,
            total_size,
        },
    ))
}

fn inflate(stream: &[u8], wrapper: &'static str) -> Result<Vec<u8>> {
    let mut inflated = Vec::new();
    ZlibDecoder::new(stream)
        .read_to_end(&mut inflated)
        .map_err(|source| Error::Decompression { wrapper, source })?;
    Ok(inflated)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn size_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::OffsetOverflow {
        path: "<container>".to_owned(),
    })
}

/// Apply the envelope described by `wrapper` to `payload`.
///
/// `Zbb` payloads are split using the recorded block sizes as hints, cycling back to the last recorded size once
/// the list is exhausted, so a payload that grew or shrank still produces a valid block list.
#[instrument(skip_all, err, fields(size = payload.len(), kind = wrapper.kind()))]
pub fn wrap_container(payload: &[u8], wrapper: &Wrapper) -> Result<Vec<u8>> {
    match wrapper {
        Wrapper::Raw => Ok(payload.to_vec()),
        Wrapper::Zlb { unknown, .. } => {
            let compressed = deflate(payload)?;
            let header = ZlbHeader {
                unknown: *unknown,
                compressed_size: size_u32(compressed.len())?,
                uncompressed_size: size_u32(payload.len())?,
            };

            let mut output = Cursor::new(Vec::with_capacity(ZlbHeader::SIZE + compressed.len()));
            header.write(&mut output)?;
            output.write_all(&compressed)?;
            Ok(output.into_inner())
        }
        Wrapper::Zbb { chunk_sizes, .. } => {
            let fallback = chunk_sizes
                .last()
                .copied()
                .filter(|size| *size > 0)
                .map(|size| size as usize)
                .unwrap_or(payload.len().max(1));

            let mut blocks = Cursor::new(Vec::new());
            let mut total_compressed = 0u32;
            let mut cursor = 0;
            let mut hints = chunk_sizes.iter().map(|size| *size as usize);

            while cursor < payload.len() {
                let hint = match hints.next() {
                    Some(size) if size > 0 => size,
                    _ => fallback,
                };
                let end = payload.len().min(cursor + hint);
                let block = &payload[cursor..end];
                let compressed = deflate(block)?;

                ZbbBlockHeader {
                    compressed_size: size_u32(compressed.len())?,
                    uncompressed_size: size_u32(block.len())?,
                }
                .write(&mut blocks)?;
                blocks.write_all(&compressed)?;

                total_compressed = total_compressed
                    .checked_add(size_u32(compressed.len())?)
                    .ok_or(Error::OffsetOverflow {
                        path: "<container>".to_owned(),
                    })?;
                cursor = end;
            }

            let header = ZbbHeader {
                total_compressed,
                total_size: size_u32(payload.len())?,
            };

            let blocks = blocks.into_inner();
            let mut output = Cursor::new(Vec::with_capacity(ZbbHeader::SIZE + blocks.len()));
            header.write(&mut output)?;
            output.write_all(&blocks)?;
            Ok(output.into_inner())
        }
    }
}
