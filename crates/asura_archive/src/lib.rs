//! This library handles reading, patching and creating **Asura** resource archives.
//!
//! # Asura Archive Format Documentation
//!
//! Asura archives bundle the named resources of a level or front end (mostly textures) into a flat stream of
//! tagged chunks. The resources are either addressed through one shared offset table (**RSFL** layout) or stored
//! as one self-contained chunk each (**RSCF** layout).
//!
//! ## Envelope
//!
//! The first 8 bytes select an optional compression envelope around the archive.
//!
//! | Signature    | Description                                                                  |
//! |--------------|------------------------------------------------------------------------------|
//! | `Asura   `   | Uncompressed archive, the signature is part of the payload                   |
//! | `AsuraZlb`   | One zlib stream holding the whole archive                                    |
//! | `AsuraZbb`   | A sequence of independently compressed zlib blocks                           |
//!
//! ### AsuraZlb
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Signature              | 8 bytes: "AsuraZlb"                                        |
//! | 0x0008         | Unknown                | 4 bytes: Opaque, written back unchanged                    |
//! | 0x000C         | Compressed Size        | 4 bytes: Length of the zlib stream                         |
//! | 0x0010         | Uncompressed Size      | 4 bytes: Length of the decompressed archive                |
//! | 0x0014         | Stream                 | zlib stream                                                |
//!
//! ### AsuraZbb
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Signature              | 8 bytes: "AsuraZbb"                                        |
//! | 0x0008         | Total Compressed       | 4 bytes: Sum of the compressed block sizes                 |
//! | 0x000C         | Total Size             | 4 bytes: Length of the decompressed archive                |
//! | 0x0010         | Blocks                 | Block header followed by a zlib stream, repeated           |
//!
//! Every block starts with its compressed and uncompressed size (4 bytes each). A compressed size of zero ends the
//! block list early.
//!
//! ## Chunks
//!
//! After the `Asura   ` signature the archive is a sequence of chunks, each starting with a 16 byte header.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Tag                    | 4 bytes: Chunk kind, e.g. "LFSR" or "RSCF"                 |
//! | 0x0004         | Total Size             | 4 bytes: Size of the chunk, header included                |
//! | 0x0008         | Type 1                 | 4 bytes: Opaque                                            |
//! | 0x000C         | Type 2                 | 4 bytes: Opaque                                            |
//!
//! Chunks with other tags are skipped. An `LFSR` chunk takes priority over any `RSCF` chunk.
//!
//! ### LFSR (RSFL layout)
//!
//! The chunk header is followed by a 20 byte table header: magic `0x5246534C`, inner size, two opaque type fields
//! and the number of entries. Each entry is a NUL terminated name padded to 4 bytes followed by a 12 byte record.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Raw Offset             | 4 bytes: Payload offset from the chunk start or chunk end  |
//! | 0x0004         | Size                   | 4 bytes: Payload size                                      |
//! | 0x0008         | Unknown                | 4 bytes: Opaque                                            |
//!
//! Different tools measure the raw offset from different ends of the chunk. The end is tried first and the start
//! is used when the payload would not fit inside the archive.
//!
//! ### RSCF (RSCF layout)
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0010         | Version                | 4 bytes: Opaque                                            |
//! | 0x0014         | Data Offset            | 4 bytes: Payload offset from the end of the name           |
//! | 0x0018         | Data Span              | 4 bytes: Payload size                                      |
//! | 0x001C         | Name                   | NUL terminated, padded to 4 bytes                          |
//!
//! The high byte of the data offset is sometimes used for flags. When neither the plain nor the masked data
//! offset fits, the payload is taken to end with the chunk.
//!
//! ## Additional Information
//!
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Names**: UTF-8, with a Latin-1 fallback, using `\` as separator
//!

pub mod compression;
pub mod error;
#[cfg(feature = "serde")]
pub mod manifest;
pub mod model;
pub mod patch;
pub mod read;
pub mod rscf;
pub mod rsfl;
pub mod scan;
pub mod source;
pub mod types;
pub mod write;

pub use compression::{unwrap_container, wrap_container, Wrapper};
pub use model::{Entry, EntryKind, Layout};
pub use patch::{build_patch, Patch};
pub use read::{AsuraArchive, LoadOptions};
pub use write::{apply_replacements, Replacements, RscfWriter, RsflWriter};
