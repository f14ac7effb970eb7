//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Transparent wrapper for [`serde_json::Error`]
    #[cfg(feature = "serde")]
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// file does not start with the plain Asura signature
    #[error("file is not an Asura archive")]
    NotAnArchive,

    /// the 8 byte signature is not one of the known wrappers
    #[error("unsupported Asura container wrapper {0:?}")]
    #[diagnostic(help("try running the QuickBMS script over the file first"))]
    UnsupportedWrapper(String),

    /// a fixed size structure runs past the end of the buffer
    #[error("truncated {what} at offset {offset:#x}")]
    Truncated { what: &'static str, offset: usize },

    /// a chunk declares a total size of zero
    #[error("encountered zero-sized chunk at offset {0:#x} while scanning")]
    ZeroSizedChunk(usize),

    /// neither an LFSR nor an RSCF chunk exists in the archive
    #[error("unable to locate RS controlled chunks")]
    NoResourceChunks,

    /// the LFSR inner header does not carry the expected magic
    #[error("corrupted RSFL inner header at offset {0:#x}")]
    CorruptedRsflHeader(usize),

    /// a padded name never terminates before the end of the buffer
    #[error("unterminated padded name at offset {0:#x}")]
    UnterminatedName(usize),

    /// an RSFL table entry points outside of the archive
    #[error("entry {name} points outside of archive bounds")]
    EntryOutOfBounds { name: String },

    /// no payload candidate of an RSCF chunk fits inside the chunk
    #[error("RSCF payload of {name} exceeds chunk bounds")]
    RscfPayloadOutOfBounds { name: String },

    /// a zbb block decompressed to a different length than its header states
    #[error("decompressed zbb block holds {actual} bytes, header declares {expected}")]
    BlockSizeMismatch { expected: u32, actual: usize },

    /// the zlib stream of a wrapper could not be inflated
    #[error("failed to decompress {wrapper} archive")]
    Decompression {
        wrapper: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// a value written back does not fit into 32 bits
    #[error("replacement for {path} exceeds 32-bit offset capacity")]
    OffsetOverflow { path: String },

    /// an RSFL offset would point before its anchor
    #[error("replacement for {path} would produce a negative offset")]
    NegativeOffset { path: String },

    /// an RSCF chunk would shrink to zero bytes or less
    #[error("replacement for {path} would shrink the RSCF chunk below zero bytes")]
    ChunkUnderflow { path: String },

    /// two entries normalise to the same relative path
    #[error("archive contains the entry {0} more than once")]
    DuplicateEntry(String),

    /// unable to find requested entry
    #[error("unable to find requested entry")]
    EntryNotFound(#[from] EntryNotFoundError),

    /// two entries would be extracted to the same file
    #[error("entries {first} and {second} would both be exported to {path}")]
    ExportPathCollision {
        path: String,
        first: String,
        second: String,
    },

    /// every replacement matches the original payload
    #[error("no modified files differ from the original archive")]
    NothingToPatch,

    /// none of the manifest's files exist in the modified directory
    #[error("no modified files found in the provided directory")]
    NoReplacements,

    /// manifest lists no files
    #[error("manifest does not contain any file entries")]
    EmptyManifest,

    /// manifest was produced from another archive
    #[error("archive {actual} does not match manifest metadata ({expected})")]
    ArchiveMismatch { expected: String, actual: String },

    /// manifest was produced from an archive with another wrapper
    #[error("manifest was generated from a {expected} archive, found {actual}")]
    WrapperMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Error type to provide further information when an entry has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested entry")]
pub enum EntryNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
