//! Readable byte source backing a loaded archive

use std::fmt::{self, Debug};
use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};
use tracing::debug;

use crate::error::Result;

/// Bytes of an archive, either owned on the heap or mapped read-only from disk.
///
/// Parsing only ever sees `&[u8]`. A mapping is released when the source is dropped, so every exit path of a load
/// unmaps the file.
pub enum ArchiveSource {
    Heap(Vec<u8>),
    Mapped(Mmap),
}

impl ArchiveSource {
    /// Open `path`, mapping it when it is at least `threshold` bytes long.
    pub fn open(path: &Path, threshold: u64) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        if size > 0 && size >= threshold {
            // Safety: the mapping is read-only and the source never hands out mutable access.
            match unsafe { MmapOptions::new().map(&file) } {
                Ok(mmap) => {
                    debug!(path = %path.display(), size, "memory-mapped archive");
                    return Ok(ArchiveSource::Mapped(mmap));
                }
                Err(e) => {
                    debug!(path = %path.display(), "failed to memory-map archive, reading it instead: {e}");
                }
            }
        }

        Ok(ArchiveSource::Heap(std::fs::read(path)?))
    }

    /// Whether the bytes live in a file mapping
    pub fn is_mapped(&self) -> bool {
        matches!(self, ArchiveSource::Mapped(_))
    }
}

impl Deref for ArchiveSource {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            ArchiveSource::Heap(data) => data.as_slice(),
            ArchiveSource::Mapped(mmap) => &mmap[..],
        }
    }
}

impl AsRef<[u8]> for ArchiveSource {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl From<Vec<u8>> for ArchiveSource {
    fn from(value: Vec<u8>) -> Self {
        ArchiveSource::Heap(value)
    }
}

impl Debug for ArchiveSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArchiveSource::Heap(data) => write!(f, "Heap({} bytes)", data.len()),
            ArchiveSource::Mapped(mmap) => write!(f, "Mapped({} bytes)", mmap.len()),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use crate::error::Result;
    use crate::source::ArchiveSource;

    #[test]
    fn small_files_stay_on_the_heap() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"Asura   payload")?;

        let source = ArchiveSource::open(file.path(), 1024)?;
        assert!(!source.is_mapped());
        assert_eq!(&*source, b"Asura   payload");

        Ok(())
    }

    #[test]
    fn large_files_are_mapped() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"Asura   payload")?;

        let source = ArchiveSource::open(file.path(), 4)?;
        assert!(source.is_mapped());
        assert_eq!(&*source, b"Asura   payload");

        Ok(())
    }
}
