use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use memmap2::MmapMut;

/// A fixed-size file mapped read-write into memory.
///
/// The mapping is shared, so writes land in the file once the OS flushes
/// or on an explicit [`MmapFile::flush`].
#[derive(Debug)]
pub struct MmapFile {
    mmap: MmapMut,
    file: File,
}

impl MmapFile {
    /// Creates a new file of exactly `size` bytes and maps it.
    ///
    /// Fails if the path already exists. The kernel zero-fills the
    /// extended file, so the mapped region starts all-zero.
    pub fn create(path: &Path, size: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.set_len(size)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { mmap, file })
    }

    /// Maps an existing file read-write at its current size.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { mmap, file })
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Flush dirty pages and sync the backing file.
    pub fn flush(&self) -> io::Result<()> {
        self.mmap.flush()?;
        self.file.sync_all()
    }
}

impl AsRef<[u8]> for MmapFile {
    fn as_ref(&self) -> &[u8] {
        &self.mmap
    }
}

impl AsMut<[u8]> for MmapFile {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }
}
