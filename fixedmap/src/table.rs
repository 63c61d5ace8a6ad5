use std::hash::{BuildHasher, RandomState};
use std::io;
use std::path::Path;

use crate::bucket::{BucketIndex, BucketWord, Probe};
use crate::error::{Result, TableError};
use crate::layout::{self, Header, Layout, ValueKind, HEADER_SIZE};
use crate::slot::SlotCodec;
use crate::store::MmapFile;

/// A fixed-capacity hash table persisted in a single memory-mapped file.
///
/// `key_size`, `value_size`, `capacity` and `nbuckets` are fixed at
/// creation and never change for the lifetime of the file. Keys must be
/// exactly `key_size` bytes; values are either byte blobs of up to
/// `value_size` bytes or arrays of up to `value_size / 8` doubles, and a
/// table holds one shape or the other, never both.
///
/// The engine does no locking. `&mut self` on the write path rules out
/// in-process races, but nothing stops a second process from mapping the
/// same file; concurrent unsynchronized writers can interleave partial
/// slot writes and corrupt a slot. Callers needing multiple writers must
/// serialize externally. Concurrent read-only mappings with no writer
/// active are safe. All operations are synchronous and run to completion.
///
/// Durability is best-effort through the shared mapping: writes reach the
/// file when the OS flushes, or on [`FixedTable::flush`]. A crash in the
/// middle of an insert can leave a torn slot; no repair pass exists.
#[derive(Debug)]
pub struct FixedTable {
    store: MmapFile,
    header: Header,
    layout: Layout,
    codec: SlotCodec,
    index: BucketIndex,
}

impl FixedTable {
    /// Creates a new table file at `path` and maps it.
    ///
    /// The file is sized from the four parameters, zero-initialized (all
    /// buckets empty) and stamped with a header carrying a fresh hash
    /// seed. Fails with `AlreadyExists` if the path exists; overwriting
    /// must be an explicit, separate step by the caller.
    pub fn create<P: AsRef<Path>>(
        path: P,
        key_size: usize,
        value_size: usize,
        capacity: usize,
        nbuckets: usize,
    ) -> Result<Self> {
        layout::validate_params(key_size, value_size, capacity, nbuckets)?;
        let path = path.as_ref();
        let layout = Layout::compute(key_size, value_size, capacity, nbuckets);

        let mut store = match MmapFile::create(path, layout.file_size as u64) {
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(TableError::AlreadyExists(path.to_path_buf()));
            }
            other => other?,
        };

        let header = Header {
            key_size: key_size as u32,
            value_size: value_size as u32,
            capacity: capacity as u32,
            nbuckets: nbuckets as u32,
            seed: RandomState::new().hash_one(path.as_os_str()),
            fill: 0,
            value_kind: 0,
        };
        store.as_mut()[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
        store.flush()?;

        Ok(Self::from_parts(store, header, layout))
    }

    /// Maps an existing table file read-write.
    ///
    /// Fails with `NotFound` if the path is missing and with
    /// `IncompatibleFormat` if the header does not validate or the file
    /// size disagrees with the layout the header describes.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let store = match MmapFile::open(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TableError::NotFound(path.to_path_buf()));
            }
            other => other?,
        };

        let header = Header::from_bytes(store.as_ref())?;
        let layout = Layout::for_header(&header);
        if layout.file_size != store.len() {
            return Err(TableError::IncompatibleFormat(format!(
                "file is {} bytes, header describes a {}-byte table",
                store.len(),
                layout.file_size
            )));
        }
        if header.fill > header.capacity {
            return Err(TableError::IncompatibleFormat(format!(
                "fill {} exceeds capacity {}",
                header.fill, header.capacity
            )));
        }
        if header.value_kind != 0 && ValueKind::from_tag(header.value_kind).is_none() {
            return Err(TableError::IncompatibleFormat(format!(
                "unknown value kind tag {}",
                header.value_kind
            )));
        }

        Ok(Self::from_parts(store, header, layout))
    }

    fn from_parts(store: MmapFile, header: Header, layout: Layout) -> Self {
        let codec = SlotCodec::new(header.key_size as usize, header.value_size as usize);
        let index = BucketIndex::new(header.nbuckets as usize, header.seed);
        Self {
            store,
            header,
            layout,
            codec,
            index,
        }
    }

    /// Number of occupied entries
    pub fn len(&self) -> usize {
        self.header.fill as usize
    }

    pub fn is_empty(&self) -> bool {
        self.header.fill == 0
    }

    pub fn capacity(&self) -> usize {
        self.header.capacity as usize
    }

    pub fn key_size(&self) -> usize {
        self.header.key_size as usize
    }

    pub fn value_size(&self) -> usize {
        self.header.value_size as usize
    }

    pub fn nbuckets(&self) -> usize {
        self.header.nbuckets as usize
    }

    /// The value shape this table holds, or `None` before the first insert
    pub fn value_kind(&self) -> Option<ValueKind> {
        ValueKind::from_tag(self.header.value_kind)
    }

    /// Inserts a blob value, overwriting in place if the key exists.
    pub fn insert_bytes(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.insert_with(key, ValueKind::Bytes, |codec, region| {
            codec.encode_bytes(region, key, value)
        })
    }

    /// Inserts an array of doubles, overwriting in place if the key exists.
    pub fn insert_f64s(&mut self, key: &[u8], values: &[f64]) -> Result<()> {
        self.insert_with(key, ValueKind::F64s, |codec, region| {
            codec.encode_f64s(region, key, values)
        })
    }

    /// Looks up a blob value; `Ok(None)` means the key is absent.
    pub fn get_bytes(&self, key: &[u8]) -> Result<Option<&[u8]>> {
        self.check_key(key)?;
        let Some(stored) = self.value_kind() else {
            return Ok(None);
        };
        if stored != ValueKind::Bytes {
            return Err(TableError::ShapeMismatch {
                stored,
                requested: ValueKind::Bytes,
            });
        }
        match self.probe_key(key) {
            Probe::Found { slot, .. } => self.codec.decode_bytes(self.slot(slot)).map(Some),
            _ => Ok(None),
        }
    }

    /// Looks up an array of doubles; `Ok(None)` means the key is absent.
    pub fn get_f64s(&self, key: &[u8]) -> Result<Option<Vec<f64>>> {
        self.check_key(key)?;
        let Some(stored) = self.value_kind() else {
            return Ok(None);
        };
        if stored != ValueKind::F64s {
            return Err(TableError::ShapeMismatch {
                stored,
                requested: ValueKind::F64s,
            });
        }
        match self.probe_key(key) {
            Probe::Found { slot, .. } => self.codec.decode_f64s(self.slot(slot)).map(Some),
            _ => Ok(None),
        }
    }

    /// Flushes dirty pages and syncs the backing file.
    pub fn flush(&self) -> Result<()> {
        self.store.flush()?;
        Ok(())
    }

    /// Releases the table: flushes, then unmaps and closes the file.
    ///
    /// Consuming `self` makes a second release unrepresentable; dropping
    /// the table without calling this unmaps as well, skipping the sync.
    pub fn close(self) -> Result<()> {
        self.flush()
    }

    fn insert_with(
        &mut self,
        key: &[u8],
        kind: ValueKind,
        write: impl FnOnce(&SlotCodec, &mut [u8]) -> Result<()>,
    ) -> Result<()> {
        self.check_key(key)?;
        if let Some(stored) = self.value_kind() {
            if stored != kind {
                return Err(TableError::ShapeMismatch {
                    stored,
                    requested: kind,
                });
            }
        }

        match self.probe_key(key) {
            Probe::Found { slot, .. } => {
                let codec = self.codec;
                write(&codec, self.slot_mut(slot))
            }
            Probe::Vacant { bucket } => {
                if self.header.fill >= self.header.capacity {
                    return Err(TableError::TableFull);
                }
                // Next free slot in the arena; slots are allocated in
                // insertion order and never reclaimed.
                let slot = self.header.fill as usize;
                let codec = self.codec;
                write(&codec, self.slot_mut(slot))?;
                // Publish the slot only after it is fully written.
                self.buckets_mut()[bucket] = BucketWord::full_at(slot);
                self.header.fill += 1;
                self.header.value_kind = kind.tag();
                self.write_header();
                Ok(())
            }
            Probe::Exhausted => Err(TableError::TableFull),
        }
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.header.key_size as usize {
            return Err(TableError::InvalidKeyLength {
                expected: self.header.key_size as usize,
                got: key.len(),
            });
        }
        Ok(())
    }

    fn probe_key(&self, key: &[u8]) -> Probe {
        self.index
            .probe(self.buckets(), key, |slot| self.codec.key(self.slot(slot)))
    }

    fn buckets(&self) -> &[BucketWord] {
        let range = self.layout.buckets_offset..self.layout.arena_offset;
        bytemuck::cast_slice(&self.store.as_ref()[range])
    }

    fn buckets_mut(&mut self) -> &mut [BucketWord] {
        let range = self.layout.buckets_offset..self.layout.arena_offset;
        bytemuck::cast_slice_mut(&mut self.store.as_mut()[range])
    }

    fn slot(&self, idx: usize) -> &[u8] {
        let start = self.layout.arena_offset + idx * self.layout.slot_size;
        &self.store.as_ref()[start..start + self.layout.slot_size]
    }

    fn slot_mut(&mut self, idx: usize) -> &mut [u8] {
        let start = self.layout.arena_offset + idx * self.layout.slot_size;
        &mut self.store.as_mut()[start..start + self.layout.slot_size]
    }

    fn write_header(&mut self) {
        let bytes = self.header.to_bytes();
        self.store.as_mut()[..HEADER_SIZE].copy_from_slice(&bytes);
    }
}
