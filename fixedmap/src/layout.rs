use crate::error::{Result, TableError};

/// Magic bytes identifying a fixedmap table file
pub const MAGIC: [u8; 4] = *b"FXMP";

/// On-disk format version
pub const VERSION: u16 = 1;

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 48;

/// One bucket word per bucket in the bucket table
pub const BUCKET_WORD_SIZE: usize = 4;

/// Upper bound on `key_size`
pub const MAX_KEY_SIZE: usize = 100;

/// Upper bound on `value_size`
pub const MAX_VALUE_SIZE: usize = 1000;

/// Largest slot index representable in a bucket word (31 bits)
pub const MAX_CAPACITY: usize = (1 << 31) - 1;

/// The value shape a table holds, stamped into the header on first insert.
///
/// Slots carry no per-slot type tag; a table is either all blobs or all
/// f64 arrays, and accessing it with the other shape is a caller error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bytes,
    F64s,
}

impl ValueKind {
    pub(crate) fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(ValueKind::Bytes),
            2 => Some(ValueKind::F64s),
            _ => None,
        }
    }

    pub(crate) fn tag(self) -> u32 {
        match self {
            ValueKind::Bytes => 1,
            ValueKind::F64s => 2,
        }
    }
}

/// Fixed-size header at the start of every table file.
///
/// Layout (little-endian):
///   [0..4]   magic:      [u8;4] - "FXMP"
///   [4..6]   version:    u16
///   [6..8]   reserved:   u16    - must be zero
///   [8..12]  key_size:   u32
///   [12..16] value_size: u32    - slot payload budget in bytes
///   [16..20] capacity:   u32
///   [20..24] nbuckets:   u32
///   [24..32] seed:       u64    - hash seed fixed at creation
///   [32..36] fill:       u32    - occupied slot count
///   [36..40] value_kind: u32    - 0 unset, 1 bytes, 2 f64s
///   [40..48] reserved:   [u8;8]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub key_size: u32,
    pub value_size: u32,
    pub capacity: u32,
    pub nbuckets: u32,
    pub seed: u64,
    pub fill: u32,
    pub value_kind: u32,
}

impl Header {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..6].copy_from_slice(&VERSION.to_le_bytes());
        buf[8..12].copy_from_slice(&self.key_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.value_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.capacity.to_le_bytes());
        buf[20..24].copy_from_slice(&self.nbuckets.to_le_bytes());
        buf[24..32].copy_from_slice(&self.seed.to_le_bytes());
        buf[32..36].copy_from_slice(&self.fill.to_le_bytes());
        buf[36..40].copy_from_slice(&self.value_kind.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(TableError::IncompatibleFormat(format!(
                "file is {} bytes, header needs {}",
                buf.len(),
                HEADER_SIZE
            )));
        }
        if buf[0..4] != MAGIC {
            return Err(TableError::IncompatibleFormat(
                "bad magic, not a table file".to_string(),
            ));
        }
        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != VERSION {
            return Err(TableError::IncompatibleFormat(format!(
                "format version {} is not supported (expected {})",
                version, VERSION
            )));
        }
        Ok(Self {
            key_size: read_u32(buf, 8),
            value_size: read_u32(buf, 12),
            capacity: read_u32(buf, 16),
            nbuckets: read_u32(buf, 20),
            seed: u64::from_le_bytes(buf[24..32].try_into().expect("8-byte field")),
            fill: read_u32(buf, 32),
            value_kind: read_u32(buf, 36),
        })
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(buf[at..at + 4].try_into().expect("4-byte field"))
}

/// Whole-file layout: header, then the bucket table, then the slot arena.
///
/// Fully determined by the four creation parameters; the file never grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub slot_size: usize,
    pub buckets_offset: usize,
    pub arena_offset: usize,
    pub file_size: usize,
}

impl Layout {
    pub fn compute(key_size: usize, value_size: usize, capacity: usize, nbuckets: usize) -> Self {
        // key bytes + u32 length/count field + payload budget
        let slot_size = key_size + 4 + value_size;
        let buckets_offset = HEADER_SIZE;
        let arena_offset = buckets_offset + nbuckets * BUCKET_WORD_SIZE;
        let file_size = arena_offset + capacity * slot_size;
        Self {
            slot_size,
            buckets_offset,
            arena_offset,
            file_size,
        }
    }

    pub fn for_header(header: &Header) -> Self {
        Self::compute(
            header.key_size as usize,
            header.value_size as usize,
            header.capacity as usize,
            header.nbuckets as usize,
        )
    }
}

/// Validates the four creation parameters before any file is touched.
pub fn validate_params(
    key_size: usize,
    value_size: usize,
    capacity: usize,
    nbuckets: usize,
) -> Result<()> {
    if key_size == 0 || value_size == 0 || capacity == 0 || nbuckets == 0 {
        return Err(TableError::InvalidParameters(
            "key size, value size, capacity and nbuckets must all be positive".to_string(),
        ));
    }
    if key_size > MAX_KEY_SIZE {
        return Err(TableError::InvalidParameters(format!(
            "key size {} exceeds the maximum of {}",
            key_size, MAX_KEY_SIZE
        )));
    }
    if value_size > MAX_VALUE_SIZE {
        return Err(TableError::InvalidParameters(format!(
            "value size {} exceeds the maximum of {}",
            value_size, MAX_VALUE_SIZE
        )));
    }
    if capacity > MAX_CAPACITY {
        return Err(TableError::InvalidParameters(format!(
            "capacity {} exceeds the maximum of {}",
            capacity, MAX_CAPACITY
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_layout() {
        let layout = Layout::compute(4, 16, 10, 8);
        assert_eq!(layout.slot_size, 4 + 4 + 16);
        assert_eq!(layout.buckets_offset, HEADER_SIZE);
        assert_eq!(layout.arena_offset, HEADER_SIZE + 8 * 4);
        assert_eq!(layout.file_size, HEADER_SIZE + 8 * 4 + 10 * 24);
    }

    #[test]
    fn test_header_roundtrip() {
        let header = Header {
            key_size: 4,
            value_size: 16,
            capacity: 10,
            nbuckets: 8,
            seed: 0xDEAD_BEEF_CAFE_F00D,
            fill: 3,
            value_kind: ValueKind::Bytes.tag(),
        };

        let bytes = header.to_bytes();
        let decoded = Header::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let header = Header {
            key_size: 4,
            value_size: 16,
            capacity: 10,
            nbuckets: 8,
            seed: 1,
            fill: 0,
            value_kind: 0,
        };
        let mut bytes = header.to_bytes();
        bytes[0] = b'X';

        let err = Header::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, TableError::IncompatibleFormat(_)));
    }

    #[test]
    fn test_header_rejects_future_version() {
        let header = Header {
            key_size: 4,
            value_size: 16,
            capacity: 10,
            nbuckets: 8,
            seed: 1,
            fill: 0,
            value_kind: 0,
        };
        let mut bytes = header.to_bytes();
        bytes[4..6].copy_from_slice(&99u16.to_le_bytes());

        let err = Header::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, TableError::IncompatibleFormat(_)));
    }

    #[test]
    fn test_validate_params() {
        assert!(validate_params(4, 16, 10, 8).is_ok());
        assert!(validate_params(0, 16, 10, 8).is_err());
        assert!(validate_params(4, 0, 10, 8).is_err());
        assert!(validate_params(4, 16, 0, 8).is_err());
        assert!(validate_params(4, 16, 10, 0).is_err());
        assert!(validate_params(MAX_KEY_SIZE + 1, 16, 10, 8).is_err());
        assert!(validate_params(4, MAX_VALUE_SIZE + 1, 10, 8).is_err());
    }
}
