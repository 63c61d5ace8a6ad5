use crate::error::{Result, TableError};

/// Bytes taken by the u32 length/count field between key and payload
pub const LEN_FIELD_SIZE: usize = 4;

/// Encodes and decodes one fixed-size slot against a raw region of the
/// mapped file.
///
/// Slot layout: `key_size` key bytes, a little-endian u32 length (blob
/// mode) or element count (f64 mode), then the payload, padded out to the
/// `value_size` budget fixed at creation.
#[derive(Debug, Clone, Copy)]
pub struct SlotCodec {
    key_size: usize,
    value_size: usize,
}

impl SlotCodec {
    pub fn new(key_size: usize, value_size: usize) -> Self {
        Self {
            key_size,
            value_size,
        }
    }

    pub fn slot_size(&self) -> usize {
        self.key_size + LEN_FIELD_SIZE + self.value_size
    }

    /// How many doubles fit in the payload budget
    pub fn max_f64s(&self) -> usize {
        self.value_size / std::mem::size_of::<f64>()
    }

    pub fn key<'a>(&self, region: &'a [u8]) -> &'a [u8] {
        &region[..self.key_size]
    }

    pub fn encode_bytes(&self, region: &mut [u8], key: &[u8], value: &[u8]) -> Result<()> {
        if value.len() > self.value_size {
            return Err(TableError::ValueTooLarge {
                budget: self.value_size,
                got: value.len(),
            });
        }
        region[..self.key_size].copy_from_slice(key);
        self.write_count(region, value.len() as u32);
        let start = self.payload_offset();
        region[start..start + value.len()].copy_from_slice(value);
        Ok(())
    }

    pub fn decode_bytes<'a>(&self, region: &'a [u8]) -> Result<&'a [u8]> {
        let len = self.read_count(region) as usize;
        if len > self.value_size {
            return Err(TableError::IncompatibleFormat(format!(
                "slot length {} exceeds the payload budget {}",
                len, self.value_size
            )));
        }
        let start = self.payload_offset();
        Ok(&region[start..start + len])
    }

    pub fn encode_f64s(&self, region: &mut [u8], key: &[u8], values: &[f64]) -> Result<()> {
        if values.len() > self.max_f64s() {
            return Err(TableError::ValueTooLarge {
                budget: self.value_size,
                got: values.len() * std::mem::size_of::<f64>(),
            });
        }
        region[..self.key_size].copy_from_slice(key);
        self.write_count(region, values.len() as u32);
        let payload: &[u8] = bytemuck::cast_slice(values);
        let start = self.payload_offset();
        region[start..start + payload.len()].copy_from_slice(payload);
        Ok(())
    }

    pub fn decode_f64s(&self, region: &[u8]) -> Result<Vec<f64>> {
        let count = self.read_count(region) as usize;
        if count > self.max_f64s() {
            return Err(TableError::IncompatibleFormat(format!(
                "slot holds {} doubles, budget is {}",
                count,
                self.max_f64s()
            )));
        }
        let start = self.payload_offset();
        let payload = &region[start..start + count * std::mem::size_of::<f64>()];
        // The payload is not 8-byte aligned within the slot, so read each
        // element unaligned instead of casting the whole slice.
        Ok(payload
            .chunks_exact(std::mem::size_of::<f64>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    fn payload_offset(&self) -> usize {
        self.key_size + LEN_FIELD_SIZE
    }

    fn write_count(&self, region: &mut [u8], count: u32) {
        region[self.key_size..self.key_size + LEN_FIELD_SIZE]
            .copy_from_slice(&count.to_le_bytes());
    }

    fn read_count(&self, region: &[u8]) -> u32 {
        u32::from_le_bytes(
            region[self.key_size..self.key_size + LEN_FIELD_SIZE]
                .try_into()
                .expect("4-byte count field"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_roundtrip() {
        let codec = SlotCodec::new(4, 16);
        let mut region = vec![0u8; codec.slot_size()];

        codec.encode_bytes(&mut region, b"abcd", b"hello").unwrap();
        assert_eq!(codec.key(&region), b"abcd");
        assert_eq!(codec.decode_bytes(&region).unwrap(), b"hello");
    }

    #[test]
    fn test_bytes_full_budget_and_empty() {
        let codec = SlotCodec::new(4, 16);
        let mut region = vec![0u8; codec.slot_size()];

        let value = [0xFFu8; 16];
        codec.encode_bytes(&mut region, b"abcd", &value).unwrap();
        assert_eq!(codec.decode_bytes(&region).unwrap(), &value);

        codec.encode_bytes(&mut region, b"abcd", b"").unwrap();
        assert_eq!(codec.decode_bytes(&region).unwrap(), b"");
    }

    #[test]
    fn test_bytes_too_large() {
        let codec = SlotCodec::new(4, 16);
        let mut region = vec![0u8; codec.slot_size()];

        let err = codec
            .encode_bytes(&mut region, b"abcd", &[0u8; 17])
            .unwrap_err();
        assert!(matches!(err, TableError::ValueTooLarge { budget: 16, got: 17 }));
    }

    #[test]
    fn test_overwrite_with_shorter_value() {
        let codec = SlotCodec::new(4, 16);
        let mut region = vec![0u8; codec.slot_size()];

        codec
            .encode_bytes(&mut region, b"abcd", b"a much longer v")
            .unwrap();
        codec.encode_bytes(&mut region, b"abcd", b"tiny").unwrap();
        assert_eq!(codec.decode_bytes(&region).unwrap(), b"tiny");
    }

    #[test]
    fn test_f64s_roundtrip() {
        let codec = SlotCodec::new(4, 32);
        let mut region = vec![0u8; codec.slot_size()];

        let values = [1.5f64, -2.25, f64::MAX, 0.0];
        codec.encode_f64s(&mut region, b"abcd", &values).unwrap();
        assert_eq!(codec.decode_f64s(&region).unwrap(), values);
    }

    #[test]
    fn test_f64s_budget() {
        let codec = SlotCodec::new(4, 32);
        assert_eq!(codec.max_f64s(), 4);

        let mut region = vec![0u8; codec.slot_size()];
        let err = codec
            .encode_f64s(&mut region, b"abcd", &[0.0; 5])
            .unwrap_err();
        assert!(matches!(err, TableError::ValueTooLarge { .. }));

        // A partial count within the budget round-trips with its count.
        codec.encode_f64s(&mut region, b"abcd", &[3.5, 7.0]).unwrap();
        assert_eq!(codec.decode_f64s(&region).unwrap(), vec![3.5, 7.0]);
    }
}
