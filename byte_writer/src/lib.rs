//! Little-endian byte builder for archive headers and fixtures.

pub struct ByteWriter {
    pub data: Vec<u8>,
}

impl Default for ByteWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Current write position, which is always the end of the buffer.
    pub fn get_offset(&self) -> usize {
        self.data.len()
    }

    pub fn append_u8(&mut self, i: u8) {
        self.data.push(i);
    }

    pub fn append_u16(&mut self, i: u16) {
        self.data.extend(i.to_le_bytes());
    }

    pub fn append_i16(&mut self, i: i16) {
        self.data.extend(i.to_le_bytes());
    }

    pub fn append_u32(&mut self, i: u32) {
        self.data.extend(i.to_le_bytes());
    }

    pub fn append_u8_slice(&mut self, i: &[u8]) {
        self.data.extend_from_slice(i);
    }

    pub fn append_zeroes(&mut self, count: usize) {
        self.data.resize(self.data.len() + count, 0);
    }

    /// Zero fills up to `offset`. Does nothing when already past it.
    pub fn pad_to(&mut self, offset: usize) {
        if offset > self.data.len() {
            self.data.resize(offset, 0);
        }
    }

    pub fn replace(&mut self, start: usize, slice: &[u8]) {
        self.data[start..(start + slice.len())].copy_from_slice(slice);
    }

    pub fn replace_with_u32(&mut self, start: usize, val: u32) {
        self.replace(start, &val.to_le_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn little_endian_layout() {
        let mut writer = ByteWriter::new();

        writer.append_u8(5);
        writer.append_u16(0xF800);
        writer.append_i16(-2);
        writer.append_u32(64);

        assert_eq!(
            writer.data,
            vec![5, 0x00, 0xF8, 0xFE, 0xFF, 64, 0, 0, 0]
        );
    }

    #[test]
    fn pad_and_patch() {
        let mut writer = ByteWriter::new();

        writer.pad_to(48);
        assert_eq!(writer.get_offset(), 48);

        // already past it
        writer.pad_to(16);
        assert_eq!(writer.get_offset(), 48);

        writer.replace_with_u32(44, 3);
        assert_eq!(&writer.data[44..48], &[3, 0, 0, 0]);

        writer.append_zeroes(2);
        assert_eq!(writer.into_bytes().len(), 50);
    }
}
