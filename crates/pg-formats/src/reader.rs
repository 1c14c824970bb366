//! Big-endian cursor over chunk bytes.

use pg_ir::var_len;

use crate::FormatError;

pub(crate) struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ChunkReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek_u8(&self) -> Result<u8, FormatError> {
        self.data.get(self.pos).copied().ok_or(FormatError::UnexpectedEof)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), FormatError> {
        if n > self.remaining() {
            return Err(FormatError::UnexpectedEof);
        }
        self.pos += n;
        Ok(())
    }

    pub fn read_u32_be(&mut self) -> Result<u32, FormatError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if n > self.remaining() {
            return Err(FormatError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_var_len(&mut self) -> Result<u64, FormatError> {
        let (value, used) = var_len::decode(&self.data[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    /// Bytes between `start` and the current position.
    pub fn since(&self, start: usize) -> &'a [u8] {
        &self.data[start..self.pos]
    }
}
