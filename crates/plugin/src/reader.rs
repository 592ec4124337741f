//! Little-endian cursor over an in-memory plugin buffer.

use esworld_common::TypeTag;

/// Errors from reading past the bounds of a buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("unexpected end of data at offset {offset}: needed {needed} bytes, {remaining} left")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("unterminated string at offset {offset}")]
    UnterminatedString { offset: usize },
}

/// A forward-only cursor. Every read is bounds-checked.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Unread bytes from the current position.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn advance(&mut self, n: usize) -> Result<(), ReadError> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ReadError> {
        if n > self.remaining() {
            return Err(ReadError::UnexpectedEof {
                offset: self.pos,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, ReadError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_i16(&mut self) -> Result<i16, ReadError> {
        self.read_array().map(i16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32, ReadError> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, ReadError> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32, ReadError> {
        self.read_array().map(f32::from_le_bytes)
    }

    pub fn read_tag(&mut self) -> Result<TypeTag, ReadError> {
        self.read_array().map(TypeTag)
    }

    /// Null-terminated string. The terminator is consumed but not returned.
    pub fn read_zstring(&mut self) -> Result<String, ReadError> {
        let rest = self.rest();
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ReadError::UnterminatedString { offset: self.pos })?;
        let value = decode_string(&rest[..end]);
        self.pos += end + 1;
        Ok(value)
    }

    /// String with a `u16` byte-length prefix and no terminator.
    pub fn read_wstring(&mut self) -> Result<String, ReadError> {
        let len = self.read_u16()? as usize;
        self.read_bytes(len).map(decode_string)
    }
}

/// Plugin strings are single-byte text. Every byte maps to the code point of
/// the same value (ISO-8859-1), so distinct byte strings always decode to
/// distinct strings and [`crate::encode_string`] restores the exact bytes.
pub fn decode_string(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}
