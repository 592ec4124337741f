//! Plugin encoding, used to author fixture files and benchmarks.
//!
//! The loader never writes plugins; this module exists so tests can build
//! byte-exact inputs.

use crate::fields::XXXX;
use crate::format::{FileHeader, GROUP_HEADER_SIZE, GroupHeader, RECORD_HEADER_SIZE, RecordHeader};
use esworld_common::TypeTag;
use esworld_records::RecordFlags;
use std::io::Write;

/// Errors encoding plugin data.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("string of {0} bytes does not fit a u16 length prefix")]
    StringTooLong(usize),
    #[error("character {0:?} has no single-byte encoding")]
    Unencodable(char),
}

/// Encode `s` one byte per character, the inverse of [`crate::decode_string`].
pub fn encode_string(s: &str) -> Result<Vec<u8>, WriteError> {
    s.chars()
        .map(|c| u8::try_from(c).map_err(|_| WriteError::Unencodable(c)))
        .collect()
}

/// Append `s` and a null terminator.
pub fn encode_zstring(out: &mut Vec<u8>, s: &str) -> Result<(), WriteError> {
    out.extend(encode_string(s)?);
    out.push(0);
    Ok(())
}

/// Append a `u16` byte length followed by the bytes of `s`.
pub fn encode_wstring(out: &mut Vec<u8>, s: &str) -> Result<(), WriteError> {
    let bytes = encode_string(s)?;
    let len = u16::try_from(bytes.len()).map_err(|_| WriteError::StringTooLong(bytes.len()))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&bytes);
    Ok(())
}

/// Compress a payload as `u32 decompressed length + zstd frame`.
pub fn compress_payload(payload: &[u8]) -> Result<Vec<u8>, WriteError> {
    let mut out = Vec::with_capacity(payload.len() / 2 + 4);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    let mut encoder = zstd::Encoder::new(out, 3)?;
    encoder.write_all(payload)?;
    Ok(encoder.finish()?)
}

/// Builds a record payload field by field.
#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. Data longer than `u16::MAX` is preceded by an `XXXX` field.
    pub fn field(&mut self, tag: TypeTag, data: &[u8]) -> &mut Self {
        let size = match u16::try_from(data.len()) {
            Ok(size) => size,
            Err(_) => {
                self.buf.extend_from_slice(XXXX.as_bytes());
                self.buf.extend_from_slice(&4u16.to_le_bytes());
                self.buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
                0
            }
        };
        self.buf.extend_from_slice(tag.as_bytes());
        self.buf.extend_from_slice(&size.to_le_bytes());
        self.buf.extend_from_slice(data);
        self
    }

    /// Append a null-terminated string field. Characters above U+00FF have
    /// no byte of their own and are written as `?`.
    pub fn zstring(&mut self, tag: TypeTag, s: &str) -> &mut Self {
        let mut data: Vec<u8> = s.chars().map(|c| u8::try_from(c).unwrap_or(b'?')).collect();
        data.push(0);
        self.field(tag, &data)
    }

    pub fn u32(&mut self, tag: TypeTag, value: u32) -> &mut Self {
        self.field(tag, &value.to_le_bytes())
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

/// Builds a whole plugin file: `TES4` header, then records and groups.
#[derive(Debug)]
pub struct PluginWriter {
    buf: Vec<u8>,
    open_groups: Vec<usize>,
}

impl PluginWriter {
    pub fn new(header: &FileHeader) -> Self {
        let payload = header.to_payload();
        let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len());
        RecordHeader::new(TypeTag::TES4, header.flags, 0, payload.len() as u32).write(&mut buf);
        buf.extend_from_slice(&payload);
        Self {
            buf,
            open_groups: Vec::new(),
        }
    }

    /// Open a top-level group. Groups may nest; close with [`Self::end_group`].
    pub fn begin_group(&mut self, label: TypeTag) -> &mut Self {
        self.open_groups.push(self.buf.len());
        GroupHeader::top(label).write(&mut self.buf);
        self
    }

    /// Close the innermost open group, patching its size.
    pub fn end_group(&mut self) -> &mut Self {
        if let Some(start) = self.open_groups.pop() {
            let size = (self.buf.len() - start) as u32;
            debug_assert!(size as usize >= GROUP_HEADER_SIZE);
            self.buf[start + 4..start + 8].copy_from_slice(&size.to_le_bytes());
        }
        self
    }

    /// Append an uncompressed record.
    pub fn record(&mut self, tag: TypeTag, flags: RecordFlags, form_id: u32, payload: &[u8]) -> &mut Self {
        let flags = flags - RecordFlags::COMPRESSED;
        RecordHeader::new(tag, flags, form_id, payload.len() as u32).write(&mut self.buf);
        self.buf.extend_from_slice(payload);
        self
    }

    /// Append a record whose payload is stored compressed.
    pub fn compressed_record(
        &mut self,
        tag: TypeTag,
        flags: RecordFlags,
        form_id: u32,
        payload: &[u8],
    ) -> Result<&mut Self, WriteError> {
        let stored = compress_payload(payload)?;
        self.raw_record(tag, flags | RecordFlags::COMPRESSED, form_id, &stored);
        Ok(self)
    }

    /// Append a record with the payload bytes exactly as given.
    pub fn raw_record(&mut self, tag: TypeTag, flags: RecordFlags, form_id: u32, stored: &[u8]) -> &mut Self {
        RecordHeader::new(tag, flags, form_id, stored.len() as u32).write(&mut self.buf);
        self.buf.extend_from_slice(stored);
        self
    }

    /// Close any open groups and return the file bytes.
    pub fn finish(mut self) -> Vec<u8> {
        while !self.open_groups.is_empty() {
            self.end_group();
        }
        self.buf
    }
}
