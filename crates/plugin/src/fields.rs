//! Field (subrecord) iteration over a record payload.

use crate::reader::{ReadError, Reader};
use esworld_common::TypeTag;

/// Marker field whose `u32` body is the size of the field that follows it.
pub const XXXX: TypeTag = TypeTag::new(b"XXXX");

/// One field of a record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawField<'a> {
    pub tag: TypeTag,
    pub data: &'a [u8],
}

impl<'a> RawField<'a> {
    pub fn reader(&self) -> Reader<'a> {
        Reader::new(self.data)
    }
}

/// Iterator over the fields of a payload.
///
/// Fields are `tag, u16 size, data`. An `XXXX` field overrides the size of
/// the next one. Iteration stops after the first error.
pub struct Fields<'a> {
    reader: Reader<'a>,
    failed: bool,
}

impl<'a> Fields<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            reader: Reader::new(payload),
            failed: false,
        }
    }

    fn next_field(&mut self) -> Result<RawField<'a>, ReadError> {
        let mut tag = self.reader.read_tag()?;
        let mut size = self.reader.read_u16()? as usize;
        if tag == XXXX {
            let large = self.reader.read_bytes(size)?;
            let large = Reader::new(large).read_u32()? as usize;
            tag = self.reader.read_tag()?;
            self.reader.read_u16()?;
            size = large;
        }
        let data = self.reader.read_bytes(size)?;
        Ok(RawField { tag, data })
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = Result<RawField<'a>, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let result = self.next_field();
        self.failed = result.is_err();
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::FieldWriter;

    #[test]
    fn iterates_fields_in_order() {
        let mut w = FieldWriter::new();
        w.zstring(TypeTag::new(b"EDID"), "Chair01");
        w.u32(TypeTag::new(b"NAME"), 0x0100_0D62);
        let payload = w.finish();

        let fields: Vec<RawField<'_>> = Fields::new(&payload).map(Result::unwrap).collect();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].tag, TypeTag::new(b"EDID"));
        assert_eq!(fields[0].data, b"Chair01\0");
        assert_eq!(fields[1].reader().read_u32().unwrap(), 0x0100_0D62);
    }

    #[test]
    fn xxxx_overrides_next_size() {
        let big = vec![7u8; 70_000];
        let mut w = FieldWriter::new();
        w.field(TypeTag::new(b"DATA"), &big);
        w.u32(TypeTag::new(b"NAME"), 1);
        let payload = w.finish();

        let fields: Vec<RawField<'_>> = Fields::new(&payload).map(Result::unwrap).collect();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].tag, TypeTag::new(b"DATA"));
        assert_eq!(fields[0].data.len(), 70_000);
        assert_eq!(fields[1].tag, TypeTag::new(b"NAME"));
    }

    #[test]
    fn truncated_field_yields_one_error() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"EDID");
        payload.extend_from_slice(&10u16.to_le_bytes());
        payload.extend_from_slice(b"abc");

        let mut fields = Fields::new(&payload);
        assert!(matches!(
            fields.next(),
            Some(Err(ReadError::UnexpectedEof { .. }))
        ));
        assert!(fields.next().is_none());
    }
}
