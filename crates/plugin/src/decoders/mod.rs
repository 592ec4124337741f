//! Per-type payload decoders and the tag → decoder registry.
//!
//! Each decoder is a plain function from a decompressed payload to a typed
//! field set. Reference fields are translated through the plugin's
//! [`FormIdResolver`] as they are read.

mod actor;
mod climate;
mod placed;
mod scripts;

use crate::fields::{Fields, RawField};
use crate::formid::{FormIdError, FormIdResolver};
use crate::reader::ReadError;
use esworld_common::TypeTag;
use esworld_records::{Field, FormRef, RecordData};
use std::collections::HashMap;

pub use scripts::decode_script_block;

pub(crate) const EDID: TypeTag = TypeTag::new(b"EDID");

/// Errors decoding a record payload. Each one only spoils the record.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("field {tag} has {actual} bytes, expected {expected}")]
    BadSize {
        tag: TypeTag,
        expected: usize,
        actual: usize,
    },
    #[error("unknown script property type {0}")]
    UnknownPropertyType(u8),
    #[error(transparent)]
    FormId(#[from] FormIdError),
}

/// Output of a payload decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedFields {
    pub editor_id: Option<String>,
    pub data: RecordData,
}

pub type DecodeFn = fn(&[u8], &FormIdResolver) -> Result<TypedFields, FieldError>;

/// Maps record type tags to payload decoders. Unregistered tags decode as
/// generic records.
#[derive(Debug, Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<TypeTag, DecodeFn>,
}

impl DecoderRegistry {
    /// A registry with no typed decoders.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register a decoder, returning the one it replaces.
    pub fn register(&mut self, tag: TypeTag, decode: DecodeFn) -> Option<DecodeFn> {
        self.decoders.insert(tag, decode)
    }

    pub fn get(&self, tag: TypeTag) -> DecodeFn {
        self.decoders.get(&tag).copied().unwrap_or(decode_generic)
    }

    pub fn is_typed(&self, tag: TypeTag) -> bool {
        self.decoders.contains_key(&tag)
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(TypeTag::REFR, placed::decode_placed);
        registry.register(TypeTag::ACHR, placed::decode_placed);
        registry.register(TypeTag::NPC_, actor::decode_actor);
        registry.register(TypeTag::CLMT, climate::decode_climate);
        registry
    }
}

/// Keep every field verbatim; only `EDID` is interpreted.
pub fn decode_generic(payload: &[u8], _: &FormIdResolver) -> Result<TypedFields, FieldError> {
    let mut editor_id = None;
    let mut fields = Vec::new();
    for field in Fields::new(payload) {
        let field = field?;
        if field.tag == EDID {
            editor_id = Some(field.reader().read_zstring()?);
        } else {
            fields.push(Field {
                tag: field.tag,
                data: field.data.to_vec(),
            });
        }
    }
    Ok(TypedFields {
        editor_id,
        data: RecordData::Generic(fields),
    })
}

/// Translate a raw form id. A null id is "no reference".
pub(crate) fn form_ref(raw: u32, resolver: &FormIdResolver) -> Result<Option<FormRef>, FieldError> {
    if raw == 0 {
        return Ok(None);
    }
    Ok(Some(FormRef::new(resolver.resolve(raw)?)))
}

/// Read a field that is exactly one form id.
pub(crate) fn ref_field(
    field: &RawField<'_>,
    resolver: &FormIdResolver,
) -> Result<Option<FormRef>, FieldError> {
    expect_min(field, 4)?;
    form_ref(field.reader().read_u32()?, resolver)
}

pub(crate) fn expect_min(field: &RawField<'_>, expected: usize) -> Result<(), FieldError> {
    if field.data.len() < expected {
        return Err(FieldError::BadSize {
            tag: field.tag,
            expected,
            actual: field.data.len(),
        });
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::resolver;
    use super::*;
    use crate::writer::FieldWriter;
    use esworld_common::GlobalFormId;

    #[test]
    fn default_registry_covers_builtin_kinds() {
        let registry = DecoderRegistry::default();
        for tag in [TypeTag::REFR, TypeTag::ACHR, TypeTag::NPC_, TypeTag::CLMT] {
            assert!(registry.is_typed(tag));
        }
        assert!(!registry.is_typed(TypeTag::new(b"GLOB")));
    }

    #[test]
    fn unregistered_tags_decode_generically() {
        let mut w = FieldWriter::new();
        w.zstring(EDID, "GameHour");
        w.field(TypeTag::new(b"FLTV"), &9.5f32.to_le_bytes());
        let payload = w.finish();

        let registry = DecoderRegistry::default();
        let decoded = registry.get(TypeTag::new(b"GLOB"))(&payload, &resolver()).unwrap();
        assert_eq!(decoded.editor_id.as_deref(), Some("GameHour"));
        match decoded.data {
            RecordData::Generic(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].tag, TypeTag::new(b"FLTV"));
            }
            other => panic!("expected generic data, got {other:?}"),
        }
    }

    #[test]
    fn custom_decoder_replaces_generic() {
        fn empty(_: &[u8], _: &FormIdResolver) -> Result<TypedFields, FieldError> {
            Ok(TypedFields {
                editor_id: Some("custom".into()),
                data: RecordData::Generic(Vec::new()),
            })
        }
        let mut registry = DecoderRegistry::empty();
        assert!(registry.register(TypeTag::new(b"GLOB"), empty).is_none());
        let decoded = registry.get(TypeTag::new(b"GLOB"))(&[], &resolver()).unwrap();
        assert_eq!(decoded.editor_id.as_deref(), Some("custom"));
    }

    #[test]
    fn null_form_id_is_no_reference() {
        assert_eq!(form_ref(0, &resolver()).unwrap(), None);
        assert_eq!(
            form_ref(0x0100_0010, &resolver()).unwrap().unwrap().target(),
            GlobalFormId::standard(0, 0x10)
        );
    }
}
