//! `VMAD` script attachment blocks.
//!
//! ```text
//! version:i16 object_format:i16 script_count:u16
//!   script: name:wstring [status:u8 if version >= 4] property_count:u16
//!     property: name:wstring type:u8 [status:u8 if version >= 4] value
//! ```
//!
//! Any fragment data after the script list is ignored.

use super::{FieldError, form_ref};
use crate::formid::FormIdResolver;
use crate::reader::Reader;
use esworld_records::{PropertyValue, Script, ScriptBlock, ScriptObject, ScriptProperty};

const TYPE_OBJECT: u8 = 1;
const TYPE_STRING: u8 = 2;
const TYPE_INT: u8 = 3;
const TYPE_FLOAT: u8 = 4;
const TYPE_BOOL: u8 = 5;
const ARRAY_OFFSET: u8 = 10;

pub fn decode_script_block(data: &[u8], resolver: &FormIdResolver) -> Result<ScriptBlock, FieldError> {
    let mut r = Reader::new(data);
    let version = r.read_i16()?;
    let object_format = r.read_i16()?;
    let script_count = r.read_u16()?;

    let mut scripts = Vec::with_capacity(usize::from(script_count));
    for _ in 0..script_count {
        let name = r.read_wstring()?;
        let status = if version >= 4 { r.read_u8()? } else { 0 };
        let property_count = r.read_u16()?;
        let mut properties = Vec::with_capacity(usize::from(property_count));
        for _ in 0..property_count {
            let name = r.read_wstring()?;
            let kind = r.read_u8()?;
            let status = if version >= 4 { r.read_u8()? } else { 0 };
            let value = read_value(&mut r, kind, object_format, resolver)?;
            properties.push(ScriptProperty {
                name,
                status,
                value,
            });
        }
        scripts.push(Script {
            name,
            status,
            properties,
        });
    }

    Ok(ScriptBlock {
        version,
        object_format,
        scripts,
    })
}

fn read_value(
    r: &mut Reader<'_>,
    kind: u8,
    object_format: i16,
    resolver: &FormIdResolver,
) -> Result<PropertyValue, FieldError> {
    let value = match kind {
        TYPE_OBJECT => PropertyValue::Object(read_object(r, object_format, resolver)?),
        TYPE_STRING => PropertyValue::String(r.read_wstring()?),
        TYPE_INT => PropertyValue::Int(r.read_i32()?),
        TYPE_FLOAT => PropertyValue::Float(r.read_f32()?),
        TYPE_BOOL => PropertyValue::Bool(r.read_u8()? != 0),
        k if k > ARRAY_OFFSET && k <= ARRAY_OFFSET + TYPE_BOOL => {
            let count = r.read_u32()? as usize;
            // Each element takes at least one byte; cap the allocation by what is left.
            let capacity = count.min(r.remaining());
            match k - ARRAY_OFFSET {
                TYPE_OBJECT => {
                    let mut items = Vec::with_capacity(capacity);
                    for _ in 0..count {
                        items.push(read_object(r, object_format, resolver)?);
                    }
                    PropertyValue::ObjectArray(items)
                }
                TYPE_STRING => PropertyValue::StringArray(
                    (0..count).map(|_| r.read_wstring()).collect::<Result<_, _>>()?,
                ),
                TYPE_INT => PropertyValue::IntArray(
                    (0..count).map(|_| r.read_i32()).collect::<Result<_, _>>()?,
                ),
                TYPE_FLOAT => PropertyValue::FloatArray(
                    (0..count).map(|_| r.read_f32()).collect::<Result<_, _>>()?,
                ),
                _ => PropertyValue::BoolArray(
                    (0..count)
                        .map(|_| r.read_u8().map(|b| b != 0))
                        .collect::<Result<_, _>>()?,
                ),
            }
        }
        other => return Err(FieldError::UnknownPropertyType(other)),
    };
    Ok(value)
}

/// Object format 1 puts the form id first; format 2 puts it last.
fn read_object(
    r: &mut Reader<'_>,
    object_format: i16,
    resolver: &FormIdResolver,
) -> Result<ScriptObject, FieldError> {
    let (raw, alias) = if object_format == 1 {
        let raw = r.read_u32()?;
        let alias = r.read_i16()?;
        r.read_u16()?;
        (raw, alias)
    } else {
        r.read_u16()?;
        let alias = r.read_i16()?;
        (r.read_u32()?, alias)
    };
    Ok(ScriptObject {
        reference: form_ref(raw, resolver)?,
        alias,
    })
}
