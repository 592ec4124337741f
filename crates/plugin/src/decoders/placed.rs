use super::{EDID, FieldError, TypedFields, expect_min, form_ref, ref_field};
use crate::fields::Fields;
use crate::formid::FormIdResolver;
use esworld_common::TypeTag;
use esworld_records::{EnableParent, PlacedObject, RecordData};
use glam::Vec3;

const NAME: TypeTag = TypeTag::new(b"NAME");
const DATA: TypeTag = TypeTag::new(b"DATA");
const XSCL: TypeTag = TypeTag::new(b"XSCL");
const XESP: TypeTag = TypeTag::new(b"XESP");
const XOWN: TypeTag = TypeTag::new(b"XOWN");

/// `REFR` / `ACHR`: base object, placement, scale, enable parent, owner.
pub fn decode_placed(payload: &[u8], resolver: &FormIdResolver) -> Result<TypedFields, FieldError> {
    let mut editor_id = None;
    let mut obj = PlacedObject::default();

    for field in Fields::new(payload) {
        let field = field?;
        let mut r = field.reader();
        match field.tag {
            EDID => editor_id = Some(r.read_zstring()?),
            NAME => obj.base = ref_field(&field, resolver)?,
            DATA => {
                expect_min(&field, 24)?;
                obj.position = Vec3::new(r.read_f32()?, r.read_f32()?, r.read_f32()?);
                obj.rotation = Vec3::new(r.read_f32()?, r.read_f32()?, r.read_f32()?);
            }
            XSCL => obj.scale = Some(r.read_f32()?),
            XESP => {
                expect_min(&field, 5)?;
                let raw = r.read_u32()?;
                let flags = r.read_u8()?;
                obj.enable_parent =
                    form_ref(raw, resolver)?.map(|reference| EnableParent { reference, flags });
            }
            XOWN => obj.owner = ref_field(&field, resolver)?,
            _ => {}
        }
    }

    Ok(TypedFields {
        editor_id,
        data: RecordData::PlacedObject(obj),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::test_support::resolver;
    use crate::writer::FieldWriter;
    use esworld_common::GlobalFormId;

    fn placement(pos: [f32; 3], rot: [f32; 3]) -> Vec<u8> {
        pos.iter()
            .chain(rot.iter())
            .flat_map(|v| v.to_le_bytes())
            .collect()
    }

    #[test]
    fn decodes_placed_object() {
        let mut w = FieldWriter::new();
        w.zstring(EDID, "ChairRef");
        w.u32(NAME, 0x0100_0D62);
        w.field(DATA, &placement([1.0, 2.0, 3.0], [0.0, 0.0, 1.5]));
        w.field(XSCL, &2.0f32.to_le_bytes());
        w.field(XESP, &[0x10, 0x00, 0x00, 0x00, 0x01, 0, 0, 0]);
        w.u32(XOWN, 0x0000_0020);

        let decoded = decode_placed(&w.finish(), &resolver()).unwrap();
        assert_eq!(decoded.editor_id.as_deref(), Some("ChairRef"));
        let RecordData::PlacedObject(obj) = decoded.data else {
            panic!("expected placed object");
        };
        assert_eq!(obj.base.unwrap().target(), GlobalFormId::standard(0, 0xD62));
        assert_eq!(obj.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(obj.rotation, Vec3::new(0.0, 0.0, 1.5));
        assert_eq!(obj.scale, Some(2.0));
        let parent = obj.enable_parent.unwrap();
        assert_eq!(parent.reference.target(), GlobalFormId::standard(5, 0x10));
        assert_eq!(parent.flags, 1);
        assert_eq!(obj.owner.unwrap().target(), GlobalFormId::standard(5, 0x20));
    }

    #[test]
    fn short_placement_is_bad_size() {
        let mut w = FieldWriter::new();
        w.field(DATA, &[0u8; 12]);
        assert!(matches!(
            decode_placed(&w.finish(), &resolver()),
            Err(FieldError::BadSize {
                expected: 24,
                actual: 12,
                ..
            })
        ));
    }

    #[test]
    fn reference_to_undeclared_master_slot_is_form_id_error() {
        let mut w = FieldWriter::new();
        w.u32(NAME, 0x0300_0001);
        assert!(matches!(
            decode_placed(&w.finish(), &resolver()),
            Err(FieldError::FormId(_))
        ));
    }
}
