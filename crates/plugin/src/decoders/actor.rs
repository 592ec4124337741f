use super::scripts::decode_script_block;
use super::{EDID, FieldError, TypedFields, expect_min, form_ref, ref_field};
use crate::fields::Fields;
use crate::formid::FormIdResolver;
use esworld_common::TypeTag;
use esworld_records::{Actor, FactionRank, RecordData};

const FULL: TypeTag = TypeTag::new(b"FULL");
const RNAM: TypeTag = TypeTag::new(b"RNAM");
const CNAM: TypeTag = TypeTag::new(b"CNAM");
const TPLT: TypeTag = TypeTag::new(b"TPLT");
const SNAM: TypeTag = TypeTag::new(b"SNAM");
const PKID: TypeTag = TypeTag::new(b"PKID");
const VMAD: TypeTag = TypeTag::new(b"VMAD");

/// `NPC_`: name, race, class, template, faction ranks, packages, scripts.
pub fn decode_actor(payload: &[u8], resolver: &FormIdResolver) -> Result<TypedFields, FieldError> {
    let mut editor_id = None;
    let mut actor = Actor::default();

    for field in Fields::new(payload) {
        let field = field?;
        let mut r = field.reader();
        match field.tag {
            EDID => editor_id = Some(r.read_zstring()?),
            FULL => actor.full_name = Some(r.read_zstring()?),
            RNAM => actor.race = ref_field(&field, resolver)?,
            CNAM => actor.class = ref_field(&field, resolver)?,
            TPLT => actor.template = ref_field(&field, resolver)?,
            SNAM => {
                expect_min(&field, 5)?;
                let raw = r.read_u32()?;
                let rank = r.read_i8()?;
                if let Some(faction) = form_ref(raw, resolver)? {
                    actor.factions.push(FactionRank { faction, rank });
                }
            }
            PKID => actor.packages.extend(ref_field(&field, resolver)?),
            VMAD => actor.scripts = Some(decode_script_block(field.data, resolver)?),
            _ => {}
        }
    }

    Ok(TypedFields {
        editor_id,
        data: RecordData::Actor(actor),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::test_support::resolver;
    use crate::writer::FieldWriter;
    use esworld_common::GlobalFormId;

    #[test]
    fn decodes_actor_template() {
        let mut w = FieldWriter::new();
        w.zstring(EDID, "BanditMelee");
        w.zstring(FULL, "Bandit");
        w.u32(RNAM, 0x0100_0019);
        w.u32(CNAM, 0x0000_0801);
        w.field(SNAM, &[0x05, 0x00, 0x00, 0x01, 0xFF, 0, 0, 0]);
        w.field(SNAM, &[0x06, 0x00, 0x00, 0x01, 0x02, 0, 0, 0]);
        w.u32(PKID, 0x0100_00A0);
        w.u32(PKID, 0x0100_00A1);

        let decoded = decode_actor(&w.finish(), &resolver()).unwrap();
        assert_eq!(decoded.editor_id.as_deref(), Some("BanditMelee"));
        let RecordData::Actor(actor) = decoded.data else {
            panic!("expected actor");
        };
        assert_eq!(actor.full_name.as_deref(), Some("Bandit"));
        assert_eq!(actor.race.unwrap().target(), GlobalFormId::standard(0, 0x19));
        assert_eq!(actor.class.unwrap().target(), GlobalFormId::standard(5, 0x801));
        assert_eq!(actor.template, None);
        assert_eq!(actor.factions.len(), 2);
        assert_eq!(actor.factions[0].rank, -1);
        assert_eq!(
            actor.factions[1].faction.target(),
            GlobalFormId::standard(0, 0x6)
        );
        assert_eq!(actor.packages.len(), 2);
    }

    #[test]
    fn null_template_is_none() {
        let mut w = FieldWriter::new();
        w.u32(TPLT, 0);
        let decoded = decode_actor(&w.finish(), &resolver()).unwrap();
        let RecordData::Actor(actor) = decoded.data else {
            panic!("expected actor");
        };
        assert_eq!(actor.template, None);
    }
}
