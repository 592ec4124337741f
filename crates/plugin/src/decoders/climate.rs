use super::{EDID, FieldError, TypedFields, form_ref};
use crate::fields::Fields;
use crate::formid::FormIdResolver;
use esworld_common::TypeTag;
use esworld_records::{Climate, ClimateTiming, RecordData, WeatherChance};

const WLST: TypeTag = TypeTag::new(b"WLST");
const FNAM: TypeTag = TypeTag::new(b"FNAM");
const GNAM: TypeTag = TypeTag::new(b"GNAM");
const TNAM: TypeTag = TypeTag::new(b"TNAM");

const WEATHER_ENTRY_SIZE: usize = 12;
const TIMING_SIZE: usize = 6;

/// `CLMT`: weighted weather list, sun textures, timing.
pub fn decode_climate(payload: &[u8], resolver: &FormIdResolver) -> Result<TypedFields, FieldError> {
    let mut editor_id = None;
    let mut climate = Climate::default();

    for field in Fields::new(payload) {
        let field = field?;
        let mut r = field.reader();
        match field.tag {
            EDID => editor_id = Some(r.read_zstring()?),
            WLST => {
                // Entries are fixed-size; `expected` reports the entry size.
                if field.data.len() % WEATHER_ENTRY_SIZE != 0 {
                    return Err(FieldError::BadSize {
                        tag: WLST,
                        expected: WEATHER_ENTRY_SIZE,
                        actual: field.data.len(),
                    });
                }
                while !r.is_empty() {
                    let weather = r.read_u32()?;
                    let chance = r.read_i32()?;
                    let global = r.read_u32()?;
                    // An entry without a weather carries nothing.
                    let Some(weather) = form_ref(weather, resolver)? else {
                        continue;
                    };
                    climate.weathers.push(WeatherChance {
                        weather,
                        chance,
                        global: form_ref(global, resolver)?,
                    });
                }
            }
            FNAM => climate.sun_texture = Some(r.read_zstring()?),
            GNAM => climate.glare_texture = Some(r.read_zstring()?),
            TNAM => {
                if field.data.len() != TIMING_SIZE {
                    return Err(FieldError::BadSize {
                        tag: TNAM,
                        expected: TIMING_SIZE,
                        actual: field.data.len(),
                    });
                }
                climate.timing = Some(ClimateTiming {
                    sunrise_begin: r.read_u8()?,
                    sunrise_end: r.read_u8()?,
                    sunset_begin: r.read_u8()?,
                    sunset_end: r.read_u8()?,
                    volatility: r.read_u8()?,
                    moons: r.read_u8()?,
                });
            }
            _ => {}
        }
    }

    Ok(TypedFields {
        editor_id,
        data: RecordData::Climate(climate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::test_support::resolver;
    use crate::writer::FieldWriter;
    use esworld_common::GlobalFormId;

    fn entry(weather: u32, chance: i32, global: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&weather.to_le_bytes());
        out.extend_from_slice(&chance.to_le_bytes());
        out.extend_from_slice(&global.to_le_bytes());
        out
    }

    #[test]
    fn decodes_climate() {
        let mut weathers = entry(0x0100_0100, 60, 0);
        weathers.extend(entry(0x0000_0900, 40, 0x0100_0200));

        let mut w = FieldWriter::new();
        w.zstring(EDID, "TundraClimate");
        w.field(WLST, &weathers);
        w.zstring(FNAM, "Sky\\Sun.dds");
        w.field(TNAM, &[36, 48, 108, 120, 20, 3]);

        let decoded = decode_climate(&w.finish(), &resolver()).unwrap();
        let RecordData::Climate(climate) = decoded.data else {
            panic!("expected climate");
        };
        assert_eq!(climate.weathers.len(), 2);
        assert_eq!(
            climate.weathers[0].weather.target(),
            GlobalFormId::standard(0, 0x100)
        );
        assert_eq!(climate.weathers[0].global, None);
        assert_eq!(
            climate.weathers[1].weather.target(),
            GlobalFormId::standard(5, 0x900)
        );
        assert_eq!(
            climate.weathers[1].global.unwrap().target(),
            GlobalFormId::standard(0, 0x200)
        );
        assert_eq!(climate.sun_texture.as_deref(), Some("Sky\\Sun.dds"));
        assert_eq!(climate.timing.unwrap().sunset_end, 120);
    }

    #[test]
    fn ragged_weather_list_is_bad_size() {
        let mut w = FieldWriter::new();
        w.field(WLST, &[0u8; 13]);
        assert!(matches!(
            decode_climate(&w.finish(), &resolver()),
            Err(FieldError::BadSize { tag: WLST, .. })
        ));
    }
}
