//! Translation of plugin-local form ids into the global id space.
//!
//! Inside a plugin, the high byte of a form id selects where the record
//! lives: `0` is the plugin itself, `N >= 1` is the N-th master it declares,
//! and `0xFE` addresses a light plugin directly.

use esworld_common::{GlobalFormId, LIGHT_SENTINEL, PluginIndex};
use esworld_loadorder::MasterTable;

/// Errors translating local form ids.
///
/// `UnknownMaster` comes from [`FormIdResolver::new`] and is fatal for the
/// plugin. The others come from one id in one record and only spoil that
/// record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormIdError {
    #[error("master {master:?} is not loaded before this plugin")]
    UnknownMaster { master: String },
    #[error("form id {raw:08X} does not fit the 12-bit id space of light plugin {plugin}")]
    LocalIdOutOfRange { raw: u32, plugin: PluginIndex },
    #[error("form id {raw:08X} names master slot {slot}, but the plugin declares {declared} masters")]
    MasterIndexOutOfRange {
        raw: u32,
        slot: u8,
        declared: usize,
    },
}

/// Per-plugin translation context.
///
/// Built once per plugin from its declared masters and the master table as
/// it stands when the plugin is decoded. Construction fails if any declared
/// master is not yet in the table.
#[derive(Debug, Clone)]
pub struct FormIdResolver {
    /// Global standard index of each declared master, in declaration order.
    masters: Vec<u8>,
    self_index: PluginIndex,
}

impl FormIdResolver {
    pub fn new(
        declared_masters: &[String],
        master_table: &MasterTable,
        self_index: PluginIndex,
    ) -> Result<Self, FormIdError> {
        let masters = declared_masters
            .iter()
            .map(|name| {
                master_table
                    .get(name)
                    .ok_or_else(|| FormIdError::UnknownMaster {
                        master: name.clone(),
                    })
            })
            .collect::<Result<Vec<u8>, _>>()?;
        Ok(Self {
            masters,
            self_index,
        })
    }

    pub fn self_index(&self) -> PluginIndex {
        self.self_index
    }

    pub fn is_light_self(&self) -> bool {
        self.self_index.is_light()
    }

    /// Translate one local form id.
    pub fn resolve(&self, local: u32) -> Result<GlobalFormId, FormIdError> {
        let slot = (local >> 24) as u8;
        match slot {
            LIGHT_SENTINEL => Ok(GlobalFormId::from_raw(local)),
            0 => self
                .self_index
                .form_id(local)
                .ok_or(FormIdError::LocalIdOutOfRange {
                    raw: local,
                    plugin: self.self_index,
                }),
            n => self
                .masters
                .get(usize::from(n) - 1)
                .map(|&global| GlobalFormId::standard(global, local))
                .ok_or(FormIdError::MasterIndexOutOfRange {
                    raw: local,
                    slot: n,
                    declared: self.masters.len(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, u8)]) -> MasterTable {
        let mut t = MasterTable::new();
        for (name, index) in entries {
            t.register(name, *index);
        }
        t
    }

    #[test]
    fn slot_zero_is_self_regardless_of_position() {
        let masters = table(&[("A.esm", 0)]);
        for self_index in [1u8, 7, 200] {
            let r = FormIdResolver::new(&["A.esm".into()], &masters, PluginIndex::Standard(self_index))
                .unwrap();
            assert_eq!(
                r.resolve(0x0000_1234).unwrap(),
                GlobalFormId::standard(self_index, 0x1234)
            );
        }
    }

    #[test]
    fn slot_zero_in_light_plugin_uses_light_space() {
        let r = FormIdResolver::new(&[], &MasterTable::new(), PluginIndex::Light(3)).unwrap();
        assert!(r.is_light_self());
        assert_eq!(r.resolve(0x0000_0801).unwrap(), GlobalFormId::light(3, 0x801));
    }

    #[test]
    fn master_slots_map_through_master_table() {
        let masters = table(&[("A.esm", 0), ("B.esm", 4)]);
        let declared = vec!["B.esm".to_string(), "A.esm".to_string()];
        let r = FormIdResolver::new(&declared, &masters, PluginIndex::Standard(9)).unwrap();

        assert_eq!(r.resolve(0x0100_0ABC).unwrap(), GlobalFormId::standard(4, 0xABC));
        assert_eq!(r.resolve(0x0200_0ABC).unwrap(), GlobalFormId::standard(0, 0xABC));
    }

    #[test]
    fn light_self_id_beyond_12_bits_is_rejected() {
        let r = FormIdResolver::new(&[], &MasterTable::new(), PluginIndex::Light(0)).unwrap();
        assert_eq!(r.resolve(0x0000_0FFF).unwrap(), GlobalFormId::light(0, 0xFFF));
        assert_eq!(
            r.resolve(0x0000_1801),
            Err(FormIdError::LocalIdOutOfRange {
                raw: 0x0000_1801,
                plugin: PluginIndex::Light(0),
            })
        );
    }

    #[test]
    fn light_sentinel_passes_through() {
        let r = FormIdResolver::new(&[], &MasterTable::new(), PluginIndex::Standard(2)).unwrap();
        assert_eq!(r.resolve(0xFE00_2805).unwrap(), GlobalFormId::light(2, 0x805));
    }

    #[test]
    fn undeclared_master_is_rejected_upfront() {
        let masters = table(&[("A.esm", 0)]);
        let err = FormIdResolver::new(&["Later.esm".into()], &masters, PluginIndex::Standard(1))
            .unwrap_err();
        assert_eq!(
            err,
            FormIdError::UnknownMaster {
                master: "Later.esm".into()
            }
        );
    }

    #[test]
    fn slot_beyond_declared_masters_is_an_error() {
        let masters = table(&[("A.esm", 0)]);
        let r = FormIdResolver::new(&["A.esm".into()], &masters, PluginIndex::Standard(1)).unwrap();
        assert!(matches!(
            r.resolve(0x0200_0001),
            Err(FormIdError::MasterIndexOutOfRange {
                slot: 2,
                declared: 1,
                ..
            })
        ));
    }
}
