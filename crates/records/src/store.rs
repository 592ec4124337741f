use crate::record::{FormRef, Link, Record};
use esworld_common::{GlobalFormId, TypeTag};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record store is finalized; cannot insert {0}")]
    Finalized(GlobalFormId),
}

/// Outcome of a reference-linking pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceStats {
    pub resolved: usize,
    pub unresolved: usize,
}

/// The accumulating record collection for one load session.
///
/// Records are owned exclusively by the store. Lookups go through the global
/// id index; type-scoped iteration goes through a secondary index that keeps
/// first-insertion order per tag.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: HashMap<GlobalFormId, Record>,
    by_type: HashMap<TypeTag, Vec<GlobalFormId>>,
    overrides: usize,
    finalized: bool,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any record with the same id.
    ///
    /// Returns the replaced record. Plugins later in the load order win.
    pub fn insert(&mut self, record: Record) -> Result<Option<Record>, StoreError> {
        if self.finalized {
            return Err(StoreError::Finalized(record.id));
        }
        let id = record.id;
        let tag = record.tag;
        let previous = self.records.insert(id, record);

        match &previous {
            Some(old) => {
                self.overrides += 1;
                tracing::trace!(%id, from = %old.origin, "record overridden");
                if old.tag != tag {
                    if let Some(ids) = self.by_type.get_mut(&old.tag) {
                        ids.retain(|other| *other != id);
                    }
                    self.by_type.entry(tag).or_default().push(id);
                }
            }
            None => self.by_type.entry(tag).or_default().push(id),
        }
        Ok(previous)
    }

    /// Link every reference field to its target, or mark it unresolved.
    ///
    /// Runs after the last plugin has been inserted and closes the store to
    /// further insertion. Running it again recomputes the same state.
    pub fn build_references(&mut self) -> ReferenceStats {
        let _span = tracing::info_span!("build_references", records = self.records.len()).entered();

        let present: HashSet<GlobalFormId> = self.records.keys().copied().collect();
        let mut stats = ReferenceStats::default();
        for record in self.records.values_mut() {
            record.visit_refs_mut(&mut |r| {
                let found = present.contains(&r.target());
                r.set_present(found);
                if found {
                    stats.resolved += 1;
                } else {
                    stats.unresolved += 1;
                }
            });
        }
        self.finalized = true;

        tracing::info!(
            resolved = stats.resolved,
            unresolved = stats.unresolved,
            "references built"
        );
        stats
    }

    pub fn lookup(&self, id: GlobalFormId) -> Option<&Record> {
        self.records.get(&id)
    }

    /// Follow a reference field to its target.
    ///
    /// Only `Resolved` links are followed; pending and unresolved links yield `None`.
    pub fn resolve(&self, reference: &FormRef) -> Option<&Record> {
        match reference.link() {
            Link::Resolved => self.records.get(&reference.target()),
            Link::Pending | Link::Unresolved => None,
        }
    }

    /// Records of one type, in first-insertion order. Call again to restart.
    pub fn iter_by_type(&self, tag: TypeTag) -> impl Iterator<Item = &Record> + '_ {
        self.by_type
            .get(&tag)
            .into_iter()
            .flatten()
            .filter_map(|id| self.records.get(id))
    }

    /// All records, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records.values()
    }

    /// Record count per type tag, sorted by tag.
    pub fn type_counts(&self) -> BTreeMap<TypeTag, usize> {
        self.by_type
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(tag, ids)| (*tag, ids.len()))
            .collect()
    }

    /// Reference fields whose target was never loaded, with the id of the
    /// record holding them.
    pub fn unresolved_references(&self) -> Vec<(GlobalFormId, FormRef)> {
        self.records
            .values()
            .flat_map(|record| {
                record
                    .references()
                    .into_iter()
                    .filter(|r| r.link() == Link::Unresolved)
                    .map(move |r| (record.id, r))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of inserts that replaced an existing record.
    pub fn override_count(&self) -> usize {
        self.overrides
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Climate, Field, PlacedObject, RecordData, RecordFlags, WeatherChance};
    use esworld_common::PluginIndex;

    fn id(plugin: u8, local: u32) -> GlobalFormId {
        GlobalFormId::standard(plugin, local)
    }

    fn generic(id: GlobalFormId, tag: TypeTag, origin: u8) -> Record {
        Record {
            id,
            tag,
            flags: RecordFlags::empty(),
            origin: PluginIndex::Standard(origin),
            editor_id: None,
            data: RecordData::Generic(Vec::new()),
        }
    }

    fn placed(id: GlobalFormId, base: GlobalFormId) -> Record {
        Record {
            id,
            tag: TypeTag::REFR,
            flags: RecordFlags::empty(),
            origin: PluginIndex::Standard(id_plugin(id)),
            editor_id: None,
            data: RecordData::PlacedObject(PlacedObject {
                base: Some(FormRef::new(base)),
                ..PlacedObject::default()
            }),
        }
    }

    fn id_plugin(id: GlobalFormId) -> u8 {
        match id.plugin_index() {
            PluginIndex::Standard(p) => p,
            PluginIndex::Light(_) => 0xFE,
        }
    }

    #[test]
    fn insert_and_lookup() {
        let mut store = RecordStore::new();
        let rec = generic(id(0, 0x10), TypeTag::NPC_, 0);
        assert!(store.insert(rec.clone()).unwrap().is_none());
        assert_eq!(store.lookup(id(0, 0x10)), Some(&rec));
        assert_eq!(store.lookup(id(0, 0x11)), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn last_write_wins() {
        let mut store = RecordStore::new();
        let shared = id(0, 0x800);
        store.insert(generic(shared, TypeTag::NPC_, 0)).unwrap();
        let replaced = store.insert(generic(shared, TypeTag::NPC_, 3)).unwrap();

        assert_eq!(replaced.unwrap().origin, PluginIndex::Standard(0));
        assert_eq!(store.lookup(shared).unwrap().origin, PluginIndex::Standard(3));
        assert_eq!(store.len(), 1);
        assert_eq!(store.iter_by_type(TypeTag::NPC_).count(), 1);
        assert_eq!(store.override_count(), 1);
    }

    #[test]
    fn override_with_new_type_moves_type_index() {
        let mut store = RecordStore::new();
        let shared = id(0, 0x900);
        store.insert(generic(shared, TypeTag::NPC_, 0)).unwrap();
        store.insert(generic(shared, TypeTag::CLMT, 1)).unwrap();
        assert_eq!(store.iter_by_type(TypeTag::NPC_).count(), 0);
        assert_eq!(store.iter_by_type(TypeTag::CLMT).count(), 1);
        assert!(!store.type_counts().contains_key(&TypeTag::NPC_));
    }

    #[test]
    fn iter_by_type_is_restartable_and_ordered() {
        let mut store = RecordStore::new();
        for local in [5, 3, 9] {
            store.insert(generic(id(0, local), TypeTag::REFR, 0)).unwrap();
        }
        store.insert(generic(id(0, 1), TypeTag::NPC_, 0)).unwrap();

        let first: Vec<GlobalFormId> = store.iter_by_type(TypeTag::REFR).map(|r| r.id).collect();
        let second: Vec<GlobalFormId> = store.iter_by_type(TypeTag::REFR).map(|r| r.id).collect();
        assert_eq!(first, vec![id(0, 5), id(0, 3), id(0, 9)]);
        assert_eq!(first, second);
        assert_eq!(store.iter_by_type(TypeTag::CLMT).count(), 0);
    }

    #[test]
    fn build_references_links_present_targets() {
        let mut store = RecordStore::new();
        store.insert(generic(id(0, 0x20), TypeTag::NPC_, 0)).unwrap();
        store.insert(placed(id(1, 0x30), id(0, 0x20))).unwrap();

        let stats = store.build_references();
        assert_eq!(stats, ReferenceStats { resolved: 1, unresolved: 0 });

        let refr = store.lookup(id(1, 0x30)).unwrap();
        let base = refr.references()[0];
        assert_eq!(base.link(), Link::Resolved);
        assert_eq!(store.resolve(&base).unwrap().id, id(0, 0x20));
    }

    #[test]
    fn missing_target_is_unresolved_not_error() {
        let mut store = RecordStore::new();
        store.insert(placed(id(1, 0x30), id(7, 0x99))).unwrap();

        let stats = store.build_references();
        assert_eq!(stats.unresolved, 1);

        let base = store.lookup(id(1, 0x30)).unwrap().references()[0];
        assert_eq!(base.link(), Link::Unresolved);
        assert!(store.resolve(&base).is_none());
        assert_eq!(store.lookup(id(7, 0x99)), None);
        assert_eq!(store.unresolved_references(), vec![(id(1, 0x30), base)]);
    }

    #[test]
    fn forward_references_resolve() {
        let mut store = RecordStore::new();
        // Referencing record inserted before its target.
        store.insert(placed(id(0, 0x1), id(2, 0x5))).unwrap();
        store.insert(generic(id(2, 0x5), TypeTag::NPC_, 2)).unwrap();
        store.build_references();
        assert!(store.lookup(id(0, 0x1)).unwrap().references()[0].is_resolved());
    }

    #[test]
    fn build_references_is_idempotent() {
        let mut store = RecordStore::new();
        store.insert(generic(id(0, 0x20), TypeTag::NPC_, 0)).unwrap();
        store.insert(placed(id(0, 0x30), id(0, 0x20))).unwrap();
        store
            .insert(Record {
                id: id(0, 0x40),
                tag: TypeTag::CLMT,
                flags: RecordFlags::empty(),
                origin: PluginIndex::Standard(0),
                editor_id: None,
                data: RecordData::Climate(Climate {
                    weathers: vec![WeatherChance {
                        weather: FormRef::new(id(4, 0x1)),
                        chance: 40,
                        global: None,
                    }],
                    ..Climate::default()
                }),
            })
            .unwrap();

        let first_stats = store.build_references();
        let mut first: Vec<Record> = store.iter().cloned().collect();
        first.sort_by_key(|r| r.id);

        let second_stats = store.build_references();
        let mut second: Vec<Record> = store.iter().cloned().collect();
        second.sort_by_key(|r| r.id);

        assert_eq!(first_stats, second_stats);
        assert_eq!(first, second);
    }

    #[test]
    fn insert_after_finalize_is_rejected() {
        let mut store = RecordStore::new();
        store.build_references();
        assert!(store.is_finalized());
        let result = store.insert(generic(id(0, 1), TypeTag::NPC_, 0));
        assert!(matches!(result, Err(StoreError::Finalized(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn generic_records_have_no_references() {
        let mut store = RecordStore::new();
        let mut rec = generic(id(0, 1), TypeTag::new(b"GLOB"), 0);
        rec.data = RecordData::Generic(vec![Field {
            tag: TypeTag::new(b"FLTV"),
            data: 1.0f32.to_le_bytes().to_vec(),
        }]);
        store.insert(rec).unwrap();
        assert_eq!(store.build_references(), ReferenceStats::default());
        assert_eq!(store.type_counts().get(&TypeTag::new(b"GLOB")), Some(&1));
    }
}
