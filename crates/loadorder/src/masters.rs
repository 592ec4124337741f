use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Append-only mapping from master filename to its standard index.
///
/// Lookups are case-insensitive, matching how plugin filenames are compared
/// on the platforms these files are authored on. Entries are never removed
/// or re-pointed once registered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MasterTable {
    entries: Vec<(String, u8)>,
    by_name: HashMap<String, u8>,
}

impl MasterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a master. Returns `false` if the name was already present,
    /// in which case the existing index is kept.
    pub fn register(&mut self, filename: &str, index: u8) -> bool {
        let key = normalize(filename);
        if self.by_name.contains_key(&key) {
            return false;
        }
        self.by_name.insert(key, index);
        self.entries.push((filename.to_string(), index));
        true
    }

    /// Standard index of a registered master.
    pub fn get(&self, filename: &str) -> Option<u8> {
        self.by_name.get(&normalize(filename)).copied()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.by_name.contains_key(&normalize(filename))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.entries.iter().map(|(name, index)| (name.as_str(), *index))
    }
}

fn normalize(filename: &str) -> String {
    filename.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut table = MasterTable::new();
        assert!(table.register("Skyrim.esm", 0));
        assert_eq!(table.get("skyrim.ESM"), Some(0));
        assert!(table.contains("SKYRIM.esm"));
        assert_eq!(table.get("Update.esm"), None);
    }

    #[test]
    fn register_keeps_first_index() {
        let mut table = MasterTable::new();
        assert!(table.register("A.esm", 0));
        assert!(!table.register("a.esm", 5));
        assert_eq!(table.get("A.esm"), Some(0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn iterates_in_registration_order() {
        let mut table = MasterTable::new();
        table.register("B.esm", 1);
        table.register("A.esm", 0);
        let names: Vec<&str> = table.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["B.esm", "A.esm"]);
    }
}
