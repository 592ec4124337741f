use esworld_common::PluginIndex;
use esworld_plugin::DecodeError;
use esworld_records::ReferenceStats;
use serde::Serialize;
use std::fmt;

/// Why a plugin contributed nothing to the session.
#[derive(Debug, thiserror::Error)]
pub enum PluginSkip {
    #[error("not present in the data directory")]
    Missing,
    #[error("unreadable: {0}")]
    Unreadable(#[source] std::io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedPlugin {
    pub filename: String,
    pub index: PluginIndex,
    /// Records inserted into the store.
    pub records: usize,
    /// Records dropped for corrupt payloads.
    pub skipped_records: usize,
    /// Hex SHA-256 of the file as read.
    pub sha256: String,
}

#[derive(Debug)]
pub struct SkippedPlugin {
    pub filename: String,
    pub index: PluginIndex,
    pub reason: PluginSkip,
}

/// What a load session did, plugin by plugin.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<LoadedPlugin>,
    pub skipped: Vec<SkippedPlugin>,
    /// Manifest lines rejected during load-order resolution.
    pub rejected_lines: usize,
    pub records_inserted: usize,
    pub overrides: usize,
    pub references: ReferenceStats,
}

impl LoadReport {
    pub fn skipped_records(&self) -> usize {
        self.loaded.iter().map(|p| p.skipped_records).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
            && self.rejected_lines == 0
            && self.skipped_records() == 0
            && self.references.unresolved == 0
    }

    pub fn skipped_plugin(&self, filename: &str) -> Option<&PluginSkip> {
        self.skipped
            .iter()
            .find(|p| p.filename.eq_ignore_ascii_case(filename))
            .map(|p| &p.reason)
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} plugins loaded, {} skipped, {} manifest lines rejected; \
             {} records ({} overrides, {} corrupt skipped); \
             {} references resolved, {} unresolved",
            self.loaded.len(),
            self.skipped.len(),
            self.rejected_lines,
            self.records_inserted,
            self.overrides,
            self.skipped_records(),
            self.references.resolved,
            self.references.unresolved,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_line() {
        let report = LoadReport {
            loaded: vec![LoadedPlugin {
                filename: "A.esm".into(),
                index: PluginIndex::Standard(0),
                records: 3,
                skipped_records: 1,
                sha256: String::new(),
            }],
            skipped: vec![SkippedPlugin {
                filename: "Gone.esp".into(),
                index: PluginIndex::Standard(1),
                reason: PluginSkip::Missing,
            }],
            records_inserted: 3,
            references: ReferenceStats {
                resolved: 2,
                unresolved: 1,
            },
            ..LoadReport::default()
        };
        assert_eq!(
            report.to_string(),
            "1 plugins loaded, 1 skipped, 0 manifest lines rejected; \
             3 records (0 overrides, 1 corrupt skipped); \
             2 references resolved, 1 unresolved"
        );
        assert!(!report.is_clean());
        assert!(matches!(report.skipped_plugin("gone.esp"), Some(PluginSkip::Missing)));
    }
}
