use crate::masters::MasterTable;
use esworld_common::{MAX_LIGHT_PLUGINS, MAX_STANDARD_PLUGINS, PluginIndex, PluginKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors from reading or interpreting the load-order manifest.
///
/// `NotFound` and `Io` abort the load. The per-line variants are collected on
/// the resulting [`LoadOrder`] and the offending line is skipped.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("load-order manifest not found at {}: {source}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read load-order manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: extension not recognized: {entry:?}")]
    UnrecognizedExtension { line: usize, entry: String },
    #[error("line {line}: plugin {entry:?} is already in the load order")]
    DuplicatePlugin { line: usize, entry: String },
    #[error("line {line}: no free {kind:?} plugin index left for {entry:?}")]
    IndexSpaceExhausted {
        line: usize,
        entry: String,
        kind: PluginKind,
    },
}

/// One entry of the load order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub filename: String,
    pub kind: PluginKind,
    pub index: PluginIndex,
}

impl PluginDescriptor {
    pub fn standard_index(&self) -> Option<u8> {
        match self.index {
            PluginIndex::Standard(index) => Some(index),
            PluginIndex::Light(_) => None,
        }
    }

    pub fn light_index(&self) -> Option<u16> {
        match self.index {
            PluginIndex::Light(index) => Some(index),
            PluginIndex::Standard(_) => None,
        }
    }

    pub fn is_light(&self) -> bool {
        self.index.is_light()
    }
}

/// The resolved load order: descriptors in manifest order plus the master table.
///
/// Built once per load session and read-only afterwards.
#[derive(Debug, Default)]
pub struct LoadOrder {
    plugins: Vec<PluginDescriptor>,
    masters: MasterTable,
    rejected: Vec<ManifestError>,
}

impl LoadOrder {
    /// Read and resolve a manifest file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound {
                    path: path.to_path_buf(),
                    source,
                });
            }
            Err(e) => return Err(ManifestError::Io(e)),
        };
        tracing::debug!(path = %path.display(), "read load-order manifest");
        Ok(Self::resolve(text.lines()))
    }

    /// Resolve manifest lines into a load order.
    ///
    /// Blank lines and `#` comments are ignored. The last character of each
    /// remaining line classifies the plugin. Lines that cannot be placed are
    /// logged, recorded in [`LoadOrder::rejected`] and skipped.
    pub fn resolve<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut order = Self::default();
        let mut next_standard: usize = 0;
        let mut next_light: usize = 0;

        for (i, raw) in lines.into_iter().enumerate() {
            let line_no = i + 1;
            let entry = raw.as_ref().trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }

            let kind = match entry.chars().last().and_then(PluginKind::from_marker) {
                Some(kind) => kind,
                None => {
                    order.reject(ManifestError::UnrecognizedExtension {
                        line: line_no,
                        entry: entry.to_string(),
                    });
                    continue;
                }
            };

            if order.position(entry).is_some() {
                order.reject(ManifestError::DuplicatePlugin {
                    line: line_no,
                    entry: entry.to_string(),
                });
                continue;
            }

            let index = match kind {
                PluginKind::Master | PluginKind::Standard => {
                    if next_standard >= MAX_STANDARD_PLUGINS {
                        order.reject(ManifestError::IndexSpaceExhausted {
                            line: line_no,
                            entry: entry.to_string(),
                            kind,
                        });
                        continue;
                    }
                    let index = next_standard as u8;
                    // A master is also an ordinary standard-indexed plugin.
                    if kind == PluginKind::Master {
                        order.masters.register(entry, index);
                    }
                    next_standard += 1;
                    PluginIndex::Standard(index)
                }
                PluginKind::Light => {
                    if next_light >= MAX_LIGHT_PLUGINS {
                        order.reject(ManifestError::IndexSpaceExhausted {
                            line: line_no,
                            entry: entry.to_string(),
                            kind,
                        });
                        continue;
                    }
                    let index = next_light as u16;
                    next_light += 1;
                    PluginIndex::Light(index)
                }
            };

            tracing::trace!(plugin = entry, ?kind, %index, "assigned plugin index");
            order.plugins.push(PluginDescriptor {
                filename: entry.to_string(),
                kind,
                index,
            });
        }

        tracing::info!(
            plugins = order.plugins.len(),
            masters = order.masters.len(),
            rejected = order.rejected.len(),
            "load order resolved"
        );
        order
    }

    fn reject(&mut self, err: ManifestError) {
        tracing::error!(%err, "skipping load-order entry");
        self.rejected.push(err);
    }

    /// Descriptors in manifest order.
    pub fn plugins(&self) -> &[PluginDescriptor] {
        &self.plugins
    }

    /// Every master named by the manifest, with its standard index.
    pub fn masters(&self) -> &MasterTable {
        &self.masters
    }

    /// Manifest lines that were skipped.
    pub fn rejected(&self) -> &[ManifestError] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Position of a plugin in the load order (case-insensitive).
    pub fn position(&self, filename: &str) -> Option<usize> {
        self.plugins
            .iter()
            .position(|p| p.filename.eq_ignore_ascii_case(filename))
    }

    pub fn get(&self, filename: &str) -> Option<&PluginDescriptor> {
        self.position(filename).map(|i| &self.plugins[i])
    }
}
