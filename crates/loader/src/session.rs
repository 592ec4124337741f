use crate::config::LoaderConfig;
use crate::report::{LoadReport, LoadedPlugin, PluginSkip, SkippedPlugin};
use esworld_loadorder::{LoadOrder, ManifestError, MasterTable, PluginDescriptor};
use esworld_plugin::{DecodedPlugin, DecoderRegistry, PluginDecoder};
use esworld_records::{RecordStore, StoreError};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Errors that abort a whole load session.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("data directory not found: {}", .0.display())]
    DataDirNotFound(PathBuf),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything one load produced. Reloading means building a new session.
#[derive(Debug)]
pub struct LoadSession {
    pub load_order: LoadOrder,
    pub store: RecordStore,
    pub report: LoadReport,
}

/// Drives a load: manifest, then every plugin in order, then reference linking.
#[derive(Debug)]
pub struct Loader {
    config: LoaderConfig,
    registry: DecoderRegistry,
}

impl Loader {
    pub fn new(config: LoaderConfig) -> Self {
        Self::with_registry(config, DecoderRegistry::default())
    }

    pub fn with_registry(config: LoaderConfig, registry: DecoderRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Resolve the load order only.
    pub fn load_order(&self) -> Result<LoadOrder, LoaderError> {
        if !self.config.data_dir.is_dir() {
            return Err(LoaderError::DataDirNotFound(self.config.data_dir.clone()));
        }
        Ok(LoadOrder::from_path(self.config.manifest_path())?)
    }

    /// Load every plugin in the manifest into a finalized record store.
    ///
    /// Plugins that fail to decode are skipped whole and reported; the
    /// session is the union of everything that did decode.
    pub fn build_record_collection(&self) -> Result<LoadSession, LoaderError> {
        let _span = tracing::info_span!("load", data_dir = %self.config.data_dir.display()).entered();

        let load_order = self.load_order()?;
        let mut report = LoadReport {
            rejected_lines: load_order.rejected().len(),
            ..LoadReport::default()
        };
        let decoder = PluginDecoder::new(&self.registry);
        let mut store = RecordStore::new();
        // Masters become visible only to plugins after them.
        let mut masters = MasterTable::new();

        for plugin in load_order.plugins() {
            let _plugin_span =
                tracing::info_span!("plugin", name = %plugin.filename, index = %plugin.index).entered();
            match self.decode_one(&decoder, plugin, &masters) {
                Ok((decoded, sha256)) => {
                    let records = decoded.records.len();
                    for record in decoded.records {
                        store.insert(record)?;
                    }
                    tracing::info!(
                        plugin = %plugin.filename,
                        index = %plugin.index,
                        records,
                        skipped = decoded.skipped.len(),
                        "plugin loaded"
                    );
                    report.loaded.push(LoadedPlugin {
                        filename: plugin.filename.clone(),
                        index: plugin.index,
                        records,
                        skipped_records: decoded.skipped.len(),
                        sha256,
                    });
                }
                Err(reason) => {
                    tracing::warn!(plugin = %plugin.filename, %reason, "skipping plugin");
                    report.skipped.push(SkippedPlugin {
                        filename: plugin.filename.clone(),
                        index: plugin.index,
                        reason,
                    });
                }
            }

            if let Some(index) = load_order.masters().get(&plugin.filename) {
                masters.register(&plugin.filename, index);
            }
        }

        report.records_inserted = store.len();
        report.overrides = store.override_count();
        report.references = store.build_references();
        tracing::info!(%report, "load complete");

        Ok(LoadSession {
            load_order,
            store,
            report,
        })
    }

    fn decode_one(
        &self,
        decoder: &PluginDecoder<'_>,
        plugin: &PluginDescriptor,
        masters: &MasterTable,
    ) -> Result<(DecodedPlugin, String), PluginSkip> {
        let path = self.config.plugin_path(&plugin.filename);
        let bytes = std::fs::read(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => PluginSkip::Missing,
            _ => PluginSkip::Unreadable(err),
        })?;
        let sha256 = sha256_hex(&bytes);
        let decoded = decoder.decode_bytes(&bytes, masters, plugin.index)?;
        Ok((decoded, sha256))
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
