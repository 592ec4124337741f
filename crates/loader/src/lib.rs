//! Load sessions: read the manifest in a data directory, decode each plugin
//! in load order, and collect the results into one finalized record store.
//!
//! # Invariants
//! - Plugins are decoded one at a time, in load order, each file closed
//!   before the next is opened.
//! - A master is visible to the form id resolver only for plugins after it.
//! - `build_references` runs exactly once, after the last plugin.

mod config;
mod report;
mod session;

pub use config::{ConfigError, DEFAULT_MANIFEST_NAME, LoaderConfig};
pub use report::{LoadReport, LoadedPlugin, PluginSkip, SkippedPlugin};
pub use session::{LoadSession, Loader, LoaderError};
