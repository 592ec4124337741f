//! Load order: manifest parsing, plugin classification, index assignment.
//!
//! # Invariants
//! - Standard and light indices start at 0 and advance independently, in
//!   manifest line order.
//! - A master occupies a standard slot and is also recorded in the master
//!   table under that same index.
//! - A rejected line never consumes an index.

mod manifest;
mod masters;

pub use manifest::{LoadOrder, ManifestError, PluginDescriptor};
pub use masters::MasterTable;
