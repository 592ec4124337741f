//! Shared types: type tags, plugin indices and the global form id space.
//!
//! # Invariants
//! - A `GlobalFormId` is either standard (8-bit plugin index) or light
//!   (12-bit plugin index); the two spaces never alias.
//! - Raw `u32` bit layouts are only produced and consumed by the conversion
//!   functions on `GlobalFormId`.

mod types;

pub use types::{
    FormIdParseError, GlobalFormId, LIGHT_SENTINEL, MAX_LIGHT_PLUGINS, MAX_STANDARD_PLUGINS,
    PluginIndex, PluginKind, TypeTag,
};
