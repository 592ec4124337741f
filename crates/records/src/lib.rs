//! Record collection: resolved typed records and the store that owns them.
//!
//! # Invariants
//! - Every record is keyed by its `GlobalFormId`; a later insert with the same
//!   id replaces the earlier record.
//! - Reference fields stay `Pending` until `RecordStore::build_references`
//!   runs, after which each one is `Resolved` or `Unresolved`.
//! - No insertion is accepted after finalization.

pub mod record;
pub mod store;

pub use record::{
    Actor, Climate, ClimateTiming, EnableParent, FactionRank, Field, FormRef, Link, PlacedObject,
    PropertyValue, Record, RecordData, RecordFlags, Script, ScriptBlock, ScriptObject,
    ScriptProperty, WeatherChance,
};
pub use store::{RecordStore, ReferenceStats, StoreError};
