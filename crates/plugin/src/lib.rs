//! Plugin decoding: container framing, payload decompression, typed field
//! decoding and translation of local form ids into the global space.
//!
//! # Invariants
//! - A plugin either decodes completely or not at all; only individual
//!   records with corrupt payloads are dropped.
//! - Every form id leaving this crate is global. Local ids never escape.
//! - Decoding reads nothing but its own file and the master table it is given.

pub mod decoders;
mod decoder;
mod fields;
mod format;
mod formid;
mod reader;
mod writer;

pub use decoder::{DecodeError, DecodedPlugin, PluginDecoder, RawRecord};
pub use decoders::{DecodeFn, DecoderRegistry, FieldError, TypedFields, decode_generic};
pub use fields::{Fields, RawField, XXXX};
pub use format::{
    FileHeader, GROUP_HEADER_SIZE, GroupHeader, HeaderError, RECORD_HEADER_SIZE, RecordHeader,
    SUPPORTED_VERSIONS, is_supported_version,
};
pub use formid::{FormIdError, FormIdResolver};
pub use reader::{ReadError, Reader, decode_string};
pub use writer::{
    FieldWriter, PluginWriter, WriteError, compress_payload, encode_string, encode_wstring,
    encode_zstring,
};
