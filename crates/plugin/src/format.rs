//! Container layout: record and group headers, and the `TES4` file header.
//!
//! ```text
//! record:  tag[4] data_size:u32 flags:u32 form_id:u32 vc_info:u32 version:u16 unknown:u16 data
//! group:   "GRUP" group_size:u32 label[4] group_type:i32 stamp:u16 unknown:u16 version:u16 unknown:u16 children
//! ```
//!
//! `group_size` includes the group header. All integers are little-endian.

use crate::fields::Fields;
use crate::reader::{ReadError, Reader};
use esworld_common::TypeTag;
use esworld_records::RecordFlags;
use serde::{Deserialize, Serialize};

pub const RECORD_HEADER_SIZE: usize = 24;
pub const GROUP_HEADER_SIZE: usize = 24;

/// `HEDR` format versions this decoder understands.
pub const SUPPORTED_VERSIONS: [f32; 5] = [0.94, 0.95, 1.0, 1.7, 1.71];

const HEDR: TypeTag = TypeTag::new(b"HEDR");
const CNAM: TypeTag = TypeTag::new(b"CNAM");
const SNAM: TypeTag = TypeTag::new(b"SNAM");
const MAST: TypeTag = TypeTag::new(b"MAST");
const DATA: TypeTag = TypeTag::new(b"DATA");

pub fn is_supported_version(version: f32) -> bool {
    SUPPORTED_VERSIONS
        .iter()
        .any(|known| (known - version).abs() < 1e-4)
}

/// Fixed header in front of every record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub tag: TypeTag,
    pub data_size: u32,
    pub flags: RecordFlags,
    pub form_id: u32,
    pub vc_info: u32,
    pub form_version: u16,
    pub unknown: u16,
}

impl RecordHeader {
    pub fn new(tag: TypeTag, flags: RecordFlags, form_id: u32, data_size: u32) -> Self {
        Self {
            tag,
            data_size,
            flags,
            form_id,
            vc_info: 0,
            form_version: 44,
            unknown: 0,
        }
    }

    /// Read the header fields that follow an already-consumed tag.
    pub fn read_after_tag(tag: TypeTag, r: &mut Reader<'_>) -> Result<Self, ReadError> {
        Ok(Self {
            tag,
            data_size: r.read_u32()?,
            flags: RecordFlags::from_bits_retain(r.read_u32()?),
            form_id: r.read_u32()?,
            vc_info: r.read_u32()?,
            form_version: r.read_u16()?,
            unknown: r.read_u16()?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.tag.as_bytes());
        out.extend_from_slice(&self.data_size.to_le_bytes());
        out.extend_from_slice(&self.flags.bits().to_le_bytes());
        out.extend_from_slice(&self.form_id.to_le_bytes());
        out.extend_from_slice(&self.vc_info.to_le_bytes());
        out.extend_from_slice(&self.form_version.to_le_bytes());
        out.extend_from_slice(&self.unknown.to_le_bytes());
    }
}

/// Fixed header of a `GRUP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupHeader {
    pub group_size: u32,
    pub label: [u8; 4],
    pub group_type: i32,
    pub stamp: u16,
    pub unknown: u16,
    pub version: u16,
    pub unknown2: u16,
}

impl GroupHeader {
    /// Top-level group holding every record of one type.
    pub fn top(label: TypeTag) -> Self {
        Self {
            group_size: GROUP_HEADER_SIZE as u32,
            label: label.0,
            group_type: 0,
            stamp: 0,
            unknown: 0,
            version: 0,
            unknown2: 0,
        }
    }

    pub fn read_after_tag(r: &mut Reader<'_>) -> Result<Self, ReadError> {
        Ok(Self {
            group_size: r.read_u32()?,
            label: r.read_array()?,
            group_type: r.read_i32()?,
            stamp: r.read_u16()?,
            unknown: r.read_u16()?,
            version: r.read_u16()?,
            unknown2: r.read_u16()?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(TypeTag::GRUP.as_bytes());
        out.extend_from_slice(&self.group_size.to_le_bytes());
        out.extend_from_slice(&self.label);
        out.extend_from_slice(&self.group_type.to_le_bytes());
        out.extend_from_slice(&self.stamp.to_le_bytes());
        out.extend_from_slice(&self.unknown.to_le_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.unknown2.to_le_bytes());
    }
}

/// Errors interpreting the `TES4` payload.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("file header has no HEDR field")]
    MissingHedr,
}

/// Decoded `TES4` file header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    pub flags: RecordFlags,
    pub version: f32,
    pub record_count: u32,
    pub next_object_id: u32,
    pub author: Option<String>,
    pub description: Option<String>,
    /// Declared masters, in the order local form ids index them.
    pub masters: Vec<String>,
}

impl Default for FileHeader {
    fn default() -> Self {
        Self {
            flags: RecordFlags::empty(),
            version: 1.71,
            record_count: 0,
            next_object_id: 0x800,
            author: None,
            description: None,
            masters: Vec::new(),
        }
    }
}

impl FileHeader {
    pub fn is_master(&self) -> bool {
        self.flags.contains(RecordFlags::MASTER)
    }

    pub fn is_light(&self) -> bool {
        self.flags.contains(RecordFlags::LIGHT)
    }

    pub fn parse(flags: RecordFlags, payload: &[u8]) -> Result<Self, HeaderError> {
        let mut header = Self {
            flags,
            ..Self::default()
        };
        let mut saw_hedr = false;

        for field in Fields::new(payload) {
            let field = field?;
            let mut r = field.reader();
            match field.tag {
                HEDR => {
                    header.version = r.read_f32()?;
                    header.record_count = r.read_u32()?;
                    header.next_object_id = r.read_u32()?;
                    saw_hedr = true;
                }
                CNAM => header.author = Some(r.read_zstring()?),
                SNAM => header.description = Some(r.read_zstring()?),
                MAST => header.masters.push(r.read_zstring()?),
                // Master file size, unused.
                DATA => {}
                other => tracing::trace!(tag = %other, "ignoring file header field"),
            }
        }

        if !saw_hedr {
            return Err(HeaderError::MissingHedr);
        }
        Ok(header)
    }

    pub fn to_payload(&self) -> Vec<u8> {
        let mut hedr = Vec::with_capacity(12);
        hedr.extend_from_slice(&self.version.to_le_bytes());
        hedr.extend_from_slice(&self.record_count.to_le_bytes());
        hedr.extend_from_slice(&self.next_object_id.to_le_bytes());

        let mut w = crate::writer::FieldWriter::new();
        w.field(HEDR, &hedr);
        if let Some(author) = &self.author {
            w.zstring(CNAM, author);
        }
        if let Some(description) = &self.description {
            w.zstring(SNAM, description);
        }
        for master in &self.masters {
            w.zstring(MAST, master);
            w.field(DATA, &0u64.to_le_bytes());
        }
        w.finish()
    }
}
