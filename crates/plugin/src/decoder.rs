use crate::decoders::{DecoderRegistry, FieldError};
use crate::format::{
    FileHeader, GROUP_HEADER_SIZE, GroupHeader, HeaderError, RecordHeader, is_supported_version,
};
use crate::formid::{FormIdError, FormIdResolver};
use crate::reader::{ReadError, Reader};
use esworld_common::{PluginIndex, TypeTag};
use esworld_loadorder::MasterTable;
use esworld_records::{Record, RecordFlags};
use std::borrow::Cow;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Upper bound on a declared decompressed size (256 MiB).
const MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

/// `HEDR` record counts are advisory; never reserve more than this up front.
const MAX_PREALLOCATED_RECORDS: usize = 1 << 16;

/// Errors from decoding a plugin file.
///
/// `CorruptPayload` is per record and is reported in
/// [`DecodedPlugin::skipped`]; every other variant aborts the plugin. Of the
/// form id errors only `UnknownMaster` reaches this enum directly; the rest
/// are confined to the record that carries the bad id.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to read plugin {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("plugin truncated at offset {offset}: chunk needs {needed} bytes, {available} available")]
    TruncatedFile {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("malformed group at offset {offset}: declared size {size}")]
    MalformedGroup { offset: usize, size: u32 },
    #[error("plugin does not start with a TES4 file header (found {0})")]
    MissingHeader(TypeTag),
    #[error("corrupt file header: {0}")]
    CorruptHeader(#[from] HeaderError),
    #[error("unsupported plugin format version {0}")]
    UnsupportedVersion(f32),
    #[error("record {tag} {form_id:08X} at offset {offset} is corrupt: {reason}")]
    CorruptPayload {
        tag: TypeTag,
        form_id: u32,
        offset: usize,
        reason: String,
    },
    #[error(transparent)]
    FormId(#[from] FormIdError),
}

impl DecodeError {
    fn truncated(err: ReadError, limit: usize) -> Self {
        match err {
            ReadError::UnexpectedEof {
                offset,
                needed,
                remaining,
            } => Self::TruncatedFile {
                offset,
                needed,
                available: remaining,
            },
            ReadError::UnterminatedString { offset } => Self::TruncatedFile {
                offset,
                needed: 1,
                available: limit.saturating_sub(offset),
            },
        }
    }
}

/// A framed record, payload decompressed, form id still plugin-local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord<'a> {
    pub tag: TypeTag,
    pub flags: RecordFlags,
    pub local_form_id: u32,
    pub offset: usize,
    pub payload: Cow<'a, [u8]>,
}

/// Result of decoding one plugin.
#[derive(Debug)]
pub struct DecodedPlugin {
    pub header: FileHeader,
    /// Resolved records in file order.
    pub records: Vec<Record>,
    /// Records dropped as `DecodeError::CorruptPayload`.
    pub skipped: Vec<DecodeError>,
}

/// Streams a plugin's record structure into resolved records.
#[derive(Debug, Clone, Copy)]
pub struct PluginDecoder<'r> {
    registry: &'r DecoderRegistry,
}

impl<'r> PluginDecoder<'r> {
    pub fn new(registry: &'r DecoderRegistry) -> Self {
        Self { registry }
    }

    /// Read and decode a plugin file.
    ///
    /// The file is read whole and its handle closed before decoding starts.
    pub fn decode(
        &self,
        path: &Path,
        masters: &MasterTable,
        self_index: PluginIndex,
    ) -> Result<DecodedPlugin, DecodeError> {
        let bytes = std::fs::read(path).map_err(|source| DecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.decode_bytes(&bytes, masters, self_index)
    }

    /// Decode an in-memory plugin.
    pub fn decode_bytes(
        &self,
        bytes: &[u8],
        masters: &MasterTable,
        self_index: PluginIndex,
    ) -> Result<DecodedPlugin, DecodeError> {
        let mut reader = Reader::new(bytes);
        let header = read_file_header(&mut reader)?;
        if header.is_light() != self_index.is_light() {
            tracing::warn!(
                %self_index,
                header_light = header.is_light(),
                "load-order classification disagrees with file header"
            );
        }

        let resolver = FormIdResolver::new(&header.masters, masters, self_index)?;

        let mut records = Vec::with_capacity((header.record_count as usize).min(MAX_PREALLOCATED_RECORDS));
        let mut skipped = Vec::new();
        for raw in RecordStream::new(reader) {
            let (framed_header, offset, stored) = raw?;
            let raw = match inflate(&framed_header, offset, stored) {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!(%err, "skipping record");
                    skipped.push(err);
                    continue;
                }
            };

            match self.decode_record(&raw, &resolver) {
                Ok(record) => records.push(record),
                Err(err) => {
                    let err = DecodeError::CorruptPayload {
                        tag: raw.tag,
                        form_id: raw.local_form_id,
                        offset: raw.offset,
                        reason: err.to_string(),
                    };
                    tracing::warn!(%err, "skipping record");
                    skipped.push(err);
                }
            }
        }

        tracing::debug!(
            %self_index,
            records = records.len(),
            skipped = skipped.len(),
            masters = header.masters.len(),
            "plugin decoded"
        );
        Ok(DecodedPlugin {
            header,
            records,
            skipped,
        })
    }

    /// Resolve the record id and decode the payload. Any failure here,
    /// including a bad form id, spoils only this record.
    fn decode_record(&self, raw: &RawRecord<'_>, resolver: &FormIdResolver) -> Result<Record, FieldError> {
        let id = resolver.resolve(raw.local_form_id)?;
        let fields = self.registry.get(raw.tag)(&raw.payload, resolver)?;
        Ok(Record {
            id,
            tag: raw.tag,
            flags: raw.flags,
            origin: resolver.self_index(),
            editor_id: fields.editor_id,
            data: fields.data,
        })
    }
}

fn read_file_header(reader: &mut Reader<'_>) -> Result<FileHeader, DecodeError> {
    let limit = reader.len();
    let tag = reader
        .read_tag()
        .map_err(|e| DecodeError::truncated(e, limit))?;
    if tag != TypeTag::TES4 {
        return Err(DecodeError::MissingHeader(tag));
    }
    let record =
        RecordHeader::read_after_tag(tag, reader).map_err(|e| DecodeError::truncated(e, limit))?;
    let payload = reader
        .read_bytes(record.data_size as usize)
        .map_err(|e| DecodeError::truncated(e, limit))?;
    let header = FileHeader::parse(record.flags, payload)?;
    if !is_supported_version(header.version) {
        return Err(DecodeError::UnsupportedVersion(header.version));
    }
    Ok(header)
}

/// Apply decompression to a framed record.
fn inflate<'a>(
    header: &RecordHeader,
    offset: usize,
    stored: &'a [u8],
) -> Result<RawRecord<'a>, DecodeError> {
    let corrupt = |reason: String| DecodeError::CorruptPayload {
        tag: header.tag,
        form_id: header.form_id,
        offset,
        reason,
    };

    let payload = if header.flags.contains(RecordFlags::COMPRESSED) {
        let mut r = Reader::new(stored);
        let declared = r
            .read_u32()
            .map_err(|_| corrupt("missing decompressed length".into()))? as usize;
        if declared > MAX_DECOMPRESSED_SIZE {
            return Err(corrupt(format!("declared length {declared} is too large")));
        }
        let decoder = zstd::Decoder::new(r.rest()).map_err(|e| corrupt(e.to_string()))?;
        let mut buf = Vec::with_capacity(declared);
        decoder
            .take(declared as u64 + 1)
            .read_to_end(&mut buf)
            .map_err(|e| corrupt(e.to_string()))?;
        if buf.len() != declared {
            return Err(corrupt(format!(
                "decompressed to {} bytes, expected {declared}",
                buf.len()
            )));
        }
        Cow::Owned(buf)
    } else {
        Cow::Borrowed(stored)
    };

    Ok(RawRecord {
        tag: header.tag,
        flags: header.flags,
        local_form_id: header.form_id,
        offset,
        payload,
    })
}

/// Walks nested groups and yields each record's header, offset and stored
/// bytes. Stops after the first framing error.
struct RecordStream<'a> {
    reader: Reader<'a>,
    /// End offsets of the groups enclosing the cursor, innermost last.
    group_ends: Vec<usize>,
    failed: bool,
}

impl<'a> RecordStream<'a> {
    fn new(reader: Reader<'a>) -> Self {
        Self {
            reader,
            group_ends: Vec::new(),
            failed: false,
        }
    }

    /// Offset the current chunk must not extend past.
    fn limit(&self) -> usize {
        self.group_ends
            .last()
            .copied()
            .unwrap_or_else(|| self.reader.len())
    }

    fn next_chunk(&mut self) -> Option<Result<(RecordHeader, usize, &'a [u8]), DecodeError>> {
        loop {
            while self
                .group_ends
                .last()
                .is_some_and(|&end| self.reader.position() >= end)
            {
                self.group_ends.pop();
            }
            if self.reader.is_empty() {
                return None;
            }

            let offset = self.reader.position();
            let limit = self.limit();
            let framing = |e: ReadError| DecodeError::truncated(e, limit);

            let tag = match self.reader.read_tag() {
                Ok(tag) => tag,
                Err(e) => return Some(Err(framing(e))),
            };

            if tag == TypeTag::GRUP {
                let group = match GroupHeader::read_after_tag(&mut self.reader) {
                    Ok(group) => group,
                    Err(e) => return Some(Err(framing(e))),
                };
                let size = group.group_size as usize;
                if size < GROUP_HEADER_SIZE {
                    return Some(Err(DecodeError::MalformedGroup {
                        offset,
                        size: group.group_size,
                    }));
                }
                let end = offset + size;
                if end > limit {
                    return Some(Err(DecodeError::TruncatedFile {
                        offset,
                        needed: size,
                        available: limit - offset,
                    }));
                }
                tracing::trace!(label = %TypeTag(group.label), offset, size, "entering group");
                self.group_ends.push(end);
                continue;
            }

            let header = match RecordHeader::read_after_tag(tag, &mut self.reader) {
                Ok(header) => header,
                Err(e) => return Some(Err(framing(e))),
            };
            let size = header.data_size as usize;
            let start = self.reader.position();
            if start + size > limit {
                return Some(Err(DecodeError::TruncatedFile {
                    offset,
                    needed: size,
                    available: limit.saturating_sub(start),
                }));
            }
            return Some(
                self.reader
                    .read_bytes(size)
                    .map(|stored| (header, offset, stored))
                    .map_err(framing),
            );
        }
    }
}

impl<'a> Iterator for RecordStream<'a> {
    type Item = Result<(RecordHeader, usize, &'a [u8]), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_chunk();
        self.failed = matches!(item, Some(Err(_)));
        item
    }
}
