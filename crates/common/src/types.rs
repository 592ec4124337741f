use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// High byte reserved for light-plugin identifiers.
pub const LIGHT_SENTINEL: u8 = 0xFE;

/// Number of usable standard plugin slots (`0x00..=0xFD`).
///
/// `0xFE` is the light sentinel and `0xFF` is reserved for runtime-created forms.
pub const MAX_STANDARD_PLUGINS: usize = 0xFE;

/// Number of usable light plugin slots (12-bit index space).
pub const MAX_LIGHT_PLUGINS: usize = 0x1000;

const STANDARD_LOCAL_MASK: u32 = 0x00FF_FFFF;
const LIGHT_FIELD_MASK: u32 = 0x0FFF;

/// A four-character type code, used for both records (`REFR`) and fields (`EDID`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeTag(pub [u8; 4]);

impl TypeTag {
    pub const TES4: Self = Self(*b"TES4");
    pub const GRUP: Self = Self(*b"GRUP");
    pub const REFR: Self = Self(*b"REFR");
    pub const ACHR: Self = Self(*b"ACHR");
    pub const NPC_: Self = Self(*b"NPC_");
    pub const CLMT: Self = Self(*b"CLMT");

    pub const fn new(bytes: &[u8; 4]) -> Self {
        Self(*bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() { b as char } else { '?' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({self})")
    }
}

/// Declared classification of a plugin in the load-order manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginKind {
    Master,
    Standard,
    Light,
}

impl PluginKind {
    /// Classify by the trailing marker character of a manifest line.
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            'm' => Some(Self::Master),
            'p' => Some(Self::Standard),
            'l' => Some(Self::Light),
            _ => None,
        }
    }

    pub fn marker(self) -> char {
        match self {
            Self::Master => 'm',
            Self::Standard => 'p',
            Self::Light => 'l',
        }
    }

    pub fn is_light(self) -> bool {
        self == Self::Light
    }
}

/// The slot a plugin occupies in one of the two index spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PluginIndex {
    Standard(u8),
    Light(u16),
}

impl PluginIndex {
    pub fn is_light(self) -> bool {
        matches!(self, Self::Light(_))
    }

    /// Global id of a record defined by the plugin in this slot.
    ///
    /// `None` if the low 24 bits of `local` do not fit the slot's id space,
    /// which only happens for light plugins (12-bit local ids).
    pub fn form_id(self, local: u32) -> Option<GlobalFormId> {
        let local = local & STANDARD_LOCAL_MASK;
        match self {
            Self::Standard(index) => Some(GlobalFormId::standard(index, local)),
            Self::Light(index) if local <= LIGHT_FIELD_MASK => {
                Some(GlobalFormId::light(index, local as u16))
            }
            Self::Light(_) => None,
        }
    }
}

impl fmt::Display for PluginIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard(index) => write!(f, "{index:02X}"),
            Self::Light(index) => write!(f, "FE:{index:03X}"),
        }
    }
}

/// A session-wide record identifier.
///
/// Standard ids carry an 8-bit plugin index and a 24-bit local id. Light ids
/// carry a 12-bit plugin index and a 12-bit local id, and encode to raw form
/// under the `0xFE` high byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GlobalFormId {
    Standard { plugin: u8, local: u32 },
    Light { plugin: u16, local: u16 },
}

impl GlobalFormId {
    /// Build a standard id. `local` is truncated to 24 bits.
    pub fn standard(plugin: u8, local: u32) -> Self {
        debug_assert_ne!(plugin, LIGHT_SENTINEL, "0xFE is the light sentinel");
        Self::Standard {
            plugin,
            local: local & STANDARD_LOCAL_MASK,
        }
    }

    /// Build a light id. Both parts are truncated to 12 bits.
    pub fn light(plugin: u16, local: u16) -> Self {
        Self::Light {
            plugin: plugin & LIGHT_FIELD_MASK as u16,
            local: local & LIGHT_FIELD_MASK as u16,
        }
    }

    /// Decode a raw 32-bit global id.
    pub fn from_raw(raw: u32) -> Self {
        let high = (raw >> 24) as u8;
        if high == LIGHT_SENTINEL {
            Self::Light {
                plugin: ((raw >> 12) & LIGHT_FIELD_MASK) as u16,
                local: (raw & LIGHT_FIELD_MASK) as u16,
            }
        } else {
            Self::Standard {
                plugin: high,
                local: raw & STANDARD_LOCAL_MASK,
            }
        }
    }

    /// Encode to the raw 32-bit layout.
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Standard { plugin, local } => (u32::from(plugin) << 24) | local,
            Self::Light { plugin, local } => {
                (u32::from(LIGHT_SENTINEL) << 24)
                    | (u32::from(plugin) << 12)
                    | u32::from(local)
            }
        }
    }

    pub fn plugin_index(self) -> PluginIndex {
        match self {
            Self::Standard { plugin, .. } => PluginIndex::Standard(plugin),
            Self::Light { plugin, .. } => PluginIndex::Light(plugin),
        }
    }

    pub fn local(self) -> u32 {
        match self {
            Self::Standard { local, .. } => local,
            Self::Light { local, .. } => u32::from(local),
        }
    }
}

impl fmt::Display for GlobalFormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.to_raw())
    }
}

/// Error parsing a hexadecimal form id.
#[derive(Debug, thiserror::Error)]
#[error("invalid form id {0:?}: expected up to 8 hex digits")]
pub struct FormIdParseError(pub String);

impl FromStr for GlobalFormId {
    type Err = FormIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > 8 {
            return Err(FormIdParseError(s.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .map(Self::from_raw)
            .map_err(|_| FormIdParseError(s.to_string()))
    }
}
