use bitflags::bitflags;
use esworld_common::{GlobalFormId, PluginIndex, TypeTag};
use glam::Vec3;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Record header flags. Unknown bits are retained as read.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct RecordFlags: u32 {
        /// File header only: the plugin is a master.
        const MASTER = 0x0000_0001;
        const DELETED = 0x0000_0020;
        /// File header only: the plugin is light.
        const LIGHT = 0x0000_0200;
        const IGNORED = 0x0000_1000;
        /// Payload is a length-prefixed compressed stream.
        const COMPRESSED = 0x0004_0000;
    }
}

/// Resolution state of a reference field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Link {
    /// Not yet examined by `RecordStore::build_references`.
    Pending,
    /// Target is present in the store.
    Resolved,
    /// Target was never loaded.
    Unresolved,
}

/// A field holding the global id of another record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormRef {
    target: GlobalFormId,
    link: Link,
}

impl FormRef {
    pub fn new(target: GlobalFormId) -> Self {
        Self {
            target,
            link: Link::Pending,
        }
    }

    pub fn target(&self) -> GlobalFormId {
        self.target
    }

    pub fn link(&self) -> Link {
        self.link
    }

    pub fn is_resolved(&self) -> bool {
        self.link == Link::Resolved
    }

    /// Set the link state from whether the target exists.
    pub(crate) fn set_present(&mut self, present: bool) {
        self.link = if present {
            Link::Resolved
        } else {
            Link::Unresolved
        };
    }
}

/// A raw field kept verbatim by records without a typed decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub tag: TypeTag,
    pub data: Vec<u8>,
}

/// `XESP`: the reference whose enabled state this one follows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnableParent {
    pub reference: FormRef,
    pub flags: u8,
}

/// A placed object or placed actor (`REFR`, `ACHR`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlacedObject {
    pub base: Option<FormRef>,
    pub position: Vec3,
    /// Euler angles in radians.
    pub rotation: Vec3,
    pub scale: Option<f32>,
    pub enable_parent: Option<EnableParent>,
    pub owner: Option<FormRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactionRank {
    pub faction: FormRef,
    pub rank: i8,
}

/// An actor template (`NPC_`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Actor {
    pub full_name: Option<String>,
    pub race: Option<FormRef>,
    pub class: Option<FormRef>,
    pub template: Option<FormRef>,
    pub factions: Vec<FactionRank>,
    pub packages: Vec<FormRef>,
    pub scripts: Option<ScriptBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherChance {
    pub weather: FormRef,
    pub chance: i32,
    pub global: Option<FormRef>,
}

/// Sun timing in units of ten minutes, plus volatility and moon phase data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClimateTiming {
    pub sunrise_begin: u8,
    pub sunrise_end: u8,
    pub sunset_begin: u8,
    pub sunset_end: u8,
    pub volatility: u8,
    pub moons: u8,
}

/// A climate (`CLMT`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Climate {
    pub weathers: Vec<WeatherChance>,
    pub sun_texture: Option<String>,
    pub glare_texture: Option<String>,
    pub timing: Option<ClimateTiming>,
}

/// `VMAD`: scripts attached to a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScriptBlock {
    pub version: i16,
    pub object_format: i16,
    pub scripts: Vec<Script>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    pub status: u8,
    pub properties: Vec<ScriptProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptProperty {
    pub name: String,
    pub status: u8,
    pub value: PropertyValue,
}

/// An object-typed script property value. A null form id is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptObject {
    pub reference: Option<FormRef>,
    pub alias: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Object(ScriptObject),
    String(String),
    Int(i32),
    Float(f32),
    Bool(bool),
    ObjectArray(Vec<ScriptObject>),
    StringArray(Vec<String>),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    BoolArray(Vec<bool>),
}

/// Type-specific field set of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordData {
    PlacedObject(PlacedObject),
    Actor(Actor),
    Climate(Climate),
    Generic(Vec<Field>),
}

/// A resolved, typed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: GlobalFormId,
    pub tag: TypeTag,
    pub flags: RecordFlags,
    /// Plugin that supplied this version of the record.
    pub origin: PluginIndex,
    pub editor_id: Option<String>,
    pub data: RecordData,
}

impl Record {
    pub fn is_deleted(&self) -> bool {
        self.flags.contains(RecordFlags::DELETED)
    }

    /// Every reference field held by this record.
    pub fn references(&self) -> Vec<FormRef> {
        let mut refs = Vec::new();
        self.data.visit_refs(&mut |r| refs.push(*r));
        refs
    }

    pub(crate) fn visit_refs_mut(&mut self, f: &mut dyn FnMut(&mut FormRef)) {
        self.data.visit_refs_mut(f);
    }
}

/// Walks every reference slot of a `RecordData`. Expands once for shared
/// access and once, with a trailing `mut`, for exclusive access.
macro_rules! for_each_ref {
    ($data:expr, $f:ident $(, $m:tt)?) => {
        match $data {
            RecordData::PlacedObject(obj) => {
                for r in &$($m)? obj.base {
                    $f(r);
                }
                for parent in &$($m)? obj.enable_parent {
                    $f(&$($m)? parent.reference);
                }
                for r in &$($m)? obj.owner {
                    $f(r);
                }
            }
            RecordData::Actor(actor) => {
                for r in &$($m)? actor.race {
                    $f(r);
                }
                for r in &$($m)? actor.class {
                    $f(r);
                }
                for r in &$($m)? actor.template {
                    $f(r);
                }
                for rank in &$($m)? actor.factions {
                    $f(&$($m)? rank.faction);
                }
                for r in &$($m)? actor.packages {
                    $f(r);
                }
                for block in &$($m)? actor.scripts {
                    for script in &$($m)? block.scripts {
                        for property in &$($m)? script.properties {
                            match &$($m)? property.value {
                                PropertyValue::Object(obj) => {
                                    for r in &$($m)? obj.reference {
                                        $f(r);
                                    }
                                }
                                PropertyValue::ObjectArray(objs) => {
                                    for obj in objs {
                                        for r in &$($m)? obj.reference {
                                            $f(r);
                                        }
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                }
            }
            RecordData::Climate(climate) => {
                for entry in &$($m)? climate.weathers {
                    $f(&$($m)? entry.weather);
                    for r in &$($m)? entry.global {
                        $f(r);
                    }
                }
            }
            RecordData::Generic(_) => {}
        }
    };
}

impl RecordData {
    fn visit_refs(&self, f: &mut dyn FnMut(&FormRef)) {
        for_each_ref!(self, f);
    }

    fn visit_refs_mut(&mut self, f: &mut dyn FnMut(&mut FormRef)) {
        for_each_ref!(self, f, mut);
    }
}
