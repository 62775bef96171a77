use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

/* Tags at or above this value are not plain primitives */
pub const ADST_MAXTYPES: u32 = 34;

/* Type entry describes a data type */
pub const ADSDATATYPEFLAG_DATATYPE: u32 = 0x0000_0001;
/* Type entry describes a data item (struct member) */
pub const ADSDATATYPEFLAG_DATAITEM: u32 = 0x0000_0002;

/* Wire data-type tags as published in type and symbol records */
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "kebab-case")]
#[repr(u32)]
pub enum AdsDataType {
    Void = 0,
    Int16 = 2,
    Int32 = 3,
    Real32 = 4,
    Real64 = 5,
    Int8 = 16,
    Uint8 = 17,
    Uint16 = 18,
    Uint32 = 19,
    Int64 = 20,
    Uint64 = 21,
    String = 30,
    WString = 31,
    Real80 = 32,
    Bit = 33,
    BigType = 65,
}

impl AdsDataType {
    pub fn from_code(code: u32) -> Option<Self> {
        let tag = match code {
            0 => Self::Void,
            2 => Self::Int16,
            3 => Self::Int32,
            4 => Self::Real32,
            5 => Self::Real64,
            16 => Self::Int8,
            17 => Self::Uint8,
            18 => Self::Uint16,
            19 => Self::Uint32,
            20 => Self::Int64,
            21 => Self::Uint64,
            30 => Self::String,
            31 => Self::WString,
            32 => Self::Real80,
            33 => Self::Bit,
            65 => Self::BigType,
            _ => return None,
        };
        Some(tag)
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /* Fixed wire width in bytes; None for text and opaque tags */
    pub fn width(self) -> Option<u32> {
        match self {
            Self::Void => Some(0),
            Self::Bit | Self::Int8 | Self::Uint8 => Some(1),
            Self::Int16 | Self::Uint16 => Some(2),
            Self::Int32 | Self::Uint32 | Self::Real32 => Some(4),
            Self::Int64 | Self::Uint64 | Self::Real64 => Some(8),
            Self::Real80 => Some(10),
            Self::String | Self::WString | Self::BigType => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Void => "VOID",
            Self::Int16 => "INT16",
            Self::Int32 => "INT32",
            Self::Real32 => "REAL32",
            Self::Real64 => "REAL64",
            Self::Int8 => "INT8",
            Self::Uint8 => "UINT8",
            Self::Uint16 => "UINT16",
            Self::Uint32 => "UINT32",
            Self::Int64 => "INT64",
            Self::Uint64 => "UINT64",
            Self::String => "STRING",
            Self::WString => "WSTRING",
            Self::Real80 => "REAL80",
            Self::Bit => "BIT",
            Self::BigType => "BIGTYPE",
        }
    }
}

/* True when the raw tag is a plain primitive code (below ADST_MAXTYPES) */
pub fn is_primitive_code(code: u32) -> bool {
    code < ADST_MAXTYPES
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ArrayDimension {
    pub lower_bound: u32,
    pub element_count: u32,
}

impl ArrayDimension {
    pub fn new(lower_bound: u32, element_count: u32) -> Self {
        Self {
            lower_bound,
            element_count,
        }
    }
}

/* One type catalog entry exactly as published. Struct members are nested
 * entries of the same shape; `declared_type` may name another entry. */
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct TypeNode {
    pub name: String,
    pub declared_type: String,
    #[serde(default)]
    pub comment: String,
    pub entry_length: u32,
    pub version: u32,
    pub size: u32,
    pub offset: u32,
    pub data_type: u32,
    pub flags: u32,
    #[serde(default)]
    pub array_dimensions: Vec<ArrayDimension>,
    #[serde(default)]
    pub sub_items: BTreeMap<String, TypeNode>,
}

impl TypeNode {
    /* Base type entry, e.g. `INT` */
    pub fn primitive(name: &str, tag: AdsDataType, size: u32) -> Self {
        Self {
            name: name.to_string(),
            size,
            data_type: tag.code(),
            flags: ADSDATATYPEFLAG_DATATYPE,
            ..Default::default()
        }
    }

    /* Named alias of another entry, carrying the tag the controller reports for it */
    pub fn alias(name: &str, target: &str, tag: AdsDataType, size: u32) -> Self {
        Self {
            name: name.to_string(),
            declared_type: target.to_string(),
            size,
            data_type: tag.code(),
            flags: ADSDATATYPEFLAG_DATATYPE,
            ..Default::default()
        }
    }

    /* Array entry over `element`; `tag` is the element tag as the controller reports it */
    pub fn array(
        name: &str,
        element: &str,
        tag: AdsDataType,
        size: u32,
        dimensions: Vec<ArrayDimension>,
    ) -> Self {
        Self {
            name: name.to_string(),
            declared_type: element.to_string(),
            size,
            data_type: tag.code(),
            flags: ADSDATATYPEFLAG_DATATYPE,
            array_dimensions: dimensions,
            ..Default::default()
        }
    }

    /* Struct entry; members are keyed by their own names */
    pub fn structure(name: &str, size: u32, members: Vec<TypeNode>) -> Self {
        Self {
            name: name.to_string(),
            size,
            data_type: AdsDataType::BigType.code(),
            flags: ADSDATATYPEFLAG_DATATYPE,
            sub_items: members
                .into_iter()
                .map(|member| (member.name.clone(), member))
                .collect(),
            ..Default::default()
        }
    }

    /* Struct member of type `declared` at `offset` */
    pub fn member(name: &str, declared: &str, tag: AdsDataType, offset: u32, size: u32) -> Self {
        Self {
            name: name.to_string(),
            declared_type: declared.to_string(),
            size,
            offset,
            data_type: tag.code(),
            flags: ADSDATATYPEFLAG_DATAITEM,
            ..Default::default()
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    pub fn is_struct(&self) -> bool {
        !self.sub_items.is_empty()
    }

    pub fn is_array(&self) -> bool {
        !self.array_dimensions.is_empty()
    }

    /* Product of all element counts (1 for scalars) */
    pub fn element_count(&self) -> u64 {
        self.array_dimensions
            .iter()
            .fold(1u64, |count, dim| count.saturating_mul(dim.element_count as u64))
    }

    pub fn is_datatype(&self) -> bool {
        self.flags & ADSDATATYPEFLAG_DATATYPE == ADSDATATYPEFLAG_DATATYPE
    }

    pub fn is_dataitem(&self) -> bool {
        self.flags & ADSDATATYPEFLAG_DATAITEM == ADSDATATYPEFLAG_DATAITEM
    }
}

/* A named controller variable and where it lives */
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Symbol {
    pub name: String,
    pub index_group: u32,
    pub index_offset: u32,
    pub size: u32,
    #[serde(rename = "Type")]
    pub type_name: String,
    pub comment: String,
    /* Tag and flags from the symbol record itself; not part of the listing */
    #[serde(skip)]
    pub data_type: u32,
    #[serde(skip)]
    pub flags: u32,
}
