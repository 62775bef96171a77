use ads_types::{AdsDataType, ADSERR_DEVICE_INVALIDDATA, ADSERR_DEVICE_SYMBOLNOTFOUND};
use thiserror::Error;

/// Result alias used across the reflection crate.
pub type ReflectResult<T> = Result<T, BridgeError>;

/// A non-zero status returned by the external transport, kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ADS transport error {code:#x}")]
pub struct TransportError {
    pub code: u32,
}

impl TransportError {
    pub fn new(code: u32) -> Self {
        Self { code }
    }
}

/// Errors raised while walking a metadata blob.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobError {
    /// A record announced a zero length before the declared count was reached.
    #[error("record {index} at byte {offset} has zero length ({parsed} of {declared} parsed)")]
    ZeroLengthRecord {
        index: u32,
        offset: usize,
        parsed: u32,
        declared: u32,
    },

    /// A record, field or text segment extends past its enclosing buffer.
    #[error("{what} at byte {offset} needs {needed} bytes but only {available} remain")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A record is shorter than its own fixed header.
    #[error("record at byte {offset} declares length {length}, shorter than its {header}-byte header")]
    RecordTooShort {
        offset: usize,
        length: usize,
        header: usize,
    },
}

/// Errors raised while flattening a type reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Requested type is missing from the type catalog.
    #[error("type '{type_name}' not found in type catalog")]
    UnknownType { type_name: String },

    /// Alias or nesting chain exceeded the configured depth (usually a cycle).
    #[error("resolving '{type_name}' exceeded depth limit {limit}")]
    DepthExceeded { type_name: String, limit: usize },

    /// Extended-type leaf whose size cannot be mapped onto an integer.
    #[error("type '{type_name}' is an extended type of unsupported size {size}")]
    UnsupportedExtendedSize { type_name: String, size: u32 },

    /// Array dimensions describe more data than the entry's declared size.
    #[error("array '{type_name}' declares {declared} bytes but {elements} elements need {required}")]
    SizeMismatch {
        type_name: String,
        declared: u32,
        elements: u64,
        required: u64,
    },
}

/// Errors raised by the value codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The transport rejected a read or write.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Leaf carries a tag the codec cannot marshal.
    #[error("'{name}' has unsupported data type tag {tag}")]
    UnsupportedTag { name: String, tag: u32 },

    /// JSON value kind does not match the leaf tag.
    #[error("'{name}' expects {expected} but got {found}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// JSON object lacks a declared struct field.
    #[error("'{name}' is missing field '{field}'")]
    MissingField { name: String, field: String },

    /// JSON array length differs from the declared element count.
    #[error("'{name}' expects {expected} elements but got {found}")]
    LengthMismatch {
        name: String,
        expected: u32,
        found: usize,
    },

    /// Integer does not fit the leaf width.
    #[error("'{name}' value {value} does not fit {tag:?}")]
    OutOfRange {
        name: String,
        tag: AdsDataType,
        value: String,
    },

    /// Transport returned fewer bytes than the leaf needs.
    #[error("'{name}' needs {needed} bytes but read returned {available}")]
    ShortRead {
        name: String,
        needed: usize,
        available: usize,
    },

    /// Float value has no JSON representation.
    #[error("'{name}' holds a non-finite float")]
    NonFinite { name: String },
}

impl CodecError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Numeric code: the transport code verbatim, otherwise the invalid-data sentinel.
    pub fn code(&self) -> u32 {
        match self {
            Self::Transport(err) => err.code,
            _ => ADSERR_DEVICE_INVALIDDATA,
        }
    }
}

/// Errors raised by a catalog refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("fetching {catalog} catalog failed: {source}")]
    Fetch {
        catalog: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("parsing {catalog} catalog failed: {source}")]
    Parse {
        catalog: &'static str,
        #[source]
        source: BlobError,
    },
}

impl RefreshError {
    pub fn code(&self) -> u32 {
        match self {
            Self::Fetch { source, .. } => source.code,
            Self::Parse { .. } => ADSERR_DEVICE_INVALIDDATA,
        }
    }
}

/// Top-level errors produced by the symbol bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("symbol '{name}' not found")]
    SymbolNotFound { name: String },

    #[error("raw read of {requested} bytes exceeds the {limit}-byte limit")]
    RawReadTooLong { requested: u32, limit: u32 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl BridgeError {
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Codec(err) => err.is_transport(),
            _ => false,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::SymbolNotFound { .. } => ADSERR_DEVICE_SYMBOLNOTFOUND,
            Self::Transport(err) => err.code,
            Self::Codec(err) => err.code(),
            Self::RawReadTooLong { .. } | Self::Resolve(_) => ADSERR_DEVICE_INVALIDDATA,
        }
    }
}
