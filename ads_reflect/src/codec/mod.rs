/* Value codec
 *
 * Walks a resolved type against live controller memory. Decoding produces
 * JSON; encoding turns JSON into a sequence of transport writes. Both sides
 * keep going past data failures and report the first one; only a transport
 * write failure stops an encode early. */

pub mod decode;
pub mod encode;

pub use decode::{decode, Decoded};
pub use encode::encode;

use crate::resolve::ResolvedType;
use serde_json::Value;

/* Short name of a JSON value's kind, used in mismatch errors */
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/* Byte distance between consecutive entries of dimension `depth` */
pub(crate) fn stride(resolved: &ResolvedType, depth: usize) -> u64 {
    resolved.dimensions[depth + 1..]
        .iter()
        .map(|dim| dim.element_count as u64)
        .product::<u64>()
        * resolved.size as u64
}

/* Offsets past the 32-bit address space are clamped; the transport rejects them */
pub(crate) fn advance(offset: u32, distance: u64) -> u32 {
    u32::try_from(offset as u64 + distance).unwrap_or(u32::MAX)
}
