/* JSON -> memory */

use super::{advance, json_kind, stride};
use crate::errors::{CodecError, TransportError};
use crate::resolve::{ResolvedKind, ResolvedType};
use crate::transport::Transport;
use ads_types::AdsDataType;
use serde_json::Value;
use tracing::trace;

/// Encode `value` into the memory described by `resolved` at
/// `index_group`/`index_offset`.
///
/// Data failures (wrong kind, missing field, bad length, out of range) are
/// recorded and the remaining siblings are still written; the first one is
/// returned once the walk finishes. A transport write failure stops the walk
/// immediately and is returned as is.
pub fn encode(
    resolved: &ResolvedType,
    index_group: u32,
    index_offset: u32,
    value: &Value,
    transport: &dyn Transport,
) -> Result<(), CodecError> {
    let mut encoder = Encoder {
        transport,
        index_group,
        error: None,
    };
    encoder.encode_value(resolved, index_offset, value)?;
    match encoder.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct Encoder<'a> {
    transport: &'a dyn Transport,
    index_group: u32,
    error: Option<CodecError>,
}

impl Encoder<'_> {
    fn record(&mut self, err: CodecError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn encode_value(
        &mut self,
        resolved: &ResolvedType,
        offset: u32,
        value: &Value,
    ) -> Result<(), TransportError> {
        if resolved.is_array() {
            self.encode_dimension(resolved, 0, offset, value)
        } else {
            self.encode_single(resolved, offset, value)
        }
    }

    fn encode_dimension(
        &mut self,
        resolved: &ResolvedType,
        depth: usize,
        offset: u32,
        value: &Value,
    ) -> Result<(), TransportError> {
        let Some(items) = value.as_array() else {
            self.record(mismatch(resolved, "array", value));
            return Ok(());
        };
        let count = resolved.dimensions[depth].element_count;
        if items.len() != count as usize {
            self.record(CodecError::LengthMismatch {
                name: resolved.name.clone(),
                expected: count,
                found: items.len(),
            });
            return Ok(());
        }

        let step = stride(resolved, depth);
        let inner = depth + 1 < resolved.dimensions.len();
        for (index, item) in items.iter().enumerate() {
            let element_offset = advance(offset, step * index as u64);
            if inner {
                self.encode_dimension(resolved, depth + 1, element_offset, item)?;
            } else {
                self.encode_single(resolved, element_offset, item)?;
            }
        }
        Ok(())
    }

    fn encode_single(
        &mut self,
        resolved: &ResolvedType,
        offset: u32,
        value: &Value,
    ) -> Result<(), TransportError> {
        match &resolved.kind {
            ResolvedKind::Struct { fields } => {
                let Some(object) = value.as_object() else {
                    self.record(mismatch(resolved, "object", value));
                    return Ok(());
                };
                for (key, field) in fields {
                    match object.get(key) {
                        Some(member) => {
                            self.encode_value(field, advance(offset, field.offset as u64), member)?
                        }
                        None => self.record(CodecError::MissingField {
                            name: resolved.name.clone(),
                            field: key.clone(),
                        }),
                    }
                }
                Ok(())
            }
            ResolvedKind::Primitive { tag } => {
                trace!(
                    name = %resolved.name,
                    type_name = %resolved.type_name,
                    tag,
                    offset,
                    "encode leaf"
                );
                match leaf_bytes(resolved, *tag, value) {
                    Ok(bytes) if bytes.is_empty() => Ok(()),
                    Ok(bytes) => self
                        .transport
                        .write_memory(self.index_group, offset, &bytes),
                    Err(err) => {
                        self.record(err);
                        Ok(())
                    }
                }
            }
        }
    }
}

/* Wire image of one leaf; empty for VOID */
fn leaf_bytes(resolved: &ResolvedType, tag: u32, value: &Value) -> Result<Vec<u8>, CodecError> {
    let Some(tag) = AdsDataType::from_code(tag) else {
        return Err(CodecError::UnsupportedTag {
            name: resolved.name.clone(),
            tag,
        });
    };
    let bytes = match tag {
        AdsDataType::Void => {
            if !value.is_null() {
                return Err(mismatch(resolved, "null", value));
            }
            Vec::new()
        }
        AdsDataType::Bit => {
            let flag = value
                .as_bool()
                .ok_or_else(|| mismatch(resolved, "boolean", value))?;
            vec![flag as u8]
        }
        AdsDataType::Int8 => signed::<i8>(resolved, tag, value)?.to_le_bytes().to_vec(),
        AdsDataType::Int16 => signed::<i16>(resolved, tag, value)?.to_le_bytes().to_vec(),
        AdsDataType::Int32 => signed::<i32>(resolved, tag, value)?.to_le_bytes().to_vec(),
        AdsDataType::Int64 => signed::<i64>(resolved, tag, value)?.to_le_bytes().to_vec(),
        AdsDataType::Uint8 => unsigned::<u8>(resolved, tag, value)?.to_le_bytes().to_vec(),
        AdsDataType::Uint16 => unsigned::<u16>(resolved, tag, value)?.to_le_bytes().to_vec(),
        AdsDataType::Uint32 => unsigned::<u32>(resolved, tag, value)?.to_le_bytes().to_vec(),
        AdsDataType::Uint64 => unsigned::<u64>(resolved, tag, value)?.to_le_bytes().to_vec(),
        AdsDataType::Real32 => {
            let narrowed = real(resolved, value)? as f32;
            if !narrowed.is_finite() {
                return Err(CodecError::NonFinite {
                    name: resolved.name.clone(),
                });
            }
            narrowed.to_le_bytes().to_vec()
        }
        AdsDataType::Real64 => real(resolved, value)?.to_le_bytes().to_vec(),
        AdsDataType::String => {
            let text = value
                .as_str()
                .ok_or_else(|| mismatch(resolved, "string", value))?;
            let size = resolved.size as usize;
            let mut bytes = vec![0u8; size];
            let keep = text.len().min(size.saturating_sub(1));
            bytes[..keep].copy_from_slice(&text.as_bytes()[..keep]);
            bytes
        }
        AdsDataType::WString | AdsDataType::Real80 | AdsDataType::BigType => {
            return Err(CodecError::UnsupportedTag {
                name: resolved.name.clone(),
                tag: tag.code(),
            })
        }
    };
    Ok(bytes)
}

fn signed<T: TryFrom<i64>>(
    resolved: &ResolvedType,
    tag: AdsDataType,
    value: &Value,
) -> Result<T, CodecError> {
    if !value.is_i64() && !value.is_u64() {
        return Err(mismatch(resolved, "integer", value));
    }
    value
        .as_i64()
        .and_then(|raw| T::try_from(raw).ok())
        .ok_or_else(|| out_of_range(resolved, tag, value))
}

fn unsigned<T: TryFrom<u64>>(
    resolved: &ResolvedType,
    tag: AdsDataType,
    value: &Value,
) -> Result<T, CodecError> {
    if !value.is_i64() && !value.is_u64() {
        return Err(mismatch(resolved, "non-negative integer", value));
    }
    value
        .as_u64()
        .and_then(|raw| T::try_from(raw).ok())
        .ok_or_else(|| out_of_range(resolved, tag, value))
}

fn real(resolved: &ResolvedType, value: &Value) -> Result<f64, CodecError> {
    if !value.is_f64() {
        return Err(mismatch(resolved, "float", value));
    }
    value
        .as_f64()
        .ok_or_else(|| mismatch(resolved, "float", value))
}

fn mismatch(resolved: &ResolvedType, expected: &'static str, value: &Value) -> CodecError {
    CodecError::KindMismatch {
        name: resolved.name.clone(),
        expected,
        found: json_kind(value),
    }
}

fn out_of_range(resolved: &ResolvedType, tag: AdsDataType, value: &Value) -> CodecError {
    CodecError::OutOfRange {
        name: resolved.name.clone(),
        tag,
        value: value.to_string(),
    }
}
