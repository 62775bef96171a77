/* Memory -> JSON */

use super::{advance, stride};
use crate::config::CodecConfig;
use crate::errors::CodecError;
use crate::resolve::{ResolvedKind, ResolvedType};
use crate::transport::Transport;
use ads_types::AdsDataType;
use serde_json::{Map, Number, Value};
use tracing::trace;

/// Result of a decode: the assembled value plus the first failure, if any.
/// Failed leaves are `null` inside `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: Value,
    pub error: Option<CodecError>,
}

impl Decoded {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Strict view: any recorded failure fails the whole decode.
    pub fn into_result(self) -> Result<Value, CodecError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

/// Decode the value described by `resolved` located at `index_group`/`index_offset`.
pub fn decode(
    resolved: &ResolvedType,
    index_group: u32,
    index_offset: u32,
    transport: &dyn Transport,
    config: &CodecConfig,
) -> Decoded {
    let mut decoder = Decoder {
        transport,
        config,
        index_group,
        error: None,
    };
    let value = decoder.decode_value(resolved, index_offset);
    Decoded {
        value,
        error: decoder.error,
    }
}

struct Decoder<'a> {
    transport: &'a dyn Transport,
    config: &'a CodecConfig,
    index_group: u32,
    error: Option<CodecError>,
}

impl Decoder<'_> {
    fn record(&mut self, err: CodecError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn decode_value(&mut self, resolved: &ResolvedType, offset: u32) -> Value {
        if resolved.is_array() {
            self.decode_dimension(resolved, 0, offset)
        } else {
            self.decode_single(resolved, offset)
        }
    }

    /* Row-major walk: the last dimension varies fastest */
    fn decode_dimension(&mut self, resolved: &ResolvedType, depth: usize, offset: u32) -> Value {
        let count = resolved.dimensions[depth].element_count;
        let step = stride(resolved, depth);
        let inner = depth + 1 < resolved.dimensions.len();

        let mut elements = Vec::new();
        for index in 0..count {
            let element_offset = advance(offset, step * index as u64);
            let element = if inner {
                self.decode_dimension(resolved, depth + 1, element_offset)
            } else {
                self.decode_single(resolved, element_offset)
            };
            elements.push(element);
        }
        Value::Array(elements)
    }

    fn decode_single(&mut self, resolved: &ResolvedType, offset: u32) -> Value {
        match &resolved.kind {
            ResolvedKind::Struct { fields } => {
                let mut object = Map::new();
                for (key, field) in fields {
                    let value = self.decode_value(field, advance(offset, field.offset as u64));
                    object.insert(key.clone(), value);
                }
                Value::Object(object)
            }
            ResolvedKind::Primitive { tag } => {
                trace!(
                    name = %resolved.name,
                    type_name = %resolved.type_name,
                    tag,
                    offset,
                    "decode leaf"
                );
                match self.decode_leaf(resolved, *tag, offset) {
                    Ok(value) => value,
                    Err(err) => {
                        self.record(err);
                        Value::Null
                    }
                }
            }
        }
    }

    fn decode_leaf(
        &self,
        resolved: &ResolvedType,
        tag: u32,
        offset: u32,
    ) -> Result<Value, CodecError> {
        let Some(tag) = AdsDataType::from_code(tag) else {
            return Err(unsupported(resolved, tag));
        };
        let value = match tag {
            AdsDataType::Void => Value::Null,
            AdsDataType::Bit => Value::Bool(self.fixed::<1>(resolved, offset)?[0] != 0),
            AdsDataType::Int8 => Value::from(i8::from_le_bytes(self.fixed(resolved, offset)?)),
            AdsDataType::Uint8 => Value::from(u8::from_le_bytes(self.fixed(resolved, offset)?)),
            AdsDataType::Int16 => Value::from(i16::from_le_bytes(self.fixed(resolved, offset)?)),
            AdsDataType::Uint16 => Value::from(u16::from_le_bytes(self.fixed(resolved, offset)?)),
            AdsDataType::Int32 => Value::from(i32::from_le_bytes(self.fixed(resolved, offset)?)),
            AdsDataType::Uint32 => Value::from(u32::from_le_bytes(self.fixed(resolved, offset)?)),
            AdsDataType::Int64 => Value::from(i64::from_le_bytes(self.fixed(resolved, offset)?)),
            AdsDataType::Uint64 => Value::from(u64::from_le_bytes(self.fixed(resolved, offset)?)),
            AdsDataType::Real32 => {
                let raw = f32::from_le_bytes(self.fixed(resolved, offset)?);
                float(resolved, raw as f64)?
            }
            AdsDataType::Real64 => {
                let raw = f64::from_le_bytes(self.fixed(resolved, offset)?);
                float(resolved, raw)?
            }
            AdsDataType::String => {
                let length = resolved.size.min(self.config.max_text_bytes);
                let bytes = self.read(resolved, offset, length as usize)?;
                let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
                Value::String(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            AdsDataType::WString | AdsDataType::Real80 | AdsDataType::BigType => {
                return Err(unsupported(resolved, tag.code()))
            }
        };
        Ok(value)
    }

    fn fixed<const N: usize>(
        &self,
        resolved: &ResolvedType,
        offset: u32,
    ) -> Result<[u8; N], CodecError> {
        let bytes = self.read(resolved, offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes[..N]);
        Ok(out)
    }

    /* Reads exactly `length` bytes or fails; a longer answer is cut down */
    fn read(
        &self,
        resolved: &ResolvedType,
        offset: u32,
        length: usize,
    ) -> Result<Vec<u8>, CodecError> {
        let mut bytes = self
            .transport
            .read_memory(self.index_group, offset, length as u32)?;
        if bytes.len() < length {
            return Err(CodecError::ShortRead {
                name: resolved.name.clone(),
                needed: length,
                available: bytes.len(),
            });
        }
        bytes.truncate(length);
        Ok(bytes)
    }
}

fn float(resolved: &ResolvedType, raw: f64) -> Result<Value, CodecError> {
    Number::from_f64(raw)
        .map(Value::Number)
        .ok_or_else(|| CodecError::NonFinite {
            name: resolved.name.clone(),
        })
}

fn unsupported(resolved: &ResolvedType, tag: u32) -> CodecError {
    CodecError::UnsupportedTag {
        name: resolved.name.clone(),
        tag,
    }
}
