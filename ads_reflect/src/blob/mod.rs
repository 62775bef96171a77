/* Metadata blob parser
 *
 * Both catalogs arrive as flat sequences of variable-length little-endian
 * records. Every record starts with its own total length, so the walk advances
 * by that length instead of a fixed stride. A zero length means "no next
 * record"; hitting one before the declared count is exhausted is a malformed
 * blob and stops the walk with whatever was parsed so far. */

pub mod writer;

pub use writer::{encode_symbol_record, encode_type_record, BlobWriter};

use crate::errors::BlobError;
use ads_types::{ArrayDimension, Symbol, TypeNode};
use std::collections::BTreeMap;

/* entryLength, version, hashValue, typeHashValue, size, offs, dataType, flags
 * (u32 each) + nameLength, typeLength, commentLength, arrayDim, subItems (u16 each) */
pub const TYPE_HEADER_LEN: usize = 42;

/* entryLength, iGroup, iOffs, size, dataType, flags (u32 each)
 * + nameLength, typeLength, commentLength (u16 each) */
pub const SYMBOL_HEADER_LEN: usize = 30;

/* lowerBound + elementCount */
pub const ARRAY_INFO_LEN: usize = 8;

pub const UPLOAD_INFO_LEN: usize = 24;

/// Result of walking one blob: everything parsed plus an optional failure flag.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome<T> {
    pub entries: BTreeMap<String, T>,
    pub parsed: u32,
    pub declared: u32,
    pub failure: Option<BlobError>,
}

impl<T> ParseOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Discards partial results when the walk failed.
    pub fn into_result(self) -> Result<BTreeMap<String, T>, BlobError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.entries),
        }
    }
}

/// Announced sizes and counts of the symbol and type uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadInfo {
    pub symbol_count: u32,
    pub symbol_size: u32,
    pub datatype_count: u32,
    pub datatype_size: u32,
    pub max_dyn_symbols: u32,
    pub used_dyn_symbols: u32,
}

impl UploadInfo {
    pub fn parse(data: &[u8]) -> Result<Self, BlobError> {
        let reader = RecordReader::new(data, 0);
        reader.require(0, UPLOAD_INFO_LEN, "upload info")?;
        Ok(Self {
            symbol_count: reader.u32_at(0, "upload info")?,
            symbol_size: reader.u32_at(4, "upload info")?,
            datatype_count: reader.u32_at(8, "upload info")?,
            datatype_size: reader.u32_at(12, "upload info")?,
            max_dyn_symbols: reader.u32_at(16, "upload info")?,
            used_dyn_symbols: reader.u32_at(20, "upload info")?,
        })
    }

    pub fn to_bytes(&self) -> [u8; UPLOAD_INFO_LEN] {
        let mut out = [0u8; UPLOAD_INFO_LEN];
        let fields = [
            self.symbol_count,
            self.symbol_size,
            self.datatype_count,
            self.datatype_size,
            self.max_dyn_symbols,
            self.used_dyn_symbols,
        ];
        for (chunk, value) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        out
    }
}

/// Parse the data type upload into a catalog keyed by type name.
pub fn parse_types(blob: &[u8], declared_count: u32) -> ParseOutcome<TypeNode> {
    walk_records(blob, declared_count, |record, base| {
        let node = parse_type_record(record, base)?;
        Ok((node.name.clone(), node))
    })
}

/// Parse the symbol upload into a catalog keyed by symbol name.
pub fn parse_symbols(blob: &[u8], declared_count: u32) -> ParseOutcome<Symbol> {
    walk_records(blob, declared_count, |record, base| {
        let symbol = parse_symbol_record(record, base)?;
        Ok((symbol.name.clone(), symbol))
    })
}

fn walk_records<T>(
    blob: &[u8],
    declared_count: u32,
    mut parse_one: impl FnMut(&[u8], usize) -> Result<(String, T), BlobError>,
) -> ParseOutcome<T> {
    let mut outcome = ParseOutcome {
        entries: BTreeMap::new(),
        parsed: 0,
        declared: declared_count,
        failure: None,
    };
    let reader = RecordReader::new(blob, 0);
    let mut pos = 0usize;

    for index in 0..declared_count {
        let step = reader
            .record_at(pos, index, outcome.parsed, declared_count)
            .and_then(|record| parse_one(record, pos).map(|entry| (entry, record.len())));
        match step {
            Ok(((name, entry), length)) => {
                outcome.entries.insert(name, entry);
                outcome.parsed += 1;
                pos += length;
            }
            Err(err) => {
                outcome.failure = Some(err);
                break;
            }
        }
    }
    outcome
}

/// Parse one type record (and, recursively, its struct members).
pub fn parse_type_record(record: &[u8], base: usize) -> Result<TypeNode, BlobError> {
    let reader = RecordReader::new(record, base);
    if record.len() < TYPE_HEADER_LEN {
        return Err(BlobError::RecordTooShort {
            offset: base,
            length: record.len(),
            header: TYPE_HEADER_LEN,
        });
    }

    let entry_length = reader.u32_at(0, "type header")?;
    let version = reader.u32_at(4, "type header")?;
    /* 8: hashValue, 12: typeHashValue */
    let size = reader.u32_at(16, "type header")?;
    let offset = reader.u32_at(20, "type header")?;
    let data_type = reader.u32_at(24, "type header")?;
    let flags = reader.u32_at(28, "type header")?;
    let name_len = reader.u16_at(32, "type header")? as usize;
    let type_len = reader.u16_at(34, "type header")? as usize;
    let comment_len = reader.u16_at(36, "type header")? as usize;
    let array_dim = reader.u16_at(38, "type header")?;
    let sub_count = reader.u16_at(40, "type header")?;

    let mut pos = TYPE_HEADER_LEN;
    let name = reader.text_at(pos, name_len, "type name")?;
    pos += name_len + 1;
    let declared_type = reader.text_at(pos, type_len, "declared type")?;
    pos += type_len + 1;
    let comment = reader.text_at(pos, comment_len, "type comment")?;
    pos += comment_len + 1;

    let mut array_dimensions = Vec::with_capacity(array_dim as usize);
    for _ in 0..array_dim {
        reader.require(pos, ARRAY_INFO_LEN, "array info")?;
        array_dimensions.push(ArrayDimension {
            lower_bound: reader.u32_at(pos, "array info")?,
            element_count: reader.u32_at(pos + 4, "array info")?,
        });
        pos += ARRAY_INFO_LEN;
    }

    let mut sub_items = BTreeMap::new();
    for index in 0..sub_count {
        let sub_record = reader.record_at(pos, index as u32, index as u32, sub_count as u32)?;
        let member = parse_type_record(sub_record, base + pos)?;
        pos += sub_record.len();
        sub_items.insert(member.name.clone(), member);
    }

    Ok(TypeNode {
        name,
        declared_type,
        comment,
        entry_length,
        version,
        size,
        offset,
        data_type,
        flags,
        array_dimensions,
        sub_items,
    })
}

/// Parse one symbol record.
pub fn parse_symbol_record(record: &[u8], base: usize) -> Result<Symbol, BlobError> {
    let reader = RecordReader::new(record, base);
    if record.len() < SYMBOL_HEADER_LEN {
        return Err(BlobError::RecordTooShort {
            offset: base,
            length: record.len(),
            header: SYMBOL_HEADER_LEN,
        });
    }

    let index_group = reader.u32_at(4, "symbol header")?;
    let index_offset = reader.u32_at(8, "symbol header")?;
    let size = reader.u32_at(12, "symbol header")?;
    let data_type = reader.u32_at(16, "symbol header")?;
    let flags = reader.u32_at(20, "symbol header")?;
    let name_len = reader.u16_at(24, "symbol header")? as usize;
    let type_len = reader.u16_at(26, "symbol header")? as usize;
    let comment_len = reader.u16_at(28, "symbol header")? as usize;

    let mut pos = SYMBOL_HEADER_LEN;
    let name = reader.text_at(pos, name_len, "symbol name")?;
    pos += name_len + 1;
    let type_name = reader.text_at(pos, type_len, "symbol type")?;
    pos += type_len + 1;
    let comment = reader.text_at(pos, comment_len, "symbol comment")?;

    Ok(Symbol {
        name,
        index_group,
        index_offset,
        size,
        type_name,
        comment,
        data_type,
        flags,
    })
}

/* Bounds-checked view over one record; `base` is only used for error offsets */
struct RecordReader<'a> {
    data: &'a [u8],
    base: usize,
}

impl<'a> RecordReader<'a> {
    fn new(data: &'a [u8], base: usize) -> Self {
        Self { data, base }
    }

    fn require(&self, pos: usize, needed: usize, what: &'static str) -> Result<(), BlobError> {
        let available = self.data.len().saturating_sub(pos);
        if needed > available {
            return Err(BlobError::Truncated {
                what,
                offset: self.base + pos,
                needed,
                available,
            });
        }
        Ok(())
    }

    fn u16_at(&self, pos: usize, what: &'static str) -> Result<u16, BlobError> {
        self.require(pos, 2, what)?;
        Ok(u16::from_le_bytes([self.data[pos], self.data[pos + 1]]))
    }

    fn u32_at(&self, pos: usize, what: &'static str) -> Result<u32, BlobError> {
        self.require(pos, 4, what)?;
        Ok(u32::from_le_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ]))
    }

    /* Text of `len` bytes plus its NUL terminator */
    fn text_at(&self, pos: usize, len: usize, what: &'static str) -> Result<String, BlobError> {
        self.require(pos, len + 1, what)?;
        Ok(String::from_utf8_lossy(&self.data[pos..pos + len]).into_owned())
    }

    /* Slice out the length-prefixed record starting at `pos` */
    fn record_at(
        &self,
        pos: usize,
        index: u32,
        parsed: u32,
        declared: u32,
    ) -> Result<&'a [u8], BlobError> {
        let length = self.u32_at(pos, "record length")? as usize;
        if length == 0 {
            return Err(BlobError::ZeroLengthRecord {
                index,
                offset: self.base + pos,
                parsed,
                declared,
            });
        }
        self.require(pos, length, "record")?;
        Ok(&self.data[pos..pos + length])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ads_types::AdsDataType;
    use assert_matches::assert_matches;

    fn leaf(name: &str, declared: &str, tag: AdsDataType, size: u32, offset: u32) -> TypeNode {
        TypeNode {
            name: name.into(),
            declared_type: declared.into(),
            size,
            offset,
            data_type: tag.code(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_nested_struct_with_array_member() {
        let mut point = leaf("ST_Point", "", AdsDataType::BigType, 16, 0);
        point
            .sub_items
            .insert("x".into(), leaf("x", "DINT", AdsDataType::Int32, 4, 0));
        let mut samples = leaf("samples", "ARRAY [0..2] OF INT", AdsDataType::Int16, 6, 4);
        samples.array_dimensions.push(ArrayDimension::new(0, 3));
        point.sub_items.insert("samples".into(), samples);

        let mut writer = BlobWriter::new();
        writer.push_type(&point);
        let outcome = parse_types(writer.as_bytes(), writer.count());

        assert!(outcome.is_complete());
        let parsed = &outcome.entries["ST_Point"];
        assert_eq!(parsed.size, 16);
        assert_eq!(parsed.entry_length as usize, writer.as_bytes().len());
        assert_eq!(
            parsed.sub_items.keys().collect::<Vec<_>>(),
            vec!["samples", "x"]
        );
        let samples = &parsed.sub_items["samples"];
        assert_eq!(samples.offset, 4);
        assert_eq!(samples.declared_type, "ARRAY [0..2] OF INT");
        assert_eq!(samples.array_dimensions, vec![ArrayDimension::new(0, 3)]);
    }

    #[test]
    fn zero_length_second_record_keeps_first_and_flags_failure() {
        let mut writer = BlobWriter::new();
        writer.push_type(&leaf("T_First", "", AdsDataType::Int16, 2, 0));
        let mut blob = writer.as_bytes().to_vec();
        blob.extend_from_slice(&[0u8; 8]);

        let outcome = parse_types(&blob, 3);
        assert_eq!(outcome.parsed, 1);
        assert!(outcome.entries.contains_key("T_First"));
        assert_matches!(
            outcome.failure,
            Some(BlobError::ZeroLengthRecord { index: 1, parsed: 1, declared: 3, .. })
        );
    }

    #[test]
    fn record_running_past_buffer_is_truncated_not_a_panic() {
        let mut writer = BlobWriter::new();
        writer.push_type(&leaf("T_First", "", AdsDataType::Int16, 2, 0));
        let bytes = writer.as_bytes();
        let cut = &bytes[..bytes.len() - 3];

        let outcome = parse_types(cut, 1);
        assert!(outcome.entries.is_empty());
        assert_matches!(outcome.failure, Some(BlobError::Truncated { .. }));
    }

    #[test]
    fn missing_trailing_records_are_reported() {
        let mut writer = BlobWriter::new();
        writer.push_symbol(&Symbol {
            name: "MAIN.a".into(),
            index_group: 0x4020,
            index_offset: 0,
            size: 2,
            type_name: "INT".into(),
            comment: "counter".into(),
            data_type: AdsDataType::Int16.code(),
            flags: 0,
        });

        let outcome = parse_symbols(writer.as_bytes(), 2);
        assert_eq!(outcome.parsed, 1);
        assert_eq!(outcome.entries["MAIN.a"].comment, "counter");
        assert_matches!(
            outcome.failure,
            Some(BlobError::Truncated { what: "record length", .. })
        );
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn short_record_length_is_rejected() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&10u32.to_le_bytes());
        blob.extend_from_slice(&[0u8; 6]);

        let outcome = parse_symbols(&blob, 1);
        assert_matches!(
            outcome.failure,
            Some(BlobError::RecordTooShort { length: 10, header: SYMBOL_HEADER_LEN, .. })
        );
    }

    #[test]
    fn upload_info_round_trips() {
        let info = UploadInfo {
            symbol_count: 3,
            symbol_size: 300,
            datatype_count: 7,
            datatype_size: 900,
            max_dyn_symbols: 0,
            used_dyn_symbols: 0,
        };
        assert_eq!(UploadInfo::parse(&info.to_bytes()), Ok(info));
        assert_matches!(
            UploadInfo::parse(&[0u8; 10]),
            Err(BlobError::Truncated { what: "upload info", .. })
        );
    }
}
