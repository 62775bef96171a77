/* Writes catalog records in the controller's upload layout.
 *
 * Entry lengths are always recomputed from the content; the `entry_length`
 * stored on a TypeNode is ignored. */

use super::{SYMBOL_HEADER_LEN, TYPE_HEADER_LEN};
use crate::transport::CatalogBlob;
use ads_types::{Symbol, TypeNode};

/// Accumulates records into one upload blob.
#[derive(Debug, Clone, Default)]
pub struct BlobWriter {
    buffer: Vec<u8>,
    count: u32,
}

impl BlobWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_type(&mut self, node: &TypeNode) -> &mut Self {
        self.buffer.extend(encode_type_record(node));
        self.count += 1;
        self
    }

    pub fn push_symbol(&mut self, symbol: &Symbol) -> &mut Self {
        self.buffer.extend(encode_symbol_record(symbol));
        self.count += 1;
        self
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_blob(self) -> CatalogBlob {
        CatalogBlob {
            bytes: self.buffer,
            declared_count: self.count,
        }
    }
}

/// Encode a type record, including its struct members, under the node's own name.
pub fn encode_type_record(node: &TypeNode) -> Vec<u8> {
    encode_type_named(&node.name, node)
}

fn encode_type_named(name: &str, node: &TypeNode) -> Vec<u8> {
    let members: Vec<Vec<u8>> = node
        .sub_items
        .iter()
        .map(|(key, member)| encode_type_named(key, member))
        .collect();

    let mut body = Vec::new();
    push_text(&mut body, name);
    push_text(&mut body, &node.declared_type);
    push_text(&mut body, &node.comment);
    for dim in &node.array_dimensions {
        body.extend_from_slice(&dim.lower_bound.to_le_bytes());
        body.extend_from_slice(&dim.element_count.to_le_bytes());
    }
    for member in &members {
        body.extend_from_slice(member);
    }

    let entry_length = (TYPE_HEADER_LEN + body.len()) as u32;
    let mut record = Vec::with_capacity(entry_length as usize);
    record.extend_from_slice(&entry_length.to_le_bytes());
    record.extend_from_slice(&node.version.to_le_bytes());
    record.extend_from_slice(&0u32.to_le_bytes()); /* hashValue */
    record.extend_from_slice(&0u32.to_le_bytes()); /* typeHashValue */
    record.extend_from_slice(&node.size.to_le_bytes());
    record.extend_from_slice(&node.offset.to_le_bytes());
    record.extend_from_slice(&node.data_type.to_le_bytes());
    record.extend_from_slice(&node.flags.to_le_bytes());
    record.extend_from_slice(&text_len(name).to_le_bytes());
    record.extend_from_slice(&text_len(&node.declared_type).to_le_bytes());
    record.extend_from_slice(&text_len(&node.comment).to_le_bytes());
    record.extend_from_slice(&(node.array_dimensions.len() as u16).to_le_bytes());
    record.extend_from_slice(&(members.len() as u16).to_le_bytes());
    record.extend_from_slice(&body);
    record
}

/// Encode a symbol record.
pub fn encode_symbol_record(symbol: &Symbol) -> Vec<u8> {
    let mut body = Vec::new();
    push_text(&mut body, &symbol.name);
    push_text(&mut body, &symbol.type_name);
    push_text(&mut body, &symbol.comment);

    let entry_length = (SYMBOL_HEADER_LEN + body.len()) as u32;
    let mut record = Vec::with_capacity(entry_length as usize);
    record.extend_from_slice(&entry_length.to_le_bytes());
    record.extend_from_slice(&symbol.index_group.to_le_bytes());
    record.extend_from_slice(&symbol.index_offset.to_le_bytes());
    record.extend_from_slice(&symbol.size.to_le_bytes());
    record.extend_from_slice(&symbol.data_type.to_le_bytes());
    record.extend_from_slice(&symbol.flags.to_le_bytes());
    record.extend_from_slice(&text_len(&symbol.name).to_le_bytes());
    record.extend_from_slice(&text_len(&symbol.type_name).to_le_bytes());
    record.extend_from_slice(&text_len(&symbol.comment).to_le_bytes());
    record.extend_from_slice(&body);
    record
}

fn push_text(buffer: &mut Vec<u8>, text: &str) {
    buffer.extend_from_slice(text.as_bytes());
    buffer.push(0);
}

fn text_len(text: &str) -> u16 {
    text.len() as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::parse_symbols;

    #[test]
    fn symbol_record_length_covers_header_and_text() {
        let symbol = Symbol {
            name: "MAIN.b".into(),
            type_name: "BOOL".into(),
            ..Default::default()
        };
        let record = encode_symbol_record(&symbol);
        assert_eq!(record.len(), SYMBOL_HEADER_LEN + 7 + 5 + 1);
        assert_eq!(
            u32::from_le_bytes([record[0], record[1], record[2], record[3]]) as usize,
            record.len()
        );
    }

    #[test]
    fn writer_counts_records() {
        let mut writer = BlobWriter::new();
        for name in ["A", "B", "C"] {
            writer.push_symbol(&Symbol {
                name: name.into(),
                ..Default::default()
            });
        }
        let blob = writer.into_blob();
        assert_eq!(blob.declared_count, 3);
        let outcome = parse_symbols(&blob.bytes, blob.declared_count);
        assert!(outcome.is_complete());
        assert_eq!(outcome.entries.len(), 3);
    }
}
