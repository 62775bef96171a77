/* Type resolution
 *
 * Flattens a catalog entry into a self-contained tree: struct members are
 * inlined, alias chains followed, array dimensions gathered outermost-first,
 * and opaque extended leaves mapped onto a concrete integer tag. */

use crate::config::DEFAULT_MAX_RESOLVE_DEPTH;
use crate::errors::ResolveError;
use ads_types::{is_primitive_code, AdsDataType, ArrayDimension, Symbol, TypeNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A fully resolved type. For arrays, `size` is the size of one element and
/// `kind` describes that element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedType {
    /* Field name inside a struct, otherwise the catalog name */
    pub name: String,
    /* Catalog entry this node was resolved from (informational only) */
    pub type_name: String,
    pub comment: String,
    pub size: u32,
    /* Offset relative to the enclosing struct */
    pub offset: u32,
    pub dimensions: Vec<ArrayDimension>,
    pub kind: ResolvedKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ResolvedKind {
    Primitive { tag: u32 },
    Struct { fields: BTreeMap<String, ResolvedType> },
}

impl ResolvedType {
    pub fn is_array(&self) -> bool {
        !self.dimensions.is_empty()
    }

    pub fn tag(&self) -> Option<u32> {
        match &self.kind {
            ResolvedKind::Primitive { tag } => Some(*tag),
            ResolvedKind::Struct { .. } => None,
        }
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, ResolvedType>> {
        match &self.kind {
            ResolvedKind::Struct { fields } => Some(fields),
            ResolvedKind::Primitive { .. } => None,
        }
    }

    /* Element count across all dimensions (1 for scalars) */
    pub fn element_count(&self) -> u64 {
        self.dimensions
            .iter()
            .fold(1u64, |count, dim| count.saturating_mul(dim.element_count as u64))
    }

    pub fn total_size(&self) -> u64 {
        (self.size as u64).saturating_mul(self.element_count())
    }

    fn leaf(node: &TypeNode, tag: u32, size: u32) -> Self {
        Self {
            name: node.name.clone(),
            type_name: node.name.clone(),
            comment: node.comment.clone(),
            size,
            offset: node.offset,
            dimensions: Vec::new(),
            kind: ResolvedKind::Primitive { tag },
        }
    }
}

/// Resolves names against one type catalog. Pure; holds no mutable state.
#[derive(Debug, Clone, Copy)]
pub struct TypeResolver<'a> {
    types: &'a BTreeMap<String, TypeNode>,
    max_depth: usize,
}

impl<'a> TypeResolver<'a> {
    pub fn new(types: &'a BTreeMap<String, TypeNode>) -> Self {
        Self::with_max_depth(types, DEFAULT_MAX_RESOLVE_DEPTH)
    }

    pub fn with_max_depth(types: &'a BTreeMap<String, TypeNode>, max_depth: usize) -> Self {
        Self { types, max_depth }
    }

    /// Resolve a catalog entry by name.
    pub fn resolve(&self, type_name: &str) -> Result<ResolvedType, ResolveError> {
        self.resolve_at(type_name, 0)
    }

    /// Resolve the type of a symbol. A symbol whose type is not in the catalog
    /// still resolves when its own record carries a usable tag.
    pub fn resolve_symbol(&self, symbol: &Symbol) -> Result<ResolvedType, ResolveError> {
        let mut resolved = if self.types.contains_key(&symbol.type_name) {
            self.resolve(&symbol.type_name)?
        } else {
            let standalone = TypeNode {
                name: symbol.type_name.clone(),
                declared_type: symbol.type_name.clone(),
                size: symbol.size,
                data_type: symbol.data_type,
                ..Default::default()
            };
            self.resolve_node(&standalone, 0)?
        };
        resolved.name = symbol.name.clone();
        resolved.comment = symbol.comment.clone();
        resolved.offset = 0;
        Ok(resolved)
    }

    fn resolve_at(&self, type_name: &str, depth: usize) -> Result<ResolvedType, ResolveError> {
        if depth > self.max_depth {
            return Err(ResolveError::DepthExceeded {
                type_name: type_name.to_string(),
                limit: self.max_depth,
            });
        }
        let node = self
            .types
            .get(type_name)
            .ok_or_else(|| ResolveError::UnknownType {
                type_name: type_name.to_string(),
            })?;
        self.resolve_node(node, depth)
    }

    fn resolve_node(&self, node: &TypeNode, depth: usize) -> Result<ResolvedType, ResolveError> {
        if node.is_struct() {
            return self.resolve_struct(node, depth);
        }

        if !node.is_array() {
            if node.declared_type.is_empty() || is_primitive_code(node.data_type) {
                return Ok(ResolvedType::leaf(node, node.data_type, node.size));
            }
            if node.data_type == AdsDataType::BigType.code() {
                return reclassify_extended(node);
            }
            return self.resolve_at(&node.declared_type, depth + 1);
        }

        let mut element = self.resolve_element(node, depth + 1)?;
        let mut dimensions = node.array_dimensions.clone();
        dimensions.append(&mut element.dimensions);
        element.dimensions = dimensions;
        check_array_size(node, &element)?;
        Ok(element)
    }

    fn resolve_struct(
        &self,
        node: &TypeNode,
        depth: usize,
    ) -> Result<ResolvedType, ResolveError> {
        let mut fields = BTreeMap::new();
        for (key, member) in &node.sub_items {
            let mut field = self.resolve_member(member, depth + 1)?;
            field.type_name = std::mem::replace(&mut field.name, key.clone());
            field.offset = member.offset;
            field.comment = member.comment.clone();
            fields.insert(key.clone(), field);
        }
        Ok(ResolvedType {
            name: node.name.clone(),
            type_name: node.name.clone(),
            comment: node.comment.clone(),
            size: node.size,
            offset: node.offset,
            dimensions: Vec::new(),
            kind: ResolvedKind::Struct { fields },
        })
    }

    /* A member follows its declared type; when that type is not published the
     * member record itself is the best description available */
    fn resolve_member(
        &self,
        member: &TypeNode,
        depth: usize,
    ) -> Result<ResolvedType, ResolveError> {
        if self.has_target(member) {
            self.resolve_at(&member.declared_type, depth)
        } else {
            self.resolve_node(member, depth)
        }
    }

    fn resolve_element(
        &self,
        node: &TypeNode,
        depth: usize,
    ) -> Result<ResolvedType, ResolveError> {
        if self.has_target(node) {
            return self.resolve_at(&node.declared_type, depth);
        }
        if !is_primitive_code(node.data_type) {
            return Err(ResolveError::UnknownType {
                type_name: node.declared_type.clone(),
            });
        }
        let count = node.element_count();
        let element_size = if count == 0 {
            node.size
        } else {
            (node.size as u64 / count) as u32
        };
        Ok(ResolvedType::leaf(node, node.data_type, element_size))
    }

    fn has_target(&self, node: &TypeNode) -> bool {
        !node.declared_type.is_empty() && self.types.contains_key(&node.declared_type)
    }
}

/* Opaque extended leaves carry no layout; only pointer-sized ones map onto an integer */
fn reclassify_extended(node: &TypeNode) -> Result<ResolvedType, ResolveError> {
    let tag = match node.size {
        4 => AdsDataType::Uint32,
        8 => AdsDataType::Uint64,
        size => {
            return Err(ResolveError::UnsupportedExtendedSize {
                type_name: node.name.clone(),
                size,
            })
        }
    };
    Ok(ResolvedType::leaf(node, tag.code(), node.size))
}

/* Element count and element size must fit inside the array's declared byte size */
fn check_array_size(node: &TypeNode, element: &ResolvedType) -> Result<(), ResolveError> {
    let declared = node.size as u64;
    let count = element.element_count();
    let required = element.total_size();
    if required > declared || count > declared {
        return Err(ResolveError::SizeMismatch {
            type_name: node.name.clone(),
            declared: node.size,
            elements: count,
            required,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ads_types::ADST_MAXTYPES;
    use assert_matches::assert_matches;

    fn catalog(nodes: Vec<TypeNode>) -> BTreeMap<String, TypeNode> {
        nodes
            .into_iter()
            .map(|node| (node.name.clone(), node))
            .collect()
    }

    #[test]
    fn array_of_array_collects_dimensions_outermost_first() {
        let types = catalog(vec![
            TypeNode::primitive("DINT", AdsDataType::Int32, 4),
            TypeNode::array("U", "DINT", AdsDataType::Int32, 8, vec![ArrayDimension::new(0, 2)]),
            TypeNode::array("T", "U", AdsDataType::BigType, 24, vec![ArrayDimension::new(1, 3)]),
        ]);

        let resolved = TypeResolver::new(&types).resolve("T").expect("resolves");
        assert_eq!(
            resolved.dimensions,
            vec![ArrayDimension::new(1, 3), ArrayDimension::new(0, 2)]
        );
        assert_eq!(resolved.tag(), Some(AdsDataType::Int32.code()));
        assert_eq!(resolved.size, 4);
        assert_eq!(resolved.total_size(), 24);
    }

    #[test]
    fn struct_members_take_field_identity() {
        let types = catalog(vec![
            TypeNode::primitive("INT", AdsDataType::Int16, 2),
            TypeNode::alias("T_Speed", "INT", AdsDataType::Int16, 2)
                .with_comment("alias comment"),
            TypeNode::structure(
                "ST_Drive",
                4,
                vec![
                    TypeNode::member("speed", "T_Speed", AdsDataType::BigType, 2, 2)
                        .with_comment("rpm"),
                    TypeNode::member("state", "INT", AdsDataType::Int16, 0, 2),
                ],
            ),
        ]);

        let resolved = TypeResolver::new(&types).resolve("ST_Drive").expect("resolves");
        let fields = resolved.fields().expect("struct");
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["speed", "state"]);
        let speed = &fields["speed"];
        assert_eq!(speed.name, "speed");
        assert_eq!(speed.type_name, "T_Speed");
        assert_eq!(speed.offset, 2);
        assert_eq!(speed.comment, "rpm");
        assert_eq!(speed.tag(), Some(AdsDataType::Int16.code()));
    }

    #[test]
    fn primitive_coded_alias_is_a_leaf() {
        let types = catalog(vec![TypeNode::alias("T_Count", "UDINT", AdsDataType::Uint32, 4)]);

        let resolved = TypeResolver::new(&types).resolve("T_Count").expect("resolves");
        assert_eq!(resolved.tag(), Some(AdsDataType::Uint32.code()));
        assert!(resolved.fields().is_none());
    }

    #[test]
    fn self_referential_arrays_hit_depth_limit() {
        let dims = vec![ArrayDimension::new(0, 1)];
        let types = catalog(vec![
            TypeNode::array("A", "B", AdsDataType::BigType, 4, dims.clone()),
            TypeNode::array("B", "A", AdsDataType::BigType, 4, dims),
        ]);

        let result = TypeResolver::with_max_depth(&types, 8).resolve("A");
        assert_matches!(result, Err(ResolveError::DepthExceeded { limit: 8, .. }));
    }

    #[test]
    fn non_primitive_tags_follow_the_alias_chain() {
        let mut outer = TypeNode::alias("T_Outer", "T_Inner", AdsDataType::Int16, 2);
        outer.data_type = ADST_MAXTYPES;
        let mut inner = TypeNode::alias("T_Inner", "INT", AdsDataType::Int16, 2);
        inner.data_type = ADST_MAXTYPES;
        let types = catalog(vec![
            TypeNode::primitive("INT", AdsDataType::Int16, 2),
            inner,
            outer,
        ]);

        let resolved = TypeResolver::new(&types).resolve("T_Outer").expect("resolves");
        assert_eq!(resolved.name, "INT");
        assert_eq!(resolved.tag(), Some(AdsDataType::Int16.code()));
    }

    #[test]
    fn extended_leaves_are_reclassified_by_size() {
        let types = catalog(vec![
            TypeNode::alias("POINTER TO INT", "INT", AdsDataType::BigType, 4),
            TypeNode::alias("T_Ref", "NotPublished", AdsDataType::BigType, 8),
            TypeNode::alias("T_Odd", "INT", AdsDataType::BigType, 6),
            TypeNode::primitive("INT", AdsDataType::Int16, 2),
        ]);
        let resolver = TypeResolver::new(&types);

        assert_eq!(
            resolver.resolve("POINTER TO INT").expect("4 bytes").tag(),
            Some(AdsDataType::Uint32.code())
        );
        assert_eq!(
            resolver.resolve("T_Ref").expect("8 bytes").tag(),
            Some(AdsDataType::Uint64.code())
        );
        assert_matches!(
            resolver.resolve("T_Odd"),
            Err(ResolveError::UnsupportedExtendedSize { size: 6, .. })
        );
    }

    #[test]
    fn extended_alias_of_a_published_struct_is_still_reclassified() {
        let types = catalog(vec![
            TypeNode::primitive("DINT", AdsDataType::Int32, 4),
            TypeNode::structure(
                "ST_Small",
                4,
                vec![TypeNode::member("v", "DINT", AdsDataType::Int32, 0, 4)],
            ),
            TypeNode::alias("T_Wrap", "ST_Small", AdsDataType::BigType, 4),
        ]);

        let resolved = TypeResolver::new(&types).resolve("T_Wrap").expect("resolves");
        assert_eq!(resolved.tag(), Some(AdsDataType::Uint32.code()));
        assert!(resolved.fields().is_none());
    }

    #[test]
    fn bare_leaves_keep_their_tag_verbatim() {
        let types = catalog(vec![TypeNode::primitive("PVOID", AdsDataType::BigType, 4)]);

        let resolved = TypeResolver::new(&types).resolve("PVOID").expect("resolves");
        assert_eq!(resolved.tag(), Some(AdsDataType::BigType.code()));
    }

    #[test]
    fn arrays_must_fit_their_declared_size() {
        let types = catalog(vec![
            TypeNode::primitive("INT", AdsDataType::Int16, 2),
            TypeNode::array(
                "T_Short",
                "INT",
                AdsDataType::Int16,
                4,
                vec![ArrayDimension::new(0, 3)],
            ),
            TypeNode::array(
                "T_Huge",
                "Unpublished",
                AdsDataType::Int16,
                6,
                vec![ArrayDimension::new(0, u32::MAX)],
            ),
            TypeNode::array(
                "T_Exact",
                "INT",
                AdsDataType::Int16,
                6,
                vec![ArrayDimension::new(0, 3)],
            ),
        ]);
        let resolver = TypeResolver::new(&types);

        assert_matches!(
            resolver.resolve("T_Short"),
            Err(ResolveError::SizeMismatch { declared: 4, elements: 3, required: 6, .. })
        );
        assert_matches!(
            resolver.resolve("T_Huge"),
            Err(ResolveError::SizeMismatch { declared: 6, .. })
        );
        assert_eq!(resolver.resolve("T_Exact").expect("fits").total_size(), 6);
    }

    #[test]
    fn unknown_names_are_reported() {
        let mut broken = TypeNode::alias("T_Broken", "Missing", AdsDataType::Int16, 2);
        broken.data_type = ADST_MAXTYPES;
        let types = catalog(vec![broken]);
        let resolver = TypeResolver::new(&types);

        assert_matches!(
            resolver.resolve("Nope"),
            Err(ResolveError::UnknownType { type_name }) if type_name == "Nope"
        );
        assert_matches!(
            resolver.resolve("T_Broken"),
            Err(ResolveError::UnknownType { type_name }) if type_name == "Missing"
        );
    }

    #[test]
    fn unpublished_member_and_element_types_fall_back_to_their_tags() {
        let mut readings = TypeNode::member(
            "readings",
            "ARRAY [0..3] OF UINT",
            AdsDataType::Uint16,
            4,
            8,
        );
        readings.array_dimensions.push(ArrayDimension::new(0, 4));
        let types = catalog(vec![TypeNode::structure(
            "ST_Sensor",
            12,
            vec![
                TypeNode::member("id", "UDINT", AdsDataType::Uint32, 0, 4),
                readings,
            ],
        )]);

        let resolved = TypeResolver::new(&types).resolve("ST_Sensor").expect("resolves");
        let fields = resolved.fields().expect("struct");
        assert_eq!(fields["id"].tag(), Some(AdsDataType::Uint32.code()));
        assert_eq!(fields["readings"].dimensions, vec![ArrayDimension::new(0, 4)]);
        assert_eq!(fields["readings"].size, 2);
        assert_eq!(fields["readings"].offset, 4);
    }

    #[test]
    fn symbols_without_catalog_entry_use_their_own_tag() {
        let types = BTreeMap::new();
        let symbol = Symbol {
            name: "MAIN.flag".into(),
            index_group: 0x4020,
            size: 1,
            type_name: "BOOL".into(),
            data_type: AdsDataType::Bit.code(),
            ..Default::default()
        };

        let resolved = TypeResolver::new(&types).resolve_symbol(&symbol).expect("resolves");
        assert_eq!(resolved.name, "MAIN.flag");
        assert_eq!(resolved.tag(), Some(AdsDataType::Bit.code()));
        assert_eq!(resolved.size, 1);
    }
}
