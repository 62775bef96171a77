/* Catalog snapshots
 *
 * A `Catalog` is the immutable pair of type and symbol maps produced by one
 * refresh. `CatalogStore` publishes them through an atomic pointer swap, so a
 * reader holding an `Arc<Catalog>` sees one refresh in full, never a mix. */

use crate::blob::{parse_symbols, parse_types};
use crate::errors::{RefreshError, ResolveError};
use crate::resolve::{ResolvedType, TypeResolver};
use crate::transport::Transport;
use ads_types::{Symbol, TypeNode};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One published view of the controller's types and symbols.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub types: BTreeMap<String, TypeNode>,
    pub symbols: BTreeMap<String, Symbol>,
    /* 0 until the first successful refresh */
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl Catalog {
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.symbols.is_empty()
    }

    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn resolver(&self, max_depth: usize) -> TypeResolver<'_> {
        TypeResolver::with_max_depth(&self.types, max_depth)
    }

    pub fn resolve_symbol(
        &self,
        symbol: &Symbol,
        max_depth: usize,
    ) -> Result<ResolvedType, ResolveError> {
        self.resolver(max_depth).resolve_symbol(symbol)
    }
}

/// Holder of the current snapshot. Cloning shares the same slot.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    current: Arc<ArcSwap<Catalog>>,
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore {
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(Catalog::default())),
        }
    }

    /// The snapshot live right now; stays valid after later publishes.
    pub fn load(&self) -> Arc<Catalog> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    /// Replace the live snapshot and return it.
    pub fn publish(
        &self,
        types: BTreeMap<String, TypeNode>,
        symbols: BTreeMap<String, Symbol>,
    ) -> Arc<Catalog> {
        let next = Arc::new(Catalog {
            types,
            symbols,
            generation: self.generation() + 1,
            refreshed_at: Some(Utc::now()),
        });
        self.current.store(Arc::clone(&next));
        next
    }
}

/// Fetch and parse both metadata uploads. Any fetch error, and any parse that
/// stops short of its declared count, fails the whole build.
pub fn fetch_catalogs(
    transport: &dyn Transport,
) -> Result<(BTreeMap<String, TypeNode>, BTreeMap<String, Symbol>), RefreshError> {
    let type_blob = transport
        .fetch_type_catalog_blob()
        .map_err(|source| RefreshError::Fetch {
            catalog: "type",
            source,
        })?;
    let symbol_blob = transport
        .fetch_symbol_catalog_blob()
        .map_err(|source| RefreshError::Fetch {
            catalog: "symbol",
            source,
        })?;

    let types = parse_types(&type_blob.bytes, type_blob.declared_count)
        .into_result()
        .map_err(|source| RefreshError::Parse {
            catalog: "type",
            source,
        })?;
    let symbols = parse_symbols(&symbol_blob.bytes, symbol_blob.declared_count)
        .into_result()
        .map_err(|source| RefreshError::Parse {
            catalog: "symbol",
            source,
        })?;

    debug!(types = types.len(), symbols = symbols.len(), "parsed catalogs");
    Ok((types, symbols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobWriter;
    use crate::transport::{CatalogBlob, MemoryTransport};
    use ads_types::{AdsDataType, ADSERR_DEVICE_INVALIDDATA};
    use assert_matches::assert_matches;

    fn symbol(name: &str) -> Symbol {
        Symbol {
            name: name.into(),
            index_group: 0x4020,
            size: 2,
            type_name: "INT".into(),
            data_type: AdsDataType::Int16.code(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_store_serves_generation_zero() {
        let store = CatalogStore::new();
        let snapshot = store.load();
        assert_eq!(snapshot.generation, 0);
        assert!(snapshot.is_empty());
        assert!(snapshot.refreshed_at.is_none());
    }

    #[test]
    fn readers_keep_their_snapshot_across_publishes() {
        let store = CatalogStore::new();
        let mut symbols = BTreeMap::new();
        symbols.insert("MAIN.a".to_string(), symbol("MAIN.a"));
        store.publish(BTreeMap::new(), symbols);

        let held = store.load();
        store.publish(BTreeMap::new(), BTreeMap::new());

        assert_eq!(held.generation, 1);
        assert!(held.symbol("MAIN.a").is_some());
        assert_eq!(store.generation(), 2);
        assert!(store.load().symbol("MAIN.a").is_none());
    }

    #[test]
    fn fetch_fails_when_a_blob_is_cut_short() {
        let device = MemoryTransport::new();
        let mut types = BlobWriter::new();
        types.push_type(&TypeNode::primitive("INT", AdsDataType::Int16, 2));
        let mut symbols = BlobWriter::new();
        symbols.push_symbol(&symbol("MAIN.a"));
        let mut symbol_blob = symbols.into_blob();
        symbol_blob.declared_count = 2;
        device.set_catalogs(types.into_blob(), symbol_blob);

        let err = fetch_catalogs(&device).expect_err("second symbol is missing");
        assert_matches!(err, RefreshError::Parse { catalog: "symbol", .. });
        assert_eq!(err.code(), ADSERR_DEVICE_INVALIDDATA);
    }

    #[test]
    fn fetch_errors_keep_the_transport_code() {
        let device = MemoryTransport::new();
        device.set_catalogs(CatalogBlob::default(), CatalogBlob::default());
        device.set_fetch_failure(Some(0x745));

        let err = fetch_catalogs(&device).expect_err("fetch fails");
        assert_matches!(err, RefreshError::Fetch { catalog: "type", .. });
        assert_eq!(err.code(), 0x745);
    }
}
