/* Symbol bridge
 *
 * Entry point for the request layer: looks symbols up in the live snapshot,
 * resolves their types and runs the codec against the transport. Every call
 * works on one snapshot from start to finish. */

use crate::catalog::{Catalog, CatalogStore};
use crate::codec::{self, Decoded};
use crate::config::BridgeConfig;
use crate::errors::{BridgeError, ReflectResult};
use crate::refresher::CatalogRefresher;
use crate::resolve::ResolvedType;
use crate::transport::Transport;
use ads_types::Symbol;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct SymbolBridge {
    transport: Arc<dyn Transport>,
    store: CatalogStore,
    config: BridgeConfig,
}

impl SymbolBridge {
    pub fn new(transport: Arc<dyn Transport>, config: BridgeConfig) -> Self {
        Self::with_store(transport, CatalogStore::new(), config)
    }

    pub fn with_store(
        transport: Arc<dyn Transport>,
        store: CatalogStore,
        config: BridgeConfig,
    ) -> Self {
        Self {
            transport,
            store,
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.store.load()
    }

    /// A refresher publishing into this bridge's store.
    pub fn refresher(&self) -> CatalogRefresher {
        CatalogRefresher::new(
            Arc::clone(&self.transport),
            self.store.clone(),
            self.config.refresher,
        )
    }

    /// All symbols of the live snapshot, ordered by name.
    pub fn list_symbols(&self) -> Vec<Symbol> {
        self.catalog().symbols.values().cloned().collect()
    }

    /// Symbol listing as a JSON object keyed by symbol name; each entry is
    /// `{"Name","IndexGroup","IndexOffset","Size","Type","Comment"}`.
    pub fn symbols_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(&self.catalog().symbols)
    }

    pub fn symbol_info(&self, name: &str) -> ReflectResult<Symbol> {
        self.catalog()
            .symbol(name)
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    /// Symbol plus its fully resolved type.
    pub fn resolve_symbol(&self, name: &str) -> ReflectResult<(Symbol, ResolvedType)> {
        let catalog = self.catalog();
        let symbol = catalog.symbol(name).ok_or_else(|| not_found(name))?;
        let resolved = catalog.resolve_symbol(symbol, self.config.codec.max_resolve_depth)?;
        Ok((symbol.clone(), resolved))
    }

    /// Read a symbol; any recorded decode failure fails the call.
    pub fn read_symbol(&self, name: &str) -> ReflectResult<Value> {
        Ok(self.read_symbol_partial(name)?.into_result()?)
    }

    /// Read a symbol, keeping whatever decoded alongside the first failure.
    pub fn read_symbol_partial(&self, name: &str) -> ReflectResult<Decoded> {
        let (symbol, resolved) = self.resolve_symbol(name)?;
        debug!(
            symbol = name,
            group = symbol.index_group,
            offset = symbol.index_offset,
            "read symbol"
        );
        Ok(codec::decode(
            &resolved,
            symbol.index_group,
            symbol.index_offset,
            self.transport.as_ref(),
            &self.config.codec,
        ))
    }

    pub fn write_symbol(&self, name: &str, value: &Value) -> ReflectResult<()> {
        let (symbol, resolved) = self.resolve_symbol(name)?;
        debug!(
            symbol = name,
            group = symbol.index_group,
            offset = symbol.index_offset,
            "write symbol"
        );
        codec::encode(
            &resolved,
            symbol.index_group,
            symbol.index_offset,
            value,
            self.transport.as_ref(),
        )?;
        Ok(())
    }

    pub fn resolve_handle(&self, name: &str) -> ReflectResult<u32> {
        Ok(self.transport.resolve_handle(name)?)
    }

    /// Untyped read, bounded by `max_raw_read`.
    pub fn read_raw(
        &self,
        index_group: u32,
        index_offset: u32,
        length: u32,
    ) -> ReflectResult<Vec<u8>> {
        if length > self.config.max_raw_read {
            return Err(BridgeError::RawReadTooLong {
                requested: length,
                limit: self.config.max_raw_read,
            });
        }
        Ok(self.transport.read_memory(index_group, index_offset, length)?)
    }
}

fn not_found(name: &str) -> BridgeError {
    BridgeError::SymbolNotFound {
        name: name.to_string(),
    }
}
