/* Transport seam
 *
 * The reflection runtime never talks to a controller directly. Every device
 * round trip goes through `Transport`; implementations block the caller until
 * the device answers and report failures as raw ADS status codes. */

use crate::errors::TransportError;
use ads_types::{
    ADSERR_DEVICE_INVALIDGRP, ADSERR_DEVICE_INVALIDSIZE, ADSERR_DEVICE_SYMBOLNOTFOUND,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// One metadata upload together with the record count announced for it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogBlob {
    pub bytes: Vec<u8>,
    pub declared_count: u32,
}

/// Blocking access to a controller's memory and metadata.
pub trait Transport: Send + Sync {
    fn read_memory(
        &self,
        index_group: u32,
        index_offset: u32,
        length: u32,
    ) -> Result<Vec<u8>, TransportError>;

    fn write_memory(
        &self,
        index_group: u32,
        index_offset: u32,
        data: &[u8],
    ) -> Result<(), TransportError>;

    fn fetch_type_catalog_blob(&self) -> Result<CatalogBlob, TransportError>;

    fn fetch_symbol_catalog_blob(&self) -> Result<CatalogBlob, TransportError>;

    fn resolve_handle(&self, name: &str) -> Result<u32, TransportError>;
}

/// A write that reached `MemoryTransport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub index_group: u32,
    pub index_offset: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct DeviceState {
    regions: BTreeMap<u32, Vec<u8>>,
    types: CatalogBlob,
    symbols: CatalogBlob,
    handles: BTreeMap<String, u32>,
    read_faults: BTreeMap<(u32, u32), u32>,
    write_faults: BTreeMap<(u32, u32), u32>,
    fetch_fault: Option<u32>,
    fetches: u64,
    log_writes: bool,
    writes: Vec<WriteRecord>,
}

/// In-process controller image: memory regions per index group plus the two
/// metadata uploads. Supports injecting failures at specific addresses.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<DeviceState>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /* Like `new`, but keeps every successful write for `writes` to return */
    pub fn with_write_log() -> Self {
        let device = Self::default();
        device.state.lock().log_writes = true;
        device
    }

    /* Replace (or create) the memory image of one index group */
    pub fn set_region(&self, index_group: u32, bytes: Vec<u8>) {
        self.state.lock().regions.insert(index_group, bytes);
    }

    pub fn region(&self, index_group: u32) -> Option<Vec<u8>> {
        self.state.lock().regions.get(&index_group).cloned()
    }

    pub fn set_catalogs(&self, types: CatalogBlob, symbols: CatalogBlob) {
        let mut state = self.state.lock();
        state.types = types;
        state.symbols = symbols;
    }

    pub fn set_handle(&self, name: &str, handle: u32) {
        self.state.lock().handles.insert(name.to_string(), handle);
    }

    pub fn fail_read_at(&self, index_group: u32, index_offset: u32, code: u32) {
        self.state
            .lock()
            .read_faults
            .insert((index_group, index_offset), code);
    }

    pub fn fail_write_at(&self, index_group: u32, index_offset: u32, code: u32) {
        self.state
            .lock()
            .write_faults
            .insert((index_group, index_offset), code);
    }

    /* Make every metadata fetch fail with `code` until cleared with None */
    pub fn set_fetch_failure(&self, code: Option<u32>) {
        self.state.lock().fetch_fault = code;
    }

    pub fn fetch_count(&self) -> u64 {
        self.state.lock().fetches
    }

    /* Writes logged since the last `take_writes`; always empty without the log */
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().writes.clone()
    }

    pub fn take_writes(&self) -> Vec<WriteRecord> {
        std::mem::take(&mut self.state.lock().writes)
    }

    fn fetch(
        &self,
        pick: impl FnOnce(&DeviceState) -> CatalogBlob,
    ) -> Result<CatalogBlob, TransportError> {
        let mut state = self.state.lock();
        state.fetches += 1;
        if let Some(code) = state.fetch_fault {
            return Err(TransportError::new(code));
        }
        Ok(pick(&*state))
    }
}

fn span(
    index_offset: u32,
    length: usize,
    region_len: usize,
) -> Result<std::ops::Range<usize>, TransportError> {
    let start = index_offset as usize;
    let end = start
        .checked_add(length)
        .filter(|end| *end <= region_len)
        .ok_or(TransportError::new(ADSERR_DEVICE_INVALIDSIZE))?;
    Ok(start..end)
}

impl Transport for MemoryTransport {
    fn read_memory(
        &self,
        index_group: u32,
        index_offset: u32,
        length: u32,
    ) -> Result<Vec<u8>, TransportError> {
        let state = self.state.lock();
        if let Some(code) = state.read_faults.get(&(index_group, index_offset)) {
            return Err(TransportError::new(*code));
        }
        let region = state
            .regions
            .get(&index_group)
            .ok_or(TransportError::new(ADSERR_DEVICE_INVALIDGRP))?;
        let range = span(index_offset, length as usize, region.len())?;
        Ok(region[range].to_vec())
    }

    fn write_memory(
        &self,
        index_group: u32,
        index_offset: u32,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(code) = state.write_faults.get(&(index_group, index_offset)) {
            return Err(TransportError::new(*code));
        }
        let region = state
            .regions
            .get_mut(&index_group)
            .ok_or(TransportError::new(ADSERR_DEVICE_INVALIDGRP))?;
        let range = span(index_offset, data.len(), region.len())?;
        region[range].copy_from_slice(data);
        if state.log_writes {
            state.writes.push(WriteRecord {
                index_group,
                index_offset,
                data: data.to_vec(),
            });
        }
        Ok(())
    }

    fn fetch_type_catalog_blob(&self) -> Result<CatalogBlob, TransportError> {
        self.fetch(|state| state.types.clone())
    }

    fn fetch_symbol_catalog_blob(&self) -> Result<CatalogBlob, TransportError> {
        self.fetch(|state| state.symbols.clone())
    }

    fn resolve_handle(&self, name: &str) -> Result<u32, TransportError> {
        self.state
            .lock()
            .handles
            .get(name)
            .copied()
            .ok_or(TransportError::new(ADSERR_DEVICE_SYMBOLNOTFOUND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ads_types::ADSERR_DEVICE_INVALIDDATA;

    #[test]
    fn reads_and_writes_stay_inside_the_region() {
        let device = MemoryTransport::with_write_log();
        device.set_region(0x4020, vec![1, 2, 3, 4]);

        assert_eq!(device.read_memory(0x4020, 1, 2), Ok(vec![2, 3]));
        assert_eq!(
            device.read_memory(0x4020, 3, 2),
            Err(TransportError::new(ADSERR_DEVICE_INVALIDSIZE))
        );
        assert_eq!(
            device.read_memory(0x4021, 0, 1),
            Err(TransportError::new(ADSERR_DEVICE_INVALIDGRP))
        );

        device.write_memory(0x4020, 2, &[9, 9]).expect("write fits");
        assert_eq!(device.region(0x4020), Some(vec![1, 2, 9, 9]));
        assert_eq!(device.writes().len(), 1);
        assert_eq!(device.take_writes()[0].data, vec![9, 9]);
        assert!(device.writes().is_empty());
    }

    #[test]
    fn writes_are_not_logged_by_default() {
        let device = MemoryTransport::new();
        device.set_region(0x4020, vec![0; 4]);
        for _ in 0..3 {
            device.write_memory(0x4020, 0, &[1, 2]).expect("write fits");
        }
        assert_eq!(device.region(0x4020), Some(vec![1, 2, 0, 0]));
        assert!(device.writes().is_empty());
    }

    #[test]
    fn injected_faults_surface_their_code() {
        let device = MemoryTransport::with_write_log();
        device.set_region(1, vec![0; 8]);
        device.fail_read_at(1, 4, 0x745);
        device.fail_write_at(1, 0, 0x746);
        device.set_fetch_failure(Some(ADSERR_DEVICE_INVALIDDATA));

        assert_eq!(device.read_memory(1, 4, 1), Err(TransportError::new(0x745)));
        assert_eq!(device.write_memory(1, 0, &[1]), Err(TransportError::new(0x746)));
        assert!(device.fetch_type_catalog_blob().is_err());
        assert_eq!(device.fetch_count(), 1);
        assert!(device.writes().is_empty());
    }

    #[test]
    fn handles_must_be_registered() {
        let device = MemoryTransport::new();
        device.set_handle("MAIN.counter", 0x1234);
        assert_eq!(device.resolve_handle("MAIN.counter"), Ok(0x1234));
        assert_eq!(
            device.resolve_handle("MAIN.missing"),
            Err(TransportError::new(ADSERR_DEVICE_SYMBOLNOTFOUND))
        );
    }
}
