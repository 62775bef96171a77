/* ADS Reflection Library
 *
 * This library discovers a controller's variables and their data types from
 * the two metadata uploads, resolves those types into self-contained trees,
 * and marshals live memory to and from JSON using them.
 */

pub mod blob;
pub mod bridge;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod errors;
pub mod refresher;
pub mod resolve;
pub mod transport;

pub use blob::{parse_symbols, parse_types, BlobWriter, ParseOutcome, UploadInfo};
pub use bridge::SymbolBridge;
pub use catalog::{Catalog, CatalogStore};
pub use codec::{decode, encode, Decoded};
pub use config::{BridgeConfig, CodecConfig, RefresherConfig};
pub use errors::*;
pub use refresher::{CatalogRefresher, RefresherHandle};
pub use resolve::{ResolvedKind, ResolvedType, TypeResolver};
pub use transport::{CatalogBlob, MemoryTransport, Transport};
