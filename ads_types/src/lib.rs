//! ADS Type Definitions
//!
//! This crate contains the data definitions shared by the ADS reflection
//! runtime: wire data-type tags, status codes, and the unresolved catalog
//! records (symbols and type nodes) exactly as a controller publishes them.
//! It holds no I/O and no decoding logic.

pub mod codes;
pub mod types;

// Re-export commonly used types at the crate root
pub use codes::*;
pub use types::*;
