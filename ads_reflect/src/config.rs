/* Runtime configuration for the bridge core */

use serde::{Deserialize, Serialize};
use std::time::Duration;

/* Text leaves are never read beyond this many bytes */
pub const DEFAULT_MAX_TEXT_BYTES: u32 = 255;

/* Deepest alias/struct nesting the resolver follows before giving up */
pub const DEFAULT_MAX_RESOLVE_DEPTH: usize = 64;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5;

/* Largest raw (untyped) read the bridge serves */
pub const DEFAULT_MAX_RAW_READ: u32 = 255;

/* Limits applied while resolving and marshalling values */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CodecConfig {
    pub max_text_bytes: u32,
    pub max_resolve_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_text_bytes: DEFAULT_MAX_TEXT_BYTES,
            max_resolve_depth: DEFAULT_MAX_RESOLVE_DEPTH,
        }
    }
}

/* Periodic catalog refresh settings */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RefresherConfig {
    pub interval_millis: u64,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            interval_millis: DEFAULT_REFRESH_INTERVAL_SECS * 1000,
        }
    }
}

impl RefresherConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval_millis: interval.as_millis() as u64,
        }
    }

    pub fn interval(&self) -> Duration {
        /* tokio's interval panics on a zero period */
        Duration::from_millis(self.interval_millis.max(1))
    }
}

/* Top-level bridge configuration */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BridgeConfig {
    pub codec: CodecConfig,
    pub refresher: RefresherConfig,
    pub max_raw_read: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            codec: CodecConfig::default(),
            refresher: RefresherConfig::default(),
            max_raw_read: DEFAULT_MAX_RAW_READ,
        }
    }
}

impl BridgeConfig {
    /* Parse a JSON config document; missing keys fall back to defaults */
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
