/* ADS status codes surfaced by the reflection runtime.
 *
 * Transport failures carry whatever code the device returned; locally detected
 * problems are collapsed onto the fixed sentinels below. */

/// No error.
pub const ADSERR_NOERR: u32 = 0x000;

/// Generic device error base.
pub const ADSERR_DEVICE_ERROR: u32 = 0x700;

/// Service is not supported by the server.
pub const ADSERR_DEVICE_SRVNOTSUPP: u32 = 0x701;

/// Invalid index group.
pub const ADSERR_DEVICE_INVALIDGRP: u32 = 0x702;

/// Invalid index offset.
pub const ADSERR_DEVICE_INVALIDOFFSET: u32 = 0x703;

/// Parameter size not correct.
pub const ADSERR_DEVICE_INVALIDSIZE: u32 = 0x705;

/// Invalid data values. Used as the sentinel for every locally detected
/// data failure (malformed blob, unresolvable type, JSON/tag mismatch).
pub const ADSERR_DEVICE_INVALIDDATA: u32 = 0x706;

/// Symbol not found.
pub const ADSERR_DEVICE_SYMBOLNOTFOUND: u32 = 0x710;

/// Returns a short human readable label for the well-known codes above.
pub fn describe_code(code: u32) -> &'static str {
    match code {
        ADSERR_NOERR => "no error",
        ADSERR_DEVICE_ERROR => "device error",
        ADSERR_DEVICE_SRVNOTSUPP => "service not supported",
        ADSERR_DEVICE_INVALIDGRP => "invalid index group",
        ADSERR_DEVICE_INVALIDOFFSET => "invalid index offset",
        ADSERR_DEVICE_INVALIDSIZE => "invalid size",
        ADSERR_DEVICE_INVALIDDATA => "invalid data",
        ADSERR_DEVICE_SYMBOLNOTFOUND => "symbol not found",
        _ => "unknown ADS error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_data_sentinel_matches_device_range() {
        assert_eq!(ADSERR_DEVICE_INVALIDDATA, 1798);
        assert_eq!(describe_code(ADSERR_DEVICE_INVALIDDATA), "invalid data");
        assert_eq!(describe_code(0x1234), "unknown ADS error");
    }
}
