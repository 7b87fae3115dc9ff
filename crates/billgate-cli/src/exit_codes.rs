//! Process exit codes. Upstream failures reuse `UpstreamError::exit_code`.

pub const SUCCESS: i32 = 0;
pub const BUSINESS_FAILURE: i32 = 1; // Upstream answered with RC != "00"
pub const CONFIG_ERROR: i32 = 2; // Bad config, bad arguments or invalid request
pub const CACHE_ERROR: i32 = 7; // Cache backend unavailable
