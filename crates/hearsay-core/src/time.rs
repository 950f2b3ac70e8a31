// crates/hearsay-core/src/time.rs
//
// Wall-clock helpers. Assertions carry whole seconds, everything on the wire
// and in the in-memory caches uses epoch milliseconds.

use chrono::Utc;

/// Current time as whole seconds since the Unix epoch.
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Current time as milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
