//! Time utilities for the wallet.
//!
//! Ledger records use Unix epoch microseconds (u64); credential documents
//! use RFC 3339 timestamps via `chrono`.

use chrono::{DateTime, SubsecRound, Utc};

/// Return the current time as microseconds since Unix epoch.
pub fn now_micros() -> u64 {
    Utc::now().timestamp_micros().max(0) as u64
}

/// Current UTC time truncated to whole seconds, as written into credentials.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Convert microseconds to an RFC 3339 string.
pub fn micros_to_rfc3339(micros: u64) -> String {
    let secs = (micros / 1_000_000) as i64;
    let nsecs = ((micros % 1_000_000) * 1000) as u32;
    let dt = DateTime::from_timestamp(secs, nsecs).unwrap_or(DateTime::UNIX_EPOCH);
    dt.to_rfc3339()
}
