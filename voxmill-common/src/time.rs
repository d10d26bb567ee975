//! Timestamp utilities

use chrono::{DateTime, Local, Utc};

/// Format used for job creation stamps (`YYYY-MM-DD HH:MM:SS`)
pub const JOB_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current local wall-clock time formatted as `YYYY-MM-DD HH:MM:SS`
pub fn local_timestamp() -> String {
    Local::now().format(JOB_TIMESTAMP_FORMAT).to_string()
}
