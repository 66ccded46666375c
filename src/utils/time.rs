use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Wall clock milliseconds since the Unix epoch; 0 if the clock is before it
pub fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
