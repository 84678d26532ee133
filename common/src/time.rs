// Time types used across the relay.
//
// Everything here reads the system clock and is therefore only suitable for
// TTL management (quotes, anti-replay slots, locks), cache freshness,
// velocity buckets and logging. Nothing in the relay derives on-chain
// semantics from local time.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Millis timestamps used to determine it using its type
pub type TimestampMillis = u64;

// Seconds timestamps used to determine it using its type
pub type TimestampSeconds = u64;

#[inline]
pub fn get_current_time() -> Duration {
    let start = SystemTime::now();

    start
        .duration_since(UNIX_EPOCH)
        .expect("Incorrect time returned from get_current_time")
}

// Return timestamp in seconds
pub fn get_current_time_in_seconds() -> TimestampSeconds {
    get_current_time().as_secs()
}

// Return timestamp in milliseconds
// We cast it to u64 as we have plenty of time before it overflows
pub fn get_current_time_in_millis() -> TimestampMillis {
    get_current_time().as_millis() as TimestampMillis
}

// Current minute index since the epoch, used for velocity buckets
pub fn get_current_minute() -> u64 {
    get_current_time_in_seconds() / 60
}

// UTC day key in YYYY-MM-DD form for daily aggregates
pub fn current_day_key() -> String {
    day_key_for(get_current_time_in_seconds())
}

// Civil date from a unix timestamp, days-from-epoch algorithm
pub fn day_key_for(timestamp: TimestampSeconds) -> String {
    let days = (timestamp / 86_400) as i64;
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    format!("{:04}-{:02}-{:02}", y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_key_known_dates() {
        assert_eq!(day_key_for(0), "1970-01-01");
        assert_eq!(day_key_for(86_400), "1970-01-02");
        // 2026-08-01T00:00:00Z
        assert_eq!(day_key_for(1_785_542_400), "2026-08-01");
    }

    #[test]
    fn test_minute_bucket_is_stable_within_minute() {
        let ts = 1_785_542_400u64;
        assert_eq!(ts / 60, (ts + 59) / 60);
        assert_ne!(ts / 60, (ts + 60) / 60);
    }
}
