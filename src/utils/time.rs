// Time helpers for the Asia/Tokyo reference timezone
// Japan does not observe DST, so a fixed +09:00 offset is exact.

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Timelike, Utc};

const JST_OFFSET_SECONDS: i32 = 9 * 3600;

/// The fixed Asia/Tokyo offset
pub fn tokyo() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECONDS).expect("valid JST offset")
}

/// Current instant as epoch milliseconds
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Wall-clock time of day in Tokyo for a given instant
pub fn tokyo_time_of_day(now: DateTime<Utc>) -> NaiveTime {
    now.with_timezone(&tokyo()).time()
}

/// Normalize an epoch-milliseconds instant to the start of its Tokyo day
pub fn start_of_day_ms(epoch_ms: i64) -> i64 {
    // A fixed offset never yields an ambiguous local time
    let Some(local) = tokyo().timestamp_millis_opt(epoch_ms).single() else {
        return epoch_ms;
    };
    let start = local
        .with_hour(0)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(local);
    start.timestamp_millis()
}

/// Normalize an epoch-milliseconds instant to the end of its Tokyo day
/// (23:59:59.999 local)
pub fn end_of_day_ms(epoch_ms: i64) -> i64 {
    start_of_day_ms(epoch_ms) + 24 * 3600 * 1000 - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_tokyo_time_of_day() {
        // 2025-03-01 01:00 UTC is 10:00 in Tokyo
        let utc = Utc
            .with_ymd_and_hms(2025, 3, 1, 1, 0, 0)
            .single()
            .expect("valid datetime");
        assert_eq!(
            tokyo_time_of_day(utc),
            NaiveTime::from_hms_opt(10, 0, 0).expect("valid time")
        );
    }

    #[test]
    fn test_day_normalization_brackets_a_full_tokyo_day() {
        // 2025-03-01 12:34:56 JST
        let instant = tokyo()
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2025, 3, 1)
                    .expect("valid date")
                    .and_hms_opt(12, 34, 56)
                    .expect("valid time"),
            )
            .single()
            .expect("unambiguous")
            .timestamp_millis();

        let start = start_of_day_ms(instant);
        let end = end_of_day_ms(instant);

        assert_eq!(end - start, 24 * 3600 * 1000 - 1);

        let start_local = tokyo().timestamp_millis_opt(start).single().expect("valid");
        assert_eq!(start_local.time(), NaiveTime::MIN);
        assert_eq!(
            start_local.date_naive(),
            NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date")
        );
    }

    #[test]
    fn test_normalization_is_idempotent_within_the_day() {
        let base = 1_740_800_000_000; // arbitrary instant
        let start = start_of_day_ms(base);
        assert_eq!(start_of_day_ms(start), start);
        assert_eq!(start_of_day_ms(end_of_day_ms(base)), start);
    }
}
