//! Time-related utilities with clock abstraction for testability.
//!
//! Timestamps are Unix epoch milliseconds. Calendar questions ("is this game
//! today?") are answered in a fixed zone offset, the server's configured
//! timezone (UTC+9 unless configured otherwise).

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// Default zone offset of the service, in hours east of UTC (KST/JST).
pub const DEFAULT_ZONE_OFFSET_HOURS: i32 = 9;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get current Unix timestamp (milliseconds)
    fn now_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        current_timestamp()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_time
    }
}

/// Clock that only moves when told to. Used to drive TTL expiry in tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn advance_millis(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set_millis(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Get current Unix timestamp (milliseconds)
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

/// Build a zone offset from whole hours east of UTC, falling back to UTC for
/// out-of-range values.
pub fn zone_offset(hours_east: i32) -> FixedOffset {
    FixedOffset::east_opt(hours_east * 3600).unwrap_or_else(|| Utc.fix())
}

/// Calendar date of a timestamp in the given zone.
pub fn local_date(timestamp_millis: i64, offset: FixedOffset) -> NaiveDate {
    DateTime::from_timestamp_millis(timestamp_millis)
        .unwrap_or_default()
        .with_timezone(&offset)
        .date_naive()
}

/// Index of the one-minute bucket a timestamp falls into.
pub fn minute_bucket(timestamp_millis: i64) -> i64 {
    timestamp_millis.div_euclid(MILLIS_PER_MINUTE)
}

/// Convert Unix timestamp (milliseconds) to RFC 3339 format in the given zone
pub fn timestamp_to_rfc3339(timestamp_millis: i64, offset: FixedOffset) -> String {
    DateTime::from_timestamp_millis(timestamp_millis)
        .unwrap_or_default()
        .with_timezone(&offset)
        .to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_returns_non_zero_timestamp() {
        // テスト項目: SystemClock が 0 以外のタイムスタンプを返す
        // given (前提条件):
        let clock = SystemClock;

        // when (操作):
        let timestamp = clock.now_millis();

        // then (期待する結果):
        assert!(timestamp > 0);
    }

    #[test]
    fn test_fixed_clock_returns_fixed_timestamp() {
        // テスト項目: FixedClock が固定されたタイムスタンプを返す
        // given (前提条件):
        let fixed_time = 1234567890123;
        let clock = FixedClock::new(fixed_time);

        // when (操作):
        let timestamp1 = clock.now_millis();
        let timestamp2 = clock.now_millis();

        // then (期待する結果):
        assert_eq!(timestamp1, fixed_time);
        assert_eq!(timestamp2, fixed_time);
    }

    #[test]
    fn test_manual_clock_advances_only_on_request() {
        // テスト項目: ManualClock は advance_millis で指定した分だけ進む
        // given (前提条件):
        let clock = ManualClock::new(1_000);

        // when (操作):
        clock.advance_millis(59_000);

        // then (期待する結果):
        assert_eq!(clock.now_millis(), 60_000);
    }

    #[test]
    fn test_local_date_crosses_midnight_in_zone() {
        // テスト項目: UTC では前日でも UTC+9 では翌日の日付になる
        // given (前提条件):
        // 2023-01-01 15:30:00 UTC == 2023-01-02 00:30:00 +09:00
        let timestamp = 1672587000000;

        // when (操作):
        let utc_date = local_date(timestamp, zone_offset(0));
        let kst_date = local_date(timestamp, zone_offset(9));

        // then (期待する結果):
        assert_eq!(utc_date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(kst_date, NaiveDate::from_ymd_opt(2023, 1, 2).unwrap());
    }

    #[test]
    fn test_minute_bucket_groups_same_minute() {
        // テスト項目: 同じ分に属するタイムスタンプは同じバケットになる
        // given (前提条件):
        let start = 1672498800000;

        // when (操作):
        let a = minute_bucket(start);
        let b = minute_bucket(start + 59_999);
        let c = minute_bucket(start + 60_000);

        // then (期待する結果):
        assert_eq!(a, b);
        assert_eq!(c, a + 1);
    }

    #[test]
    fn test_timestamp_to_rfc3339_format() {
        // テスト項目: タイムスタンプが正しく RFC 3339 形式に変換される
        // given (前提条件):
        // 2023-01-01 00:00:00 +09:00 in milliseconds
        let timestamp = 1672498800000;

        // when (操作):
        let result = timestamp_to_rfc3339(timestamp, zone_offset(DEFAULT_ZONE_OFFSET_HOURS));

        // then (期待する結果):
        assert!(result.starts_with("2023-01-01T00:00:00"));
        assert!(result.contains("+09:00"));
    }

    #[test]
    fn test_zone_offset_out_of_range_falls_back_to_utc() {
        // テスト項目: 範囲外のオフセットは UTC にフォールバックする
        // when (操作):
        let offset = zone_offset(48);

        // then (期待する結果):
        assert_eq!(offset.local_minus_utc(), 0);
    }
}
