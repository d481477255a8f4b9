use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use merit_core::{MeritError, MeritResult, BUCKETS_PER_YEAR};

/// Spacing between bucket boundaries in days. 52 buckets of 7.05 days span
/// 366.6 days, so the first boundary is pulled back one day and the last one
/// lands just past New Year.
pub const BUCKET_SPACING_DAYS: f64 = 7.05;

/// Half-open date window `[start, end)` covered by one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketWindow {
    pub bucket: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BucketWindow {
    #[inline]
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts < self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Maps weekly buckets of one calendar year to date windows.
#[derive(Debug, Clone, Copy)]
pub struct BucketCalendar {
    year: i32,
    jan1: NaiveDateTime,
}

impl BucketCalendar {
    pub fn new(year: i32) -> MeritResult<Self> {
        let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| MeritError::Config(format!("year {year} is out of range")))?
            .and_time(NaiveTime::MIN);
        Ok(Self { year, jan1 })
    }

    /// Calendar for the year containing `ts`.
    pub fn for_timestamp(ts: NaiveDateTime) -> MeritResult<Self> {
        Self::new(ts.year())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn is_leap_year(&self) -> bool {
        NaiveDate::from_ymd_opt(self.year, 2, 29).is_some()
    }

    /// Window for bucket `t` (1-based).
    ///
    /// In a leap year the final bucket is stretched by one day so it still
    /// reaches the end of December.
    pub fn window(&self, bucket: usize) -> MeritResult<BucketWindow> {
        if !(1..=BUCKETS_PER_YEAR).contains(&bucket) {
            return Err(MeritError::Config(format!(
                "bucket {bucket} outside 1..={BUCKETS_PER_YEAR}"
            )));
        }
        let t = bucket as f64;
        let start = self.midnight_of(BUCKET_SPACING_DAYS * (t - 1.0) - 1.0);
        let end = if self.is_leap_year() && bucket == BUCKETS_PER_YEAR {
            self.midnight_of(BUCKET_SPACING_DAYS * t)
        } else {
            self.midnight_of(BUCKET_SPACING_DAYS * t - 1.0)
        };
        Ok(BucketWindow { bucket, start, end })
    }

    pub fn windows(&self) -> impl Iterator<Item = BucketWindow> + '_ {
        (1..=BUCKETS_PER_YEAR).filter_map(move |t| self.window(t).ok())
    }

    /// Bucket whose window contains `ts`, if any.
    pub fn bucket_of(&self, ts: NaiveDateTime) -> Option<usize> {
        self.windows().find(|w| w.contains(ts)).map(|w| w.bucket)
    }

    // Midnight starting the day that lies `days` (fractional) after Jan 1.
    fn midnight_of(&self, days: f64) -> NaiveDateTime {
        let seconds = (days * 86_400.0).round() as i64;
        (self.jan1 + Duration::seconds(seconds))
            .date()
            .and_time(NaiveTime::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(NaiveTime::MIN)
    }

    #[test]
    fn first_bucket_starts_on_new_years_eve() {
        let cal = BucketCalendar::new(2017).unwrap();
        let w = cal.window(1).unwrap();
        assert_eq!(w.start, midnight(2016, 12, 31));
        assert_eq!(w.end, midnight(2017, 1, 7));
    }

    #[test]
    fn leap_year_final_bucket_is_one_day_longer() {
        let common = BucketCalendar::new(2015).unwrap().window(52).unwrap();
        let leap = BucketCalendar::new(2016).unwrap().window(52).unwrap();
        assert_eq!(leap.days(), common.days() + 1);
        assert_eq!(common.end, midnight(2016, 1, 1));
        assert_eq!(leap.end, midnight(2017, 1, 1));
    }

    #[test]
    fn century_years_follow_gregorian_rule() {
        assert!(!BucketCalendar::new(2100).unwrap().is_leap_year());
        assert!(BucketCalendar::new(2000).unwrap().is_leap_year());
    }

    #[test]
    fn windows_are_contiguous_and_cover_the_year() {
        for year in [2015, 2016] {
            let cal = BucketCalendar::new(year).unwrap();
            let windows: Vec<_> = cal.windows().collect();
            assert_eq!(windows.len(), 52);
            for pair in windows.windows(2) {
                assert_eq!(pair[0].end, pair[1].start, "gap after bucket {}", pair[0].bucket);
            }
            assert!(windows[0].start <= midnight(year, 1, 1));
            assert!(windows[51].end >= midnight(year + 1, 1, 1));
        }
    }

    #[test]
    fn fractional_offsets_truncate_to_their_own_day() {
        let cal = BucketCalendar::new(2018).unwrap();
        // Bucket 2 spans offsets 6.05 to 13.1 days from Jan 1.
        let w = cal.window(2).unwrap();
        assert_eq!(w.start, midnight(2018, 1, 7));
        assert_eq!(w.end, midnight(2018, 1, 14));
        for window in cal.windows() {
            assert_eq!(window.start.time(), NaiveTime::MIN);
            assert_eq!(window.end.time(), NaiveTime::MIN);
        }
    }

    #[test]
    fn calendar_follows_the_timestamp_year() {
        let ts = midnight(2016, 7, 4) + Duration::hours(13);
        let cal = BucketCalendar::for_timestamp(ts).unwrap();
        assert_eq!(cal.year(), 2016);
        assert!(cal.is_leap_year());
    }

    #[test]
    fn bucket_lookup() {
        let cal = BucketCalendar::new(2018).unwrap();
        assert_eq!(cal.bucket_of(midnight(2018, 1, 3)), Some(1));
        assert_eq!(cal.bucket_of(midnight(2018, 12, 31)), Some(52));
        assert!(cal.window(53).is_err());
        assert!(cal.window(0).is_err());
    }
}
