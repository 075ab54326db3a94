//! Wall-clock provider.
//!
//! The scheduler stores instants as UTC epoch seconds, which keeps
//! equality and ordering trivial, and matches schedule fields against
//! broken-down *local* time. The [`Calendar`] trait is the seam
//! between the two: an implementation supplies "now" and the
//! local-time views, while everything that is plain epoch arithmetic
//! ships as provided methods. [`ZonedCalendar`] is the chrono-backed
//! implementation used in practice.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// A point in time, stored as UTC epoch seconds.
///
/// # Examples
///
/// ```rust
/// use chrono::Utc;
/// use sched_tab::{Calendar, Instant, ZonedCalendar};
///
/// let calendar = ZonedCalendar::new(Utc);
/// let t = calendar.from_utc(2020, 1, 1, 0, 0, 0).unwrap();
/// assert_eq!(t, Instant::from_epoch_seconds(1_577_836_800));
/// assert_eq!(t.to_string(), "2020-01-01T00:00:00Z");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Instant {
    /// Seconds since 1970-01-01T00:00:00Z.
    pub epoch_seconds: i64,
}

impl Instant {
    /// Builds an instant from raw epoch seconds.
    pub fn from_epoch_seconds(epoch_seconds: i64) -> Instant {
        Instant { epoch_seconds }
    }

    /// Seconds past the current UTC minute, `0..=59`.
    pub fn second_of_minute(&self) -> i64 {
        self.epoch_seconds.rem_euclid(60)
    }

    /// This instant with the seconds-of-minute cleared.
    pub fn truncate_to_minute(&self) -> Instant {
        Instant::from_epoch_seconds(self.epoch_seconds - self.second_of_minute())
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::from_timestamp(self.epoch_seconds, 0) {
            Some(utc) => write!(f, "{}", utc.format("%Y-%m-%dT%H:%M:%SZ")),
            None => write!(f, "@{}", self.epoch_seconds),
        }
    }
}

/// Wall-clock collaborator consumed by the scheduler.
///
/// Required methods cover the current time and the local-time views
/// the occurrence search needs; the rest is epoch arithmetic provided
/// with default bodies. Implementations decide what "local" means.
pub trait Calendar {
    /// Current wall-clock time.
    fn now(&self) -> Instant;

    /// Local midnight of the day containing `t`.
    fn start_of_day_local(&self, t: Instant) -> Instant;

    /// `t` re-stamped to the given local time of day.
    fn set_time_of_day_local(&self, t: Instant, hour: u32, minute: u32, second: u32) -> Instant;

    /// Local month, `1..=12`.
    fn month_local(&self, t: Instant) -> u32;

    /// Local day of month, `1..=31`.
    fn day_local(&self, t: Instant) -> u32;

    /// Local weekday, `0` = Sunday through `6` = Saturday.
    fn weekday_local(&self, t: Instant) -> u32;

    /// Builds an instant from broken-down UTC fields, or `None` when
    /// the fields name no real date.
    fn from_utc(
        &self,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Option<Instant> {
        let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
        Some(Instant::from_epoch_seconds(naive.and_utc().timestamp()))
    }

    /// `t` shifted by whole minutes.
    fn add_minutes(&self, t: Instant, minutes: i64) -> Instant {
        Instant::from_epoch_seconds(t.epoch_seconds + minutes * 60)
    }

    /// `a - b` in whole minutes, truncated toward zero.
    fn difference_in_minutes(&self, a: Instant, b: Instant) -> i64 {
        (a.epoch_seconds - b.epoch_seconds) / 60
    }

    /// `a - b` in seconds.
    fn difference_in_seconds(&self, a: Instant, b: Instant) -> i64 {
        a.epoch_seconds - b.epoch_seconds
    }

    /// Strict `a > b`.
    fn is_after(&self, a: Instant, b: Instant) -> bool {
        a.epoch_seconds > b.epoch_seconds
    }

    /// `a == b`.
    fn is_equal(&self, a: Instant, b: Instant) -> bool {
        a.epoch_seconds == b.epoch_seconds
    }
}

/// Chrono-backed [`Calendar`] whose local side is the timezone it is
/// built with.
///
/// # Examples
///
/// ```rust
/// use chrono::{FixedOffset, Utc};
/// use sched_tab::{Calendar, ZonedCalendar};
///
/// let utc = ZonedCalendar::new(Utc);
/// let hanoi = ZonedCalendar::new(FixedOffset::east_opt(7 * 3600).unwrap());
///
/// let t = utc.from_utc(2025, 1, 1, 20, 0, 0).unwrap();
/// assert_eq!(utc.day_local(t), 1);
/// assert_eq!(hanoi.day_local(t), 2); // 03:00 on Jan 2 at UTC+7
/// ```
#[derive(Debug, Clone)]
pub struct ZonedCalendar<Z>
where
    Z: TimeZone,
{
    tz: Z,
}

impl<Z> ZonedCalendar<Z>
where
    Z: TimeZone,
{
    /// Creates a calendar whose local time is `tz`.
    pub fn new(tz: Z) -> ZonedCalendar<Z> {
        ZonedCalendar { tz }
    }

    fn local(&self, t: Instant) -> DateTime<Z> {
        DateTime::from_timestamp(t.epoch_seconds, 0)
            .unwrap_or(DateTime::UNIX_EPOCH)
            .with_timezone(&self.tz)
    }

    /// Maps a naive local time onto the timeline. DST folds resolve to
    /// the earliest mapping; gaps retry one hour later.
    fn resolve_local(&self, naive: NaiveDateTime) -> Option<DateTime<Z>> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => self
                .tz
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest(),
        }
    }

    fn restamp(&self, t: Instant, hour: u32, minute: u32, second: u32) -> Instant {
        self.local(t)
            .date_naive()
            .and_hms_opt(hour, minute, second)
            .and_then(|naive| self.resolve_local(naive))
            .map(|dt| Instant::from_epoch_seconds(dt.timestamp()))
            .unwrap_or(t)
    }
}

impl<Z> Calendar for ZonedCalendar<Z>
where
    Z: TimeZone,
{
    fn now(&self) -> Instant {
        Instant::from_epoch_seconds(Utc::now().timestamp())
    }

    fn start_of_day_local(&self, t: Instant) -> Instant {
        self.restamp(t, 0, 0, 0)
    }

    fn set_time_of_day_local(&self, t: Instant, hour: u32, minute: u32, second: u32) -> Instant {
        self.restamp(t, hour, minute, second)
    }

    fn month_local(&self, t: Instant) -> u32 {
        self.local(t).month()
    }

    fn day_local(&self, t: Instant) -> u32 {
        self.local(t).day()
    }

    fn weekday_local(&self, t: Instant) -> u32 {
        self.local(t).weekday().num_days_from_sunday()
    }
}
