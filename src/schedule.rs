//! Schedule model and validation.
//!
//! A [`Schedule`] is either a one-shot instant or five [`FieldSet`]s,
//! one per calendar field. Field semantics are local wall-clock time;
//! one-shot instants are UTC.

use crate::clock::Instant;
use crate::error::SchedError;
use crate::field::FieldSet;
use crate::Result;

/// A specification of a set of wall-clock instants.
///
/// Recurring schedules fire whenever the local minute, hour and month
/// all match and the day passes the day rule (day-of-month or
/// day-of-week, union when both are constrained). One-shot schedules
/// fire at exactly one stored UTC instant.
///
/// # Examples
///
/// ```rust
/// use sched_tab::Schedule;
///
/// // 09:30 local, every day.
/// let daily = Schedule::daily_at_local(9, 30);
/// assert!(daily.validate().is_ok());
///
/// // 18:30 local, Monday through Friday (bit 0 = Sunday).
/// let weekdays = Schedule::weekly_at_local(0b0111110, 18, 30);
/// assert!(weekdays.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    /// Minute of the hour, `0..=59`.
    pub minute: FieldSet,
    /// Hour of the day, `0..=23`.
    pub hour: FieldSet,
    /// Day of the month, `1..=31`.
    pub day_of_month: FieldSet,
    /// Month of the year, `1..=12`.
    pub month: FieldSet,
    /// Day of the week, `0` = Sunday through `6` = Saturday.
    pub day_of_week: FieldSet,
    once_at_utc: Option<Instant>,
}

impl Default for Schedule {
    /// An all-`any` recurring schedule: fires every minute.
    fn default() -> Schedule {
        Schedule {
            minute: FieldSet::any(),
            hour: FieldSet::any(),
            day_of_month: FieldSet::any(),
            month: FieldSet::any(),
            day_of_week: FieldSet::any(),
            once_at_utc: None,
        }
    }
}

impl Schedule {
    /// A one-shot schedule firing at the given UTC instant.
    pub fn once_utc(when_utc: Instant) -> Schedule {
        Schedule {
            once_at_utc: Some(when_utc),
            ..Schedule::default()
        }
    }

    /// Every day at `hour:minute` local time.
    pub fn daily_at_local(hour: i32, minute: i32) -> Schedule {
        Schedule {
            minute: FieldSet::only(minute),
            hour: FieldSet::only(hour),
            ..Schedule::default()
        }
    }

    /// Selected weekdays at `hour:minute` local time.
    ///
    /// `dow_mask` bit `i` selects weekday `i` (`0` = Sunday through
    /// `6` = Saturday). An empty mask degrades to any day of week.
    pub fn weekly_at_local(dow_mask: u8, hour: i32, minute: i32) -> Schedule {
        let days: Vec<i32> = (0..7).filter(|day| dow_mask & (1 << day) != 0).collect();
        let day_of_week = if days.is_empty() {
            FieldSet::any()
        } else {
            FieldSet::list(&days)
        };
        Schedule {
            minute: FieldSet::only(minute),
            hour: FieldSet::only(hour),
            day_of_week,
            ..Schedule::default()
        }
    }

    /// One day each month at `hour:minute` local time. The day is
    /// clamped to `1..=31`.
    pub fn monthly_on_day_local(day_of_month: i32, hour: i32, minute: i32) -> Schedule {
        Schedule {
            minute: FieldSet::only(minute),
            hour: FieldSet::only(hour),
            day_of_month: FieldSet::only(day_of_month.clamp(1, 31)),
            ..Schedule::default()
        }
    }

    /// Raw construction from five field sets.
    pub fn custom(
        minute: FieldSet,
        hour: FieldSet,
        day_of_month: FieldSet,
        month: FieldSet,
        day_of_week: FieldSet,
    ) -> Schedule {
        Schedule {
            minute,
            hour,
            day_of_month,
            month,
            day_of_week,
            once_at_utc: None,
        }
    }

    /// Whether this schedule fires exactly once.
    pub fn is_one_shot(&self) -> bool {
        self.once_at_utc.is_some()
    }

    /// The stored instant of a one-shot schedule.
    pub fn once_at_utc(&self) -> Option<Instant> {
        self.once_at_utc
    }

    /// Checks that every field holds at least one value inside its
    /// legal range. One-shot schedules are always valid.
    pub fn validate(&self) -> Result<()> {
        if self.is_one_shot() {
            return Ok(());
        }
        let checks: [(&FieldSet, i32, i32, &'static str); 5] = [
            (&self.minute, 0, 59, "minute"),
            (&self.hour, 0, 23, "hour"),
            (&self.day_of_month, 1, 31, "day-of-month"),
            (&self.month, 1, 12, "month"),
            (&self.day_of_week, 0, 6, "day-of-week"),
        ];
        for (field, min, max, name) in checks {
            if !field_within_range(field, min, max) {
                return Err(SchedError::InvalidSchedule(name));
            }
        }
        Ok(())
    }
}

fn field_within_range(field: &FieldSet, min: i32, max: i32) -> bool {
    if field.is_any() {
        return true;
    }
    let mask = field.raw_mask();
    mask != 0 && mask & allowed_mask(min, max) != 0
}

fn allowed_mask(min: i32, max: i32) -> u64 {
    let min = min.max(0);
    let max = max.min(63);
    if max >= 63 {
        return u64::MAX;
    }
    let upper = (1u64 << (max + 1)) - 1;
    let lower = if min == 0 { 0 } else { (1u64 << min) - 1 };
    upper & !lower
}
