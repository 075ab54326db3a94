//! "Next occurrence after T" search.

use crate::clock::{Calendar, Instant};
use crate::schedule::Schedule;
use crate::MAX_SEARCH_MINUTES;

/// Finds the earliest instant at or after `from_utc` matching
/// `schedule`, or `None` when nothing matches within
/// [`MAX_SEARCH_MINUTES`](crate::MAX_SEARCH_MINUTES), one leap year of
/// minutes. A rule satisfiable only beyond that horizon, such as a
/// Feb 29 schedule evaluated from March of a leap year, reports
/// exhaustion.
///
/// One-shot schedules return their stored instant unchanged, even when
/// it lies before `from_utc`.
///
/// Field matching happens in the calendar's local time; the returned
/// instant is UTC. The hour and minute are derived from
/// minutes-into-local-day rather than the wall clock, so days
/// stretched or shrunk by DST are walked linearly.
pub fn next_occurrence<C>(calendar: &C, schedule: &Schedule, from_utc: Instant) -> Option<Instant>
where
    C: Calendar + ?Sized,
{
    if let Some(once) = schedule.once_at_utc() {
        return Some(once);
    }

    // Recurrence resolves to whole minutes: round up to the next
    // minute boundary before scanning.
    let mut cursor = from_utc;
    if cursor.second_of_minute() != 0 {
        cursor = calendar.add_minutes(cursor, 1);
    }
    cursor = cursor.truncate_to_minute();

    for _ in 0..MAX_SEARCH_MINUTES {
        let month = calendar.month_local(cursor) as i32;
        let day = calendar.day_local(cursor) as i32;
        let weekday = calendar.weekday_local(cursor) as i32;

        let start_of_day = calendar.start_of_day_local(cursor);
        let minutes_into_day = calendar.difference_in_minutes(cursor, start_of_day);
        if minutes_into_day < 0 {
            // Provider quirk around day boundaries; step past it.
            cursor = calendar.add_minutes(cursor, 1);
            continue;
        }
        let hour = (minutes_into_day / 60) as i32;
        let minute = (minutes_into_day % 60) as i32;

        let dom_any = schedule.day_of_month.is_any();
        let dow_any = schedule.day_of_week.is_any();
        // Classical cron day rule: with both day fields constrained,
        // either one matching selects the day.
        let day_ok = match (dom_any, dow_any) {
            (true, true) => true,
            (true, false) => schedule.day_of_week.matches(weekday),
            (false, true) => schedule.day_of_month.matches(day),
            (false, false) => {
                schedule.day_of_month.matches(day) || schedule.day_of_week.matches(weekday)
            }
        };

        if schedule.month.matches(month)
            && schedule.hour.matches(hour)
            && schedule.minute.matches(minute)
            && day_ok
        {
            return Some(calendar.set_time_of_day_local(cursor, hour as u32, minute as u32, 0));
        }
        cursor = calendar.add_minutes(cursor, 1);
    }
    None
}
