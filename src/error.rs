//! Error types for the scheduler.
//!
//! Every failure is surfaced as a value; nothing in the library panics
//! on user input.

use std::io;

use thiserror;

/// Errors that can occur when registering jobs.
///
/// # Examples
///
/// ```rust
/// use chrono::Utc;
/// use sched_tab::{FieldSet, JobMode, SchedError, Schedule, Scheduler, ZonedCalendar};
///
/// let scheduler = Scheduler::new(ZonedCalendar::new(Utc));
///
/// // Minute 60 does not exist, so the schedule is rejected.
/// let bad = Schedule::custom(
///     FieldSet::only(60),
///     FieldSet::any(),
///     FieldSet::any(),
///     FieldSet::any(),
///     FieldSet::any(),
/// );
/// match scheduler.add_job(bad, JobMode::Inline, || {}) {
///     Err(SchedError::InvalidSchedule(field)) => assert_eq!(field, "minute"),
///     other => panic!("expected InvalidSchedule, got {other:?}"),
/// }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum SchedError {
    /// A recurring schedule constrains a field to values entirely
    /// outside the field's legal range, so it could never fire. The
    /// payload names the offending field.
    #[error("invalid schedule: no usable value in the {0} field")]
    InvalidSchedule(&'static str),

    /// The platform refused to create a worker thread. The job was not
    /// registered and its context has been released.
    #[error("worker thread creation failed: {0}")]
    Spawn(#[from] io::Error),
}
