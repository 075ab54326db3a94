//! # sched_tab
//!
//! A calendar-field job scheduler for Rust.
//!
//! Schedules are built from bitmask [`FieldSet`]s over minute, hour,
//! day of month, month and day of week (or a one-shot UTC instant)
//! and resolved against a pluggable wall clock, the [`Calendar`]
//! trait. Jobs run in one of two modes:
//!
//! - [`Inline`](JobMode::Inline): the callback runs on whichever
//!   thread calls [`Scheduler::tick`], so the embedding application
//!   keeps full control of execution.
//! - [`Worker`](JobMode::Worker): the job owns a dedicated
//!   cooperative thread that sleeps until its next firing, in chunks
//!   of at most [`WORKER_SLEEP_CHUNK_SECONDS`] so cancellation and
//!   pause are observed promptly.
//!
//! The scheduler refuses to fire while the wall clock reads earlier
//! than its minimum valid epoch (default 2020-01-01T00:00:00Z), which
//! protects devices whose clock starts at the epoch until time is
//! synchronized.
//!
//! ## Usage
//!
//! ```rust
//! use chrono::Utc;
//! use sched_tab::{JobMode, Schedule, Scheduler, ZonedCalendar};
//!
//! let scheduler = Scheduler::new(ZonedCalendar::new(Utc));
//!
//! // 09:30 every day, driven by tick() calls.
//! let daily = scheduler
//!     .add_job(Schedule::daily_at_local(9, 30), JobMode::Inline, || {
//!         println!("good morning");
//!     })
//!     .unwrap();
//!
//! scheduler.tick();
//! assert!(scheduler.cancel_job(daily));
//! ```
//!
//! Worker mode needs no driving loop:
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use sched_tab::{Calendar, JobMode, Scheduler, ZonedCalendar};
//!
//! let calendar = ZonedCalendar::new(Utc);
//! let when = calendar.add_minutes(calendar.now(), 5);
//! let scheduler = Scheduler::new(calendar);
//!
//! scheduler
//!     .add_job_once_utc(when, JobMode::Worker, || {
//!         println!("five minutes later, on a dedicated thread");
//!     })
//!     .unwrap();
//! ```

mod clock;
mod error;
mod field;
mod job;
mod schedule;
mod scheduler;
mod solver;
mod worker;

pub use clock::{Calendar, Instant, ZonedCalendar};
pub use error::SchedError;
pub use field::FieldSet;
pub use job::{JobId, JobInfo, JobMode};
pub use schedule::Schedule;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use solver::next_occurrence;
pub use worker::TaskConfig;

/// Convenient alias for `Result` with [`SchedError`].
pub type Result<T, E = SchedError> = std::result::Result<T, E>;

/// Default clock gate, 2020-01-01T00:00:00Z. Jobs never fire while
/// the wall clock reads earlier than the gate; see
/// [`Scheduler::set_min_valid_unix_seconds`].
pub const DEFAULT_MIN_VALID_EPOCH_SECONDS: i64 = 1_577_836_800;

/// Longest uninterrupted nap inside a worker thread, in seconds.
/// Bounds how late a worker can observe cancellation, pause or a
/// clock-gate change.
pub const WORKER_SLEEP_CHUNK_SECONDS: i64 = 60;

/// Occurrence-search horizon: one leap year of minutes. Schedules
/// with no match inside the horizon report exhaustion and their jobs
/// finish.
pub const MAX_SEARCH_MINUTES: i64 = 366 * 24 * 60;
