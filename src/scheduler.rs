//! Scheduler facade: registration, lifecycle, tick driving and
//! inspection for both execution modes.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::clock::{Calendar, Instant};
use crate::error::SchedError;
use crate::job::{InlineJob, JobFn, JobId, JobInfo, JobMode};
use crate::schedule::Schedule;
use crate::solver;
use crate::worker::{spawn_worker, TaskConfig, WorkerContext, WorkerJob};
use crate::{Result, DEFAULT_MIN_VALID_EPOCH_SECONDS};

/// Container placement knobs for the scheduler's job tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerConfig {
    /// Prefer a PSRAM-backed region for scheduler-owned containers on
    /// platforms that have one. Hosts without such a region fall back
    /// to the process heap, so the flag is accepted everywhere.
    pub use_psram_buffers: bool,
}

struct Inner<C: Calendar> {
    initialized: bool,
    next_id: JobId,
    inline_jobs: Vec<InlineJob>,
    worker_jobs: Vec<WorkerJob<C>>,
}

impl<C: Calendar> Inner<C> {
    fn next_id(&mut self) -> JobId {
        if self.next_id == 0 {
            self.next_id = 1;
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    fn compact(&mut self) {
        self.inline_jobs.retain(|job| !job.finished);
        self.worker_jobs.retain(|job| !job.is_done());
    }
}

/// A dual-mode job scheduler over a pluggable wall clock.
///
/// Jobs carry a calendar-field [`Schedule`] and fire in one of two
/// modes: [`Inline`](JobMode::Inline) jobs run on whichever thread
/// calls [`tick`](Self::tick), while [`Worker`](JobMode::Worker) jobs
/// each own a dedicated thread that sleeps until the next firing.
///
/// The scheduler idles while the wall clock reads earlier than its
/// minimum valid epoch (default 2020-01-01T00:00:00Z), so jobs never
/// fire against an unsynchronized clock.
///
/// # Thread safety
///
/// All operations take `&self` and are individually atomic; share the
/// scheduler between threads as `Arc<Scheduler<_>>`. Callbacks are
/// invoked with no internal lock held and may re-enter mutators such
/// as [`cancel_job`](Self::cancel_job) or [`add_job`](Self::add_job).
/// Do not call [`tick`](Self::tick) itself from inside a callback.
///
/// # Examples
///
/// ```rust
/// use chrono::Utc;
/// use sched_tab::{JobMode, Schedule, Scheduler, ZonedCalendar};
///
/// let scheduler = Scheduler::new(ZonedCalendar::new(Utc));
/// let job_id = scheduler
///     .add_job(Schedule::daily_at_local(9, 30), JobMode::Inline, || {
///         println!("good morning");
///     })
///     .unwrap();
/// assert_ne!(job_id, 0);
///
/// // Drive inline jobs from your main loop.
/// scheduler.tick();
/// ```
pub struct Scheduler<C: Calendar> {
    calendar: Arc<C>,
    min_valid_epoch: Arc<AtomicI64>,
    config: SchedulerConfig,
    inner: Mutex<Inner<C>>,
}

impl<C: Calendar> Scheduler<C> {
    /// Creates a scheduler with default configuration.
    pub fn new(calendar: C) -> Scheduler<C> {
        Scheduler::with_config(calendar, SchedulerConfig::default())
    }

    /// Creates a scheduler with an explicit [`SchedulerConfig`].
    pub fn with_config(calendar: C, config: SchedulerConfig) -> Scheduler<C> {
        Scheduler {
            calendar: Arc::new(calendar),
            min_valid_epoch: Arc::new(AtomicI64::new(DEFAULT_MIN_VALID_EPOCH_SECONDS)),
            config,
            inner: Mutex::new(Inner {
                initialized: true,
                next_id: 1,
                inline_jobs: Vec::new(),
                worker_jobs: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C>> {
        // A panicking callback must not brick the scheduler.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The configuration the scheduler was built with.
    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// False only between [`deinit`](Self::deinit) and the next
    /// `add_job*` call.
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Moves the clock gate: jobs never fire while the wall clock
    /// reads earlier than `min_epoch_seconds`. Running workers observe
    /// the change without re-registration.
    pub fn set_min_valid_unix_seconds(&self, min_epoch_seconds: i64) {
        self.min_valid_epoch.store(min_epoch_seconds, Ordering::SeqCst);
        let inner = self.lock();
        for job in &inner.worker_jobs {
            job.wake();
        }
    }

    /// [`set_min_valid_unix_seconds`](Self::set_min_valid_unix_seconds)
    /// with an [`Instant`].
    pub fn set_min_valid_utc(&self, min_utc: Instant) {
        self.set_min_valid_unix_seconds(min_utc.epoch_seconds);
    }

    /// The current clock-gate threshold in epoch seconds.
    pub fn min_valid_unix_seconds(&self) -> i64 {
        self.min_valid_epoch.load(Ordering::SeqCst)
    }

    /// Cancels a job. Inline jobs are removed immediately; a worker
    /// observes the request within one sleep chunk and never runs its
    /// callback afterwards. Returns false when neither table holds an
    /// entry with this id (or the scheduler is deinitialized).
    pub fn cancel_job(&self, job_id: JobId) -> bool {
        let mut inner = self.lock();
        if !inner.initialized {
            return false;
        }

        let mut canceled = false;
        for job in inner.inline_jobs.iter_mut() {
            if job.id == job_id && !job.finished {
                job.finished = true;
                canceled = true;
            }
        }
        for job in inner.worker_jobs.iter() {
            if job.id == job_id {
                job.request_cancel();
                canceled = true;
            }
        }
        if canceled {
            debug!(job_id, "job canceled");
            inner.compact();
        }
        canceled
    }

    /// Pauses a job. A paused job keeps its cached next-run instant
    /// and does not fire until resumed.
    pub fn pause_job(&self, job_id: JobId) -> bool {
        let mut inner = self.lock();
        if !inner.initialized {
            return false;
        }
        for job in inner.inline_jobs.iter_mut() {
            if job.id == job_id && !job.finished {
                job.paused = true;
                return true;
            }
        }
        for job in inner.worker_jobs.iter() {
            if job.id == job_id {
                job.set_paused(true);
                return true;
            }
        }
        false
    }

    /// Resumes a paused job.
    pub fn resume_job(&self, job_id: JobId) -> bool {
        let mut inner = self.lock();
        if !inner.initialized {
            return false;
        }
        for job in inner.inline_jobs.iter_mut() {
            if job.id == job_id && !job.finished {
                job.paused = false;
                return true;
            }
        }
        for job in inner.worker_jobs.iter() {
            if job.id == job_id {
                job.set_paused(false);
                return true;
            }
        }
        false
    }

    /// Cancels every registered job of both modes.
    pub fn cancel_all(&self) {
        let mut inner = self.lock();
        if !inner.initialized {
            return;
        }
        for job in inner.worker_jobs.iter() {
            job.request_cancel();
        }
        inner.inline_jobs.clear();
        inner.worker_jobs.clear();
        debug!("all jobs canceled");
    }

    /// [`tick_at`](Self::tick_at) with the calendar's current time.
    pub fn tick(&self) {
        self.tick_at(self.calendar.now());
    }

    /// Advances every live, unpaused inline job against `now_utc`.
    ///
    /// Jobs are visited in insertion order and each fires at most once
    /// per tick; slots missed between ticks collapse into a single
    /// late invocation. Ticks with a clock reading below the minimum
    /// valid epoch return immediately without side effects.
    ///
    /// Callbacks run on the caller's thread with no internal lock
    /// held; finished entries are swept afterwards.
    pub fn tick_at(&self, now_utc: Instant) {
        let due: Vec<(JobId, Instant, bool, Arc<JobFn>)> = {
            let mut inner = self.lock();
            if !inner.initialized {
                return;
            }
            if now_utc.epoch_seconds < self.min_valid_epoch.load(Ordering::SeqCst) {
                trace!(now = %now_utc, "clock below minimum; tick skipped");
                return;
            }

            let calendar = &*self.calendar;
            let mut due = Vec::new();
            for job in inner.inline_jobs.iter_mut() {
                if job.finished || job.paused {
                    continue;
                }
                if job.next_run.is_none() {
                    job.next_run = solver::next_occurrence(calendar, &job.schedule, now_utc);
                    if job.next_run.is_none() {
                        warn!(job_id = job.id, "no occurrence within the search horizon");
                        job.finished = true;
                        continue;
                    }
                }
                let next = match job.next_run {
                    Some(next) => next,
                    None => continue,
                };
                if calendar.is_after(next, now_utc) {
                    continue;
                }
                due.push((job.id, next, job.schedule.is_one_shot(), job.run.clone()));
            }
            due
        };

        // Unlocked: callbacks may re-enter scheduler operations.
        for (id, slot, _, run) in &due {
            trace!(job_id = *id, slot = %slot, "inline job fired");
            run();
        }

        let mut inner = self.lock();
        let calendar = &*self.calendar;
        for (id, slot, one_shot, _) in due {
            // The callback may have canceled the job, or deinit may
            // have emptied the table; a vanished entry stays gone.
            if let Some(job) = inner.inline_jobs.iter_mut().find(|job| job.id == id) {
                if one_shot {
                    job.finished = true;
                    continue;
                }
                let from = calendar.add_minutes(slot, 1);
                match solver::next_occurrence(calendar, &job.schedule, from) {
                    Some(next) => job.next_run = Some(next),
                    None => {
                        warn!(job_id = id, "no occurrence within the search horizon");
                        job.finished = true;
                    }
                }
            }
        }
        inner.compact();
    }

    /// Sweeps finished entries out of both job tables. Removal is
    /// otherwise lazy, so this only reclaims memory earlier.
    pub fn cleanup(&self) {
        let mut inner = self.lock();
        if !inner.initialized {
            return;
        }
        inner.compact();
    }

    /// Enumerates live jobs: inline table first, then workers, both in
    /// insertion order, skipping finished and cancel-requested
    /// entries. The reported next run is the cached value when
    /// present, the stored instant for one-shots, or computed from the
    /// calendar's current time.
    pub fn get_job_info(&self, index: usize) -> Option<JobInfo> {
        let inner = self.lock();
        if !inner.initialized {
            return None;
        }

        let mut current = 0;
        for job in inner.inline_jobs.iter() {
            if job.finished {
                continue;
            }
            if current == index {
                return Some(JobInfo {
                    id: job.id,
                    enabled: !job.paused,
                    mode: JobMode::Inline,
                    schedule: job.schedule,
                    next_run_utc: self.fill_next(&job.schedule, job.next_run),
                });
            }
            current += 1;
        }
        for job in inner.worker_jobs.iter() {
            if job.is_done() {
                continue;
            }
            if current == index {
                let ctx = &job.context;
                return Some(JobInfo {
                    id: job.id,
                    enabled: !ctx.paused.load(Ordering::SeqCst),
                    mode: JobMode::Worker,
                    schedule: ctx.schedule,
                    next_run_utc: self.fill_next(&ctx.schedule, ctx.next_run()),
                });
            }
            current += 1;
        }
        None
    }

    fn fill_next(&self, schedule: &Schedule, cached: Option<Instant>) -> Option<Instant> {
        if cached.is_some() {
            return cached;
        }
        if let Some(once) = schedule.once_at_utc() {
            return Some(once);
        }
        solver::next_occurrence(&*self.calendar, schedule, self.calendar.now())
    }

    /// The earliest instant at or after `from_utc` matching
    /// `schedule`, or `None` when nothing matches within the search
    /// horizon.
    pub fn next_occurrence(&self, schedule: &Schedule, from_utc: Instant) -> Option<Instant> {
        solver::next_occurrence(&*self.calendar, schedule, from_utc)
    }

    /// Tears the scheduler down: inline jobs are dropped, workers are
    /// asked to cancel, both tables release their storage and the id
    /// counter restarts at 1. Idempotent; any later `add_job*` call
    /// re-initializes transparently.
    pub fn deinit(&self) {
        let mut inner = self.lock();
        if !inner.initialized {
            return;
        }
        inner.initialized = false;
        for job in inner.worker_jobs.iter() {
            job.request_cancel();
        }
        inner.inline_jobs = Vec::new();
        inner.worker_jobs = Vec::new();
        inner.next_id = 1;
        debug!("scheduler deinitialized");
    }
}

impl<C> Scheduler<C>
where
    C: Calendar + Send + Sync + 'static,
{
    /// Registers a job. Inline jobs wait for [`tick`](Self::tick)
    /// calls; worker jobs start their dedicated thread immediately
    /// (with default [`TaskConfig`]).
    ///
    /// # Errors
    ///
    /// [`SchedError::InvalidSchedule`] when a recurring schedule
    /// constrains a field entirely outside its legal range, and
    /// [`SchedError::Spawn`] when the worker thread cannot be created.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chrono::Utc;
    /// use sched_tab::{JobMode, Schedule, Scheduler, ZonedCalendar};
    ///
    /// let scheduler = Scheduler::new(ZonedCalendar::new(Utc));
    /// let id = scheduler
    ///     .add_job(Schedule::weekly_at_local(0b0111110, 18, 30), JobMode::Inline, || {
    ///         println!("weekday evening");
    ///     })
    ///     .unwrap();
    /// assert!(scheduler.cancel_job(id));
    /// ```
    pub fn add_job<F>(&self, schedule: Schedule, mode: JobMode, f: F) -> Result<JobId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add_job_with_config(schedule, mode, TaskConfig::default(), f)
    }

    /// [`add_job`](Self::add_job) for callbacks that borrow a payload.
    /// The payload moves into the job and is handed to every
    /// invocation.
    pub fn add_job_with_data<D, F>(
        &self,
        schedule: Schedule,
        mode: JobMode,
        data: D,
        f: F,
    ) -> Result<JobId>
    where
        D: Send + Sync + 'static,
        F: Fn(&D) + Send + Sync + 'static,
    {
        self.add_job(schedule, mode, move || f(&data))
    }

    /// Registers a one-shot job firing at `when_utc`. Instants already
    /// in the past fire on the next opportunity.
    pub fn add_job_once_utc<F>(&self, when_utc: Instant, mode: JobMode, f: F) -> Result<JobId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add_job(Schedule::once_utc(when_utc), mode, f)
    }

    /// [`add_job_once_utc`](Self::add_job_once_utc) with a payload.
    pub fn add_job_once_utc_with_data<D, F>(
        &self,
        when_utc: Instant,
        mode: JobMode,
        data: D,
        f: F,
    ) -> Result<JobId>
    where
        D: Send + Sync + 'static,
        F: Fn(&D) + Send + Sync + 'static,
    {
        self.add_job_with_data(Schedule::once_utc(when_utc), mode, data, f)
    }

    /// [`add_job`](Self::add_job) with explicit thread parameters for
    /// worker mode. Inline jobs ignore `task_cfg`.
    pub fn add_job_with_config<F>(
        &self,
        schedule: Schedule,
        mode: JobMode,
        task_cfg: TaskConfig,
        f: F,
    ) -> Result<JobId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        schedule.validate()?;
        let run: Arc<JobFn> = Arc::new(f);

        let mut inner = self.lock();
        if !inner.initialized {
            inner.initialized = true;
        }
        let id = inner.next_id();

        match mode {
            JobMode::Inline => {
                inner.inline_jobs.push(InlineJob {
                    id,
                    schedule,
                    run,
                    next_run: None,
                    paused: false,
                    finished: false,
                });
            }
            JobMode::Worker => {
                let (ctx, wake_tx) = WorkerContext::new(
                    schedule,
                    run,
                    self.calendar.clone(),
                    self.min_valid_epoch.clone(),
                );
                // The table entry goes in first so the registry knows
                // the worker before its user code can run.
                inner.worker_jobs.push(WorkerJob::new(id, ctx.clone(), wake_tx));
                match spawn_worker(ctx, id, &task_cfg) {
                    Ok(handle) => {
                        if let Some(job) = inner.worker_jobs.last_mut() {
                            job.handle = Some(handle);
                        }
                    }
                    Err(err) => {
                        inner.worker_jobs.pop();
                        return Err(SchedError::Spawn(err));
                    }
                }
            }
        }
        debug!(job_id = id, mode = ?mode, "job registered");
        Ok(id)
    }
}

impl<C: Calendar> Drop for Scheduler<C> {
    fn drop(&mut self) {
        self.deinit();
    }
}
