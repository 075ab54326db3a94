//! Worker-mode job engine.
//!
//! Each worker job owns one dedicated thread running a cooperative
//! sleep/poll loop. A worker never sleeps more than
//! [`WORKER_SLEEP_CHUNK_SECONDS`](crate::WORKER_SLEEP_CHUNK_SECONDS)
//! at a stretch, so cancellation, pause and clock-gate changes are
//! observed within one chunk. The facade additionally nudges a wake
//! channel on control changes, which usually cuts that latency to
//! milliseconds; the chunk remains the contractual worst case.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::clock::{Calendar, Instant};
use crate::job::{JobFn, JobId};
use crate::schedule::Schedule;
use crate::solver::next_occurrence;
use crate::WORKER_SLEEP_CHUNK_SECONDS;

/// Thread parameters for a worker job.
///
/// `priority`, `core_id` and `use_psram_stack` describe placement on
/// realtime kernels. A std host honors `name` and `stack_size` (the
/// platform may raise the stack to its minimum) and accepts the rest.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// Thread name, visible to debuggers and panic messages.
    pub name: String,
    /// Requested stack size in bytes.
    pub stack_size: usize,
    /// Kernel priority on platforms that schedule by priority.
    pub priority: u8,
    /// Pin the worker to one core, where the platform allows it.
    pub core_id: Option<usize>,
    /// Place the stack in PSRAM on platforms that have it.
    pub use_psram_stack: bool,
}

impl Default for TaskConfig {
    fn default() -> TaskConfig {
        TaskConfig {
            name: "sched-job".to_string(),
            stack_size: 4096,
            priority: 1,
            core_id: None,
            use_psram_stack: false,
        }
    }
}

/// State shared between a worker's table entry and its thread.
///
/// Control flags are atomics polled by the worker on chunk boundaries.
/// `next_run` is the one field both sides read, so it sits behind a
/// mutex for `get_job_info`.
pub(crate) struct WorkerContext<C: Calendar> {
    pub(crate) schedule: Schedule,
    pub(crate) run: Arc<JobFn>,
    pub(crate) calendar: Arc<C>,
    pub(crate) min_valid_epoch: Arc<AtomicI64>,
    pub(crate) paused: AtomicBool,
    pub(crate) cancel_requested: AtomicBool,
    pub(crate) finished: AtomicBool,
    next_run: Mutex<Option<Instant>>,
    wake_rx: Receiver<()>,
}

impl<C: Calendar> WorkerContext<C> {
    pub(crate) fn new(
        schedule: Schedule,
        run: Arc<JobFn>,
        calendar: Arc<C>,
        min_valid_epoch: Arc<AtomicI64>,
    ) -> (Arc<WorkerContext<C>>, Sender<()>) {
        let (wake_tx, wake_rx) = crossbeam_channel::unbounded();
        let ctx = Arc::new(WorkerContext {
            schedule,
            run,
            calendar,
            min_valid_epoch,
            paused: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            next_run: Mutex::new(None),
            wake_rx,
        });
        (ctx, wake_tx)
    }

    pub(crate) fn next_run(&self) -> Option<Instant> {
        *self.next_run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_next_run(&self, next: Instant) {
        *self.next_run.lock().unwrap_or_else(PoisonError::into_inner) = Some(next);
    }

    /// A job is gone from the registry's point of view once it has
    /// finished or cancellation was requested.
    pub(crate) fn is_done(&self) -> bool {
        self.finished.load(Ordering::SeqCst) || self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Sleeps up to `seconds`, returning early when the facade nudges
    /// the wake channel.
    fn sleep_chunk(&self, seconds: i64) {
        let seconds = seconds.clamp(1, WORKER_SLEEP_CHUNK_SECONDS) as u64;
        crossbeam_channel::select! {
            recv(self.wake_rx) -> _ => {}
            recv(crossbeam_channel::after(Duration::from_secs(seconds))) -> _ => {}
        }
    }
}

/// Worker table entry held by the facade.
pub(crate) struct WorkerJob<C: Calendar> {
    pub(crate) id: JobId,
    pub(crate) context: Arc<WorkerContext<C>>,
    wake_tx: Sender<()>,
    pub(crate) handle: Option<JoinHandle<()>>,
}

impl<C: Calendar> WorkerJob<C> {
    pub(crate) fn new(id: JobId, context: Arc<WorkerContext<C>>, wake_tx: Sender<()>) -> WorkerJob<C> {
        WorkerJob {
            id,
            context,
            wake_tx,
            handle: None,
        }
    }

    /// Whether the registry should stop exposing this entry. Covers
    /// the context flags plus threads that died without reporting,
    /// e.g. a callback that panicked.
    pub(crate) fn is_done(&self) -> bool {
        self.context.is_done()
            || self
                .handle
                .as_ref()
                .is_some_and(|handle| handle.is_finished())
    }

    /// Interrupts the worker's current nap so it re-reads its flags.
    pub(crate) fn wake(&self) {
        let _ = self.wake_tx.send(());
    }

    pub(crate) fn request_cancel(&self) {
        self.context.cancel_requested.store(true, Ordering::SeqCst);
        self.wake();
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.context.paused.store(paused, Ordering::SeqCst);
        self.wake();
    }
}

/// Marks the context finished when the worker unwinds, so a panicking
/// callback cannot leave a zombie entry behind.
struct FinishGuard<'a>(&'a AtomicBool);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Worker thread body: the cooperative sleep/poll loop.
pub(crate) fn run_worker<C>(ctx: Arc<WorkerContext<C>>, id: JobId)
where
    C: Calendar,
{
    let _finish = FinishGuard(&ctx.finished);
    debug!(job_id = id, "worker started");
    loop {
        if ctx.cancel_requested.load(Ordering::SeqCst) {
            break;
        }
        let now = ctx.calendar.now();
        if now.epoch_seconds < ctx.min_valid_epoch.load(Ordering::SeqCst) {
            ctx.sleep_chunk(WORKER_SLEEP_CHUNK_SECONDS);
            continue;
        }

        let next = match ctx.next_run() {
            Some(next) => next,
            None => match next_occurrence(&*ctx.calendar, &ctx.schedule, now) {
                Some(next) => {
                    ctx.store_next_run(next);
                    next
                }
                None => {
                    warn!(job_id = id, "no occurrence within the search horizon");
                    break;
                }
            },
        };

        if ctx.paused.load(Ordering::SeqCst) {
            ctx.sleep_chunk(WORKER_SLEEP_CHUNK_SECONDS);
            continue;
        }

        let diff = ctx.calendar.difference_in_seconds(next, now);
        if diff > 0 {
            ctx.sleep_chunk(diff.min(WORKER_SLEEP_CHUNK_SECONDS));
            continue;
        }

        (ctx.run)();

        if ctx.schedule.is_one_shot() {
            break;
        }
        let from = ctx.calendar.add_minutes(next, 1);
        match next_occurrence(&*ctx.calendar, &ctx.schedule, from) {
            Some(next) => ctx.store_next_run(next),
            None => {
                warn!(job_id = id, "no occurrence within the search horizon");
                break;
            }
        }
    }
    debug!(job_id = id, "worker exited");
}

/// Spawns the dedicated thread for a worker job.
pub(crate) fn spawn_worker<C>(
    ctx: Arc<WorkerContext<C>>,
    id: JobId,
    task_cfg: &TaskConfig,
) -> std::io::Result<JoinHandle<()>>
where
    C: Calendar + Send + Sync + 'static,
{
    std::thread::Builder::new()
        .name(task_cfg.name.clone())
        .stack_size(task_cfg.stack_size)
        .spawn(move || run_worker(ctx, id))
}
