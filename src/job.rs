//! Job model shared by both execution engines.

use std::fmt;
use std::sync::Arc;

use crate::clock::Instant;
use crate::schedule::Schedule;

/// Identifier returned by the `add_job` family.
///
/// Ids start at 1 and stay unique among live jobs; 0 is never issued,
/// even after the counter wraps.
pub type JobId = u32;

/// How a job's callback is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobMode {
    /// The callback runs on whichever thread calls
    /// [`tick`](crate::Scheduler::tick).
    Inline,
    /// The job owns a dedicated thread that sleeps until its next
    /// firing.
    Worker,
}

/// Callback invoked when a job fires.
pub type JobFn = dyn Fn() + Send + Sync + 'static;

/// Snapshot of a registered job, produced by
/// [`get_job_info`](crate::Scheduler::get_job_info).
#[derive(Debug, Clone, Copy)]
pub struct JobInfo {
    /// The job's identifier.
    pub id: JobId,
    /// False while the job is paused.
    pub enabled: bool,
    /// Execution mode the job was registered with.
    pub mode: JobMode,
    /// The job's schedule.
    pub schedule: Schedule,
    /// The next firing instant, when known or computable.
    pub next_run_utc: Option<Instant>,
}

/// Inline-mode job record. Owned by the facade; only the tick path and
/// the lifecycle operations touch it.
pub(crate) struct InlineJob {
    pub(crate) id: JobId,
    pub(crate) schedule: Schedule,
    pub(crate) run: Arc<JobFn>,
    pub(crate) next_run: Option<Instant>,
    pub(crate) paused: bool,
    pub(crate) finished: bool,
}

impl fmt::Debug for InlineJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineJob")
            .field("id", &self.id)
            .field("schedule", &self.schedule)
            .field("next_run", &self.next_run)
            .field("paused", &self.paused)
            .field("finished", &self.finished)
            .finish()
    }
}
