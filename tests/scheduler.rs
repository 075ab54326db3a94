#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread::sleep;
    use std::time::Duration;

    use chrono::Utc;
    use sched_tab::{
        Calendar, FieldSet, Instant, JobId, JobMode, SchedError, Schedule, Scheduler, TaskConfig,
        ZonedCalendar, DEFAULT_MIN_VALID_EPOCH_SECONDS,
    };

    fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Instant {
        ZonedCalendar::new(Utc)
            .from_utc(year, month, day, hour, minute, second)
            .unwrap()
    }

    fn scheduler() -> Scheduler<ZonedCalendar<Utc>> {
        Scheduler::new(ZonedCalendar::new(Utc))
    }

    fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if cond() {
                return true;
            }
            sleep(Duration::from_millis(10));
        }
        cond()
    }

    #[test]
    fn inline_tick_fires_and_reschedules() {
        let scheduler = scheduler();
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);

        scheduler
            .add_job(Schedule::daily_at_local(6, 0), JobMode::Inline, move || {
                *c.lock().unwrap() += 1;
            })
            .unwrap();

        scheduler.tick_at(utc(2025, 1, 1, 6, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 1);

        // Same day, later: the slot already fired.
        scheduler.tick_at(utc(2025, 1, 1, 23, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 1);

        scheduler.tick_at(utc(2025, 1, 2, 6, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 2);
    }

    #[test]
    fn tick_waits_until_clock_valid() {
        let scheduler = scheduler();
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);

        scheduler
            .add_job(Schedule::daily_at_local(6, 0), JobMode::Inline, move || {
                *c.lock().unwrap() += 1;
            })
            .unwrap();

        scheduler.tick_at(utc(1970, 1, 1, 0, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 0);

        scheduler.tick_at(utc(2025, 1, 1, 6, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 1);
    }

    #[test]
    fn missed_slots_collapse_into_one_catchup_per_tick() {
        let scheduler = scheduler();
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);

        scheduler
            .add_job(Schedule::daily_at_local(6, 0), JobMode::Inline, move || {
                *c.lock().unwrap() += 1;
            })
            .unwrap();

        scheduler.tick_at(utc(2025, 1, 1, 6, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 1);

        // Three days of slots were missed; each tick catches up once.
        scheduler.tick_at(utc(2025, 1, 5, 12, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 2);
        scheduler.tick_at(utc(2025, 1, 5, 12, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 3);
    }

    #[test]
    fn one_shot_inline_runs_once_and_is_removed() {
        let scheduler = scheduler();
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);
        let when = utc(2025, 1, 1, 12, 0, 0);

        scheduler
            .add_job_once_utc(when, JobMode::Inline, move || {
                *c.lock().unwrap() += 1;
            })
            .unwrap();

        scheduler.tick_at(utc(2025, 1, 1, 11, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 0);
        let info = scheduler.get_job_info(0).unwrap();
        assert_eq!(info.mode, JobMode::Inline);
        assert_eq!(info.next_run_utc, Some(when));

        scheduler.tick_at(when);
        assert_eq!(*counter.lock().unwrap(), 1);
        assert!(scheduler.get_job_info(0).is_none());

        scheduler.tick_at(utc(2025, 1, 1, 13, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 1);
    }

    #[test]
    fn pause_retains_slot_and_resume_fires_it() {
        let scheduler = scheduler();
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);

        let id = scheduler
            .add_job(Schedule::daily_at_local(6, 0), JobMode::Inline, move || {
                *c.lock().unwrap() += 1;
            })
            .unwrap();

        // Resolve the next slot without firing.
        scheduler.tick_at(utc(2025, 1, 1, 5, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 0);

        assert!(scheduler.pause_job(id));
        scheduler.tick_at(utc(2025, 1, 1, 6, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 0);

        let info = scheduler.get_job_info(0).unwrap();
        assert!(!info.enabled);
        assert_eq!(info.next_run_utc, Some(utc(2025, 1, 1, 6, 0, 0)));

        assert!(scheduler.resume_job(id));
        scheduler.tick_at(utc(2025, 1, 1, 6, 30, 0));
        assert_eq!(*counter.lock().unwrap(), 1);
    }

    #[test]
    fn cancel_inline_removes_job() {
        let scheduler = scheduler();
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);

        let id = scheduler
            .add_job(Schedule::daily_at_local(6, 0), JobMode::Inline, move || {
                *c.lock().unwrap() += 1;
            })
            .unwrap();

        assert!(!scheduler.cancel_job(id + 1));
        assert!(scheduler.cancel_job(id));
        assert!(scheduler.get_job_info(0).is_none());
        assert!(!scheduler.cancel_job(id));

        scheduler.tick_at(utc(2025, 1, 1, 6, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 0);
    }

    #[test]
    fn invalid_schedule_is_rejected() {
        let scheduler = scheduler();

        let bad_minute = Schedule::custom(
            FieldSet::only(60),
            FieldSet::any(),
            FieldSet::any(),
            FieldSet::any(),
            FieldSet::any(),
        );
        assert!(matches!(
            scheduler.add_job(bad_minute, JobMode::Inline, || {}),
            Err(SchedError::InvalidSchedule("minute"))
        ));

        let empty_dow = Schedule::custom(
            FieldSet::any(),
            FieldSet::any(),
            FieldSet::any(),
            FieldSet::any(),
            FieldSet::default(),
        );
        assert!(matches!(
            scheduler.add_job(empty_dow, JobMode::Inline, || {}),
            Err(SchedError::InvalidSchedule("day-of-week"))
        ));

        assert!(scheduler.get_job_info(0).is_none());
    }

    #[test]
    fn ids_are_unique_and_never_zero() {
        let scheduler = scheduler();
        let a = scheduler
            .add_job(Schedule::daily_at_local(6, 0), JobMode::Inline, || {})
            .unwrap();
        let b = scheduler
            .add_job(Schedule::daily_at_local(7, 0), JobMode::Inline, || {})
            .unwrap();
        let c = scheduler
            .add_job(Schedule::daily_at_local(8, 0), JobMode::Inline, || {})
            .unwrap();

        assert_eq!((a, b, c), (1, 2, 3));
        assert!(a != 0 && b != 0 && c != 0);
    }

    #[test]
    fn deinit_is_idempotent_and_add_reinitializes() {
        let scheduler = scheduler();
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);

        let id = scheduler
            .add_job(Schedule::daily_at_local(6, 0), JobMode::Inline, move || {
                *c.lock().unwrap() += 1;
            })
            .unwrap();
        assert!(scheduler.is_initialized());

        scheduler.deinit();
        assert!(!scheduler.is_initialized());
        assert!(!scheduler.cancel_job(id));
        assert!(!scheduler.pause_job(id));
        assert!(!scheduler.resume_job(id));
        assert!(scheduler.get_job_info(0).is_none());
        scheduler.tick_at(utc(2025, 1, 1, 6, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 0);

        scheduler.deinit();
        assert!(!scheduler.is_initialized());

        // The next add re-initializes and the id counter restarts.
        let c2 = Arc::clone(&counter);
        let id2 = scheduler
            .add_job_once_utc(utc(2025, 1, 1, 12, 0, 0), JobMode::Inline, move || {
                *c2.lock().unwrap() += 1;
            })
            .unwrap();
        assert_eq!(id2, 1);
        assert!(scheduler.is_initialized());

        scheduler.tick_at(utc(2025, 1, 1, 12, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 1);
    }

    #[test]
    fn job_info_enumerates_inline_before_workers() {
        let scheduler = scheduler();

        let inline_id = scheduler
            .add_job(Schedule::daily_at_local(6, 0), JobMode::Inline, || {})
            .unwrap();
        let worker_id = scheduler
            .add_job_once_utc(utc(2030, 1, 1, 0, 0, 0), JobMode::Worker, || {})
            .unwrap();

        let first = scheduler.get_job_info(0).unwrap();
        assert_eq!(first.id, inline_id);
        assert_eq!(first.mode, JobMode::Inline);
        assert!(first.enabled);
        assert!(first.next_run_utc.is_some());

        let second = scheduler.get_job_info(1).unwrap();
        assert_eq!(second.id, worker_id);
        assert_eq!(second.mode, JobMode::Worker);
        assert_eq!(second.next_run_utc, Some(utc(2030, 1, 1, 0, 0, 0)));

        assert!(scheduler.get_job_info(2).is_none());

        // A canceled worker disappears from enumeration immediately.
        assert!(scheduler.cancel_job(worker_id));
        assert!(scheduler.get_job_info(1).is_none());
    }

    #[test]
    fn worker_one_shot_fires_promptly() {
        let scheduler = scheduler();
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);

        scheduler
            .add_job_once_utc(utc(2025, 1, 1, 0, 0, 0), JobMode::Worker, move || {
                *c.lock().unwrap() += 1;
            })
            .unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            *counter.lock().unwrap() == 1
        }));

        // The finished entry is swept by the next compaction.
        assert!(wait_until(Duration::from_secs(1), || {
            scheduler.cleanup();
            scheduler.get_job_info(0).is_none()
        }));
    }

    #[test]
    fn worker_cancel_is_visible_immediately() {
        let scheduler = scheduler();
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);

        let calendar = ZonedCalendar::new(Utc);
        let when = calendar.add_minutes(calendar.now(), 60);
        let id = scheduler
            .add_job_once_utc(when, JobMode::Worker, move || {
                *c.lock().unwrap() += 1;
            })
            .unwrap();

        assert!(scheduler.get_job_info(0).is_some());
        assert!(scheduler.cancel_job(id));
        assert!(scheduler.get_job_info(0).is_none());
        assert!(!scheduler.cancel_job(id));

        sleep(Duration::from_millis(200));
        assert_eq!(*counter.lock().unwrap(), 0);
    }

    #[test]
    fn worker_respects_clock_gate_until_lowered() {
        let calendar = ZonedCalendar::new(Utc);
        let scheduler = Scheduler::new(calendar.clone());
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);

        // Pretend the clock is not synchronized yet.
        let gate = calendar.now().epoch_seconds + 3600;
        scheduler.set_min_valid_unix_seconds(gate);
        assert_eq!(scheduler.min_valid_unix_seconds(), gate);

        let past = calendar.add_minutes(calendar.now(), -5);
        scheduler
            .add_job_once_utc(past, JobMode::Worker, move || {
                *c.lock().unwrap() += 1;
            })
            .unwrap();

        sleep(Duration::from_millis(300));
        assert_eq!(*counter.lock().unwrap(), 0);

        scheduler.set_min_valid_unix_seconds(DEFAULT_MIN_VALID_EPOCH_SECONDS);
        assert!(wait_until(Duration::from_secs(5), || {
            *counter.lock().unwrap() == 1
        }));
    }

    #[test]
    fn worker_pause_blocks_firing_until_resume() {
        let calendar = ZonedCalendar::new(Utc);
        let scheduler = Scheduler::new(calendar.clone());
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);

        let when = Instant::from_epoch_seconds(calendar.now().epoch_seconds + 2);
        let id = scheduler
            .add_job_once_utc(when, JobMode::Worker, move || {
                *c.lock().unwrap() += 1;
            })
            .unwrap();
        assert!(scheduler.pause_job(id));

        sleep(Duration::from_secs(3));
        assert_eq!(*counter.lock().unwrap(), 0);
        let info = scheduler.get_job_info(0).unwrap();
        assert!(!info.enabled);

        assert!(scheduler.resume_job(id));
        assert!(wait_until(Duration::from_secs(5), || {
            *counter.lock().unwrap() == 1
        }));
    }

    #[test]
    fn callback_may_cancel_its_own_job() {
        let scheduler = Arc::new(scheduler());
        let counter = Arc::new(Mutex::new(0));
        let own_id: Arc<Mutex<JobId>> = Arc::new(Mutex::new(0));

        let s = Arc::clone(&scheduler);
        let c = Arc::clone(&counter);
        let o = Arc::clone(&own_id);
        let id = scheduler
            .add_job(Schedule::daily_at_local(6, 0), JobMode::Inline, move || {
                *c.lock().unwrap() += 1;
                s.cancel_job(*o.lock().unwrap());
            })
            .unwrap();
        *own_id.lock().unwrap() = id;

        scheduler.tick_at(utc(2025, 1, 1, 6, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 1);
        assert!(scheduler.get_job_info(0).is_none());

        scheduler.tick_at(utc(2025, 1, 2, 6, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 1);
    }

    #[test]
    fn callback_may_add_jobs_for_later_ticks() {
        let scheduler = Arc::new(scheduler());
        let outer_hits = Arc::new(Mutex::new(0));
        let added_hits = Arc::new(Mutex::new(0));

        let s = Arc::clone(&scheduler);
        let outer = Arc::clone(&outer_hits);
        let added = Arc::clone(&added_hits);
        scheduler
            .add_job(Schedule::daily_at_local(6, 0), JobMode::Inline, move || {
                *outer.lock().unwrap() += 1;
                let a = Arc::clone(&added);
                s.add_job_once_utc(utc(2025, 1, 1, 5, 0, 0), JobMode::Inline, move || {
                    *a.lock().unwrap() += 1;
                })
                .unwrap();
            })
            .unwrap();

        // The job added mid-tick is not visited by that tick.
        scheduler.tick_at(utc(2025, 1, 1, 6, 0, 0));
        assert_eq!(*outer_hits.lock().unwrap(), 1);
        assert_eq!(*added_hits.lock().unwrap(), 0);
        assert!(scheduler.get_job_info(1).is_some());

        // The outer job is not due at 07:00, the added one-shot is.
        scheduler.tick_at(utc(2025, 1, 1, 7, 0, 0));
        assert_eq!(*outer_hits.lock().unwrap(), 1);
        assert_eq!(*added_hits.lock().unwrap(), 1);
    }

    #[test]
    fn cancel_all_clears_both_tables() {
        let scheduler = scheduler();
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);

        scheduler
            .add_job(Schedule::daily_at_local(6, 0), JobMode::Inline, move || {
                *c.lock().unwrap() += 1;
            })
            .unwrap();
        scheduler
            .add_job_once_utc(utc(2030, 1, 1, 0, 0, 0), JobMode::Worker, || {})
            .unwrap();

        scheduler.cancel_all();
        assert!(scheduler.get_job_info(0).is_none());
        assert!(scheduler.is_initialized());

        scheduler.tick_at(utc(2025, 1, 1, 6, 0, 0));
        assert_eq!(*counter.lock().unwrap(), 0);
    }

    #[test]
    fn next_occurrence_clamps_monthly_day() {
        let scheduler = scheduler();
        let schedule = Schedule::monthly_on_day_local(40, 8, 0);
        assert_eq!(
            scheduler.next_occurrence(&schedule, utc(2025, 1, 5, 0, 0, 0)),
            Some(utc(2025, 1, 31, 8, 0, 0))
        );
    }

    #[test]
    fn add_job_with_data_hands_payload_to_callback() {
        let scheduler = scheduler();
        let hits: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let h = Arc::clone(&hits);

        scheduler
            .add_job_with_data(
                Schedule::daily_at_local(6, 0),
                JobMode::Inline,
                String::from("payload"),
                move |data: &String| {
                    h.lock().unwrap().push(data.clone());
                },
            )
            .unwrap();

        scheduler.tick_at(utc(2025, 1, 1, 6, 0, 0));
        assert_eq!(*hits.lock().unwrap(), vec![String::from("payload")]);
    }

    #[test]
    fn worker_accepts_custom_task_config() {
        let scheduler = scheduler();
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);

        let task_cfg = TaskConfig {
            name: String::from("custom-worker"),
            stack_size: 64 * 1024,
            ..TaskConfig::default()
        };
        scheduler
            .add_job_with_config(
                Schedule::once_utc(utc(2025, 1, 1, 0, 0, 0)),
                JobMode::Worker,
                task_cfg,
                move || {
                    *c.lock().unwrap() += 1;
                },
            )
            .unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            *counter.lock().unwrap() == 1
        }));
    }
}
