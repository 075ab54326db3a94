//! One-shot jobs at a specific instant, in both execution modes.
//!
//! A one-shot in the past fires at the first opportunity; a one-shot
//! in the future fires once at its instant and is removed.

use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

use chrono::Utc;
use sched_tab::{Calendar, Instant, JobMode, Schedule, Scheduler, TaskConfig, ZonedCalendar};

fn main() {
    tracing_subscriber::fmt().init();

    let calendar = ZonedCalendar::new(Utc);
    let scheduler = Scheduler::new(calendar.clone());

    let counter = Arc::new(Mutex::new(0));

    // Worker mode: fires on its own thread two seconds from now.
    println!("scheduling a worker one-shot 2 seconds out...");
    let in_two_seconds = Instant::from_epoch_seconds(calendar.now().epoch_seconds + 2);
    let c1 = Arc::clone(&counter);
    scheduler
        .add_job_with_config(
            Schedule::once_utc(in_two_seconds),
            JobMode::Worker,
            TaskConfig {
                name: String::from("one-shot"),
                stack_size: 64 * 1024,
                ..TaskConfig::default()
            },
            move || {
                let mut count = c1.lock().unwrap();
                *count += 1;
                println!("[worker] fired, counter: {}", *count);
            },
        )
        .unwrap();

    // Inline mode: an instant already in the past fires on the first
    // tick.
    println!("scheduling an inline one-shot in the past...");
    let just_passed = calendar.add_minutes(calendar.now(), -1);
    let c2 = Arc::clone(&counter);
    scheduler
        .add_job_once_utc(just_passed, JobMode::Inline, move || {
            let mut count = c2.lock().unwrap();
            *count += 10;
            println!("[inline] fired, counter: {}", *count);
        })
        .unwrap();

    for _ in 0..4 {
        scheduler.tick();
        sleep(Duration::from_secs(1));
    }

    println!("final counter: {}", *counter.lock().unwrap());
    println!("note: one-shot jobs run exactly once and are removed automatically");
}
