use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use chrono::{Local, Utc};
use sched_tab::{JobMode, Schedule, Scheduler, ZonedCalendar};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let scheduler = Arc::new(Scheduler::new(ZonedCalendar::new(Utc)));

    let morning_id = scheduler
        .add_job(Schedule::daily_at_local(9, 30), JobMode::Inline, morning)
        .unwrap();

    scheduler
        .add_job(
            Schedule::weekly_at_local(0b0111110, 18, 30),
            JobMode::Inline,
            || {
                println!("weekday evening");
            },
        )
        .unwrap();

    let mut index = 0;
    while let Some(info) = scheduler.get_job_info(index) {
        println!(
            "job {} ({:?}) next run: {}",
            info.id,
            info.mode,
            info.next_run_utc
                .map(|t| t.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        index += 1;
    }

    // Drive inline jobs from the main loop.
    for _ in 0..5 {
        scheduler.tick();
        sleep(Duration::from_secs(1));
    }

    // remove the morning job
    scheduler.cancel_job(morning_id);
    scheduler.tick();
}

fn morning() {
    println!("now: {}", Local::now());
}
