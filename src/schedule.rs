//! Daily open/close schedule driven by sun times.
//!
//! Three cron-style daily jobs are kept: a refresh at midnight that recomputes
//! the trigger times, an open job at sunrise and a close job at dusk plus an
//! offset. Jobs never touch the gate; they post into a [`CmdMailbox`] that the
//! control loop drains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Timelike};
use log::{info, warn};

use crate::mailbox::{CmdMailbox, GateCmd};
use crate::sun::SunTimes;

const POLL_INTERVAL: StdDuration = StdDuration::from_secs(1);
/// A gap between checks larger than this is treated as a clock jump, and the
/// jobs it spans are skipped rather than replayed.
const MAX_CATCH_UP_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Refresh,
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Job {
    kind: JobKind,
    at: NaiveTime,
}

#[derive(Debug, Default)]
struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    /// Removes any job of the same kind before adding the new one.
    fn replace(&mut self, job: Job) -> Option<Job> {
        let old = self
            .jobs
            .iter()
            .position(|j| j.kind == job.kind)
            .map(|i| self.jobs.remove(i));
        self.jobs.push(job);
        old
    }

    /// Jobs with an occurrence on `date` inside `(after, until]`, in time order.
    fn due(&self, date: NaiveDate, after: DateTime<Local>, until: DateTime<Local>) -> Vec<Job> {
        let mut due: Vec<Job> = self
            .jobs
            .iter()
            .filter(|job| match local_time(date, job.at) {
                Some(when) => when > after && when <= until,
                None => false,
            })
            .copied()
            .collect();
        due.sort_by_key(|job| job.at);
        due
    }
}

/// Sun times for the current day and the gate trigger times derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleInfo {
    pub dawn: DateTime<Local>,
    pub dusk: DateTime<Local>,
    pub sunrise: DateTime<Local>,
    pub sunset: DateTime<Local>,
    pub gate_open_time: NaiveTime,
    pub gate_close_time: NaiveTime,
}

/// The controller's view of the scheduler: the mailbox and the latest info.
#[derive(Clone)]
pub struct ScheduleHandle {
    mailbox: CmdMailbox,
    info: Arc<RwLock<Option<ScheduleInfo>>>,
}

impl ScheduleHandle {
    /// Returns the pending scheduled command and clears it.
    pub fn get_gate_cmd(&self) -> GateCmd {
        self.mailbox.take()
    }

    pub fn schedule_info(&self) -> Option<ScheduleInfo> {
        self.info.read().ok().and_then(|info| info.clone())
    }
}

pub struct Scheduler<S> {
    sun: S,
    close_offset: Duration,
    jobs: JobTable,
    mailbox: CmdMailbox,
    info: Arc<RwLock<Option<ScheduleInfo>>>,
    last_check: DateTime<Local>,
}

impl<S: SunTimes> Scheduler<S> {
    /// Computes today's trigger times. Jobs whose time has already passed
    /// at `now` first fire tomorrow.
    pub fn new(sun: S, close_offset: Duration, now: DateTime<Local>) -> Self {
        let mut scheduler = Scheduler {
            sun,
            close_offset,
            jobs: JobTable::default(),
            mailbox: CmdMailbox::new(),
            info: Arc::new(RwLock::new(None)),
            last_check: now,
        };
        scheduler.jobs.replace(Job {
            kind: JobKind::Refresh,
            at: NaiveTime::MIN,
        });
        info!("Program started");
        scheduler.refresh(now.date_naive());
        scheduler
    }

    pub fn handle(&self) -> ScheduleHandle {
        ScheduleHandle {
            mailbox: self.mailbox.clone(),
            info: Arc::clone(&self.info),
        }
    }

    pub fn schedule_info(&self) -> Option<ScheduleInfo> {
        self.handle().schedule_info()
    }

    /// Recompute the open and close jobs for `date`.
    pub fn refresh(&mut self, date: NaiveDate) {
        let dawn = self.sun.dawn(date);
        let sunrise = self.sun.sunrise(date);
        let sunset = self.sun.sunset(date);
        let dusk = self.sun.dusk(date);

        let open_at = to_minute(sunrise.time());
        let close_at = to_minute((dusk + self.close_offset).time());

        for job in [
            Job {
                kind: JobKind::Open,
                at: open_at,
            },
            Job {
                kind: JobKind::Close,
                at: close_at,
            },
        ] {
            match self.jobs.replace(job) {
                Some(old) if old.at != job.at => {
                    info!("{:?} job moved from {} to {}", job.kind, old.at, job.at)
                }
                Some(_) => {}
                None => info!("{:?} job scheduled at {}", job.kind, job.at),
            }
        }

        let info = ScheduleInfo {
            dawn,
            dusk,
            sunrise,
            sunset,
            gate_open_time: open_at,
            gate_close_time: close_at,
        };
        match self.info.write() {
            Ok(mut slot) => *slot = Some(info),
            Err(err) => warn!("unable to publish schedule info: {}", err),
        }
    }

    /// Fire every job whose time fell between the previous check and `now`.
    pub fn run_pending(&mut self, now: DateTime<Local>) {
        if now <= self.last_check {
            self.last_check = now;
            return;
        }
        if now - self.last_check > Duration::minutes(MAX_CATCH_UP_MINUTES) {
            warn!(
                "clock jumped from {} to {}, skipping missed jobs",
                self.last_check, now
            );
            self.refresh(now.date_naive());
            self.last_check = now;
            return;
        }

        let mut date = self.last_check.date_naive();
        while date <= now.date_naive() {
            let due = self.jobs.due(date, self.last_check, now);
            if due.iter().any(|job| job.kind == JobKind::Refresh) {
                info!("Updating schedule for {}", date);
                self.refresh(date);
            }
            for job in self.jobs.due(date, self.last_check, now) {
                self.fire(job.kind);
            }
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        self.last_check = now;
    }

    fn fire(&self, kind: JobKind) {
        match kind {
            JobKind::Open => {
                info!("Executing scheduled open job");
                self.mailbox.post(GateCmd::Open);
            }
            JobKind::Close => {
                info!("Executing scheduled close job");
                self.mailbox.post(GateCmd::Close);
            }
            JobKind::Refresh => {}
        }
    }
}

impl<S: SunTimes + 'static> Scheduler<S> {
    /// Run the jobs on a background thread until `term` is set.
    pub fn spawn(mut self, term: Arc<AtomicBool>) -> JoinHandle<()> {
        thread::spawn(move || {
            while !term.load(Ordering::Relaxed) {
                self.run_pending(Local::now());
                thread::sleep(POLL_INTERVAL);
            }
            eprintln!("scheduler thread exiting");
        })
    }
}

fn to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

fn local_time(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&date.and_time(time)).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    /// Sunrise at 05:30 and dusk at 21:00, each shifted by one minute per day
    /// of the month so refreshes are observable.
    struct FixedSun;

    impl FixedSun {
        fn at(date: NaiveDate, h: u32, m: u32) -> DateTime<Local> {
            let time = NaiveTime::from_hms_opt(h, m, 17).unwrap()
                + Duration::minutes(i64::from(date.day()));
            local_time(date, time).unwrap()
        }
    }

    impl SunTimes for FixedSun {
        fn dawn(&self, date: NaiveDate) -> DateTime<Local> {
            FixedSun::at(date, 5, 0)
        }
        fn sunrise(&self, date: NaiveDate) -> DateTime<Local> {
            FixedSun::at(date, 5, 30)
        }
        fn sunset(&self, date: NaiveDate) -> DateTime<Local> {
            FixedSun::at(date, 20, 30)
        }
        fn dusk(&self, date: NaiveDate) -> DateTime<Local> {
            FixedSun::at(date, 21, 0)
        }
    }

    fn at(day: u32, h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, day, h, m, s).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn computes_trigger_times_on_start() {
        let scheduler = Scheduler::new(FixedSun, Duration::minutes(30), at(10, 3, 0, 0));
        let info = scheduler.schedule_info().unwrap();
        assert_eq!(info.gate_open_time, hm(5, 40));
        assert_eq!(info.gate_close_time, hm(21, 40));
        assert!(info.dawn < info.sunrise && info.sunset < info.dusk);
    }

    #[test]
    fn close_job_fires_at_dusk_plus_offset() {
        let mut scheduler = Scheduler::new(FixedSun, Duration::minutes(30), at(10, 21, 38, 0));
        let handle = scheduler.handle();

        scheduler.run_pending(at(10, 21, 39, 59));
        assert_eq!(handle.get_gate_cmd(), GateCmd::None);

        scheduler.run_pending(at(10, 21, 40, 0));
        assert_eq!(handle.get_gate_cmd(), GateCmd::Close);
        assert_eq!(handle.get_gate_cmd(), GateCmd::None);

        scheduler.run_pending(at(10, 21, 41, 0));
        assert_eq!(handle.get_gate_cmd(), GateCmd::None);
    }

    #[test]
    fn open_job_fires_at_sunrise() {
        let mut scheduler = Scheduler::new(FixedSun, Duration::zero(), at(10, 5, 39, 30));
        let handle = scheduler.handle();
        scheduler.run_pending(at(10, 5, 40, 1));
        assert_eq!(handle.get_gate_cmd(), GateCmd::Open);
    }

    #[test]
    fn passed_jobs_do_not_fire_at_start() {
        let mut scheduler = Scheduler::new(FixedSun, Duration::zero(), at(10, 12, 0, 0));
        let handle = scheduler.handle();
        scheduler.run_pending(at(10, 12, 0, 1));
        assert_eq!(handle.get_gate_cmd(), GateCmd::None);
    }

    #[test]
    fn midnight_refresh_replaces_jobs() {
        let mut scheduler = Scheduler::new(FixedSun, Duration::zero(), at(10, 23, 59, 0));
        assert_eq!(scheduler.schedule_info().unwrap().gate_open_time, hm(5, 40));

        scheduler.run_pending(at(11, 0, 0, 30));
        let info = scheduler.schedule_info().unwrap();
        assert_eq!(info.gate_open_time, hm(5, 41));
        assert_eq!(info.gate_close_time, hm(21, 11));
        assert_eq!(scheduler.jobs.jobs.len(), 3);

        let handle = scheduler.handle();
        let mut now = at(11, 5, 38, 0);
        scheduler.run_pending(now);
        let mut fired = Vec::new();
        for _ in 0..4 {
            now = now + Duration::minutes(1);
            scheduler.run_pending(now);
            fired.push(handle.get_gate_cmd());
        }
        // 05:39, 05:40 (yesterday's time, replaced), 05:41, 05:42
        assert_eq!(
            fired,
            vec![GateCmd::None, GateCmd::None, GateCmd::Open, GateCmd::None]
        );
    }

    #[test]
    fn clock_jump_skips_missed_jobs() {
        let mut scheduler = Scheduler::new(FixedSun, Duration::zero(), at(10, 3, 0, 0));
        let handle = scheduler.handle();
        scheduler.run_pending(at(13, 22, 0, 0));
        assert_eq!(handle.get_gate_cmd(), GateCmd::None);
        assert_eq!(scheduler.schedule_info().unwrap().gate_open_time, hm(5, 43));
    }

    #[test]
    fn later_job_overwrites_undrained_mailbox() {
        struct Close;
        impl SunTimes for Close {
            fn dawn(&self, date: NaiveDate) -> DateTime<Local> {
                local_time(date, hm(5, 0)).unwrap()
            }
            fn sunrise(&self, date: NaiveDate) -> DateTime<Local> {
                local_time(date, hm(6, 0)).unwrap()
            }
            fn sunset(&self, date: NaiveDate) -> DateTime<Local> {
                local_time(date, hm(6, 0)).unwrap()
            }
            fn dusk(&self, date: NaiveDate) -> DateTime<Local> {
                local_time(date, hm(6, 1)).unwrap()
            }
        }

        let mut scheduler = Scheduler::new(Close, Duration::zero(), at(10, 5, 59, 0));
        let handle = scheduler.handle();
        scheduler.run_pending(at(10, 6, 2, 0));
        assert_eq!(handle.get_gate_cmd(), GateCmd::Close);
    }
}
