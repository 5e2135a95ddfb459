use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone};
use json::JsonValue;

use chicken_gate::command::CommandInbox;
use chicken_gate::notify::LogNotifier;
use chicken_gate::status::StatusSink;
use chicken_gate::{Controller, Gate, GateDriver, GateIo, Motion, Scheduler, SunTimes};

#[derive(Default)]
struct IoState {
    pressed: bool,
    writes: Vec<(bool, bool)>,
    cleaned: bool,
}

/// Switch and relays the test can poke at while the controller owns them.
#[derive(Clone, Default)]
struct MockIo(Arc<Mutex<IoState>>);

impl MockIo {
    fn pressed(pressed: bool) -> Self {
        let io = MockIo::default();
        io.set_pressed(pressed);
        io
    }

    fn set_pressed(&self, pressed: bool) {
        self.0.lock().unwrap().pressed = pressed;
    }

    fn writes(&self) -> Vec<(bool, bool)> {
        self.0.lock().unwrap().writes.clone()
    }
}

impl GateIo for MockIo {
    fn closed_switch_pressed(&mut self) -> bool {
        self.0.lock().unwrap().pressed
    }

    fn set_relays(&mut self, forward: bool, reverse: bool) {
        self.0.lock().unwrap().writes.push((forward, reverse));
    }

    fn cleanup(&mut self) {
        let mut state = self.0.lock().unwrap();
        state.writes.push((false, false));
        state.cleaned = true;
    }
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<JsonValue>>>);

impl Recorder {
    fn last(&self) -> JsonValue {
        self.0.lock().unwrap().last().cloned().unwrap()
    }
}

impl StatusSink for Recorder {
    fn publish(&mut self, snapshot: &JsonValue) {
        self.0.lock().unwrap().push(snapshot.clone());
    }
}

/// Dawn 05:00, sunrise 05:30, sunset 20:30, dusk 21:00 every day.
struct FixedSun;

fn local(date: NaiveDate, h: u32, m: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(date.year(), date.month(), date.day(), h, m, 0)
        .unwrap()
}

impl SunTimes for FixedSun {
    fn dawn(&self, date: NaiveDate) -> DateTime<Local> {
        local(date, 5, 0)
    }
    fn sunrise(&self, date: NaiveDate) -> DateTime<Local> {
        local(date, 5, 30)
    }
    fn sunset(&self, date: NaiveDate) -> DateTime<Local> {
        local(date, 20, 30)
    }
    fn dusk(&self, date: NaiveDate) -> DateTime<Local> {
        local(date, 21, 0)
    }
}

fn june(day: u32, h: u32, m: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 6, day, h, m, s).unwrap()
}

struct Rig {
    controller: Controller<MockIo>,
    scheduler: Scheduler<FixedSun>,
    io: MockIo,
    inbox: CommandInbox,
    status: Recorder,
}

/// 10 second travel each way, so a full traversal is 100 ticks.
fn rig(pressed: bool, schedule_enabled: bool) -> Rig {
    let io = MockIo::pressed(pressed);
    let gate = Gate::new(100.0, 10.0, 10.0, Box::new(LogNotifier));
    let driver = GateDriver::new(gate, io.clone());
    let scheduler = Scheduler::new(FixedSun, Duration::minutes(30), june(10, 12, 0, 0));
    let inbox = CommandInbox::new();
    let status = Recorder::default();

    let mut controller = Controller::new(driver, scheduler.handle(), schedule_enabled);
    controller.add_source(Box::new(inbox.clone()));
    controller.add_sink(Box::new(status.clone()));
    Rig {
        controller,
        scheduler,
        io,
        inbox,
        status,
    }
}

impl Rig {
    fn send(&mut self, token: &str) {
        self.inbox.submit(token).unwrap();
        self.controller.tick();
    }

    fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.controller.tick();
        }
    }

    fn gate(&self) -> &Gate {
        self.controller.driver().gate()
    }
}

#[test]
fn reset_command_shows_in_snapshot() {
    let mut rig = rig(false, true);
    rig.send("RESET:50");

    let snapshot = rig.status.last();
    assert_eq!(snapshot["position"].as_f64(), Some(50.0));
    assert_eq!(snapshot["target_position"].as_f64(), Some(50.0));
    assert_eq!(snapshot["is_moving"].as_bool(), Some(false));
    assert_eq!(snapshot["schedule_enabled"].as_bool(), Some(true));
}

#[test]
fn snapshot_carries_schedule() {
    let mut rig = rig(false, true);
    rig.ticks(1);

    let schedule = &rig.status.last()["schedule"];
    assert_eq!(schedule["gate_open_time"].as_str(), Some("05:30"));
    assert_eq!(schedule["gate_close_time"].as_str(), Some("21:30"));
    assert_eq!(schedule["next_update"].as_str(), Some("00:00 (midnight)"));
}

#[test]
fn scheduled_close_drives_relays_once() {
    let mut rig = rig(false, true);
    assert_eq!(rig.gate().position(), 0.0);

    rig.scheduler.run_pending(june(10, 21, 29, 0));
    rig.scheduler.run_pending(june(10, 21, 30, 1));
    rig.ticks(5);

    assert_eq!(rig.io.writes(), vec![(false, true)]);
    assert_eq!(rig.gate().motion(), Motion::Closing);
    assert_eq!(rig.gate().target_position(), 100.0);
}

#[test]
fn scheduled_open_at_sunrise() {
    let mut rig = rig(true, true);
    assert_eq!(rig.gate().position(), 100.0);

    rig.scheduler.run_pending(june(10, 23, 59, 0));
    rig.scheduler.run_pending(june(11, 0, 1, 0));
    rig.ticks(1);
    assert_eq!(rig.gate().motion(), Motion::Stop);

    rig.scheduler.run_pending(june(11, 5, 29, 0));
    rig.scheduler.run_pending(june(11, 5, 30, 0));
    rig.ticks(1);
    assert_eq!(rig.gate().motion(), Motion::Opening);
    assert_eq!(rig.io.writes(), vec![(false, false), (true, false)]);
}

#[test]
fn disabled_schedule_drops_jobs() {
    let mut rig = rig(false, false);
    rig.scheduler.run_pending(june(10, 21, 29, 0));
    rig.scheduler.run_pending(june(10, 21, 31, 0));
    rig.ticks(1);
    assert_eq!(rig.gate().motion(), Motion::Stop);

    // The job was consumed while disabled and does not fire late.
    rig.send("ENABLE_SCHEDULE");
    assert!(rig.controller.schedule_enabled());
    rig.ticks(3);
    assert_eq!(rig.gate().motion(), Motion::Stop);
    assert_eq!(rig.gate().target_position(), 0.0);

    rig.send("DISABLE_SCHEDULE");
    assert!(!rig.controller.schedule_enabled());
    assert_eq!(rig.status.last()["schedule_enabled"].as_bool(), Some(false));
}

#[test]
fn malformed_commands_are_ignored() {
    let mut rig = rig(false, true);
    for token in ["", "JUMP", "RESET:abc", "RESET:101", "open"] {
        rig.send(token);
    }
    assert_eq!(rig.gate().position(), 0.0);
    assert_eq!(rig.gate().motion(), Motion::Stop);
    assert!(rig.gate().errors().is_empty());
}

#[test]
fn bare_reset_follows_switch() {
    let mut rig = rig(false, true);
    rig.send("RESET:40");
    assert_eq!(rig.gate().position(), 40.0);

    rig.io.set_pressed(true);
    rig.send("RESET");
    assert_eq!(rig.gate().position(), 100.0);

    rig.io.set_pressed(false);
    rig.send("RESET");
    assert_eq!(rig.gate().position(), 0.0);
}

#[test]
fn full_open_from_closed() {
    let mut rig = rig(true, true);
    rig.send("OPEN");
    assert_eq!(rig.gate().motion(), Motion::Opening);

    // Switch releases once the gate lifts off it.
    rig.io.set_pressed(false);
    rig.ticks(110);

    assert_eq!(rig.gate().position(), 0.0);
    assert_eq!(rig.gate().motion(), Motion::Stop);
    assert!(rig.gate().errors().is_empty());
    assert_eq!(rig.io.writes(), vec![(true, false), (false, false)]);

    let snapshot = rig.status.last();
    assert_eq!(snapshot["position"].as_f64(), Some(0.0));
    assert_eq!(snapshot["is_opening"].as_bool(), Some(false));
}

#[test]
fn clear_errors_reenables_open() {
    let mut rig = rig(false, true);
    rig.send("CLOSE");
    // The switch never closes, so finishing the close raises an alarm.
    rig.ticks(110);
    assert_eq!(rig.gate().position(), 100.0);
    assert!(rig.gate().open_disabled());
    assert_eq!(rig.gate().errors().len(), 1);
    assert_eq!(rig.status.last()["errors"].len(), 1);

    rig.send("OPEN");
    assert_eq!(rig.gate().target_position(), 100.0);
    assert_eq!(rig.gate().motion(), Motion::Stop);

    rig.send("CLEAR_ERRORS");
    assert!(!rig.gate().open_disabled());
    assert!(rig.gate().errors().is_empty());

    rig.send("OPEN");
    assert_eq!(rig.gate().motion(), Motion::Opening);
}

#[test]
fn stop_and_clear_diagnostics() {
    let mut rig = rig(false, true);
    rig.send("CLOSE");
    rig.ticks(20);
    rig.send("STOP");
    let stopped_at = rig.gate().position();
    assert_eq!(rig.gate().motion(), Motion::Stop);
    rig.ticks(10);
    assert_eq!(rig.gate().position(), stopped_at);
    assert!(!rig.gate().diagnostics().is_empty());

    rig.send("CLEAR_DIAGNOSTICS");
    assert!(rig.status.last()["diagnostic_messages"].is_empty());
}

#[test]
fn shutdown_turns_relays_off() {
    let mut rig = rig(false, true);
    rig.send("CLOSE");
    rig.controller.shutdown();

    assert_eq!(rig.io.writes().last(), Some(&(false, false)));
    assert!(rig.io.0.lock().unwrap().cleaned);
}
