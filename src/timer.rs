//! Pomodoro countdown state machine.
//!
//! The engine never spawns threads or sleeps. A driver calls [`TimerEngine::tick`]
//! once per second, or [`TimerEngine::advance`] whenever it likes and lets the
//! wall-clock anchor decide how many ticks are due. State is written to the
//! store after every transition so a restart can pick up where it left off.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{elapsed_secs, Clock};
use crate::error::{Result, StudyError};
use crate::storage::{self, SharedStore, TIMER_KEY};

pub const DEFAULT_SECONDS: u32 = 25 * 60;
const WARNING_MARKS: [u32; 2] = [300, 60];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerKind {
    #[default]
    Study,
    Break,
}

impl TimerKind {
    pub fn label(&self) -> &'static str {
        match self {
            TimerKind::Study => "Study",
            TimerKind::Break => "Break",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Pomodoro,
    ShortBreak,
    LongBreak,
}

impl Preset {
    pub fn minutes(&self) -> u32 {
        match self {
            Preset::Pomodoro => 25,
            Preset::ShortBreak => 5,
            Preset::LongBreak => 15,
        }
    }

    pub fn kind(&self) -> TimerKind {
        match self {
            Preset::Pomodoro => TimerKind::Study,
            Preset::ShortBreak | Preset::LongBreak => TimerKind::Break,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Pomodoro => "Pomodoro",
            Preset::ShortBreak => "Short Break",
            Preset::LongBreak => "Long Break",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    Set { remaining: u32, kind: TimerKind },
    Start { kind: TimerKind },
    Tick { remaining: u32, kind: TimerKind },
    /// Study timers pass five and one minute marks.
    Warning { remaining: u32 },
    Pause { kind: TimerKind },
    Stop { kind: TimerKind },
    Reset { kind: TimerKind },
    Complete { elapsed: u32, kind: TimerKind, full_session: bool },
}

/// Persisted timer state. Missing fields fall back to an idle 25 minute
/// study timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub version: u32,
    pub total_seconds: u32,
    pub remaining: u32,
    pub running: bool,
    #[serde(rename = "type")]
    pub kind: TimerKind,
    /// Epoch millis such that `now - start_time` is the elapsed run time.
    pub start_time: Option<i64>,
}

impl Default for TimerSnapshot {
    fn default() -> Self {
        Self {
            version: 1,
            total_seconds: DEFAULT_SECONDS,
            remaining: DEFAULT_SECONDS,
            running: false,
            kind: TimerKind::Study,
            start_time: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Restored {
    Idle(TimerSnapshot),
    /// Still running; `remaining` has been recomputed from the anchor.
    Resume(TimerSnapshot),
    /// The run ended while nobody was watching.
    CompletedWhileAway(TimerSnapshot),
}

/// Rebuild timer state from a snapshot taken at some earlier time.
pub fn restore(mut snapshot: TimerSnapshot, now_millis: i64) -> Restored {
    if snapshot.total_seconds == 0 {
        snapshot.total_seconds = DEFAULT_SECONDS;
    }
    snapshot.remaining = snapshot.remaining.min(snapshot.total_seconds);

    match (snapshot.running, snapshot.start_time) {
        (true, Some(anchor)) => {
            let elapsed = elapsed_secs(anchor, now_millis);
            let left = u64::from(snapshot.total_seconds).saturating_sub(elapsed);
            if left > 0 {
                snapshot.remaining = left as u32;
                Restored::Resume(snapshot)
            } else {
                snapshot.remaining = 0;
                Restored::CompletedWhileAway(snapshot)
            }
        }
        _ => {
            snapshot.running = false;
            Restored::Idle(snapshot)
        }
    }
}

pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

type Listener = Box<dyn FnMut(&TimerEvent)>;

pub struct TimerEngine {
    total_seconds: u32,
    remaining: u32,
    running: bool,
    kind: TimerKind,
    start_time: Option<i64>,
    completed: bool,

    store: SharedStore,
    clock: Rc<dyn Clock>,
    listeners: Vec<Listener>,
}

impl TimerEngine {
    pub fn new(store: SharedStore, clock: Rc<dyn Clock>) -> Self {
        Self {
            total_seconds: DEFAULT_SECONDS,
            remaining: DEFAULT_SECONDS,
            running: false,
            kind: TimerKind::Study,
            start_time: None,
            completed: false,
            store,
            clock,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&TimerEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Pick up persisted state, restarting or completing an interrupted run.
    /// Call after subscribing so listeners see the resulting events.
    pub fn resume(&mut self) {
        let Some(snapshot) = storage::load::<TimerSnapshot>(self.store.as_ref(), TIMER_KEY) else {
            return;
        };

        match restore(snapshot, self.clock.now_millis()) {
            Restored::Idle(s) => self.apply(&s),
            Restored::Resume(s) => {
                info!(remaining = s.remaining, "resuming timer");
                self.apply(&s);
                self.start();
            }
            Restored::CompletedWhileAway(s) => {
                info!(kind = ?s.kind, "timer finished while away");
                self.apply(&s);
                self.running = true;
                self.complete();
            }
        }
    }

    fn apply(&mut self, s: &TimerSnapshot) {
        self.total_seconds = s.total_seconds;
        self.remaining = s.remaining;
        self.kind = s.kind;
        self.start_time = s.start_time;
        self.running = false;
        self.completed = false;
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            version: 1,
            total_seconds: self.total_seconds,
            remaining: self.remaining,
            running: self.running,
            kind: self.kind,
            start_time: self.start_time,
        }
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn display(&self) -> String {
        format_clock(u64::from(self.remaining))
    }

    /// Fraction of the run already elapsed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total_seconds == 0 {
            return 0.0;
        }
        f64::from(self.total_seconds - self.remaining) / f64::from(self.total_seconds)
    }

    pub fn set_duration(&mut self, minutes: u32, seconds: u32, kind: TimerKind) -> Result<()> {
        let total = minutes
            .checked_mul(60)
            .and_then(|m| m.checked_add(seconds))
            .filter(|&t| t > 0)
            .ok_or(StudyError::InvalidDuration { minutes, seconds })?;

        self.total_seconds = total;
        self.remaining = total;
        self.kind = kind;
        self.completed = false;
        if self.running {
            self.start_time = Some(self.clock.now_millis());
        }
        self.save();
        self.emit(TimerEvent::Set { remaining: total, kind });
        Ok(())
    }

    pub fn set_preset(&mut self, preset: Preset) -> Result<()> {
        self.set_duration(preset.minutes(), 0, preset.kind())
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        if self.remaining == 0 {
            self.remaining = self.total_seconds;
        }
        self.running = true;
        self.completed = false;
        let done = i64::from(self.total_seconds - self.remaining) * 1000;
        self.start_time = Some(self.clock.now_millis() - done);
        self.save();
        debug!(kind = ?self.kind, remaining = self.remaining, "timer started");
        self.emit(TimerEvent::Start { kind: self.kind });
    }

    /// One second passes.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }
        self.remaining = self.remaining.saturating_sub(1);
        self.save();
        self.emit(TimerEvent::Tick {
            remaining: self.remaining,
            kind: self.kind,
        });

        if self.kind == TimerKind::Study && WARNING_MARKS.contains(&self.remaining) {
            self.emit(TimerEvent::Warning { remaining: self.remaining });
        }
        if self.remaining == 0 {
            self.complete();
        }
    }

    /// Run every tick the wall clock says is due. Returns how many ran.
    pub fn advance(&mut self) -> u32 {
        let Some(anchor) = self.start_time else {
            return 0;
        };
        let elapsed = elapsed_secs(anchor, self.clock.now_millis());
        let target = u64::from(self.total_seconds).saturating_sub(elapsed) as u32;

        let mut ticks = 0;
        while self.running && self.remaining > target {
            self.tick();
            ticks += 1;
        }
        ticks
    }

    pub fn pause(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.save();
        debug!(remaining = self.remaining, "timer paused");
        self.emit(TimerEvent::Pause { kind: self.kind });
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.start_time = None;
        self.save();
        debug!("timer stopped");
        self.emit(TimerEvent::Stop { kind: self.kind });
    }

    /// Restores the full duration. A running timer keeps running and counts
    /// down from the top again.
    pub fn reset(&mut self) {
        self.remaining = self.total_seconds;
        self.completed = false;
        if self.running {
            self.start_time = Some(self.clock.now_millis());
        }
        self.save();
        self.emit(TimerEvent::Reset { kind: self.kind });
    }

    /// Finish the current run. Fires at most once per run.
    pub fn complete(&mut self) {
        if self.completed || (!self.running && self.remaining == self.total_seconds) {
            return;
        }
        let elapsed = self.total_seconds - self.remaining;
        let full_session = self.remaining == 0;

        self.completed = true;
        self.running = false;
        self.start_time = None;
        self.save();
        info!(kind = ?self.kind, elapsed, full_session, "timer complete");
        self.emit(TimerEvent::Complete {
            elapsed,
            kind: self.kind,
            full_session,
        });
    }

    fn save(&self) {
        storage::save(self.store.as_ref(), TIMER_KEY, &self.snapshot());
    }

    fn emit(&mut self, event: TimerEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::{KeyValueStore, MemoryStore};
    use chrono::{Local, TimeZone};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    struct Harness {
        store: SharedStore,
        clock: Rc<ManualClock>,
        events: Rc<RefCell<Vec<TimerEvent>>>,
    }

    impl Harness {
        fn new() -> Self {
            let start = Local.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap();
            Self {
                store: Rc::new(MemoryStore::new()),
                clock: Rc::new(ManualClock::new(start)),
                events: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn engine(&self) -> TimerEngine {
            let mut engine = TimerEngine::new(self.store.clone(), self.clock.clone());
            let events = self.events.clone();
            engine.subscribe(move |e| events.borrow_mut().push(e.clone()));
            engine
        }

        fn count(&self, pred: impl Fn(&TimerEvent) -> bool) -> usize {
            self.events.borrow().iter().filter(|e| pred(e)).count()
        }
    }

    #[test]
    fn five_second_timer_completes_once() {
        let h = Harness::new();
        let mut timer = h.engine();
        timer.set_duration(0, 5, TimerKind::Study).unwrap();
        timer.start();

        for _ in 0..6 {
            timer.tick();
        }

        assert_eq!(timer.remaining(), 0);
        assert!(!timer.is_running());
        assert_eq!(h.count(|e| matches!(e, TimerEvent::Tick { .. })), 5);
        assert_eq!(h.count(|e| matches!(e, TimerEvent::Complete { .. })), 1);

        let ticks: Vec<u32> = h
            .events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                TimerEvent::Tick { remaining, .. } => Some(*remaining),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![4, 3, 2, 1, 0]);

        timer.complete();
        assert_eq!(h.count(|e| matches!(e, TimerEvent::Complete { .. })), 1);
    }

    #[test]
    fn complete_reports_elapsed_and_full_session() {
        let h = Harness::new();
        let mut timer = h.engine();
        timer.set_duration(0, 3, TimerKind::Break).unwrap();
        timer.start();
        for _ in 0..3 {
            timer.tick();
        }
        assert!(h.events.borrow().contains(&TimerEvent::Complete {
            elapsed: 3,
            kind: TimerKind::Break,
            full_session: true
        }));
    }

    #[test]
    fn early_completion_is_not_full_session() {
        let h = Harness::new();
        let mut timer = h.engine();
        timer.set_duration(1, 0, TimerKind::Study).unwrap();
        timer.start();
        timer.tick();
        timer.complete();
        assert!(h.events.borrow().contains(&TimerEvent::Complete {
            elapsed: 1,
            kind: TimerKind::Study,
            full_session: false
        }));
    }

    #[test]
    fn zero_duration_is_rejected_without_change() {
        let h = Harness::new();
        let mut timer = h.engine();
        let err = timer.set_duration(0, 0, TimerKind::Study).unwrap_err();
        assert!(matches!(err, StudyError::InvalidDuration { .. }));
        assert_eq!(timer.total_seconds(), DEFAULT_SECONDS);
        assert!(h.events.borrow().is_empty());
    }

    #[test]
    fn pause_keeps_remaining() {
        let h = Harness::new();
        let mut timer = h.engine();
        timer.start();
        timer.tick();
        timer.pause();
        timer.tick();
        assert_eq!(timer.remaining(), DEFAULT_SECONDS - 1);

        timer.pause();
        assert_eq!(h.count(|e| matches!(e, TimerEvent::Pause { .. })), 1);
    }

    #[test]
    fn start_is_idempotent() {
        let h = Harness::new();
        let mut timer = h.engine();
        timer.start();
        timer.start();
        assert_eq!(h.count(|e| matches!(e, TimerEvent::Start { .. })), 1);
    }

    #[test]
    fn reset_while_running_keeps_running() {
        let h = Harness::new();
        let mut timer = h.engine();
        timer.set_duration(0, 10, TimerKind::Study).unwrap();
        timer.start();
        h.clock.advance_secs(4);
        assert_eq!(timer.advance(), 4);

        timer.reset();
        assert!(timer.is_running());
        assert_eq!(timer.remaining(), 10);

        h.clock.advance_secs(2);
        assert_eq!(timer.advance(), 2);
        assert_eq!(timer.remaining(), 8);
    }

    #[test]
    fn set_duration_while_running_continues() {
        let h = Harness::new();
        let mut timer = h.engine();
        timer.start();
        timer.set_duration(0, 30, TimerKind::Break).unwrap();
        assert!(timer.is_running());
        assert_eq!(timer.remaining(), 30);
    }

    #[test]
    fn advance_follows_wall_clock() {
        let h = Harness::new();
        let mut timer = h.engine();
        timer.set_duration(0, 90, TimerKind::Study).unwrap();
        timer.start();

        h.clock.advance_secs(30);
        assert_eq!(timer.advance(), 30);
        assert_eq!(timer.remaining(), 60);

        h.clock.advance_secs(500);
        timer.advance();
        assert_eq!(timer.remaining(), 0);
        assert_eq!(h.count(|e| matches!(e, TimerEvent::Complete { .. })), 1);
    }

    #[test]
    fn study_warnings_fire_at_marks() {
        let h = Harness::new();
        let mut timer = h.engine();
        timer.set_duration(5, 1, TimerKind::Study).unwrap();
        timer.start();
        timer.tick();
        assert!(h.events.borrow().contains(&TimerEvent::Warning { remaining: 300 }));
    }

    #[test]
    fn snapshot_resumes_after_elapsed_time() {
        let h = Harness::new();
        let mut timer = h.engine();
        timer.start();
        h.clock.advance_secs(100);
        timer.advance();
        assert_eq!(timer.remaining(), 1400);

        h.clock.advance_secs(200);
        let mut reloaded = h.engine();
        reloaded.resume();
        assert!(reloaded.is_running());
        assert_eq!(reloaded.remaining(), 1200);
    }

    #[test]
    fn snapshot_completes_when_expired_while_away() {
        let h = Harness::new();
        let mut timer = h.engine();
        timer.set_duration(1, 0, TimerKind::Study).unwrap();
        timer.start();

        h.clock.advance_secs(3600);
        let mut reloaded = h.engine();
        reloaded.resume();
        assert!(!reloaded.is_running());
        assert_eq!(reloaded.remaining(), 0);
        assert_eq!(h.count(|e| matches!(e, TimerEvent::Complete { full_session: true, .. })), 1);
    }

    #[test]
    fn restore_is_pure() {
        let snapshot = TimerSnapshot {
            running: true,
            remaining: 1000,
            start_time: Some(0),
            ..TimerSnapshot::default()
        };
        assert_eq!(
            restore(snapshot.clone(), 600_500),
            Restored::Resume(TimerSnapshot { remaining: 900, ..snapshot.clone() })
        );
        assert!(matches!(restore(snapshot.clone(), 2_000_000), Restored::CompletedWhileAway(_)));

        // A clock that moved backwards counts as no time elapsed.
        match restore(snapshot, -5_000) {
            Restored::Resume(s) => assert_eq!(s.remaining, DEFAULT_SECONDS),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_snapshot_uses_defaults() {
        let h = Harness::new();
        h.store.set(TIMER_KEY, r#"{"remaining": 42}"#).unwrap();
        let mut timer = h.engine();
        timer.resume();
        assert_eq!(timer.total_seconds(), DEFAULT_SECONDS);
        assert_eq!(timer.remaining(), 42);
        assert!(!timer.is_running());
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(61), "01:01");
    }
}
