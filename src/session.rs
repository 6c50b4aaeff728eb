//! Glue between the timer and the study statistics.
//!
//! Timer listeners cannot borrow the session, so they only queue events.
//! Every timer call made through [`StudySession::control`] drains the queue
//! afterwards and reacts: completed study runs are credited to analytics and
//! may chain straight into a break.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analytics::Analytics;
use crate::clock::Clock;
use crate::storage::{self, SharedStore, RECENT_FILES_KEY};
use crate::timer::{TimerEngine, TimerEvent, TimerKind};

pub const MAX_RECENT_FILES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFile {
    pub name: String,
    pub path: PathBuf,
    pub opened_at: DateTime<Local>,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub auto_break: bool,
    pub break_minutes: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            auto_break: true,
            break_minutes: 5,
        }
    }
}

pub struct StudySession {
    timer: TimerEngine,
    analytics: Analytics,
    settings: SessionSettings,
    recent: Vec<RecentFile>,
    inbox: Rc<RefCell<VecDeque<TimerEvent>>>,
    /// Processed events not yet collected by the caller.
    handled: Vec<TimerEvent>,
    store: SharedStore,
    clock: Rc<dyn Clock>,
}

impl StudySession {
    /// Build the session and resume any timer left running by a previous run.
    pub fn new(store: SharedStore, clock: Rc<dyn Clock>, settings: SessionSettings) -> Self {
        let inbox = Rc::new(RefCell::new(VecDeque::new()));
        let mut timer = TimerEngine::new(store.clone(), clock.clone());
        let queue = inbox.clone();
        timer.subscribe(move |event| queue.borrow_mut().push_back(event.clone()));

        let recent = storage::load(store.as_ref(), RECENT_FILES_KEY).unwrap_or_default();
        let mut session = Self {
            timer,
            analytics: Analytics::load(store.clone()),
            settings,
            recent,
            inbox,
            handled: Vec::new(),
            store,
            clock,
        };
        session.control(TimerEngine::resume);
        session
    }

    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    pub fn analytics_mut(&mut self) -> &mut Analytics {
        &mut self.analytics
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    /// Run a timer operation and react to whatever it emitted.
    pub fn control<R>(&mut self, op: impl FnOnce(&mut TimerEngine) -> R) -> R {
        let result = op(&mut self.timer);
        self.process_events();
        result
    }

    /// Events handled since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<TimerEvent> {
        std::mem::take(&mut self.handled)
    }

    fn process_events(&mut self) {
        loop {
            let Some(event) = self.inbox.borrow_mut().pop_front() else {
                break;
            };
            self.on_event(&event);
            self.handled.push(event);
        }
    }

    fn on_event(&mut self, event: &TimerEvent) {
        let (elapsed, full_session) = match event {
            TimerEvent::Complete {
                elapsed,
                kind: TimerKind::Study,
                full_session,
            } => (*elapsed, *full_session),
            _ => return,
        };

        let today = self.today();
        if !full_session {
            self.analytics.add_study_time(u64::from(elapsed), today);
            return;
        }

        self.analytics.complete_session(u64::from(elapsed), today);
        info!(elapsed, "study session completed");

        if self.settings.auto_break {
            match self
                .timer
                .set_duration(self.settings.break_minutes, 0, TimerKind::Break)
            {
                Ok(()) => self.timer.start(),
                Err(err) => warn!(error = %err, "could not start automatic break"),
            }
        }
    }

    pub fn recent_files(&self) -> &[RecentFile] {
        &self.recent
    }

    /// Record that a document was opened for study.
    pub fn open_document(&mut self, path: PathBuf) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.recent.retain(|f| f.name != name);
        self.recent.insert(
            0,
            RecentFile {
                name,
                path,
                opened_at: self.clock.now(),
            },
        );
        self.recent.truncate(MAX_RECENT_FILES);
        storage::save(self.store.as_ref(), RECENT_FILES_KEY, &self.recent);

        self.analytics.increment_documents();
    }
}
