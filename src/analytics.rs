//! Study time and activity counters for the dashboard.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::{self, SharedStore, ANALYTICS_KEY};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyticsStats {
    pub total_study_seconds: u64,
    pub documents_studied: u32,
    pub flashcards_created: u32,
    pub sessions_completed: u32,
    /// Percent through the current reading plan.
    pub session_progress: u32,
    /// Study seconds per calendar day.
    pub daily: BTreeMap<NaiveDate, u64>,
}

pub struct Analytics {
    stats: AnalyticsStats,
    store: SharedStore,
}

impl Analytics {
    pub fn load(store: SharedStore) -> Self {
        let stats = storage::load(store.as_ref(), ANALYTICS_KEY).unwrap_or_default();
        Self { stats, store }
    }

    pub fn stats(&self) -> &AnalyticsStats {
        &self.stats
    }

    pub fn add_study_time(&mut self, seconds: u64, today: NaiveDate) {
        if seconds == 0 {
            return;
        }
        self.stats.total_study_seconds += seconds;
        *self.stats.daily.entry(today).or_default() += seconds;
        debug!(seconds, %today, "added study time");
        self.save();
    }

    pub fn complete_session(&mut self, seconds: u64, today: NaiveDate) {
        self.stats.sessions_completed += 1;
        if seconds == 0 {
            self.save();
        } else {
            self.add_study_time(seconds, today);
        }
    }

    pub fn increment_documents(&mut self) {
        self.stats.documents_studied += 1;
        self.save();
    }

    pub fn add_flashcards(&mut self, count: u32) {
        self.stats.flashcards_created += count;
        self.save();
    }

    pub fn set_session_progress(&mut self, percent: u32) {
        self.stats.session_progress = percent.min(100);
        self.save();
    }

    pub fn study_time_on(&self, date: NaiveDate) -> u64 {
        self.stats.daily.get(&date).copied().unwrap_or(0)
    }

    /// Seconds studied over the seven days ending `today`.
    pub fn weekly_seconds(&self, today: NaiveDate) -> u64 {
        let from = today - Duration::days(6);
        self.stats.daily.range(from..=today).map(|(_, s)| s).sum()
    }

    pub fn weekly_progress_percent(&self, goal_minutes: u32, today: NaiveDate) -> u32 {
        if goal_minutes == 0 {
            return 100;
        }
        let minutes = self.weekly_seconds(today) as f64 / 60.0;
        ((minutes / f64::from(goal_minutes)) * 100.0).round().min(100.0) as u32
    }

    /// Consecutive study days ending today, or yesterday if today has no
    /// study time yet.
    pub fn streak(&self, today: NaiveDate) -> u32 {
        let studied = |d: NaiveDate| self.study_time_on(d) > 0;
        let mut day = if studied(today) { today } else { today - Duration::days(1) };
        let mut streak = 0;
        while studied(day) {
            streak += 1;
            day -= Duration::days(1);
        }
        streak
    }

    fn save(&self) {
        storage::save(self.store.as_ref(), ANALYTICS_KEY, &self.stats);
    }
}

pub fn format_study_time(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    if h > 0 {
        format!("{}h {}m", h, m)
    } else {
        format!("{}m", m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::storage::{KeyValueStore, MemoryStore};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts writes on top of an in-memory store.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        writes: Cell<usize>,
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.writes.set(self.writes.get() + 1);
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }

        fn keys(&self) -> Result<Vec<String>> {
            self.inner.keys()
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn counters_persist() {
        let store: SharedStore = Rc::new(MemoryStore::new());
        let mut analytics = Analytics::load(store.clone());
        analytics.complete_session(1500, day(3));
        analytics.increment_documents();
        analytics.add_flashcards(4);

        let reloaded = Analytics::load(store);
        assert_eq!(reloaded.stats().sessions_completed, 1);
        assert_eq!(reloaded.stats().total_study_seconds, 1500);
        assert_eq!(reloaded.stats().documents_studied, 1);
        assert_eq!(reloaded.stats().flashcards_created, 4);
        assert_eq!(reloaded.study_time_on(day(3)), 1500);
    }

    #[test]
    fn completing_a_session_writes_once() {
        let store = Rc::new(CountingStore::default());
        let mut analytics = Analytics::load(store.clone());

        analytics.complete_session(1500, day(3));
        assert_eq!(store.writes.get(), 1);

        analytics.complete_session(0, day(3));
        assert_eq!(store.writes.get(), 2);
        assert_eq!(analytics.stats().sessions_completed, 2);
    }

    #[test]
    fn malformed_stats_are_kept_aside_before_overwrite() {
        let store: SharedStore = Rc::new(MemoryStore::new());
        let raw = r#"{"sessionsCompleted": 4, "daily": {"not-a-date": 10}}"#;
        store.set(ANALYTICS_KEY, raw).unwrap();

        let mut analytics = Analytics::load(store.clone());
        assert_eq!(analytics.stats().sessions_completed, 0);
        analytics.add_flashcards(1);

        let kept = store.get(&storage::corrupt_key(ANALYTICS_KEY)).unwrap();
        assert_eq!(kept.as_deref(), Some(raw));
    }

    #[test]
    fn weekly_progress_is_capped() {
        let mut analytics = Analytics::load(Rc::new(MemoryStore::new()));
        analytics.add_study_time(90 * 60, day(1));
        analytics.add_study_time(60 * 60, day(7));
        assert_eq!(analytics.weekly_progress_percent(300, day(7)), 50);
        assert_eq!(analytics.weekly_progress_percent(300, day(8)), 20);
        assert_eq!(analytics.weekly_progress_percent(60, day(7)), 100);
    }

    #[test]
    fn streak_counts_back_from_today_or_yesterday() {
        let mut analytics = Analytics::load(Rc::new(MemoryStore::new()));
        for d in [2, 3, 4] {
            analytics.add_study_time(600, day(d));
        }
        assert_eq!(analytics.streak(day(4)), 3);
        assert_eq!(analytics.streak(day(5)), 3);
        assert_eq!(analytics.streak(day(6)), 0);
    }

    #[test]
    fn study_time_formatting() {
        assert_eq!(format_study_time(3900), "1h 5m");
        assert_eq!(format_study_time(720), "12m");
    }
}
