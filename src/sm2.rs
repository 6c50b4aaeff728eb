//! SM-2 derived spaced repetition scheduling.
//!
//! Only an easy recall counts as a successful repetition. Medium and hard
//! both reset the streak to a one day interval and lower the ease factor,
//! differing only in how much mastery they cost.
//!
//! An easy review grows the interval by the ease factor the card had before
//! the review and raises the ease afterwards, so three easy reviews in a row
//! give intervals of 1, 6 and 16 days. Raising the ease first would give 17.

use chrono::{DateTime, Duration, Local};
use tracing::debug;

use crate::models::{Flashcard, ReviewOutcome, SpacedRepetitionData};

pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const MAX_MASTERY: f64 = 5.0;

#[derive(Debug, Clone, Default)]
pub struct Scheduler;

impl Scheduler {
    pub fn new() -> Self {
        Self
    }

    /// Apply a review outcome to a card in place.
    pub fn review_card(&self, card: &mut Flashcard, outcome: ReviewOutcome, now: DateTime<Local>) {
        let perf = &mut card.performance;
        perf.attempts += 1;
        perf.last_reviewed = Some(now);
        perf.mastery_level = match outcome {
            ReviewOutcome::Easy => {
                perf.correct += 1;
                (perf.mastery_level + 0.5).min(MAX_MASTERY)
            }
            ReviewOutcome::Medium => (perf.mastery_level - 0.1).max(0.0),
            ReviewOutcome::Hard => (perf.mastery_level - 0.3).max(0.0),
        };

        let srs = card
            .spaced_repetition
            .get_or_insert_with(|| SpacedRepetitionData::new(now));
        Self::apply(srs, outcome);
        srs.next_review = now + Duration::days(i64::from(srs.interval));
        card.difficulty = outcome.into();

        debug!(
            card = %card.id,
            outcome = outcome.name(),
            interval = srs.interval,
            ease = srs.ease_factor,
            "reviewed card"
        );
    }

    fn apply(srs: &mut SpacedRepetitionData, outcome: ReviewOutcome) {
        match outcome {
            ReviewOutcome::Easy => {
                // The interval grows by the ease the card had going into this
                // review; the bump applies from the next one.
                srs.repetition += 1;
                srs.interval = match srs.repetition {
                    1 => 1,
                    2 => 6,
                    _ => ((f64::from(srs.interval) * srs.ease_factor).round() as u32).max(1),
                };
                srs.ease_factor = (srs.ease_factor + 0.1).max(MIN_EASE_FACTOR);
            }
            ReviewOutcome::Medium | ReviewOutcome::Hard => {
                srs.repetition = 0;
                srs.interval = 1;
                srs.ease_factor = (srs.ease_factor - 0.2).max(MIN_EASE_FACTOR);
            }
        }
    }

    /// Interval in days each outcome would produce, without touching the card.
    pub fn preview_intervals(&self, card: &Flashcard) -> [(ReviewOutcome, u32); 3] {
        ReviewOutcome::ALL.map(|outcome| {
            let mut srs = card
                .spaced_repetition
                .clone()
                .unwrap_or_else(|| SpacedRepetitionData::new(card.created_at));
            Self::apply(&mut srs, outcome);
            (outcome, srs.interval)
        })
    }

    /// Cards whose next review is at or before `now`.
    pub fn due_cards<'a>(&self, cards: &'a [Flashcard], now: DateTime<Local>) -> Vec<&'a Flashcard> {
        cards.iter().filter(|c| c.is_due(now)).collect()
    }
}

pub fn format_interval(days: u32) -> String {
    match days {
        1 => "1 day".to_string(),
        d if d < 30 => format!("{} days", d),
        d if d < 365 => format!("{:.1} mo", f64::from(d) / 30.0),
        d => format!("{:.1} yr", f64::from(d) / 365.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn card() -> Flashcard {
        Flashcard::new("What is SM-2?".into(), "A scheduling algorithm".into(), now())
    }

    #[test]
    fn three_easy_reviews_follow_sm2_ladder() {
        let scheduler = Scheduler::new();
        let mut card = card();

        let mut seen = Vec::new();
        for _ in 0..3 {
            scheduler.review_card(&mut card, ReviewOutcome::Easy, now());
            let srs = card.spaced_repetition.as_ref().unwrap();
            seen.push((srs.repetition, srs.interval));
        }

        assert_eq!(seen, vec![(1, 1), (2, 6), (3, 16)]);
        let srs = card.spaced_repetition.as_ref().unwrap();
        assert!((srs.ease_factor - 2.8).abs() < 1e-9);
        assert_eq!(srs.next_review, now() + Duration::days(16));
    }

    #[test]
    fn easy_streak_never_shrinks_interval() {
        let scheduler = Scheduler::new();
        let mut card = card();
        let mut last = 0;
        for _ in 0..12 {
            scheduler.review_card(&mut card, ReviewOutcome::Easy, now());
            let interval = card.spaced_repetition.as_ref().unwrap().interval;
            assert!(interval >= last);
            last = interval;
        }
    }

    #[test]
    fn hard_resets_repetition_and_interval() {
        let scheduler = Scheduler::new();
        let mut card = card();
        for _ in 0..4 {
            scheduler.review_card(&mut card, ReviewOutcome::Easy, now());
        }
        scheduler.review_card(&mut card, ReviewOutcome::Hard, now());

        let srs = card.spaced_repetition.as_ref().unwrap();
        assert_eq!(srs.repetition, 0);
        assert_eq!(srs.interval, 1);
        assert_eq!(card.difficulty, crate::models::CardDifficulty::Hard);
    }

    #[test]
    fn ease_factor_has_floor() {
        let scheduler = Scheduler::new();
        let mut card = card();
        for i in 0..20 {
            let outcome = if i % 2 == 0 { ReviewOutcome::Hard } else { ReviewOutcome::Medium };
            scheduler.review_card(&mut card, outcome, now());
        }
        let ease = card.spaced_repetition.as_ref().unwrap().ease_factor;
        assert!(ease >= MIN_EASE_FACTOR);
        assert!((ease - MIN_EASE_FACTOR).abs() < 1e-9);
    }

    #[test]
    fn mastery_and_performance_tracking() {
        let scheduler = Scheduler::new();
        let mut card = card();

        for _ in 0..12 {
            scheduler.review_card(&mut card, ReviewOutcome::Easy, now());
        }
        assert_eq!(card.performance.mastery_level, MAX_MASTERY);

        scheduler.review_card(&mut card, ReviewOutcome::Medium, now());
        assert!((card.performance.mastery_level - 4.9).abs() < 1e-9);
        scheduler.review_card(&mut card, ReviewOutcome::Hard, now());
        assert!((card.performance.mastery_level - 4.6).abs() < 1e-9);

        assert_eq!(card.performance.attempts, 14);
        assert_eq!(card.performance.correct, 12);
        assert_eq!(card.performance.last_reviewed, Some(now()));
    }

    #[test]
    fn mastery_never_negative() {
        let scheduler = Scheduler::new();
        let mut card = card();
        scheduler.review_card(&mut card, ReviewOutcome::Hard, now());
        assert_eq!(card.performance.mastery_level, 0.0);
    }

    #[test]
    fn missing_schedule_is_created_on_review() {
        let scheduler = Scheduler::new();
        let mut card = card();
        card.spaced_repetition = None;
        scheduler.review_card(&mut card, ReviewOutcome::Easy, now());
        let srs = card.spaced_repetition.as_ref().unwrap();
        assert_eq!((srs.repetition, srs.interval), (1, 1));
    }

    #[test]
    fn preview_does_not_mutate() {
        let scheduler = Scheduler::new();
        let mut card = card();
        scheduler.review_card(&mut card, ReviewOutcome::Easy, now());
        let before = card.clone();

        let preview = scheduler.preview_intervals(&card);
        assert_eq!(preview[0], (ReviewOutcome::Easy, 6));
        assert_eq!(preview[1], (ReviewOutcome::Medium, 1));
        assert_eq!(card, before);
    }

    #[test]
    fn due_cards_filters_by_next_review() {
        let scheduler = Scheduler::new();
        let mut reviewed = card();
        scheduler.review_card(&mut reviewed, ReviewOutcome::Easy, now());
        let fresh = card();
        let cards = vec![reviewed, fresh];

        assert_eq!(scheduler.due_cards(&cards, now()).len(), 1);
        assert_eq!(scheduler.due_cards(&cards, now() + Duration::days(1)).len(), 2);
    }

    #[test]
    fn interval_formatting() {
        assert_eq!(format_interval(1), "1 day");
        assert_eq!(format_interval(16), "16 days");
        assert_eq!(format_interval(45), "1.5 mo");
    }
}
