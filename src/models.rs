//! Data models for flashcards.

use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How well a card was recalled during review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewOutcome {
    Easy,
    Medium,
    Hard,
}

impl ReviewOutcome {
    pub const ALL: [ReviewOutcome; 3] = [Self::Easy, Self::Medium, Self::Hard];

    pub fn from_key(c: char) -> Option<Self> {
        match c {
            '1' => Some(Self::Easy),
            '2' => Some(Self::Medium),
            '3' => Some(Self::Hard),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }

    pub fn color_for_theme(&self, theme: &crate::ui::theme::Theme) -> ratatui::style::Color {
        match self {
            Self::Easy => theme.colors.rating_easy,
            Self::Medium => theme.colors.rating_medium,
            Self::Hard => theme.colors.rating_hard,
        }
    }
}

/// Difficulty tag carried by a card; `New` until its first review.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CardDifficulty {
    #[default]
    New,
    Easy,
    Medium,
    Hard,
}

impl From<ReviewOutcome> for CardDifficulty {
    fn from(outcome: ReviewOutcome) -> Self {
        match outcome {
            ReviewOutcome::Easy => Self::Easy,
            ReviewOutcome::Medium => Self::Medium,
            ReviewOutcome::Hard => Self::Hard,
        }
    }
}

impl CardDifficulty {
    pub fn name(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CardSource {
    #[default]
    Manual,
    AutoGenerated,
    Imported,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Performance {
    pub attempts: u32,
    pub correct: u32,
    pub last_reviewed: Option<DateTime<Local>>,
    /// Bounded to `[0, 5]`.
    pub mastery_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpacedRepetitionData {
    /// Days until the next review, at least 1.
    pub interval: u32,
    /// Consecutive easy reviews.
    pub repetition: u32,
    pub ease_factor: f64,
    pub next_review: DateTime<Local>,
}

impl SpacedRepetitionData {
    pub const INITIAL_EASE: f64 = 2.5;

    pub fn new(next_review: DateTime<Local>) -> Self {
        Self {
            interval: 1,
            repetition: 0,
            ease_factor: Self::INITIAL_EASE,
            next_review,
        }
    }
}

/// A single flashcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub difficulty: CardDifficulty,
    #[serde(default)]
    pub source: CardSource,

    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default = "Local::now")]
    pub created_at: DateTime<Local>,

    #[serde(default)]
    pub performance: Performance,
    #[serde(default, rename = "spacedRepetitionData", skip_serializing_if = "Option::is_none")]
    pub spaced_repetition: Option<SpacedRepetitionData>,
}

impl Flashcard {
    pub fn new(question: String, answer: String, now: DateTime<Local>) -> Self {
        Self {
            id: Uuid::new_v4().to_string()[..8].to_string(),
            question,
            answer,
            difficulty: CardDifficulty::New,
            source: CardSource::Manual,
            tags: Vec::new(),
            hint: None,
            created_at: now,
            performance: Performance::default(),
            spaced_repetition: Some(SpacedRepetitionData::new(now)),
        }
    }

    pub fn with_source(mut self, source: CardSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_difficulty(mut self, difficulty: CardDifficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn is_new(&self) -> bool {
        self.performance.attempts == 0
    }

    /// Cards without scheduling data are always due.
    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        match &self.spaced_repetition {
            None => true,
            Some(srs) => srs.next_review <= now,
        }
    }

    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.question.to_lowercase().contains(&query)
            || self.answer.to_lowercase().contains(&query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&query))
    }
}

/// Statistics for a deck.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DeckStats {
    pub total_cards: usize,
    pub auto_generated: usize,
    pub manual: usize,
    /// Rounded percentage of correct reviews across all attempts.
    pub average_accuracy: u32,
    pub cards_with_performance: usize,
    pub due_cards: usize,
    pub new_cards: usize,
    pub easy_cards: usize,
    pub medium_cards: usize,
    pub hard_cards: usize,
}
