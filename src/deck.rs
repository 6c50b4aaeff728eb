//! The flashcard collection and review position.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use chrono::{DateTime, Local};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::Result;
use crate::generator;
use crate::models::{CardDifficulty, CardSource, DeckStats, Flashcard, ReviewOutcome};
use crate::sm2::Scheduler;
use crate::storage::{self, SharedStore, FLASHCARDS_KEY};

/// Upper bound on cards added by one generation run.
pub const MAX_GENERATED_PER_RUN: usize = 15;

#[derive(Debug, Serialize)]
struct DeckSnapshot {
    version: u32,
    cards: Vec<Flashcard>,
}

/// Stored deck shape, decoded card by card. Older stores hold a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDeck {
    Versioned { cards: Vec<serde_json::Value> },
    Legacy(Vec<serde_json::Value>),
}

/// Portable export of a deck.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckExport {
    pub version: u32,
    pub exported_at: DateTime<Local>,
    pub cards: Vec<Flashcard>,
}

pub struct FlashcardDeck {
    cards: Vec<Flashcard>,
    index: usize,
    scheduler: Scheduler,
    store: SharedStore,
    clock: Rc<dyn Clock>,
}

impl FlashcardDeck {
    pub fn new(store: SharedStore, clock: Rc<dyn Clock>) -> Self {
        Self {
            cards: Vec::new(),
            index: 0,
            scheduler: Scheduler::new(),
            store,
            clock,
        }
    }

    pub fn load(store: SharedStore, clock: Rc<dyn Clock>) -> Self {
        let items = match storage::load::<StoredDeck>(store.as_ref(), FLASHCARDS_KEY) {
            Some(StoredDeck::Versioned { cards }) | Some(StoredDeck::Legacy(cards)) => cards,
            None => Vec::new(),
        };
        let cards: Vec<Flashcard> = storage::decode_items(store.as_ref(), FLASHCARDS_KEY, items);
        debug!(count = cards.len(), "loaded flashcards");
        Self {
            cards,
            ..Self::new(store, clock)
        }
    }

    fn save(&self) {
        let snapshot = DeckSnapshot {
            version: 1,
            cards: self.cards.clone(),
        };
        storage::save(self.store.as_ref(), FLASHCARDS_KEY, &snapshot);
    }

    pub fn cards(&self) -> &[Flashcard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn current(&self) -> Option<&Flashcard> {
        self.cards.get(self.index)
    }

    pub fn next(&mut self) -> bool {
        if self.index + 1 < self.cards.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.index > 0 {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    /// Jump to a card by id. Returns false if it isn't in the deck.
    pub fn select(&mut self, id: &str) -> bool {
        match self.cards.iter().position(|c| c.id == id) {
            Some(i) => {
                self.index = i;
                true
            }
            None => false,
        }
    }

    pub fn add_card(&mut self, question: String, answer: String) -> &Flashcard {
        let card = Flashcard::new(question, answer, self.clock.now());
        self.cards.push(card);
        self.save();
        &self.cards[self.cards.len() - 1]
    }

    pub fn add_cards(&mut self, cards: Vec<Flashcard>) -> usize {
        let count = cards.len();
        self.cards.extend(cards);
        self.save();
        count
    }

    pub fn remove_card(&mut self, id: &str) -> bool {
        let Some(pos) = self.cards.iter().position(|c| c.id == id) else {
            return false;
        };
        self.cards.remove(pos);
        if self.index >= self.cards.len() {
            self.index = self.cards.len().saturating_sub(1);
        }
        self.save();
        true
    }

    pub fn update_card(&mut self, id: &str, question: String, answer: String) -> bool {
        let Some(card) = self.cards.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        card.question = question;
        card.answer = answer;
        self.save();
        true
    }

    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::rng());
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
        self.index = 0;
        self.save();
    }

    /// Record a review of the current card and move to the next one.
    /// Returns false on an empty deck.
    pub fn mark(&mut self, outcome: ReviewOutcome) -> bool {
        let now = self.clock.now();
        let Some(card) = self.cards.get_mut(self.index) else {
            return false;
        };
        self.scheduler.review_card(card, outcome, now);
        self.save();
        self.next();
        true
    }

    /// Generate cards from text, skipping questions the deck already has.
    /// An empty result means every candidate was a duplicate.
    pub fn generate_from_text(&mut self, text: &str) -> Result<Vec<Flashcard>> {
        let candidates = generator::extract_candidates(text)?;
        let now = self.clock.now();

        let mut seen: HashSet<String> = self.cards.iter().map(|c| c.question.clone()).collect();
        let fresh: Vec<Flashcard> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.question.clone()))
            .take(MAX_GENERATED_PER_RUN)
            .map(|c| {
                Flashcard::new(c.question, c.answer, now)
                    .with_source(CardSource::AutoGenerated)
                    .with_difficulty(c.difficulty)
            })
            .collect();

        if fresh.is_empty() {
            info!("no new flashcards generated (duplicates avoided)");
            return Ok(fresh);
        }

        self.index = self.cards.len();
        self.cards.extend(fresh.iter().cloned());
        self.save();
        info!(count = fresh.len(), "generated flashcards");
        Ok(fresh)
    }

    pub fn due_for_review(&self, now: DateTime<Local>) -> Vec<&Flashcard> {
        self.scheduler.due_cards(&self.cards, now)
    }

    pub fn cards_by_difficulty(&self, difficulty: CardDifficulty) -> Vec<&Flashcard> {
        self.cards.iter().filter(|c| c.difficulty == difficulty).collect()
    }

    pub fn search(&self, query: &str) -> Vec<&Flashcard> {
        self.cards.iter().filter(|c| c.matches(query)).collect()
    }

    pub fn stats(&self, now: DateTime<Local>) -> DeckStats {
        let mut stats = DeckStats {
            total_cards: self.cards.len(),
            ..Default::default()
        };

        let mut attempts = 0u32;
        let mut correct = 0u32;
        for card in &self.cards {
            match card.source {
                CardSource::AutoGenerated => stats.auto_generated += 1,
                _ => stats.manual += 1,
            }
            match card.difficulty {
                CardDifficulty::New => stats.new_cards += 1,
                CardDifficulty::Easy => stats.easy_cards += 1,
                CardDifficulty::Medium => stats.medium_cards += 1,
                CardDifficulty::Hard => stats.hard_cards += 1,
            }
            if card.performance.attempts > 0 {
                attempts += card.performance.attempts;
                correct += card.performance.correct;
                stats.cards_with_performance += 1;
            }
            if card.is_due(now) {
                stats.due_cards += 1;
            }
        }

        if attempts > 0 {
            stats.average_accuracy = (f64::from(correct) / f64::from(attempts) * 100.0).round() as u32;
        }
        stats
    }

    pub fn clear_all(&mut self) {
        self.cards.clear();
        self.index = 0;
        self.save();
        info!("cleared all flashcards");
    }

    pub fn export(&self) -> DeckExport {
        DeckExport {
            version: 1,
            exported_at: self.clock.now(),
            cards: self.cards.clone(),
        }
    }

    /// Append exported cards whose ids are not already present.
    pub fn import(&mut self, export: DeckExport) -> usize {
        let existing: HashSet<String> = self.cards.iter().map(|c| c.id.clone()).collect();
        let incoming: Vec<Flashcard> = export
            .cards
            .into_iter()
            .filter(|c| !existing.contains(&c.id))
            .collect();
        if incoming.is_empty() {
            return 0;
        }
        self.add_cards(incoming)
    }

    /// Import `question,answer` lines from a CSV file.
    pub fn import_csv(&mut self, csv_path: &Path) -> Result<usize> {
        let content = fs::read_to_string(csv_path)?;
        let now = self.clock.now();
        let mut cards = Vec::new();

        for (i, line) in content.lines().enumerate() {
            // Skip header
            if i == 0 && line.to_lowercase().contains("question") {
                continue;
            }

            if let Some((question, answer)) = line.split_once(',') {
                let question = question.trim().to_string();
                let answer = answer.trim().to_string();

                if !question.is_empty() && !answer.is_empty() {
                    cards.push(Flashcard::new(question, answer, now).with_source(CardSource::Imported));
                }
            }
        }

        Ok(self.add_cards(cards))
    }
}
