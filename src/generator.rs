//! Heuristic flashcard extraction from plain text.
//!
//! Each sentence of reasonable length is run through four independent
//! patterns: definitions ("X is Y"), four digit years, quantities and two
//! word proper names. Every match becomes a candidate card.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{Result, StudyError};
use crate::models::CardDifficulty;

pub const MIN_CONTENT_CHARS: usize = 50;
const MIN_SENTENCE_CHARS: usize = 20;
const MAX_SENTENCE_CHARS: usize = 200;
const BLANK: &str = "____";

static SENTENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]+").unwrap());
static DEFINITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(.+?)\s+(is|are|was|were)\s+(.+)").unwrap());
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());
static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(percent|%|million|billion|thousand)").unwrap()
});
static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z][a-z]+ [A-Z][a-z]+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub question: String,
    pub answer: String,
    pub difficulty: CardDifficulty,
}

impl Candidate {
    fn new(question: String, answer: &str, difficulty: CardDifficulty) -> Self {
        Self {
            question,
            answer: answer.trim().to_string(),
            difficulty,
        }
    }
}

pub fn sentences(text: &str) -> impl Iterator<Item = &str> {
    SENTENCE.find_iter(text).map(|m| m.as_str().trim())
}

/// All candidates for `text`, easiest first. Order within a difficulty
/// follows the text.
pub fn extract_candidates(text: &str) -> Result<Vec<Candidate>> {
    let len = text.trim().chars().count();
    if len < MIN_CONTENT_CHARS {
        return Err(StudyError::InsufficientContent {
            len,
            min: MIN_CONTENT_CHARS,
        });
    }

    let mut cards = Vec::new();
    for sentence in sentences(text) {
        let chars = sentence.chars().count();
        if !(MIN_SENTENCE_CHARS..=MAX_SENTENCE_CHARS).contains(&chars) {
            continue;
        }
        extract_from_sentence(sentence, &mut cards);
    }

    if cards.is_empty() {
        return Err(StudyError::NoCardsGenerated);
    }

    cards.sort_by_key(|c| c.difficulty);
    debug!(count = cards.len(), "extracted flashcard candidates");
    Ok(cards)
}

fn extract_from_sentence(sentence: &str, out: &mut Vec<Candidate>) {
    if let Some(caps) = DEFINITION.captures(sentence) {
        let subject = caps[1].trim();
        let verb = caps[2].to_lowercase();
        out.push(Candidate::new(
            format!("What {} {}?", verb, subject),
            &caps[3],
            CardDifficulty::Medium,
        ));
    }

    if let Some(year) = YEAR.find(sentence) {
        let context = sentence.replacen(year.as_str(), BLANK, 1);
        out.push(Candidate::new(
            format!("Fill in the year: {}", context),
            year.as_str(),
            CardDifficulty::Easy,
        ));
    }

    if let Some(quantity) = QUANTITY.find(sentence) {
        let context = sentence.replacen(quantity.as_str(), BLANK, 1);
        out.push(Candidate::new(
            format!("What number belongs here: {}", context),
            quantity.as_str(),
            CardDifficulty::Medium,
        ));
    }

    // Dense proper-noun text produces noise, so only sparse mentions count.
    let names: Vec<&str> = NAME.find_iter(sentence).map(|m| m.as_str()).collect();
    if names.len() < 3 {
        for name in names.into_iter().filter(|n| n.chars().count() > 6) {
            let context = sentence.replacen(name, BLANK, 1);
            out.push(Candidate::new(
                format!("Who is referenced here: {}", context),
                name,
                CardDifficulty::Hard,
            ));
        }
    }
}
