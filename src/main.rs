//! Studious - a terminal study companion
//!
//! Splits reading material into chunks, runs pomodoro focus sessions and
//! turns notes into spaced repetition flashcards.

mod analytics;
mod chunker;
mod clock;
mod config;
mod deck;
mod error;
mod extract;
mod generator;
mod models;
mod session;
mod sm2;
mod storage;
mod timer;
mod ui;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing::info;

use analytics::Analytics;
use chunker::{ChunkProgress, ContentKind, TextChunkMode};
use clock::{Clock, SystemClock};
use config::{Config, StudyConfig, VideoChunkMode};
use deck::{DeckExport, FlashcardDeck};
use extract::{FileExtractor, TextExtractor};
use models::{CardDifficulty, Flashcard};
use session::{SessionSettings, StudySession};
use storage::{SharedStore, StoreKind};
use timer::{TimerEngine, TimerEvent, TimerKind};
use ui::App;

// ══════════════════════════════════════════════════════════════════════════
// CLI Arguments
// ══════════════════════════════════════════════════════════════════════════

#[derive(Parser, Debug)]
#[command(name = "studious")]
#[command(author, version, about = "Chunked reading, focus timer and spaced repetition flashcards", long_about = None)]
struct Args {
    /// Directory for the store and logs
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Storage backend (overrides the config file)
    #[arg(long, value_enum, global = true)]
    store: Option<StoreKind>,

    /// Document to open in the reader
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split content into study chunks
    Chunk {
        #[command(subcommand)]
        target: ChunkTarget,
    },
    /// Generate flashcards from a document
    Generate { file: PathBuf },
    /// List flashcards due for review
    Due,
    /// Show study statistics
    Stats,
    /// Run a countdown in the terminal
    Timer {
        #[arg(default_value_t = 25)]
        minutes: u32,
        /// Count down a break instead of a study session
        #[arg(long = "break")]
        is_break: bool,
    },
    /// Write a backup of all study data
    Export {
        path: PathBuf,
        /// Export only the flashcard deck
        #[arg(long)]
        deck: bool,
    },
    /// Restore a backup, keeping existing entries
    Import {
        path: PathBuf,
        /// The file is a flashcard deck export
        #[arg(long)]
        deck: bool,
    },
    /// Import `question,answer` rows as flashcards
    ImportCsv { path: PathBuf },
    /// List flashcards, optionally filtered
    Cards {
        /// Case-insensitive match on question, answer or tags
        #[arg(short, long)]
        search: Option<String>,
        #[arg(short, long, value_enum)]
        difficulty: Option<CardDifficulty>,
    },
    /// Add a flashcard by hand
    Add { question: String, answer: String },
    /// Replace the text of a flashcard
    Edit {
        id: String,
        question: String,
        answer: String,
    },
    /// Delete a flashcard
    Remove { id: String },
    /// Delete every flashcard
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Show or change study preferences
    Prefs {
        /// Number of chunks to split content into
        #[arg(long)]
        chunks: Option<usize>,
        #[arg(long, value_enum)]
        text_mode: Option<TextChunkMode>,
        #[arg(long, value_enum)]
        video_mode: Option<VideoChunkMode>,
        /// Split points used when the video mode is manual
        #[arg(long)]
        timestamps: Option<String>,
        /// Reading speed in words per minute
        #[arg(long)]
        speed: Option<u32>,
        #[arg(long)]
        start_page: Option<u32>,
        #[arg(long)]
        end_page: Option<u32>,
        #[arg(long)]
        goal: Option<String>,
        #[arg(long)]
        break_reminders: Option<bool>,
        #[arg(long)]
        notifications: Option<bool>,
    },
}

#[derive(Subcommand, Debug)]
enum ChunkTarget {
    /// A document with the given number of pages
    Pages {
        total: u32,
        /// First page (defaults to the configured page range)
        #[arg(long)]
        start: Option<u32>,
        #[arg(long)]
        end: Option<u32>,
        #[arg(short)]
        k: Option<usize>,
    },
    /// A video of the given length
    Video {
        seconds: f64,
        #[arg(short)]
        k: Option<usize>,
        /// Comma separated split points such as "5:00, 12:30"
        #[arg(long)]
        timestamps: Option<String>,
    },
    /// A text document
    Text {
        file: PathBuf,
        #[arg(short)]
        k: Option<usize>,
        #[arg(long, value_enum)]
        mode: Option<TextChunkMode>,
    },
}

// ══════════════════════════════════════════════════════════════════════════
// Main Entry Point
// ══════════════════════════════════════════════════════════════════════════

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load().unwrap_or_default();

    let data_dir = args.data_dir.clone().unwrap_or_else(|| config.data_dir());
    init_logging(&data_dir, args.command.is_some());

    let kind = args.store.unwrap_or(config.store);
    let store = storage::open_store(kind, &data_dir)
        .with_context(|| format!("Failed to open {:?} store in {}", kind, data_dir.display()))?;
    let clock: Rc<dyn Clock> = Rc::new(SystemClock);
    info!(?kind, dir = %data_dir.display(), "starting");

    match args.command {
        Some(command) => run_command(command, store, clock, &config),
        None => run_tui(config, store, clock, args.file),
    }
}

/// File logging always; stderr logging only for one-shot commands, where it
/// cannot corrupt the terminal UI.
fn init_logging(data_dir: &Path, console: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "studious.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the entire program
    Box::leak(Box::new(guard));

    let console_layer = console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_filter(tracing_subscriber::filter::LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studious=info".into()),
        )
        .with(console_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_line_number(true)
                .with_ansi(false),
        )
        .init();
}

// ══════════════════════════════════════════════════════════════════════════
// Subcommands
// ══════════════════════════════════════════════════════════════════════════

fn run_command(command: Command, store: SharedStore, clock: Rc<dyn Clock>, config: &Config) -> Result<()> {
    match command {
        Command::Chunk { target } => run_chunk(target, store),
        Command::Generate { file } => {
            let text = FileExtractor.extract(&file)?;
            let mut deck = FlashcardDeck::load(store.clone(), clock.clone());
            let cards = deck.generate_from_text(&text)?;
            if cards.is_empty() {
                println!("No new flashcards: every question is already in the deck");
                return Ok(());
            }

            Analytics::load(store).add_flashcards(cards.len() as u32);
            for card in &cards {
                println!("[{}] {}\n    → {}", card.difficulty.name(), card.question, card.answer);
            }
            println!("✓ Added {} flashcards ({} total)", cards.len(), deck.len());
            Ok(())
        }
        Command::Due => {
            let deck = FlashcardDeck::load(store, clock.clone());
            let due = deck.due_for_review(clock.now());
            if due.is_empty() {
                println!("Nothing due. {} cards in the deck.", deck.len());
            }
            for card in &due {
                println!("{:<8} {}", card.id, card.question);
            }
            Ok(())
        }
        Command::Stats => {
            let deck = FlashcardDeck::load(store.clone(), clock.clone());
            let analytics = Analytics::load(store);
            print_stats(&deck, &analytics, config, clock.now());
            Ok(())
        }
        Command::Timer { minutes, is_break } => {
            let kind = if is_break { TimerKind::Break } else { TimerKind::Study };
            run_headless_timer(minutes, kind, store, clock)
        }
        Command::Export { path, deck } => {
            if deck {
                let export = FlashcardDeck::load(store, clock).export();
                std::fs::write(&path, serde_json::to_string_pretty(&export)?)?;
                println!("✓ Exported {} cards to {}", export.cards.len(), path.display());
            } else {
                let count = storage::export_backup(store.as_ref(), &path)?;
                println!("✓ Exported {} entries to {}", count, path.display());
            }
            Ok(())
        }
        Command::Import { path, deck } => {
            if deck {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let export: DeckExport = serde_json::from_str(&json)?;
                let added = FlashcardDeck::load(store, clock).import(export);
                println!("✓ Imported {} cards", added);
            } else {
                let (imported, skipped) = storage::import_backup(store.as_ref(), &path)?;
                if skipped > 0 {
                    println!("✓ Imported {} entries ({} skipped - already exist)", imported, skipped);
                } else {
                    println!("✓ Imported {} entries", imported);
                }
            }
            Ok(())
        }
        Command::ImportCsv { path } => {
            let mut deck = FlashcardDeck::load(store, clock);
            let added = deck.import_csv(&path)?;
            println!("✓ Imported {} cards ({} total)", added, deck.len());
            Ok(())
        }
        Command::Cards { search, difficulty } => {
            let deck = FlashcardDeck::load(store, clock);
            let mut cards = match &search {
                Some(query) => deck.search(query),
                None => deck.cards().iter().collect(),
            };
            if let Some(difficulty) = difficulty {
                let wanted: Vec<&str> = deck
                    .cards_by_difficulty(difficulty)
                    .into_iter()
                    .map(|c| c.id.as_str())
                    .collect();
                cards.retain(|c| wanted.contains(&c.id.as_str()));
            }
            print_cards(cards);
            Ok(())
        }
        Command::Add { question, answer } => {
            let mut deck = FlashcardDeck::load(store, clock);
            let id = deck.add_card(question, answer).id.clone();
            println!("✓ Added card {}", id);
            Ok(())
        }
        Command::Edit { id, question, answer } => {
            let mut deck = FlashcardDeck::load(store, clock);
            if !deck.update_card(&id, question, answer) {
                anyhow::bail!("No card with id {}", id);
            }
            println!("✓ Updated card {}", id);
            Ok(())
        }
        Command::Remove { id } => {
            let mut deck = FlashcardDeck::load(store, clock);
            if !deck.remove_card(&id) {
                anyhow::bail!("No card with id {}", id);
            }
            println!("✓ Removed card {} ({} left)", id, deck.len());
            Ok(())
        }
        Command::Clear { yes } => {
            let mut deck = FlashcardDeck::load(store, clock);
            if !yes {
                println!("This deletes {} cards. Re-run with --yes to confirm.", deck.len());
                return Ok(());
            }
            deck.clear_all();
            println!("✓ Deck cleared");
            Ok(())
        }
        Command::Prefs {
            chunks,
            text_mode,
            video_mode,
            timestamps,
            speed,
            start_page,
            end_page,
            goal,
            break_reminders,
            notifications,
        } => {
            let mut prefs = StudyConfig::load(store.as_ref());
            let before = prefs.clone();

            if let Some(n) = chunks {
                prefs.chunk_count = n.max(1);
            }
            if let Some(mode) = text_mode {
                prefs.text_chunk_mode = mode;
            }
            if let Some(mode) = video_mode {
                prefs.video_chunk_mode = mode;
            }
            if let Some(raw) = timestamps {
                prefs.manual_timestamps = raw;
            }
            if let Some(wpm) = speed {
                prefs.reading_speed = wpm.max(1);
            }
            if let Some(page) = start_page {
                prefs.page_range.start = page.max(1);
            }
            if end_page.is_some() {
                prefs.page_range.end = end_page;
            }
            if let Some(goal) = goal {
                prefs.study_goal = goal;
            }
            if let Some(on) = break_reminders {
                prefs.break_reminders = on;
            }
            if let Some(on) = notifications {
                prefs.progress_notifications = on;
            }

            if prefs != before {
                prefs.save(store.as_ref());
                println!("✓ Preferences saved");
            }
            print!("{}", toml::to_string_pretty(&prefs)?);
            Ok(())
        }
    }
}

fn run_chunk(target: ChunkTarget, store: SharedStore) -> Result<()> {
    let prefs = StudyConfig::load(store.as_ref());

    let (kind, chunks, words) = match target {
        ChunkTarget::Pages { total, start, end, k } => {
            let (first, last) = prefs.pages_for(total);
            let chunks = chunker::page_chunks(
                start.unwrap_or(first),
                end.unwrap_or(last),
                k.unwrap_or(prefs.chunk_count),
            )?;
            (ContentKind::Pdf, chunks, None)
        }
        ChunkTarget::Video { seconds, k, timestamps } => {
            let manual = timestamps.or_else(|| {
                (prefs.video_chunk_mode == VideoChunkMode::Manual && !prefs.manual_timestamps.trim().is_empty())
                    .then(|| prefs.manual_timestamps.clone())
            });
            let chunks = match manual {
                Some(raw) => chunker::manual_video_chunks(&raw, seconds),
                None => chunker::duration_chunks(seconds, k.unwrap_or(prefs.chunk_count))?,
            };
            (ContentKind::Video, chunks, None)
        }
        ChunkTarget::Text { file, k, mode } => {
            let text = FileExtractor.extract(&file)?;
            let chunks = chunker::text_chunks(
                &text,
                k.unwrap_or(prefs.chunk_count),
                mode.unwrap_or(prefs.text_chunk_mode),
            )?;
            (ContentKind::Text, chunks, Some(chunker::word_count(&text)))
        }
    };

    for chunk in &chunks {
        let marker = if chunk.is_empty() { " (empty)" } else { "" };
        println!("{}{}", chunk.title(), marker);
    }
    if let Some(words) = words {
        let minutes = chunker::estimated_reading_minutes(words, prefs.reading_speed);
        println!("{} words, about {} min at {} wpm", words, minutes, prefs.reading_speed);
    }

    ChunkProgress::new(kind).set_chunks(chunks, store.as_ref());
    Ok(())
}

fn print_cards<'a>(cards: impl IntoIterator<Item = &'a Flashcard>) {
    let mut count = 0;
    for card in cards {
        println!("{:<8} [{:<6}] {}", card.id, card.difficulty.name(), card.question);
        count += 1;
    }
    if count == 0 {
        println!("No matching cards");
    }
}

fn print_stats(deck: &FlashcardDeck, analytics: &Analytics, config: &Config, now: DateTime<Local>) {
    let today = now.date_naive();
    let stats = analytics.stats();
    let deck_stats = deck.stats(now);

    println!("Study time      {}", analytics::format_study_time(stats.total_study_seconds));
    println!("Sessions        {}", stats.sessions_completed);
    println!("Documents       {}", stats.documents_studied);
    println!("Streak          {} days", analytics.streak(today));
    println!(
        "Weekly goal     {}% of {} min",
        analytics.weekly_progress_percent(config.weekly_goal_minutes, today),
        config.weekly_goal_minutes
    );
    println!();
    println!(
        "Flashcards      {} ({} generated, {} manual)",
        deck_stats.total_cards, deck_stats.auto_generated, deck_stats.manual
    );
    println!("Due             {}", deck_stats.due_cards);
    println!(
        "By difficulty   new {} · easy {} · medium {} · hard {}",
        deck_stats.new_cards, deck_stats.easy_cards, deck_stats.medium_cards, deck_stats.hard_cards
    );
    if deck_stats.cards_with_performance > 0 {
        println!("Accuracy        {}%", deck_stats.average_accuracy);
    }
}

fn run_headless_timer(minutes: u32, kind: TimerKind, store: SharedStore, clock: Rc<dyn Clock>) -> Result<()> {
    let settings = SessionSettings {
        auto_break: false,
        break_minutes: 0,
    };
    let mut session = StudySession::new(store, clock, settings);
    session.control(|t| t.set_duration(minutes, 0, kind))?;
    session.control(TimerEngine::start);
    session.take_events();

    let mut stdout = io::stdout();
    loop {
        thread::sleep(Duration::from_millis(250));
        session.control(TimerEngine::advance);

        for event in session.take_events() {
            match event {
                TimerEvent::Tick { .. } => {
                    write!(stdout, "\r{} {}  ", kind.label(), session.timer().display())?;
                    stdout.flush()?;
                }
                TimerEvent::Warning { remaining } => {
                    writeln!(stdout, "\r{} minute(s) left", remaining / 60)?;
                }
                TimerEvent::Complete { elapsed, .. } => {
                    writeln!(stdout, "\r✓ {} complete ({})", kind.label(), timer::format_clock(u64::from(elapsed)))?;
                    return Ok(());
                }
                _ => {}
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════
// TUI
// ══════════════════════════════════════════════════════════════════════════

fn run_tui(config: Config, store: SharedStore, clock: Rc<dyn Clock>, file: Option<PathBuf>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config, Config::default_path(), store, clock);
    if let Some(path) = file {
        app.open_file(&path);
    }

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        return Err(err);
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    while app.running {
        terminal.draw(|frame| app.render(frame))?;
        app.handle_events()?;
    }
    Ok(())
}
