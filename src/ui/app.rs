//! Main application state and logic.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{block::BorderType, Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph},
    Frame,
};
use tracing::{info, warn};

use super::theme::{icons, Theme};
use super::widgets::{
    truncate_to_width, wrap_lines, Banner, BigClock, FlashcardWidget, KeyHints, OutcomeButtons,
    StatsBar,
};
use crate::analytics::format_study_time;
use crate::chunker::{self, ChunkProgress, ChunkRange, ContentKind};
use crate::clock::Clock;
use crate::config::{Config, StudyConfig};
use crate::deck::FlashcardDeck;
use crate::error::StudyError;
use crate::extract::{FileExtractor, TextExtractor};
use crate::models::{CardDifficulty, Flashcard, ReviewOutcome};
use crate::session::{SessionSettings, StudySession};
use crate::storage::{self, SharedStore};
use crate::timer::{Preset, TimerEngine, TimerEvent, TimerKind};

const STATUS_TTL: Duration = Duration::from_secs(5);

// ══════════════════════════════════════════════════════════════════════════
// Application State
// ══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Timer,
    Review,
    Reader,
    Generate,
}

impl Screen {
    const MENU: [Screen; 4] = [Screen::Timer, Screen::Review, Screen::Reader, Screen::Generate];

    fn menu_label(&self) -> String {
        match self {
            Screen::Dashboard => "Dashboard".to_string(),
            Screen::Timer => format!("{} Focus timer", icons::CLOCK),
            Screen::Review => format!("{} Review flashcards", icons::CARD),
            Screen::Reader => format!("{} Continue reading", icons::BOOK),
            Screen::Generate => format!("{} Generate flashcards", icons::SPARKLE),
        }
    }
}

struct Status {
    text: String,
    is_error: bool,
    at: Instant,
}

pub struct App {
    pub screen: Screen,
    pub running: bool,

    pub config: Config,
    config_path: PathBuf,
    pub theme: Theme,

    store: SharedStore,
    clock: Rc<dyn Clock>,
    extractor: Box<dyn TextExtractor>,

    pub session: StudySession,
    pub deck: FlashcardDeck,
    pub reader: ChunkProgress,
    pub study_config: StudyConfig,

    menu_state: ListState,

    // Review
    showing_answer: bool,
    reviewed: usize,

    // Reader
    reader_scroll: u16,

    // Generate
    path_input: String,
    last_generated: Vec<Flashcard>,

    status: Option<Status>,
}

impl App {
    pub fn new(config: Config, config_path: PathBuf, store: SharedStore, clock: Rc<dyn Clock>) -> Self {
        let theme = Theme::from_name(&config.theme);
        let settings = SessionSettings {
            auto_break: config.auto_break,
            break_minutes: config.break_minutes,
        };

        Self {
            screen: Screen::Dashboard,
            running: true,
            session: StudySession::new(store.clone(), clock.clone(), settings),
            deck: FlashcardDeck::load(store.clone(), clock.clone()),
            reader: ChunkProgress::load(ContentKind::Text, store.as_ref()),
            study_config: StudyConfig::load(store.as_ref()),
            config,
            config_path,
            theme,
            store,
            clock,
            extractor: Box::new(FileExtractor),
            menu_state: ListState::default().with_selected(Some(0)),
            showing_answer: false,
            reviewed: 0,
            reader_scroll: 0,
            path_input: String::new(),
            last_generated: Vec::new(),
            status: None,
        }
    }

    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            is_error: false,
            at: Instant::now(),
        });
    }

    fn report(&mut self, err: &StudyError) {
        if !err.is_user_facing() {
            warn!(error = %err, "operation failed");
        }
        self.status = Some(Status {
            text: err.to_string(),
            is_error: true,
            at: Instant::now(),
        });
    }

    pub fn cycle_theme(&mut self) {
        let next = self.theme.name.next();
        self.theme = Theme::new(next);
        self.config.theme = next.as_str().to_string();
        if let Err(err) = self.config.save_to(&self.config_path) {
            warn!(error = %err, "failed to persist theme");
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Timer
    // ══════════════════════════════════════════════════════════════════════

    /// Catch the timer up with the wall clock and surface its events.
    pub fn on_tick(&mut self) {
        self.session.control(TimerEngine::advance);
        self.drain_timer_events();
    }

    fn drain_timer_events(&mut self) {
        for event in self.session.take_events() {
            match event {
                TimerEvent::Warning { remaining } if self.study_config.break_reminders => {
                    self.set_status(format!("{} minute(s) left in this session", remaining / 60));
                }
                TimerEvent::Complete {
                    kind: TimerKind::Study,
                    full_session: true,
                    ..
                } => {
                    let text = if self.session.timer().kind() == TimerKind::Break {
                        "Session complete. Take a break!"
                    } else {
                        "Session complete."
                    };
                    self.set_status(text);
                }
                TimerEvent::Complete {
                    kind: TimerKind::Break,
                    ..
                } => self.set_status("Break over. Ready for another session?"),
                _ => {}
            }
        }
    }

    fn toggle_timer(&mut self) {
        if self.session.timer().is_running() {
            self.session.control(TimerEngine::pause);
        } else {
            self.session.control(TimerEngine::start);
        }
        self.drain_timer_events();
    }

    fn apply_preset(&mut self, preset: Preset) {
        match self.session.control(|t| t.set_preset(preset)) {
            Ok(()) => self.set_status(format!("{} ({} min)", preset.name(), preset.minutes())),
            Err(err) => self.report(&err),
        }
    }

    fn adjust_minutes(&mut self, delta: i64) {
        let timer = self.session.timer();
        if timer.is_running() {
            return;
        }
        let kind = timer.kind();
        let minutes = (i64::from(timer.total_seconds() / 60) + delta).clamp(1, 180) as u32;
        if let Err(err) = self.session.control(|t| t.set_duration(minutes, 0, kind)) {
            self.report(&err);
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Reading
    // ══════════════════════════════════════════════════════════════════════

    /// Extract a document, split it into reading chunks and open the reader.
    pub fn open_file(&mut self, path: &Path) {
        let text = match self.extractor.extract(path) {
            Ok(text) => text,
            Err(err) => return self.report(&err),
        };

        let chunks = match chunker::text_chunks(
            &text,
            self.study_config.chunk_count,
            self.study_config.text_chunk_mode,
        ) {
            Ok(chunks) => chunks,
            Err(err) => return self.report(&err),
        };

        let words = chunker::word_count(&text);
        let minutes = chunker::estimated_reading_minutes(words, self.study_config.reading_speed);
        info!(path = %path.display(), words, chunks = chunks.len(), "opened document");

        self.reader.set_chunks(chunks, self.store.as_ref());
        self.session.open_document(path.to_path_buf());
        self.sync_reading_progress();
        self.reader_scroll = 0;
        self.screen = Screen::Reader;

        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        self.set_status(format!("Loaded {} ({} words, ~{} min)", name, words, minutes));
    }

    fn reader_next(&mut self) {
        if self.reader.next(self.store.as_ref()) {
            self.reader_scroll = 0;
        } else if self.reader.current().is_some() {
            self.reader.mark_completed(self.store.as_ref());
            if self.study_config.progress_notifications {
                self.set_status(format!("{} All chunks complete", icons::CHECK));
            }
        }
        self.sync_reading_progress();
    }

    fn reader_prev(&mut self) {
        if self.reader.prev() {
            self.reader_scroll = 0;
        }
    }

    fn reading_percent(&self) -> u32 {
        let chunks = self.reader.chunks();
        if !chunks.is_empty() && chunks.iter().all(|c| c.completed) {
            100
        } else {
            self.reader.progress_percent()
        }
    }

    fn sync_reading_progress(&mut self) {
        let percent = self.reading_percent();
        self.session.analytics_mut().set_session_progress(percent);
    }

    fn current_chunk_text(&self) -> Option<&str> {
        match &self.reader.current()?.range {
            ChunkRange::Text { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Flashcards
    // ══════════════════════════════════════════════════════════════════════

    fn generate_from_text(&mut self, text: &str) {
        match self.deck.generate_from_text(text) {
            Ok(cards) if cards.is_empty() => {
                self.set_status("No new flashcards: every question is already in the deck");
                self.last_generated.clear();
            }
            Ok(cards) => {
                self.session.analytics_mut().add_flashcards(cards.len() as u32);
                self.set_status(format!("{} Generated {} flashcards", icons::SPARKLE, cards.len()));
                self.last_generated = cards;
            }
            Err(err) => self.report(&err),
        }
    }

    pub fn generate_from_path(&mut self) {
        let raw = self.path_input.trim();
        if raw.is_empty() {
            self.status = Some(Status {
                text: "Enter a path to a .txt, .md, .docx or .epub file".into(),
                is_error: true,
                at: Instant::now(),
            });
            return;
        }
        let path = PathBuf::from(raw);
        match self.extractor.extract(&path) {
            Ok(text) => self.generate_from_text(&text),
            Err(err) => self.report(&err),
        }
    }

    fn generate_from_reader(&mut self) {
        match self.current_chunk_text().map(str::to_owned) {
            Some(text) => self.generate_from_text(&text),
            None => self.set_status("Open a document first"),
        }
    }

    fn mark_card(&mut self, outcome: ReviewOutcome) {
        if !self.showing_answer {
            return;
        }
        if self.deck.mark(outcome) {
            self.reviewed += 1;
            self.showing_answer = false;
        }
    }

    /// Move to the next card that is due, wrapping around the deck.
    fn jump_to_due(&mut self) {
        let now = self.clock.now();
        let cards = self.deck.cards();
        let start = self.deck.index() + 1;
        let found = (0..cards.len())
            .map(|offset| &cards[(start + offset) % cards.len()])
            .find(|c| c.is_due(now))
            .map(|c| c.id.clone());

        match found {
            Some(id) => {
                self.deck.select(&id);
                self.showing_answer = false;
            }
            None => self.set_status("Nothing due for review"),
        }
    }

    fn delete_current_card(&mut self) {
        let Some(id) = self.deck.current().map(|c| c.id.clone()) else {
            return;
        };
        if self.deck.remove_card(&id) {
            self.showing_answer = false;
            self.set_status(format!("Deleted card {}", id));
        }
    }

    fn export_backup(&mut self) {
        let path = storage::default_backup_path();
        match storage::export_backup(self.store.as_ref(), &path) {
            Ok(count) => self.set_status(format!("Exported {} entries to {}", count, path.display())),
            Err(err) => self.report(&err),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Event Handling
    // ══════════════════════════════════════════════════════════════════════

    pub fn handle_events(&mut self) -> anyhow::Result<()> {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key.code);
                }
            }
        }
        self.on_tick();
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        // The path prompt swallows every printable key
        if self.screen == Screen::Generate {
            return self.handle_generate_keys(key);
        }

        match key {
            KeyCode::Char('t') => return self.cycle_theme(),
            KeyCode::Esc if self.screen != Screen::Dashboard => {
                self.screen = Screen::Dashboard;
                return;
            }
            _ => {}
        }

        match self.screen {
            Screen::Dashboard => self.handle_dashboard_keys(key),
            Screen::Timer => self.handle_timer_keys(key),
            Screen::Review => self.handle_review_keys(key),
            Screen::Reader => self.handle_reader_keys(key),
            Screen::Generate => {}
        }
    }

    fn handle_dashboard_keys(&mut self, key: KeyCode) {
        let len = Screen::MENU.len();
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Up | KeyCode::Char('k') => {
                let i = self.menu_state.selected().unwrap_or(0);
                self.menu_state.select(Some((i + len - 1) % len));
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let i = self.menu_state.selected().unwrap_or(0);
                self.menu_state.select(Some((i + 1) % len));
            }
            KeyCode::Enter => {
                if let Some(screen) = self.menu_state.selected().and_then(|i| Screen::MENU.get(i)) {
                    self.screen = *screen;
                }
            }
            KeyCode::Char('x') => self.export_backup(),
            KeyCode::Char(c @ '1'..='5') => {
                let i = c as usize - '1' as usize;
                if let Some(path) = self.session.recent_files().get(i).map(|f| f.path.clone()) {
                    self.open_file(&path);
                }
            }
            _ => {}
        }
    }

    fn handle_timer_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char(' ') => self.toggle_timer(),
            KeyCode::Char('r') => self.session.control(TimerEngine::reset),
            KeyCode::Char('s') => self.session.control(TimerEngine::stop),
            KeyCode::Char('f') => {
                self.session.control(TimerEngine::complete);
                self.drain_timer_events();
            }
            KeyCode::Char('1') => self.apply_preset(Preset::Pomodoro),
            KeyCode::Char('2') => self.apply_preset(Preset::ShortBreak),
            KeyCode::Char('3') => self.apply_preset(Preset::LongBreak),
            KeyCode::Char('+') | KeyCode::Char('=') => self.adjust_minutes(1),
            KeyCode::Char('-') => self.adjust_minutes(-1),
            _ => {}
        }
    }

    fn handle_review_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char(' ') | KeyCode::Enter => {
                if self.deck.current().is_some() {
                    self.showing_answer = !self.showing_answer;
                }
            }
            KeyCode::Char(c @ '1'..='3') => {
                if let Some(outcome) = ReviewOutcome::from_key(c) {
                    self.mark_card(outcome);
                }
            }
            KeyCode::Right | KeyCode::Char('n') => {
                self.deck.next();
                self.showing_answer = false;
            }
            KeyCode::Left | KeyCode::Char('p') => {
                self.deck.prev();
                self.showing_answer = false;
            }
            KeyCode::Char('d') => self.jump_to_due(),
            KeyCode::Delete => self.delete_current_card(),
            KeyCode::Char('s') => {
                self.deck.shuffle();
                self.showing_answer = false;
                self.set_status("Deck shuffled");
            }
            KeyCode::Char('q') => self.screen = Screen::Dashboard,
            _ => {}
        }
    }

    fn handle_reader_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Right | KeyCode::Char('n') => self.reader_next(),
            KeyCode::Left | KeyCode::Char('p') => self.reader_prev(),
            KeyCode::Down | KeyCode::Char('j') => self.reader_scroll = self.reader_scroll.saturating_add(1),
            KeyCode::Up | KeyCode::Char('k') => self.reader_scroll = self.reader_scroll.saturating_sub(1),
            KeyCode::Char('g') => self.generate_from_reader(),
            KeyCode::Char('q') => self.screen = Screen::Dashboard,
            _ => {}
        }
    }

    fn handle_generate_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => self.screen = Screen::Dashboard,
            KeyCode::Enter => self.generate_from_path(),
            KeyCode::Char(c) => self.path_input.push(c),
            KeyCode::Backspace => {
                self.path_input.pop();
            }
            _ => {}
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Rendering
    // ══════════════════════════════════════════════════════════════════════

    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();

        frame.render_widget(Clear, area);
        frame.render_widget(
            Block::default().style(Style::default().bg(self.theme.colors.bg_dark)),
            area,
        );

        let [body, status] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area);

        match self.screen {
            Screen::Dashboard => self.render_dashboard(frame, body),
            Screen::Timer => self.render_timer(frame, body),
            Screen::Review => self.render_review(frame, body),
            Screen::Reader => self.render_reader(frame, body),
            Screen::Generate => self.render_generate(frame, body),
        }

        if let Some(ref s) = self.status {
            if s.at.elapsed() < STATUS_TTL {
                frame.render_widget(
                    Paragraph::new(s.text.as_str())
                        .alignment(Alignment::Center)
                        .style(self.theme.status(s.is_error)),
                    status,
                );
            }
        }
    }

    fn panel<'a>(&self, title: &'a str) -> Block<'a> {
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(self.theme.border(false))
            .title(format!(" {} ", title))
            .title_style(self.theme.highlight())
    }

    fn render_dashboard(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(1),   // Top padding
            Constraint::Length(6),   // Banner
            Constraint::Length(1),   // Spacing
            Constraint::Min(10),     // Panels
            Constraint::Length(2),   // Hints
        ])
        .split(area);

        frame.render_widget(Banner::new(&self.theme), chunks[1]);

        let [left, right] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                .areas(centered_rect(90, 100, chunks[3]));

        // Progress panel
        let today = self.session.today();
        let analytics = self.session.analytics();
        let stats = analytics.stats();
        let streak = analytics.streak(today);
        let weekly = analytics.weekly_progress_percent(self.config.weekly_goal_minutes, today);
        let deck_stats = self.deck.stats(self.clock.now());

        let row = |label: &str, value: String| {
            Line::from(vec![
                Span::styled(format!("{:<18}", label), self.theme.muted()),
                Span::styled(value, self.theme.title()),
            ])
        };
        let progress_lines = vec![
            row("Study time", format_study_time(stats.total_study_seconds)),
            row("Today", format_study_time(analytics.study_time_on(today))),
            row("Sessions", stats.sessions_completed.to_string()),
            row("Documents", stats.documents_studied.to_string()),
            row("Cards created", stats.flashcards_created.to_string()),
            row("Cards due", deck_stats.due_cards.to_string()),
            row(
                "Streak",
                format!("{} {} day{}", icons::FIRE, streak, if streak == 1 { "" } else { "s" }),
            ),
            row("Reading progress", format!("{}%", stats.session_progress)),
        ];

        let [stats_area, goal_area] =
            Layout::vertical([Constraint::Min(8), Constraint::Length(3)]).areas(left);
        frame.render_widget(
            Paragraph::new(progress_lines).block(self.panel("Progress")),
            stats_area,
        );
        frame.render_widget(
            Gauge::default()
                .block(self.panel("Weekly goal"))
                .gauge_style(Style::default().fg(self.theme.colors.success).bg(self.theme.colors.bg_card))
                .percent(weekly.min(100) as u16)
                .label(format!(
                    "{}% of {} min",
                    weekly, self.config.weekly_goal_minutes
                )),
            goal_area,
        );

        // Menu and recent files
        let [menu_area, recent_area] =
            Layout::vertical([Constraint::Length(6), Constraint::Min(3)]).areas(right);

        let items: Vec<ListItem> = Screen::MENU
            .iter()
            .map(|s| ListItem::new(s.menu_label()))
            .collect();
        let menu = List::new(items)
            .block(self.panel("Study"))
            .highlight_style(self.theme.selected())
            .highlight_symbol("> ");
        frame.render_stateful_widget(menu, menu_area, &mut self.menu_state);

        let width = recent_area.width.saturating_sub(6) as usize;
        let recent: Vec<ListItem> = self
            .session
            .recent_files()
            .iter()
            .enumerate()
            .map(|(i, f)| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{} ", i + 1), self.theme.key_highlight()),
                    Span::styled(truncate_to_width(&f.name, width), Style::default().fg(self.theme.colors.text)),
                ]))
            })
            .collect();
        let recent_block = self.panel("Recent files");
        if recent.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled("Open a file with: studious <FILE>", self.theme.dim()))
                    .block(recent_block),
                recent_area,
            );
        } else {
            frame.render_widget(List::new(recent).block(recent_block), recent_area);
        }

        let theme_hint = format!("[{}]", self.theme.name.display_name());
        let hints: [(&str, &str); 6] = [
            ("j/k", "nav"),
            ("Enter", "open"),
            ("1-5", "recent"),
            ("x", "export"),
            ("t", &theme_hint),
            ("q", "quit"),
        ];
        frame.render_widget(KeyHints::new(&hints, &self.theme), chunks[4]);
    }

    fn render_timer(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(3),   // Header
            Constraint::Min(7),      // Clock
            Constraint::Length(3),   // Progress
            Constraint::Length(2),   // Spacing
            Constraint::Length(2),   // Hints
        ])
        .split(area);

        let timer = self.session.timer();
        let on_break = timer.kind() == TimerKind::Break;
        let state = if timer.is_running() {
            "running"
        } else if timer.remaining() == 0 {
            "finished"
        } else {
            "paused"
        };

        let header = Paragraph::new(Line::from(vec![
            Span::styled(format!("{} {} ", icons::CLOCK, timer.kind().label()), self.theme.timer(on_break)),
            Span::styled(format!("· {}", state), self.theme.muted()),
        ]))
        .alignment(Alignment::Center);
        frame.render_widget(header, chunks[0]);

        let display = timer.display();
        frame.render_widget(BigClock::new(&display, self.theme.timer(on_break)), chunks[1]);

        let percent = (timer.progress() * 100.0).round() as u16;
        frame.render_widget(
            Gauge::default()
                .gauge_style(self.theme.timer(on_break).bg(self.theme.colors.bg_card))
                .percent(percent.min(100))
                .label(format!("{}%", percent)),
            centered_rect(60, 100, chunks[2]),
        );

        let toggle = if timer.is_running() { "pause" } else { "start" };
        let hints = [
            ("Space", toggle),
            ("r", "reset"),
            ("s", "stop"),
            ("f", "finish"),
            ("1/2/3", "25/5/15 min"),
            ("+/-", "minutes"),
            ("Esc", "back"),
        ];
        frame.render_widget(KeyHints::new(&hints, &self.theme), chunks[4]);
    }

    fn render_review(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(2),   // Header
            Constraint::Length(1),   // Stats
            Constraint::Length(1),   // Separator
            Constraint::Min(8),      // Card
            Constraint::Length(1),   // Separator
            Constraint::Length(4),   // Buttons
            Constraint::Length(2),   // Hints
        ])
        .split(area);

        let stats = self.deck.stats(self.clock.now());
        let Some(card) = self.deck.current() else {
            let empty = Paragraph::new(vec![
                Line::from(Span::styled("No flashcards yet", self.theme.title())),
                Line::from(""),
                Line::from(Span::styled(
                    "Generate some from a document or import a CSV with `studious import-csv`",
                    self.theme.muted(),
                )),
            ])
            .alignment(Alignment::Center);
            frame.render_widget(empty, centered_rect(80, 40, area));
            frame.render_widget(KeyHints::new(&[("Esc", "back")], &self.theme), chunks[6]);
            return;
        };

        let header = Paragraph::new(Line::from(vec![
            Span::styled(
                format!("Card {} of {}", self.deck.index() + 1, self.deck.len()),
                self.theme.title(),
            ),
            Span::styled(
                format!(
                    "  ·  {}{} · reviewed this session: {}",
                    card.difficulty.name(),
                    if card.is_new() { " (unseen)" } else { "" },
                    self.reviewed
                ),
                self.theme.muted(),
            ),
        ]))
        .alignment(Alignment::Center);
        frame.render_widget(header, chunks[0]);
        frame.render_widget(StatsBar::new(&stats, &self.theme), chunks[1]);

        let footer = if self.showing_answer {
            None
        } else {
            card.hint.as_deref()
        };
        let content = if self.showing_answer { &card.answer } else { &card.question };
        frame.render_widget(
            FlashcardWidget::new(content, !self.showing_answer, &self.theme).footer(footer),
            centered_rect(80, 100, chunks[3]),
        );

        let preview = self.deck.scheduler().preview_intervals(card);
        frame.render_widget(
            OutcomeButtons::new(&preview, self.showing_answer, &self.theme),
            centered_rect(70, 100, chunks[5]),
        );

        let hints: &[(&str, &str)] = if self.showing_answer {
            &[("1", "Easy"), ("2", "Medium"), ("3", "Hard"), ("Space", "flip"), ("Esc", "back")]
        } else {
            &[
                ("Space", "show answer"),
                ("n/p", "next/prev"),
                ("d", "next due"),
                ("s", "shuffle"),
                ("Del", "delete"),
                ("Esc", "back"),
            ]
        };
        frame.render_widget(KeyHints::new(hints, &self.theme), chunks[6]);
    }

    fn render_reader(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(2),   // Header
            Constraint::Min(5),      // Text
            Constraint::Length(1),   // Progress
            Constraint::Length(2),   // Hints
        ])
        .split(area);

        let Some(chunk) = self.reader.current() else {
            let empty = Paragraph::new(vec![
                Line::from(Span::styled("Nothing to read", self.theme.title())),
                Line::from(""),
                Line::from(Span::styled(
                    "Start with `studious notes.md` or pick a recent file on the dashboard",
                    self.theme.muted(),
                )),
            ])
            .alignment(Alignment::Center);
            frame.render_widget(empty, centered_rect(80, 40, area));
            return;
        };

        let done = if chunk.completed { format!("  {}", icons::CHECK) } else { String::new() };
        let header = Paragraph::new(Line::from(vec![
            Span::styled(chunk.title(), self.theme.title()),
            Span::styled(
                format!("  ·  {} of {}", self.reader.index() + 1, self.reader.chunks().len()),
                self.theme.muted(),
            ),
            Span::styled(done, self.theme.status(false)),
        ]))
        .alignment(Alignment::Center);
        frame.render_widget(header, chunks[0]);

        let text_area = centered_rect(80, 100, chunks[1]);
        let inner_width = text_area.width.saturating_sub(4) as usize;
        let body = match &chunk.range {
            ChunkRange::Text { text, .. } => text.as_str(),
            _ => "",
        };
        let lines: Vec<Line> = wrap_lines(body, inner_width)
            .into_iter()
            .map(|l| Line::from(Span::styled(l, Style::default().fg(self.theme.colors.text))))
            .collect();
        let max_scroll = (lines.len() as u16).saturating_sub(text_area.height.saturating_sub(2));
        self.reader_scroll = self.reader_scroll.min(max_scroll);

        frame.render_widget(
            Paragraph::new(lines)
                .block(self.panel("Reading").padding(ratatui::widgets::Padding::horizontal(1)))
                .scroll((self.reader_scroll, 0)),
            text_area,
        );

        let percent = self.reading_percent();
        frame.render_widget(
            Gauge::default()
                .gauge_style(Style::default().fg(self.theme.colors.primary).bg(self.theme.colors.bg_card))
                .percent(percent as u16)
                .label(format!("{}% read", percent)),
            centered_rect(60, 100, chunks[2]),
        );

        let hints = [
            ("n/p", "next/prev chunk"),
            ("j/k", "scroll"),
            ("g", "make flashcards"),
            ("Esc", "back"),
        ];
        frame.render_widget(KeyHints::new(&hints, &self.theme), chunks[3]);
    }

    fn render_generate(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(3),   // Title
            Constraint::Length(3),   // Input
            Constraint::Length(1),   // Spacing
            Constraint::Min(5),      // Results
            Constraint::Length(2),   // Hints
        ])
        .split(centered_rect(80, 100, area));

        frame.render_widget(
            Paragraph::new("Generate flashcards from a document")
                .alignment(Alignment::Center)
                .style(self.theme.title()),
            chunks[0],
        );

        let input = Paragraph::new(format!("{}▏", self.path_input)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(self.theme.border(true))
                .title(" File path ")
                .title_style(self.theme.border(true)),
        );
        frame.render_widget(input, chunks[1]);

        let width = chunks[3].width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = self
            .last_generated
            .iter()
            .map(|c| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<7}", c.difficulty.name()),
                        Style::default().fg(match c.difficulty {
                            CardDifficulty::Easy => self.theme.colors.rating_easy,
                            CardDifficulty::Hard => self.theme.colors.rating_hard,
                            _ => self.theme.colors.rating_medium,
                        }),
                    ),
                    Span::styled(
                        truncate_to_width(&c.question, width.saturating_sub(8)),
                        Style::default().fg(self.theme.colors.text),
                    ),
                ]))
            })
            .collect();
        frame.render_widget(List::new(items).block(self.panel("Last generated")), chunks[3]);

        frame.render_widget(
            KeyHints::new(&[("Enter", "generate"), ("Esc", "back")], &self.theme),
            chunks[4],
        );
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Helper Functions
// ══════════════════════════════════════════════════════════════════════════

/// Create a centered rectangle.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(r);

    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(middle);
    center
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use chrono::{Local, TimeZone};
    use pretty_assertions::assert_eq;
    use ratatui::{backend::TestBackend, Terminal};

    const NOTES: &str = "The mitochondria is the powerhouse of the cell in most organisms.\n\n\
        The first vaccine was developed in 1796 by a country doctor.\n\n\
        Roughly 60 percent of the human body is made of water molecules.\n\n\
        The Treaty of Westphalia was signed in 1648 after long negotiations.";

    struct Fixture {
        app: App,
        clock: Rc<ManualClock>,
        dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let clock = Rc::new(ManualClock::new(Local.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()));
        let app = App::new(
            Config::default(),
            dir.path().join("config.toml"),
            Rc::new(MemoryStore::new()),
            clock.clone(),
        );
        Fixture { app, clock, dir }
    }

    fn draw(app: &mut App) {
        let mut terminal = Terminal::new(TestBackend::new(100, 36)).unwrap();
        terminal.draw(|frame| app.render(frame)).unwrap();
    }

    #[test]
    fn every_screen_renders() {
        let mut f = fixture();
        for screen in [Screen::Dashboard, Screen::Timer, Screen::Review, Screen::Reader, Screen::Generate] {
            f.app.screen = screen;
            draw(&mut f.app);
        }
    }

    #[test]
    fn opening_a_file_builds_reader_chunks() {
        let mut f = fixture();
        let path = f.dir.path().join("notes.md");
        std::fs::write(&path, NOTES).unwrap();

        f.app.open_file(&path);
        assert_eq!(f.app.screen, Screen::Reader);
        assert_eq!(f.app.reader.chunks().len(), 4);
        assert_eq!(f.app.session.recent_files()[0].name, "notes.md");
        assert_eq!(f.app.session.analytics().stats().documents_studied, 1);
        draw(&mut f.app);

        for _ in 0..4 {
            f.app.handle_key(KeyCode::Char('n'));
        }
        assert!(f.app.reader.chunks().iter().all(|c| c.completed));
        assert_eq!(f.app.session.analytics().stats().session_progress, 100);
    }

    #[test]
    fn unsupported_file_sets_error_status() {
        let mut f = fixture();
        f.app.open_file(Path::new("slides.pdf"));
        let status = f.app.status.as_ref().unwrap();
        assert!(status.is_error);
        assert_eq!(f.app.screen, Screen::Dashboard);
    }

    #[test]
    fn generate_then_review() {
        let mut f = fixture();
        let path = f.dir.path().join("notes.txt");
        std::fs::write(&path, NOTES).unwrap();

        f.app.screen = Screen::Generate;
        for c in path.to_string_lossy().chars() {
            f.app.handle_key(KeyCode::Char(c));
        }
        f.app.handle_key(KeyCode::Enter);
        let generated = f.app.deck.len();
        assert!(generated > 0);
        assert_eq!(f.app.session.analytics().stats().flashcards_created as usize, generated);
        draw(&mut f.app);

        f.app.handle_key(KeyCode::Esc);
        f.app.screen = Screen::Review;
        f.app.handle_key(KeyCode::Char('1'));
        assert_eq!(f.app.reviewed, 0);

        f.app.handle_key(KeyCode::Char(' '));
        draw(&mut f.app);
        f.app.handle_key(KeyCode::Char('1'));
        assert_eq!(f.app.reviewed, 1);
        assert_eq!(f.app.deck.cards()[0].performance.attempts, 1);
    }

    #[test]
    fn delete_key_removes_current_card() {
        let mut f = fixture();
        f.app.deck.add_card("Q1".into(), "A1".into());
        f.app.deck.add_card("Q2".into(), "A2".into());
        f.app.screen = Screen::Review;

        f.app.handle_key(KeyCode::Delete);
        assert_eq!(f.app.deck.len(), 1);
        assert_eq!(f.app.deck.current().unwrap().question, "Q2");
    }

    #[test]
    fn timer_keys_drive_the_session() {
        let mut f = fixture();
        f.app.screen = Screen::Timer;
        f.app.handle_key(KeyCode::Char('2'));
        assert_eq!(f.app.session.timer().total_seconds(), 300);

        f.app.handle_key(KeyCode::Char('1'));
        f.app.handle_key(KeyCode::Char(' '));
        assert!(f.app.session.timer().is_running());

        f.clock.advance_secs(25 * 60);
        f.app.on_tick();
        assert_eq!(f.app.session.analytics().stats().sessions_completed, 1);
        assert_eq!(f.app.session.timer().kind(), TimerKind::Break);
        assert_eq!(f.app.status.as_ref().unwrap().text, "Session complete. Take a break!");
        draw(&mut f.app);
    }

    fn screen_text(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 36)).unwrap();
        terminal.draw(|frame| app.render(frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn finished_break_shows_as_finished() {
        let mut f = fixture();
        f.app.screen = Screen::Timer;
        f.app.handle_key(KeyCode::Char('2'));
        f.app.handle_key(KeyCode::Char(' '));
        assert!(screen_text(&mut f.app).contains("running"));

        f.clock.advance_secs(5 * 60);
        f.app.on_tick();
        assert_eq!(f.app.session.timer().remaining(), 0);
        assert!(screen_text(&mut f.app).contains("finished"));
    }

    #[test]
    fn theme_cycle_is_persisted() {
        let mut f = fixture();
        f.app.handle_key(KeyCode::Char('t'));
        let saved = Config::load_from(&f.dir.path().join("config.toml")).unwrap();
        assert_eq!(saved.theme, "gruvbox");
    }
}
