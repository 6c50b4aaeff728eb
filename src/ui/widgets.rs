//! Custom widgets for the study TUI.

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{block::BorderType, Block, Borders, Paragraph, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::theme::Theme;
use crate::models::{DeckStats, ReviewOutcome};
use crate::sm2::format_interval;

// ══════════════════════════════════════════════════════════════════════════
// Text helpers
// ══════════════════════════════════════════════════════════════════════════

/// Shorten `s` to at most `max` display columns, ending with an ellipsis
/// when anything was cut.
pub fn truncate_to_width(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Wrap text to `width` columns, keeping paragraph breaks.
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    text.lines()
        .flat_map(|line| {
            if line.trim().is_empty() {
                vec![String::new()]
            } else {
                textwrap::wrap(line, width)
                    .into_iter()
                    .map(|l| l.into_owned())
                    .collect()
            }
        })
        .collect()
}

// ══════════════════════════════════════════════════════════════════════════
// Banner
// ══════════════════════════════════════════════════════════════════════════

pub struct Banner<'a> {
    theme: &'a Theme,
}

impl<'a> Banner<'a> {
    const ART: &'static str = r#"
     _             _ _
 ___| |_ _   _  __| (_) ___  _   _ ___
/ __| __| | | |/ _` | |/ _ \| | | / __|
\__ \ |_| |_| | (_| | | (_) | |_| \__ \
|___/\__|\__,_|\__,_|_|\___/ \__,_|___/"#;

    pub fn new(theme: &'a Theme) -> Self {
        Self { theme }
    }
}

impl Widget for Banner<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut lines: Vec<Line> = Self::ART
            .lines()
            .skip(1)
            .map(|line| Line::from(Span::styled(line, self.theme.highlight())))
            .collect();
        lines.push(Line::from(Span::styled(
            "read in chunks · focus in sprints · remember with spaced repetition",
            self.theme.muted(),
        )));

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(area, buf);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Deck Stats Bar
// ══════════════════════════════════════════════════════════════════════════

pub struct StatsBar<'a> {
    stats: &'a DeckStats,
    theme: &'a Theme,
}

impl<'a> StatsBar<'a> {
    pub fn new(stats: &'a DeckStats, theme: &'a Theme) -> Self {
        Self { stats, theme }
    }
}

impl Widget for StatsBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let cells = [
            ("Cards", self.stats.total_cards.to_string(), colors.text),
            ("Due", self.stats.due_cards.to_string(), colors.warning),
            ("New", self.stats.new_cards.to_string(), colors.secondary),
            (
                "Accuracy",
                format!("{}%", self.stats.average_accuracy),
                colors.accent,
            ),
        ];

        let columns = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(area);
        for ((label, value, color), column) in cells.into_iter().zip(columns.iter()) {
            let line = Line::from(vec![
                Span::styled("● ", Style::default().fg(color)),
                Span::styled(format!("{}: ", label), self.theme.muted()),
                Span::styled(value, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            ]);
            Paragraph::new(line)
                .alignment(Alignment::Center)
                .render(*column, buf);
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Flashcard Widget
// ══════════════════════════════════════════════════════════════════════════

pub struct FlashcardWidget<'a> {
    content: &'a str,
    is_front: bool,
    footer: Option<&'a str>,
    theme: &'a Theme,
}

impl<'a> FlashcardWidget<'a> {
    pub fn new(content: &'a str, is_front: bool, theme: &'a Theme) -> Self {
        Self {
            content,
            is_front,
            footer: None,
            theme,
        }
    }

    /// Small line under the card body, used for hints and tags.
    pub fn footer(mut self, footer: Option<&'a str>) -> Self {
        self.footer = footer;
        self
    }
}

impl Widget for FlashcardWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (label, label_style) = if self.is_front {
            ("QUESTION", self.theme.card_front())
        } else {
            ("ANSWER", self.theme.card_back())
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(label_style.remove_modifier(Modifier::BOLD))
            .title(Line::from(vec![
                Span::raw(" "),
                Span::styled(label, label_style),
                Span::raw(" "),
            ]))
            .title_alignment(Alignment::Center);

        let inner = block.inner(area);
        block.render(area, buf);

        let width = inner.width.saturating_sub(4);
        let mut lines: Vec<Line> = wrap_lines(self.content, width as usize)
            .into_iter()
            .map(|l| Line::from(Span::styled(l, Style::default().fg(self.theme.colors.text))))
            .collect();
        if let Some(footer) = self.footer {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(footer.to_string(), self.theme.dim())));
        }

        let padding = inner.height.saturating_sub(lines.len() as u16) / 2;
        let content_area = Rect {
            x: inner.x + 2,
            y: inner.y + padding,
            width,
            height: inner.height.saturating_sub(padding),
        };

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(content_area, buf);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Outcome Buttons
// ══════════════════════════════════════════════════════════════════════════

pub struct OutcomeButtons<'a> {
    preview: &'a [(ReviewOutcome, u32)],
    enabled: bool,
    theme: &'a Theme,
}

impl<'a> OutcomeButtons<'a> {
    pub fn new(preview: &'a [(ReviewOutcome, u32)], enabled: bool, theme: &'a Theme) -> Self {
        Self {
            preview,
            enabled,
            theme,
        }
    }
}

impl Widget for OutcomeButtons<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let count = self.preview.len().max(1) as u32;
        let columns =
            Layout::horizontal(vec![Constraint::Ratio(1, count); self.preview.len()]).split(area);

        for (i, ((outcome, days), column)) in self.preview.iter().zip(columns.iter()).enumerate() {
            let color = if self.enabled {
                outcome.color_for_theme(self.theme)
            } else {
                self.theme.colors.text_dim
            };

            let button = Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(color));
            let inner = button.inner(*column);
            button.render(*column, buf);

            let mut lines = vec![
                Line::from(Span::styled(
                    format!("{} {}", i + 1, outcome.name()),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )),
            ];
            if self.enabled {
                lines.push(Line::from(Span::styled(
                    format_interval(*days),
                    self.theme.muted(),
                )));
            }
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .render(inner, buf);
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Big Clock
// ══════════════════════════════════════════════════════════════════════════

const GLYPH_ROWS: usize = 5;

fn glyph(c: char) -> [&'static str; GLYPH_ROWS] {
    match c {
        '0' => ["███", "█ █", "█ █", "█ █", "███"],
        '1' => ["  █", "  █", "  █", "  █", "  █"],
        '2' => ["███", "  █", "███", "█  ", "███"],
        '3' => ["███", "  █", "███", "  █", "███"],
        '4' => ["█ █", "█ █", "███", "  █", "  █"],
        '5' => ["███", "█  ", "███", "  █", "███"],
        '6' => ["███", "█  ", "███", "█ █", "███"],
        '7' => ["███", "  █", "  █", "  █", "  █"],
        '8' => ["███", "█ █", "███", "█ █", "███"],
        '9' => ["███", "█ █", "███", "  █", "███"],
        ':' => [" ", "█", " ", "█", " "],
        _ => ["   "; GLYPH_ROWS],
    }
}

/// Block-letter rows for a clock string such as `25:00`.
pub fn big_text_rows(text: &str) -> Vec<String> {
    (0..GLYPH_ROWS)
        .map(|row| {
            text.chars()
                .map(|c| glyph(c)[row])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

pub struct BigClock<'a> {
    text: &'a str,
    style: Style,
}

impl<'a> BigClock<'a> {
    pub fn new(text: &'a str, style: Style) -> Self {
        Self { text, style }
    }
}

impl Widget for BigClock<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rows = big_text_rows(self.text);
        let too_narrow = rows.first().map_or(true, |r| r.width() > area.width as usize);

        // Fall back to plain digits in cramped terminals
        let lines: Vec<Line> = if too_narrow || area.height < GLYPH_ROWS as u16 {
            vec![Line::from(Span::styled(self.text.to_string(), self.style))]
        } else {
            rows.into_iter()
                .map(|r| Line::from(Span::styled(r, self.style)))
                .collect()
        };

        let padding = area.height.saturating_sub(lines.len() as u16) / 2;
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(
                Rect {
                    y: area.y + padding,
                    height: area.height.saturating_sub(padding),
                    ..area
                },
                buf,
            );
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Key Hints Widget
// ══════════════════════════════════════════════════════════════════════════

pub struct KeyHints<'a> {
    hints: &'a [(&'a str, &'a str)],
    theme: &'a Theme,
}

impl<'a> KeyHints<'a> {
    pub fn new(hints: &'a [(&'a str, &'a str)], theme: &'a Theme) -> Self {
        Self { hints, theme }
    }
}

impl Widget for KeyHints<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut spans = Vec::with_capacity(self.hints.len() * 3);
        for (i, (key, desc)) in self.hints.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" │ ", self.theme.key_hint()));
            }
            spans.push(Span::styled(*key, self.theme.key_highlight()));
            spans.push(Span::styled(format!(" {}", desc), self.theme.key_hint()));
        }

        Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn truncation_respects_display_width() {
        assert_eq!(truncate_to_width("notes.txt", 20), "notes.txt");
        assert_eq!(truncate_to_width("hello world", 6), "hello…");
        assert_eq!(truncate_to_width("日本語テキスト", 5), "日本…");
    }

    #[test]
    fn wrapping_keeps_blank_lines() {
        let lines = wrap_lines("one two three\n\nfour", 8);
        assert_eq!(lines, vec!["one two", "three", "", "four"]);
    }

    #[test]
    fn big_clock_rows_line_up() {
        let rows = big_text_rows("25:00");
        assert_eq!(rows.len(), GLYPH_ROWS);
        let widths: Vec<usize> = rows.iter().map(|r| r.width()).collect();
        assert!(widths.iter().all(|&w| w == widths[0]));
        assert_eq!(rows[0], "███ ███   ███ ███");
    }

    #[test]
    fn widgets_render_into_small_buffers() {
        let theme = Theme::default();
        let area = Rect::new(0, 0, 30, 6);
        let mut buf = Buffer::empty(area);

        BigClock::new("05:00", theme.timer(false)).render(area, &mut buf);
        FlashcardWidget::new("What is a mitochondrion?", true, &theme)
            .footer(Some("hint: cells"))
            .render(area, &mut buf);
        let preview = [(ReviewOutcome::Easy, 6), (ReviewOutcome::Medium, 1), (ReviewOutcome::Hard, 1)];
        OutcomeButtons::new(&preview, true, &theme).render(area, &mut buf);
        KeyHints::new(&[("q", "quit")], &theme).render(area, &mut buf);
    }
}
