//! Theme and styling for the TUI.

use ratatui::style::{Color, Modifier, Style};

/// Color palette for a theme.
#[derive(Debug, Clone)]
pub struct ThemeColors {
    pub primary: Color,
    pub secondary: Color,
    pub accent: Color,

    pub success: Color,
    pub warning: Color,
    pub error: Color,

    pub bg_dark: Color,
    pub bg_card: Color,
    pub bg_highlight: Color,

    pub text: Color,
    pub text_muted: Color,
    pub text_dim: Color,

    // Review outcomes
    pub rating_easy: Color,
    pub rating_medium: Color,
    pub rating_hard: Color,

    // Timer face
    pub timer_study: Color,
    pub timer_break: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeName {
    Default,
    Gruvbox,
}

impl ThemeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeName::Default => "default",
            ThemeName::Gruvbox => "gruvbox",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ThemeName::Default => "Default",
            ThemeName::Gruvbox => "Gruvbox",
        }
    }

    /// Unknown names fall back to the default palette.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "gruvbox" | "gruvbox-dark" => ThemeName::Gruvbox,
            _ => ThemeName::Default,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            ThemeName::Default => ThemeName::Gruvbox,
            ThemeName::Gruvbox => ThemeName::Default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: ThemeName,
    pub colors: ThemeColors,
}

impl Theme {
    pub fn new(name: ThemeName) -> Self {
        let colors = match name {
            ThemeName::Default => Self::default_colors(),
            ThemeName::Gruvbox => Self::gruvbox_colors(),
        };
        Self { name, colors }
    }

    pub fn from_name(name: &str) -> Self {
        Self::new(ThemeName::parse(name))
    }

    fn default_colors() -> ThemeColors {
        ThemeColors {
            primary: Color::Rgb(56, 189, 248),     // Sky
            secondary: Color::Rgb(167, 139, 250),  // Violet
            accent: Color::Rgb(251, 146, 60),      // Orange

            success: Color::Rgb(74, 222, 128),
            warning: Color::Rgb(250, 204, 21),
            error: Color::Rgb(248, 113, 113),

            bg_dark: Color::Rgb(17, 24, 39),       // Gray 900
            bg_card: Color::Rgb(31, 41, 55),       // Gray 800
            bg_highlight: Color::Rgb(55, 65, 81),  // Gray 700

            text: Color::Rgb(243, 244, 246),
            text_muted: Color::Rgb(156, 163, 175),
            text_dim: Color::Rgb(107, 114, 128),

            rating_easy: Color::Rgb(74, 222, 128),
            rating_medium: Color::Rgb(250, 204, 21),
            rating_hard: Color::Rgb(248, 113, 113),

            timer_study: Color::Rgb(56, 189, 248),
            timer_break: Color::Rgb(74, 222, 128),
        }
    }

    fn gruvbox_colors() -> ThemeColors {
        ThemeColors {
            primary: Color::Rgb(0x83, 0xA5, 0x98),   // blue
            secondary: Color::Rgb(0xD3, 0x86, 0x9B), // purple
            accent: Color::Rgb(0xFE, 0x80, 0x19),    // orange

            success: Color::Rgb(0xB8, 0xBB, 0x26),
            warning: Color::Rgb(0xFA, 0xBD, 0x2F),
            error: Color::Rgb(0xFB, 0x49, 0x34),

            bg_dark: Color::Rgb(0x1D, 0x20, 0x21),   // bg0_h
            bg_card: Color::Rgb(0x28, 0x28, 0x28),   // bg0
            bg_highlight: Color::Rgb(0x50, 0x49, 0x45),

            text: Color::Rgb(0xEB, 0xDB, 0xB2),
            text_muted: Color::Rgb(0xBD, 0xAE, 0x93),
            text_dim: Color::Rgb(0x7C, 0x6F, 0x64),

            rating_easy: Color::Rgb(0xB8, 0xBB, 0x26),
            rating_medium: Color::Rgb(0xFA, 0xBD, 0x2F),
            rating_hard: Color::Rgb(0xFB, 0x49, 0x34),

            timer_study: Color::Rgb(0x8E, 0xC0, 0x7C),
            timer_break: Color::Rgb(0x83, 0xA5, 0x98),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Styles
    // ══════════════════════════════════════════════════════════════════════

    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.colors.text)
            .add_modifier(Modifier::BOLD)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.colors.text_muted)
    }

    pub fn dim(&self) -> Style {
        Style::default().fg(self.colors.text_dim)
    }

    pub fn highlight(&self) -> Style {
        Style::default()
            .fg(self.colors.primary)
            .add_modifier(Modifier::BOLD)
    }

    pub fn selected(&self) -> Style {
        Style::default()
            .bg(self.colors.bg_highlight)
            .fg(self.colors.text)
    }

    pub fn border(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.colors.accent)
        } else {
            Style::default().fg(self.colors.primary)
        }
    }

    pub fn card_front(&self) -> Style {
        Style::default()
            .fg(self.colors.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn card_back(&self) -> Style {
        Style::default()
            .fg(self.colors.success)
            .add_modifier(Modifier::BOLD)
    }

    pub fn timer(&self, on_break: bool) -> Style {
        let color = if on_break {
            self.colors.timer_break
        } else {
            self.colors.timer_study
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn status(&self, is_error: bool) -> Style {
        if is_error {
            Style::default().fg(self.colors.error)
        } else {
            Style::default().fg(self.colors.success)
        }
    }

    pub fn key_hint(&self) -> Style {
        Style::default().fg(self.colors.text_dim)
    }

    pub fn key_highlight(&self) -> Style {
        Style::default()
            .fg(self.colors.accent)
            .add_modifier(Modifier::BOLD)
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::new(ThemeName::Default)
    }
}

pub mod icons {
    pub const CHECK: &str = "✓";
    pub const BOOK: &str = "📚";
    pub const CLOCK: &str = "⏱";
    pub const CARD: &str = "🃏";
    pub const FIRE: &str = "🔥";
    pub const SPARKLE: &str = "✨";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_and_cycle() {
        for name in [ThemeName::Default, ThemeName::Gruvbox] {
            assert_eq!(ThemeName::parse(name.as_str()), name);
        }
        assert_eq!(ThemeName::parse("Solarized"), ThemeName::Default);
        assert_eq!(ThemeName::Default.next().next(), ThemeName::Default);
    }

    #[test]
    fn palettes_differ() {
        let a = Theme::new(ThemeName::Default);
        let b = Theme::new(ThemeName::Gruvbox);
        assert_ne!(a.colors.bg_dark, b.colors.bg_dark);
        assert_ne!(a.timer(false), a.timer(true));
    }
}
