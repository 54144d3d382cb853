//! Color theme support

use ratatui::style::{Color, Modifier, Style};

/// Color theme for the chat UI
#[derive(Debug, Clone)]
pub struct Theme {
    /// Background color
    pub bg: Color,
    /// Primary text color
    pub fg: Color,
    /// Dimmed/secondary text
    pub dim: Color,
    /// Accent color (prompts, highlights)
    pub accent: Color,
    /// Error and apology color
    pub error: Color,
    /// Warning color
    pub warning: Color,
    /// Border color
    pub border: Color,
    /// Code/preformatted text color
    pub code: Color,
    /// Link color
    pub link: Color,
    /// User turn header color
    pub user: Color,
    /// Assistant turn header color
    pub assistant: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    /// Dark theme (default)
    pub fn dark() -> Self {
        Self {
            bg: Color::Reset,
            fg: Color::White,
            dim: Color::DarkGray,
            accent: Color::Cyan,
            error: Color::Red,
            warning: Color::Yellow,
            border: Color::DarkGray,
            code: Color::Magenta,
            link: Color::Blue,
            user: Color::Cyan,
            assistant: Color::Green,
        }
    }

    /// Light theme
    pub fn light() -> Self {
        Self {
            bg: Color::White,
            fg: Color::Black,
            dim: Color::Gray,
            accent: Color::Blue,
            error: Color::Red,
            warning: Color::Rgb(180, 120, 0),
            border: Color::Gray,
            code: Color::Magenta,
            link: Color::Blue,
            user: Color::Blue,
            assistant: Color::Rgb(0, 120, 60),
        }
    }

    /// Look up a theme by name, falling back to dark
    pub fn by_name(name: &str) -> Self {
        match name {
            "light" => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Get base style
    pub fn base_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    /// Get dimmed style
    pub fn dim_style(&self) -> Style {
        Style::default().fg(self.dim)
    }

    /// Get accent style
    pub fn accent_style(&self) -> Style {
        Style::default().fg(self.accent)
    }

    /// Get error style
    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error)
    }

    /// Get code/preformatted style
    pub fn code_style(&self) -> Style {
        Style::default().fg(self.code)
    }

    /// Get border style
    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }

    /// Bold header style for user turns
    pub fn user_header(&self) -> Style {
        Style::default().fg(self.user).add_modifier(Modifier::BOLD)
    }

    /// Bold header style for assistant turns
    pub fn assistant_header(&self) -> Style {
        Style::default()
            .fg(self.assistant)
            .add_modifier(Modifier::BOLD)
    }
}
