//! Message list widget for displaying the conversation

use crate::theme::Theme;
use crate::widgets::markdown::render_markdown;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

/// Who a displayed message is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRole {
    User,
    Assistant,
    /// Display-only notices (welcome banner, status) that are not part
    /// of the conversation transcript
    System,
}

impl DisplayRole {
    /// Header label shown above the message
    pub fn label(&self) -> &'static str {
        match self {
            DisplayRole::User => "Tu",
            DisplayRole::Assistant => "Assistente",
            DisplayRole::System => "Sistema",
        }
    }
}

/// A single message in the chat view
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: DisplayRole,
    pub content: String,
    /// Apologies and failure notices get error styling
    pub is_error: bool,
    /// Still accumulating fragments
    pub is_streaming: bool,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: DisplayRole::User,
            content: content.into(),
            is_error: false,
            is_streaming: false,
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: DisplayRole::Assistant,
            content: content.into(),
            is_error: false,
            is_streaming: false,
        }
    }

    /// Create an assistant message still being streamed
    pub fn assistant_streaming(content: impl Into<String>) -> Self {
        Self {
            role: DisplayRole::Assistant,
            content: content.into(),
            is_error: false,
            is_streaming: true,
        }
    }

    /// Create an assistant apology/failure message
    pub fn apology(content: impl Into<String>) -> Self {
        Self {
            role: DisplayRole::Assistant,
            content: content.into(),
            is_error: true,
            is_streaming: false,
        }
    }

    /// Create a display-only system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: DisplayRole::System,
            content: content.into(),
            is_error: false,
            is_streaming: false,
        }
    }
}

/// Widget for displaying a list of chat messages
pub struct MessageList<'a> {
    messages: &'a [ChatMessage],
    theme: &'a Theme,
    scroll: usize,
}

impl<'a> MessageList<'a> {
    /// Create a new message list
    pub fn new(messages: &'a [ChatMessage], theme: &'a Theme) -> Self {
        Self {
            messages,
            theme,
            scroll: 0,
        }
    }

    /// Set scroll offset
    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    fn render_message(&self, msg: &ChatMessage, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let (role_style, prefix) = match msg.role {
            DisplayRole::User => (self.theme.user_header(), "▶ "),
            DisplayRole::Assistant => (self.theme.assistant_header(), "◀ "),
            DisplayRole::System => (self.theme.dim_style(), "● "),
        };

        let header = if msg.is_streaming {
            format!("{}{} ▌", prefix, msg.role.label())
        } else {
            format!("{}{}", prefix, msg.role.label())
        };
        lines.push(Line::from(Span::styled(header, role_style)));

        let content_width = width.saturating_sub(2);

        if msg.role == DisplayRole::Assistant && !msg.is_error {
            if msg.content.is_empty() && msg.is_streaming {
                // Nothing arrived yet; the spinner in the status bar covers
                // the waiting state, show a quiet placeholder here
                lines.push(Line::from(Span::styled(
                    "  in attesa della risposta...".to_string(),
                    self.theme.dim_style(),
                )));
            } else {
                // Assistant replies are markdown
                let md_lines = render_markdown(&msg.content, self.theme, content_width);
                for line in md_lines {
                    let mut indented_spans = vec![Span::raw("  ")];
                    indented_spans.extend(
                        line.spans
                            .into_iter()
                            .map(|s| Span::styled(s.content.into_owned(), s.style)),
                    );
                    lines.push(Line::from(indented_spans));
                }
            }
        } else {
            // Plain text with wrapping for user turns, apologies, notices
            let content_style = if msg.is_error {
                self.theme.error_style()
            } else if msg.role == DisplayRole::System {
                self.theme.dim_style()
            } else {
                self.theme.base_style()
            };

            let wrapped = textwrap::wrap(&msg.content, content_width.max(1));
            for line in wrapped {
                lines.push(Line::from(Span::styled(
                    format!("  {}", line),
                    content_style,
                )));
            }
        }

        // Empty line between messages
        lines.push(Line::from(""));

        lines
    }
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::NONE);

        let inner = block.inner(area);
        block.render(area, buf);

        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let width = inner.width as usize;
        let mut all_lines: Vec<Line> = Vec::new();
        for msg in self.messages {
            all_lines.extend(self.render_message(msg, width));
        }

        let visible_lines: Vec<Line> = all_lines
            .into_iter()
            .skip(self.scroll)
            .take(inner.height as usize)
            .collect();

        let paragraph = Paragraph::new(visible_lines).wrap(Wrap { trim: false });
        paragraph.render(inner, buf);
    }
}

/// Total rendered height of the messages at the given width, used for
/// scroll clamping. Must mirror the rendering logic above.
pub fn calculate_message_height(messages: &[ChatMessage], width: usize) -> usize {
    let theme = Theme::dark();
    let content_width = width.saturating_sub(2);
    let mut total = 0;

    for msg in messages {
        // Role header
        total += 1;

        if msg.role == DisplayRole::Assistant && !msg.is_error {
            if msg.content.is_empty() && msg.is_streaming {
                total += 1;
            } else {
                total += render_markdown(&msg.content, &theme, content_width).len();
            }
        } else {
            total += textwrap::wrap(&msg.content, content_width.max(1)).len();
        }

        // Separator
        total += 1;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_labels_are_italian() {
        assert_eq!(DisplayRole::User.label(), "Tu");
        assert_eq!(DisplayRole::Assistant.label(), "Assistente");
        assert_eq!(DisplayRole::System.label(), "Sistema");
    }

    #[test]
    fn test_height_counts_header_and_separator() {
        let messages = vec![ChatMessage::user("ciao")];
        // header + one content line + separator
        assert_eq!(calculate_message_height(&messages, 80), 3);
    }

    #[test]
    fn test_height_wraps_long_user_turns() {
        let messages = vec![ChatMessage::user("parola ".repeat(40))];
        let height = calculate_message_height(&messages, 40);
        assert!(height > 3);
    }

    #[test]
    fn test_apology_is_error_styled() {
        let msg = ChatMessage::apology("Sorry, an error occurred");
        assert!(msg.is_error);
        assert_eq!(msg.role, DisplayRole::Assistant);
    }
}
