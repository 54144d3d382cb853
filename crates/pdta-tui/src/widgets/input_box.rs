//! Text input widget

use crate::input::Action;
use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::{Block, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthChar;

/// Single-line text input with horizontal scrolling
#[derive(Debug, Default)]
pub struct InputBox {
    /// Current input text
    content: String,
    /// Cursor position in characters, not bytes
    cursor: usize,
    /// Horizontal scroll offset in display columns
    scroll: usize,
    /// Placeholder shown while empty
    placeholder: String,
    /// Whether the input is focused
    focused: bool,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set placeholder text
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// Set focus state
    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    /// Get the current content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Clear the content
    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
        self.scroll = 0;
    }

    /// Take the content out, leaving the box empty
    pub fn take(&mut self) -> String {
        let text = std::mem::take(&mut self.content);
        self.cursor = 0;
        self.scroll = 0;
        text
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn cursor_columns(&self) -> usize {
        self.content
            .chars()
            .take(self.cursor)
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }

    fn remove_char_at(&mut self, char_index: usize) {
        let start = self.byte_offset(char_index);
        let end = self.byte_offset(char_index + 1);
        self.content.drain(start..end);
    }

    fn insert_char(&mut self, c: char) {
        let offset = self.byte_offset(self.cursor);
        self.content.insert(offset, c);
        self.cursor += 1;
    }

    /// Handle an input action; returns true if the state changed
    pub fn handle_action(&mut self, action: &Action, width: u16) -> bool {
        let char_count = self.content.chars().count();

        let changed = match action {
            Action::Char(c) => {
                self.insert_char(*c);
                true
            }
            Action::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.remove_char_at(self.cursor);
                    true
                } else {
                    false
                }
            }
            Action::Delete => {
                if self.cursor < char_count {
                    self.remove_char_at(self.cursor);
                    true
                } else {
                    false
                }
            }
            Action::Left => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    true
                } else {
                    false
                }
            }
            Action::Right => {
                if self.cursor < char_count {
                    self.cursor += 1;
                    true
                } else {
                    false
                }
            }
            Action::Home => {
                self.cursor = 0;
                true
            }
            Action::End => {
                self.cursor = char_count;
                true
            }
            Action::ClearLine => {
                self.clear();
                true
            }
            Action::DeleteWord => {
                let chars: Vec<char> = self.content.chars().collect();
                let mut start = self.cursor;
                while start > 0 && chars[start - 1] == ' ' {
                    start -= 1;
                }
                while start > 0 && chars[start - 1] != ' ' {
                    start -= 1;
                }
                let start_byte = self.byte_offset(start);
                let end_byte = self.byte_offset(self.cursor);
                self.content.drain(start_byte..end_byte);
                self.cursor = start;
                true
            }
            Action::Paste(text) => {
                for c in text.chars() {
                    // Single-line input: newlines collapse to a space
                    if c == '\n' || c == '\r' {
                        if self.cursor > 0 && !self.content.ends_with(' ') {
                            self.insert_char(' ');
                        }
                    } else {
                        self.insert_char(c);
                    }
                }
                true
            }
            _ => false,
        };

        if changed {
            self.update_scroll(width as usize);
        }
        changed
    }

    fn update_scroll(&mut self, width: usize) {
        // Borders and padding
        let visible_width = width.saturating_sub(4);
        let cursor_col = self.cursor_columns();

        if cursor_col < self.scroll {
            self.scroll = cursor_col;
        } else if visible_width > 0 && cursor_col >= self.scroll + visible_width {
            self.scroll = cursor_col - visible_width + 1;
        }
    }

    /// Render the input box
    pub fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(if self.focused {
                theme.accent_style()
            } else {
                theme.border_style()
            });

        let inner = block.inner(area);
        block.render(area, buf);

        let display_text = if self.content.is_empty() {
            self.placeholder.clone()
        } else {
            self.visible_slice(inner.width as usize)
        };

        let style = if self.content.is_empty() {
            theme.dim_style()
        } else {
            theme.base_style()
        };

        let paragraph = Paragraph::new(display_text).style(style);
        paragraph.render(inner, buf);

        // Cursor cell
        if self.focused && inner.width > 0 {
            let cursor_x = self.cursor_columns().saturating_sub(self.scroll);
            if cursor_x < inner.width as usize {
                let x = inner.x + cursor_x as u16;
                if let Some(cell) = buf.cell_mut((x, inner.y)) {
                    cell.set_style(Style::default().bg(theme.accent));
                }
            }
        }
    }

    /// The portion of the content visible after applying the scroll offset
    fn visible_slice(&self, visible_width: usize) -> String {
        let mut visible = String::new();
        let mut col = 0;
        for c in self.content.chars() {
            let w = c.width().unwrap_or(0);
            if col + w <= self.scroll {
                col += w;
                continue;
            }
            if col + w > self.scroll + visible_width {
                break;
            }
            visible.push(c);
            col += w;
        }
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> InputBox {
        let mut input = InputBox::new();
        for c in text.chars() {
            input.handle_action(&Action::Char(c), 80);
        }
        input
    }

    #[test]
    fn test_typing_and_take() {
        let mut input = typed("nodulo 6mm");
        assert_eq!(input.content(), "nodulo 6mm");
        assert_eq!(input.take(), "nodulo 6mm");
        assert_eq!(input.content(), "");
    }

    #[test]
    fn test_backspace_handles_multibyte() {
        let mut input = typed("età");
        input.handle_action(&Action::Backspace, 80);
        assert_eq!(input.content(), "et");
        input.handle_action(&Action::Backspace, 80);
        input.handle_action(&Action::Backspace, 80);
        assert_eq!(input.content(), "");
        assert!(!input.handle_action(&Action::Backspace, 80));
    }

    #[test]
    fn test_delete_word() {
        let mut input = typed("stadiazione del tumore");
        input.handle_action(&Action::DeleteWord, 80);
        assert_eq!(input.content(), "stadiazione del ");
    }

    #[test]
    fn test_paste_collapses_newlines() {
        let mut input = InputBox::new();
        input.handle_action(&Action::Paste("prima\r\nseconda".to_string()), 80);
        assert_eq!(input.content(), "prima seconda");
    }

    #[test]
    fn test_insert_in_the_middle() {
        let mut input = typed("nodlo");
        input.handle_action(&Action::Left, 80);
        input.handle_action(&Action::Left, 80);
        input.handle_action(&Action::Char('u'), 80);
        assert_eq!(input.content(), "nodulo");
    }
}
