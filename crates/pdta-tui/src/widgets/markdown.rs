//! Markdown rendering for assistant replies

use crate::theme::Theme;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};

/// Convert markdown text to styled ratatui lines
pub fn render_markdown<'a>(text: &str, theme: &Theme, width: usize) -> Vec<Line<'a>> {
    let mut writer = Writer::new(theme, width);
    for event in Parser::new(text) {
        writer.push(event);
    }
    writer.finish()
}

struct Writer<'t> {
    theme: &'t Theme,
    width: usize,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    style: Style,
    in_code_block: bool,
    code_block: String,
    list_depth: usize,
}

impl<'t> Writer<'t> {
    fn new(theme: &'t Theme, width: usize) -> Self {
        Self {
            theme,
            width,
            lines: Vec::new(),
            current: Vec::new(),
            style: theme.base_style(),
            in_code_block: false,
            code_block: String::new(),
            list_depth: 0,
        }
    }

    fn flush_line(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.current)));
        }
    }

    fn blank_line(&mut self) {
        self.lines.push(Line::from(""));
    }

    fn push(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag_end) => self.end_tag(tag_end),
            Event::Text(text) => {
                if self.in_code_block {
                    self.code_block.push_str(&text);
                } else {
                    self.current.push(Span::styled(text.to_string(), self.style));
                }
            }
            Event::Code(code) => {
                let code_style = self.theme.code_style().add_modifier(Modifier::BOLD);
                self.current
                    .push(Span::styled(format!("`{}`", code), code_style));
            }
            Event::SoftBreak => self.current.push(Span::raw(" ")),
            Event::HardBreak => self.flush_line(),
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush_line();
                self.style = match level {
                    HeadingLevel::H1 => self
                        .theme
                        .accent_style()
                        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                    HeadingLevel::H2 => self.theme.accent_style().add_modifier(Modifier::BOLD),
                    _ => self.theme.accent_style(),
                };
            }
            Tag::Paragraph => self.flush_line(),
            Tag::CodeBlock(_) => {
                self.in_code_block = true;
                self.code_block.clear();
                self.flush_line();
            }
            Tag::List(_) => self.list_depth += 1,
            Tag::Item => {
                self.flush_line();
                let indent = "  ".repeat(self.list_depth.saturating_sub(1));
                self.current
                    .push(Span::styled(format!("{}• ", indent), self.theme.dim_style()));
            }
            Tag::Emphasis => self.style = self.style.add_modifier(Modifier::ITALIC),
            Tag::Strong => self.style = self.style.add_modifier(Modifier::BOLD),
            Tag::Strikethrough => self.style = self.style.add_modifier(Modifier::CROSSED_OUT),
            Tag::Link { .. } => self.style = Style::default().fg(self.theme.link),
            _ => {}
        }
    }

    fn end_tag(&mut self, tag_end: TagEnd) {
        match tag_end {
            TagEnd::Heading(_) => {
                self.flush_line();
                self.style = self.theme.base_style();
            }
            TagEnd::Paragraph => {
                self.flush_line();
                self.blank_line();
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                let code_style = self.theme.code_style().add_modifier(Modifier::DIM);
                let max = self.width.saturating_sub(4);
                let code_lines: Vec<String> = self
                    .code_block
                    .lines()
                    .map(|code_line| match truncate_to_columns(code_line, max) {
                        Some(head) => format!("  {}…", head),
                        None => format!("  {}", code_line),
                    })
                    .collect();
                for display_line in code_lines {
                    self.lines.push(Line::from(Span::styled(display_line, code_style)));
                }
                self.blank_line();
            }
            TagEnd::List(_) => {
                self.list_depth = self.list_depth.saturating_sub(1);
                if self.list_depth == 0 {
                    self.blank_line();
                }
            }
            TagEnd::Item => self.flush_line(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.style = self.theme.base_style();
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_line();

        // Drop trailing blank lines
        while self.lines.last().is_some_and(|l| {
            l.spans.is_empty() || (l.spans.len() == 1 && l.spans[0].content.is_empty())
        }) {
            self.lines.pop();
        }

        self.lines
    }
}

/// Prefix of `line` that fits in `max` display columns, leaving one
/// column for the ellipsis. Returns `None` when the whole line fits.
/// Counts columns rather than bytes so accented and wide characters
/// never get split mid-char.
fn truncate_to_columns(line: &str, max: usize) -> Option<&str> {
    use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

    if line.width() <= max {
        return None;
    }
    let budget = max.saturating_sub(1);
    let mut columns = 0;
    for (idx, ch) in line.char_indices() {
        let w = ch.width().unwrap_or(0);
        if columns + w > budget {
            return Some(&line[..idx]);
        }
        columns += w;
    }
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_text() {
        let theme = Theme::dark();
        let lines = render_markdown("La TC torace è indicata.", &theme, 80);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_list_items_get_bullets() {
        let theme = Theme::dark();
        let lines = render_markdown("- primo\n- secondo", &theme, 80);
        let rendered: Vec<String> = lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert!(rendered.iter().any(|l| l.contains("• primo")));
        assert!(rendered.iter().any(|l| l.contains("• secondo")));
    }

    #[test]
    fn test_code_block() {
        let theme = Theme::dark();
        let lines = render_markdown("```\ncodice I_DS_P33\n```", &theme, 80);
        assert!(!lines.is_empty());
    }

    #[test]
    fn test_code_block_truncates_multibyte_on_char_boundaries() {
        let theme = Theme::dark();
        let md = format!("```\n{}\n```", "è".repeat(100));
        let lines = render_markdown(&md, &theme, 20);

        let text: String = lines[0].spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(text.ends_with('…'));
        assert!(text.chars().count() <= 20);
    }

    #[test]
    fn test_code_block_truncates_wide_chars_by_column() {
        use unicode_width::UnicodeWidthStr;

        let theme = Theme::dark();
        let md = format!("```\n{}\n```", "検".repeat(40));
        let lines = render_markdown(&md, &theme, 20);

        let text: String = lines[0].spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(text.ends_with('…'));
        assert!(text.width() <= 20);
    }

    #[test]
    fn test_short_code_lines_are_not_truncated() {
        let theme = Theme::dark();
        let lines = render_markdown("```\nperché\n```", &theme, 40);
        let text: String = lines[0].spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "  perché");
    }

    #[test]
    fn test_no_trailing_blank_lines() {
        let theme = Theme::dark();
        let lines = render_markdown("paragrafo\n\naltro paragrafo\n", &theme, 80);
        let last = lines.last().unwrap();
        assert!(!last.spans.is_empty());
    }
}
