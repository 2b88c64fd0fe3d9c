//! Conversation history display component

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::conversation::{Conversation, Speaker, Turn};

/// Per-frame view over the conversation store. Renders every turn bottom
/// anchored, with a typing cursor on the streaming turn.
pub struct HistoryView<'a> {
    conversation: &'a Conversation,
}

impl<'a> HistoryView<'a> {
    pub fn new(conversation: &'a Conversation) -> Self {
        Self { conversation }
    }

    fn turn_lines(&self, turn: &Turn, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let label = match turn.speaker {
            Speaker::User => "You",
            Speaker::Assistant => "Confab",
        };
        let timestamp = turn.created_at.format("%H:%M:%S").to_string();
        let header = format!("{} {} {}", label, timestamp, "─".repeat(20));
        lines.push(Line::from(Span::styled(
            header,
            Style::default().fg(Color::DarkGray),
        )));

        if turn.in_progress && turn.content.is_empty() {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled("Thinking...", Style::default().fg(Color::DarkGray)),
            ]));
            return lines;
        }

        let style = match turn.speaker {
            Speaker::User => Style::default().fg(Color::Blue),
            Speaker::Assistant => Style::default().fg(Color::Green),
        };

        let wrapped = wrap_text(&turn.content, width.saturating_sub(2) as usize);
        let last = wrapped.len().saturating_sub(1);
        for (i, content_line) in wrapped.into_iter().enumerate() {
            let mut spans = vec![Span::raw("  "), Span::styled(content_line, style)];
            if turn.in_progress && i == last {
                spans.push(Span::styled("▋", Style::default().fg(Color::Yellow)));
            }
            lines.push(Line::from(spans));
        }

        lines
    }
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title(" Confab ");
        let inner = block.inner(area);
        block.render(area, buf);

        let mut all_lines: Vec<Line> = Vec::new();
        for turn in self.conversation.turns() {
            all_lines.append(&mut self.turn_lines(turn, inner.width));
            // spacing between turns
            all_lines.push(Line::from(Span::raw("")));
        }

        // Show the tail that fits
        let height = inner.height as usize;
        let start = all_lines.len().saturating_sub(height);
        for (i, line) in all_lines[start..].iter().enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }
}

/// Wrap text to fit within the given width, breaking on whitespace.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for raw_line in text.split('\n') {
        let mut current = String::new();
        for word in raw_line.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
            } else if current.chars().count() + 1 + word.chars().count() <= width {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(current);
                current = word.to_string();
            }
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_respects_width() {
        let wrapped = wrap_text("one two three four five", 9);
        assert_eq!(wrapped, vec!["one two", "three", "four five"]);
    }

    #[test]
    fn test_wrap_preserves_explicit_newlines() {
        let wrapped = wrap_text("first\nsecond line", 20);
        assert_eq!(wrapped, vec!["first", "second line"]);
    }
}
