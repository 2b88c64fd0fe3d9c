use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::ui::conversation::commands::{command_entries, parse_slash_command, CommandEntry, SlashCommand};

const PLACEHOLDER: &str = "Type your message... (Enter to send, Shift+Enter for newline, / for commands)";

/// Result of one key press handled by the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    Submitted(String),
    Command(SlashCommand),
    None,
}

/// Input box at the bottom of the chat view. While a reply is streaming the
/// composer is locked: typed text is kept but cannot be submitted, matching
/// the one-exchange-at-a-time rule upstream.
pub struct Composer {
    content: String,
    cursor: usize, // char index, not byte index
    busy: bool,
    palette_open: bool,
    filtered: Vec<CommandEntry>,
    selected: usize,
}

impl Composer {
    pub fn new() -> Self {
        Self {
            content: String::new(),
            cursor: 0,
            busy: false,
            palette_open: false,
            filtered: Vec::new(),
            selected: 0,
        }
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.insert_char('\n');
                    return ComposerResult::None;
                }
                if self.palette_open {
                    self.apply_selected_command();
                    return ComposerResult::None;
                }
                self.submit()
            }
            KeyCode::Tab if self.palette_open => {
                self.apply_selected_command();
                ComposerResult::None
            }
            KeyCode::Esc if self.palette_open => {
                self.close_palette();
                ComposerResult::None
            }
            KeyCode::Up if self.palette_open => {
                self.move_selection(-1);
                ComposerResult::None
            }
            KeyCode::Down if self.palette_open => {
                self.move_selection(1);
                ComposerResult::None
            }
            KeyCode::Char(c) => {
                self.insert_char(c);
                self.sync_palette();
                ComposerResult::None
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_index();
                    self.content.remove(at);
                    self.sync_palette();
                }
                ComposerResult::None
            }
            KeyCode::Delete => {
                if self.cursor < self.char_count() {
                    let at = self.byte_index();
                    self.content.remove(at);
                    self.sync_palette();
                }
                ComposerResult::None
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                ComposerResult::None
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.char_count());
                ComposerResult::None
            }
            KeyCode::Home => {
                self.cursor = 0;
                ComposerResult::None
            }
            KeyCode::End => {
                self.cursor = self.char_count();
                ComposerResult::None
            }
            _ => ComposerResult::None,
        }
    }

    fn submit(&mut self) -> ComposerResult {
        let trimmed = self.content.trim();
        if trimmed.is_empty() {
            return ComposerResult::None;
        }

        if let Some(command) = parse_slash_command(trimmed) {
            self.clear();
            return ComposerResult::Command(command);
        }

        // Plain messages are held back until the current reply settles.
        if self.busy {
            return ComposerResult::None;
        }

        let text = std::mem::take(&mut self.content);
        self.cursor = 0;
        self.close_palette();
        ComposerResult::Submitted(text)
    }

    fn insert_char(&mut self, c: char) {
        let at = self.byte_index();
        self.content.insert(at, c);
        self.cursor += 1;
    }

    fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
        self.close_palette();
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_index(&self) -> usize {
        self.content
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    /// Open, refresh, or close the command palette to match the content.
    fn sync_palette(&mut self) {
        if !self.content.starts_with('/') || self.content.contains(char::is_whitespace) {
            self.close_palette();
            return;
        }

        let query = self.content.trim_start_matches('/').to_lowercase();
        self.filtered = command_entries()
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();

        self.palette_open = !self.filtered.is_empty();
        self.selected = self.selected.min(self.filtered.len().saturating_sub(1));
    }

    fn close_palette(&mut self) {
        self.palette_open = false;
        self.filtered.clear();
        self.selected = 0;
    }

    fn move_selection(&mut self, delta: isize) {
        if self.filtered.is_empty() {
            return;
        }
        let len = self.filtered.len() as isize;
        let next = (self.selected as isize + delta).rem_euclid(len);
        self.selected = next as usize;
    }

    fn apply_selected_command(&mut self) {
        if let Some(entry) = self.filtered.get(self.selected) {
            self.content = format!("/{}", entry.keyword);
            self.cursor = self.char_count();
            self.close_palette();
        }
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for &Composer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (title, border_style) = if self.busy {
            (" waiting for reply… ", Style::default().fg(Color::DarkGray))
        } else {
            (" message ", Style::default().fg(Color::Green))
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .style(border_style);
        let inner = block.inner(area);
        block.render(area, buf);

        if self.content.is_empty() {
            let placeholder = Line::from(Span::styled(
                PLACEHOLDER,
                Style::default().fg(Color::DarkGray),
            ));
            buf.set_line(inner.x, inner.y, &placeholder, inner.width);
        } else {
            let mut content = self.content.clone();
            if !self.busy {
                let at = self.byte_index();
                content.insert(at.min(content.len()), '▌');
            }
            for (i, line_text) in content.split('\n').enumerate() {
                if i < inner.height as usize {
                    let line = Line::from(Span::raw(line_text.to_string()));
                    buf.set_line(inner.x, inner.y + i as u16, &line, inner.width);
                }
            }
        }

        if self.palette_open {
            self.render_palette(inner, buf);
        }
    }
}

impl Composer {
    fn render_palette(&self, inner: Rect, buf: &mut Buffer) {
        let palette_height = (self.filtered.len().min(5) + 2) as u16;
        let palette_area = Rect {
            x: inner.x,
            y: inner.y.saturating_sub(palette_height),
            width: inner.width,
            height: palette_height,
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" commands ")
            .style(Style::default().fg(Color::Blue));
        let palette_inner = block.inner(palette_area);
        block.render(palette_area, buf);

        for (index, entry) in self.filtered.iter().enumerate() {
            if index >= palette_inner.height as usize {
                break;
            }

            let style = if index == self.selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };

            let line = Line::from(vec![
                Span::styled(format!("/{}", entry.keyword), style),
                Span::styled("  ", Style::default()),
                Span::styled(entry.description, Style::default().fg(Color::Gray)),
            ]);
            buf.set_line(palette_inner.x, palette_inner.y + index as u16, &line, palette_inner.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(composer: &mut Composer, text: &str) {
        for c in text.chars() {
            composer.handle_key(press(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_enter_submits_trimmed_content() {
        let mut composer = Composer::new();
        type_str(&mut composer, "hello world");
        let result = composer.handle_key(press(KeyCode::Enter));
        assert_eq!(result, ComposerResult::Submitted("hello world".to_string()));
        assert!(composer.content.is_empty());
    }

    #[test]
    fn test_blank_input_does_not_submit() {
        let mut composer = Composer::new();
        type_str(&mut composer, "   ");
        assert_eq!(composer.handle_key(press(KeyCode::Enter)), ComposerResult::None);
    }

    #[test]
    fn test_busy_holds_message_back() {
        let mut composer = Composer::new();
        composer.set_busy(true);
        type_str(&mut composer, "queued thought");
        assert_eq!(composer.handle_key(press(KeyCode::Enter)), ComposerResult::None);
        // the draft survives for when the reply settles
        assert_eq!(composer.content, "queued thought");
    }

    #[test]
    fn test_slash_input_becomes_command() {
        let mut composer = Composer::new();
        composer.set_busy(true);
        type_str(&mut composer, "/bye");
        // palette filtering is active; Enter applies the selection first
        composer.handle_key(press(KeyCode::Enter));
        let result = composer.handle_key(press(KeyCode::Enter));
        assert_eq!(result, ComposerResult::Command(SlashCommand::Bye));
    }
}
