//! Wires the conversation store, the aggregator, and the input components
//! together and routes key input between them.

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Paragraph, Wrap},
    Frame,
};

use crate::config::Config;
use crate::conversation::{Conversation, Speaker};
use crate::error::ChatError;
use crate::exchange::{ResponseAggregator, SendOptions};
use crate::llm::LlmClient;
use crate::ui::conversation::composer::{Composer, ComposerResult};
use crate::ui::conversation::{get_help_text, HistoryView, SlashCommand};

const GREETING: &str =
    "Hello! I'm Confab, a terminal assistant backed by OpenRouter-hosted language models. \
     How can I help you today?";

/// Actions the chat manager asks the event loop to take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    None,
    Exit,
}

/// Top-level chat view state
pub struct ChatManager {
    conversation: Conversation,
    composer: Composer,
    aggregator: ResponseAggregator,
    notice: Option<String>,
}

impl ChatManager {
    pub fn new(config: &Config) -> Self {
        let client = LlmClient::new(config.clone());
        let aggregator = ResponseAggregator::new(client, config);
        let mut conversation = Conversation::new();
        conversation.push_assistant(GREETING);

        Self {
            conversation,
            composer: Composer::new(),
            aggregator,
            notice: None,
        }
    }

    /// Handle key input
    pub async fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> ChatAction {
        match self.composer.handle_key(key) {
            ComposerResult::Submitted(text) => {
                self.notice = None;
                self.submit(&text).await;
                ChatAction::None
            }
            ComposerResult::Command(command) => self.handle_command(command).await,
            ComposerResult::None => ChatAction::None,
        }
    }

    /// Drain pending stream output into the store. Called on every tick.
    pub fn on_tick(&mut self) {
        if let Err(err) = self.aggregator.pump(&mut self.conversation) {
            self.notice = Some(err.to_string());
        }
        self.composer.set_busy(self.aggregator.in_flight());
    }

    pub fn render(&self, frame: &mut Frame) {
        let notice_height = self
            .notice
            .as_deref()
            .map(|text| (text.lines().count() as u16).clamp(1, 6) + 2)
            .unwrap_or(0);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(10),
                Constraint::Length(notice_height),
                Constraint::Length(3),
            ])
            .split(frame.size());

        frame.render_widget(HistoryView::new(&self.conversation), chunks[0]);

        if let Some(text) = self.notice.as_deref() {
            let paragraph = Paragraph::new(text)
                .style(Style::default().fg(Color::Yellow))
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, chunks[1]);
        }

        frame.render_widget(&self.composer, chunks[2]);
    }

    async fn submit(&mut self, text: &str) {
        let options = SendOptions {
            add_user_message: true,
        };
        match self.aggregator.send(&mut self.conversation, text, options).await {
            Ok(_) => {}
            Err(ChatError::EmptyMessage) => {}
            Err(err) => self.notice = Some(err.user_message().to_string()),
        }
    }

    async fn handle_command(&mut self, command: SlashCommand) -> ChatAction {
        if self.aggregator.in_flight() && !command.available_during_streaming() {
            self.notice = Some("Wait for the current reply to finish.".to_string());
            return ChatAction::None;
        }

        match command {
            SlashCommand::Bye => return ChatAction::Exit,
            SlashCommand::Help => self.notice = Some(get_help_text()),
            SlashCommand::Clear => self.reset(),
            SlashCommand::Regen => self.regenerate().await,
        }
        ChatAction::None
    }

    /// Regenerate the most recent settled assistant reply.
    async fn regenerate(&mut self) {
        let target = self
            .conversation
            .turns()
            .iter()
            .rev()
            .find(|turn| turn.speaker == Speaker::Assistant && !turn.in_progress)
            .map(|turn| turn.id);

        let Some(target) = target else {
            self.notice = Some("Nothing to regenerate yet.".to_string());
            return;
        };

        match self.aggregator.regenerate(&mut self.conversation, target).await {
            Ok(_) => self.notice = None,
            // the greeting has no prompt to re-answer
            Err(ChatError::UnknownTurn) => {
                self.notice = Some("Nothing to regenerate yet.".to_string());
            }
            Err(err) => self.notice = Some(err.user_message().to_string()),
        }
    }

    fn reset(&mut self) {
        self.conversation = Conversation::new();
        self.conversation.push_assistant(GREETING);
        self.notice = None;
    }
}
