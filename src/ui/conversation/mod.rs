//! Conversation UI components for the chat interface

pub mod commands;
pub mod composer;
pub mod history;
pub mod manager;

pub use commands::{get_help_text, SlashCommand};
pub use composer::Composer;
pub use history::HistoryView;
pub use manager::{ChatAction, ChatManager};
