use std::str::FromStr;

use once_cell::sync::Lazy;
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Regenerate the most recent assistant reply
    Regen,
    /// Start the conversation over
    Clear,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

/// Palette entry: a command paired with its keyword and description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

static COMMAND_ENTRIES: Lazy<Vec<CommandEntry>> = Lazy::new(|| {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
});

pub fn command_entries() -> &'static [CommandEntry] {
    &COMMAND_ENTRIES
}

impl SlashCommand {
    /// User-visible description shown in help and the palette.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Regen => "regenerate the most recent reply",
            SlashCommand::Clear => "start the conversation over",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether this command can run while a reply is streaming. Commands
    /// that mutate the conversation cannot.
    pub fn available_during_streaming(self) -> bool {
        match self {
            SlashCommand::Help | SlashCommand::Bye => true,
            SlashCommand::Regen | SlashCommand::Clear => false,
        }
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    if !input.starts_with('/') {
        return None;
    }

    let head = input[1..].split_whitespace().next()?;

    SlashCommand::from_str(head)
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "q" | "quit" | "exit" => Some(SlashCommand::Bye),
            "r" | "retry" | "regenerate" => Some(SlashCommand::Regen),
            "reset" | "new" => Some(SlashCommand::Clear),
            "h" | "?" => Some(SlashCommand::Help),
            _ => None,
        })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n");
    for entry in command_entries() {
        help.push_str(&format!("/{} - {}\n", entry.keyword, entry.description));
    }
    help.push_str("Aliases: /r for /regen, /reset for /clear, /q for /bye");
    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands_and_aliases() {
        assert_eq!(parse_slash_command("/regen"), Some(SlashCommand::Regen));
        assert_eq!(parse_slash_command("/r"), Some(SlashCommand::Regen));
        assert_eq!(parse_slash_command("/q"), Some(SlashCommand::Bye));
        assert_eq!(parse_slash_command("/clear trailing words"), Some(SlashCommand::Clear));
        assert_eq!(parse_slash_command("/unknown"), None);
        assert_eq!(parse_slash_command("regen"), None);
    }
}
