//! Conversation store: the ordered turn sequence and its invariants
//!
//! The store owns every message exchanged in the session and the identity of
//! the one turn that may be streaming at any moment. All mutation goes
//! through the methods here so the single-in-progress invariant holds no
//! matter what the UI or the aggregator does.

use chrono::{DateTime, Utc};

use crate::error::{ChatError, Result};
use crate::llm::ChatMessage;

/// Opaque turn identifier, allocated monotonically at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(u64);

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    /// Wire role string for the completion API
    pub fn role(self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Assistant => "assistant",
        }
    }
}

/// One message in the conversation.
///
/// `content` grows only while `in_progress` is set; `in_progress` flips once,
/// true to false. Everything else is fixed at creation.
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: TurnId,
    pub speaker: Speaker,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub in_progress: bool,
}

/// Ordered sequence of turns; insertion order is display and causal order.
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
    next_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The turn currently streaming, if any. At most one exists.
    pub fn open_turn(&self) -> Option<&Turn> {
        self.turns.iter().find(|turn| turn.in_progress)
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Append a user turn. The text is stored trimmed; input that trims to
    /// nothing is rejected.
    pub fn push_user(&mut self, text: &str) -> Result<TurnId> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        Ok(self.push(Speaker::User, trimmed.to_string(), false))
    }

    /// Append a completed assistant turn, used to seed the greeting.
    pub fn push_assistant(&mut self, text: &str) -> TurnId {
        self.push(Speaker::Assistant, text.to_string(), false)
    }

    /// Open the streaming placeholder turn for the next assistant reply.
    pub fn begin_assistant(&mut self) -> Result<TurnId> {
        if self.open_turn().is_some() {
            return Err(ChatError::TurnAlreadyOpen);
        }
        Ok(self.push(Speaker::Assistant, String::new(), true))
    }

    /// Concatenate a streamed delta onto the open turn. Rejected unless `id`
    /// names the turn that is currently streaming.
    pub fn append_chunk(&mut self, id: TurnId, chunk: &str) -> Result<()> {
        let turn = self.turn_mut(id)?;
        if !turn.in_progress {
            return Err(ChatError::NotStreaming);
        }
        turn.content.push_str(chunk);
        Ok(())
    }

    /// Mark the turn final. Idempotent.
    pub fn complete(&mut self, id: TurnId) -> Result<()> {
        let turn = self.turn_mut(id)?;
        turn.in_progress = false;
        Ok(())
    }

    /// Replace the turn's content wholesale with `message` and mark it final.
    /// Partial chunks already appended are discarded, not shown.
    pub fn fail(&mut self, id: TurnId, message: &str) -> Result<()> {
        let turn = self.turn_mut(id)?;
        turn.content = message.to_string();
        turn.in_progress = false;
        Ok(())
    }

    /// Remove `id` and every turn after it.
    pub fn truncate_from(&mut self, id: TurnId) -> Result<()> {
        let index = self.index_of(id).ok_or(ChatError::UnknownTurn)?;
        self.turns.truncate(index);
        Ok(())
    }

    /// History window: the last `limit` non-in-progress turns strictly before
    /// `id`, mapped to wire messages. Computed relative to the prompt turn so
    /// a regenerated exchange sees the same window as the original one.
    pub fn window_before(&self, id: TurnId, limit: usize) -> Vec<ChatMessage> {
        let end = self.index_of(id).unwrap_or(self.turns.len());
        let eligible: Vec<&Turn> = self.turns[..end]
            .iter()
            .filter(|turn| !turn.in_progress)
            .collect();
        let start = eligible.len().saturating_sub(limit);
        eligible[start..]
            .iter()
            .map(|turn| ChatMessage {
                role: turn.speaker.role().to_string(),
                content: turn.content.clone(),
            })
            .collect()
    }

    /// The nearest user turn preceding `id`, when `id` names an assistant
    /// turn. This is the prompt a regenerated answer responds to.
    pub fn preceding_user(&self, id: TurnId) -> Option<&Turn> {
        let index = self.index_of(id)?;
        if self.turns[index].speaker != Speaker::Assistant {
            return None;
        }
        self.turns[..index]
            .iter()
            .rev()
            .find(|turn| turn.speaker == Speaker::User)
    }

    fn push(&mut self, speaker: Speaker, content: String, in_progress: bool) -> TurnId {
        let id = TurnId(self.next_id);
        self.next_id += 1;
        self.turns.push(Turn {
            id,
            speaker,
            content,
            created_at: Utc::now(),
            in_progress,
        });
        id
    }

    fn index_of(&self, id: TurnId) -> Option<usize> {
        self.turns.iter().position(|turn| turn.id == id)
    }

    fn turn_mut(&mut self, id: TurnId) -> Result<&mut Turn> {
        self.turns
            .iter_mut()
            .find(|turn| turn.id == id)
            .ok_or(ChatError::UnknownTurn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_user_trims_and_rejects_blank() {
        let mut convo = Conversation::new();
        let id = convo.push_user("  hello  ").unwrap();
        assert_eq!(convo.turns()[0].content, "hello");
        assert_eq!(convo.turns()[0].id, id);
        assert!(matches!(
            convo.push_user("   \n "),
            Err(ChatError::EmptyMessage)
        ));
    }

    #[test]
    fn test_at_most_one_open_turn() {
        let mut convo = Conversation::new();
        convo.push_user("hi").unwrap();
        let open = convo.begin_assistant().unwrap();
        assert!(matches!(
            convo.begin_assistant(),
            Err(ChatError::TurnAlreadyOpen)
        ));
        convo.complete(open).unwrap();
        // closing the first allows a second
        convo.begin_assistant().unwrap();
        assert_eq!(
            convo.turns().iter().filter(|t| t.in_progress).count(),
            1
        );
    }

    #[test]
    fn test_append_chunks_concatenate_in_order() {
        let mut convo = Conversation::new();
        convo.push_user("hi").unwrap();
        let open = convo.begin_assistant().unwrap();
        for chunk in ["Hel", "lo", " wor", "ld"] {
            convo.append_chunk(open, chunk).unwrap();
        }
        convo.complete(open).unwrap();
        let turn = convo.last_turn().unwrap();
        assert_eq!(turn.content, "Hello world");
        assert!(!turn.in_progress);
    }

    #[test]
    fn test_append_chunk_rejects_closed_or_unknown_turn() {
        let mut convo = Conversation::new();
        let user = convo.push_user("hi").unwrap();
        assert!(matches!(
            convo.append_chunk(user, "x"),
            Err(ChatError::NotStreaming)
        ));
        let open = convo.begin_assistant().unwrap();
        convo.complete(open).unwrap();
        assert!(matches!(
            convo.append_chunk(open, "x"),
            Err(ChatError::NotStreaming)
        ));
        convo.truncate_from(open).unwrap();
        assert!(matches!(
            convo.append_chunk(open, "x"),
            Err(ChatError::UnknownTurn)
        ));
    }

    #[test]
    fn test_complete_is_idempotent() {
        let mut convo = Conversation::new();
        convo.push_user("hi").unwrap();
        let open = convo.begin_assistant().unwrap();
        convo.append_chunk(open, "done").unwrap();
        convo.complete(open).unwrap();
        convo.complete(open).unwrap();
        assert_eq!(convo.last_turn().unwrap().content, "done");
    }

    #[test]
    fn test_fail_replaces_partial_content() {
        let mut convo = Conversation::new();
        convo.push_user("hi").unwrap();
        let open = convo.begin_assistant().unwrap();
        convo.append_chunk(open, "partial answer").unwrap();
        convo.fail(open, "something went wrong").unwrap();
        let turn = convo.last_turn().unwrap();
        assert_eq!(turn.content, "something went wrong");
        assert!(!turn.in_progress);
    }

    #[test]
    fn test_truncate_from_removes_suffix() {
        let mut convo = Conversation::new();
        convo.push_user("one").unwrap();
        let answer = convo.push_assistant("first answer");
        convo.push_user("two").unwrap();
        convo.push_assistant("second answer");
        convo.truncate_from(answer).unwrap();
        assert_eq!(convo.turns().len(), 1);
        assert_eq!(convo.turns()[0].content, "one");
    }

    #[test]
    fn test_window_never_exceeds_limit() {
        let mut convo = Conversation::new();
        for i in 0..15 {
            convo.push_user(&format!("question {i}")).unwrap();
            convo.push_assistant(&format!("answer {i}"));
        }
        let prompt = convo.push_user("latest").unwrap();
        let window = convo.window_before(prompt, 10);
        assert_eq!(window.len(), 10);
        // most recent eligible turns win
        assert_eq!(window.last().unwrap().content, "answer 14");
        assert_eq!(window[0].content, "question 10");
    }

    #[test]
    fn test_window_excludes_streaming_turn() {
        let mut convo = Conversation::new();
        convo.push_user("q1").unwrap();
        convo.push_assistant("a1");
        let prompt = convo.push_user("q2").unwrap();
        convo.begin_assistant().unwrap();
        let window = convo.window_before(prompt, 10);
        let roles: Vec<&str> = window.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["user", "assistant"]);
    }

    #[test]
    fn test_regenerate_window_matches_original() {
        let mut convo = Conversation::new();
        for i in 0..6 {
            convo.push_user(&format!("q{i}")).unwrap();
            convo.push_assistant(&format!("a{i}"));
        }
        let prompt = convo.push_user("final question").unwrap();
        let original = convo.window_before(prompt, 10);

        let answer = convo.begin_assistant().unwrap();
        convo.append_chunk(answer, "bad answer").unwrap();
        convo.complete(answer).unwrap();

        // regenerate: drop the answer, keep the prompt, recompute
        convo.truncate_from(answer).unwrap();
        let regenerated = convo.window_before(prompt, 10);
        assert_eq!(original.len(), regenerated.len());
        for (a, b) in original.iter().zip(regenerated.iter()) {
            assert_eq!(a.role, b.role);
            assert_eq!(a.content, b.content);
        }
    }

    #[test]
    fn test_preceding_user_finds_the_prompt() {
        let mut convo = Conversation::new();
        let user = convo.push_user("question").unwrap();
        let answer = convo.push_assistant("answer");
        let prompt = convo.preceding_user(answer).unwrap();
        assert_eq!(prompt.id, user);
        assert_eq!(prompt.content, "question");
        // a user turn is not a regenerate target
        assert!(convo.preceding_user(user).is_none());
    }
}
