//! Streaming response aggregator
//!
//! Bridges the conversation store to the completion client and owns the
//! request lifecycle for exactly one in-flight exchange. Deltas arrive on the
//! client's event channel and are republished into the store by [`pump`],
//! which the UI drives from its event loop; `send` is the only suspension
//! point and it returns as soon as the request is dispatched.
//!
//! [`pump`]: ResponseAggregator::pump

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::debug;

use crate::config::Config;
use crate::conversation::{Conversation, Speaker, TurnId};
use crate::error::{ChatError, Result};
use crate::llm::{ChatMessage, LlmClient, LlmEvent, LlmRequest};

/// Options for [`ResponseAggregator::send`]
#[derive(Debug, Clone, Copy)]
pub struct SendOptions {
    /// When false (the regenerate path) the trailing user turn already
    /// exists in the conversation and is not appended again.
    pub add_user_message: bool,
}

/// Lifecycle of one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    Idle,
    AwaitingFirstChunk,
    Streaming,
    Completed,
    Failed,
}

struct ActiveExchange {
    placeholder: TurnId,
    rx: mpsc::Receiver<LlmEvent>,
    has_content: bool,
}

/// Drives one request/response exchange at a time against the provider.
pub struct ResponseAggregator {
    client: LlmClient,
    window: usize,
    temperature: f32,
    max_tokens: u32,
    phase: ExchangePhase,
    active: Option<ActiveExchange>,
}

impl ResponseAggregator {
    pub fn new(client: LlmClient, config: &Config) -> Self {
        Self {
            client,
            window: config.history_window,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            phase: ExchangePhase::Idle,
            active: None,
        }
    }

    /// Whether an exchange is currently open. While true, `send` and
    /// `regenerate` are rejected with [`ChatError::Busy`].
    pub fn in_flight(&self) -> bool {
        self.active.is_some()
    }

    pub fn phase(&self) -> ExchangePhase {
        self.phase
    }

    /// Start a new exchange: append the user turn (unless regenerating),
    /// open the assistant placeholder, and dispatch the streaming request.
    ///
    /// The history window is the last `window` settled turns strictly before
    /// the prompt turn, with the prompt text appended as the trailing user
    /// entry; both paths therefore include the prompt being answered exactly
    /// once.
    pub async fn send(
        &mut self,
        conversation: &mut Conversation,
        text: &str,
        options: SendOptions,
    ) -> Result<TurnId> {
        if self.active.is_some() {
            return Err(ChatError::Busy);
        }

        let prompt_id = if options.add_user_message {
            conversation.push_user(text)?
        } else {
            conversation
                .last_turn()
                .filter(|turn| turn.speaker == Speaker::User)
                .map(|turn| turn.id)
                .ok_or(ChatError::UnknownTurn)?
        };

        let mut messages = conversation.window_before(prompt_id, self.window);
        messages.push(ChatMessage::user(text.trim()));

        let placeholder = conversation.begin_assistant()?;

        let request = LlmRequest::new(messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        match self.client.stream_response(request).await {
            Ok(rx) => {
                debug!(?placeholder, "exchange dispatched");
                self.attach(placeholder, rx);
                Ok(placeholder)
            }
            Err(err) => {
                conversation.fail(placeholder, err.user_message())?;
                self.phase = ExchangePhase::Failed;
                Err(err)
            }
        }
    }

    /// Regenerate the answer at `target`: truncate the conversation back to
    /// just before it, then re-send the preserved user prompt.
    pub async fn regenerate(
        &mut self,
        conversation: &mut Conversation,
        target: TurnId,
    ) -> Result<TurnId> {
        if self.active.is_some() {
            return Err(ChatError::Busy);
        }

        let prompt = conversation
            .preceding_user(target)
            .map(|turn| turn.content.clone())
            .ok_or(ChatError::UnknownTurn)?;

        // Keep the prompt turn, drop the answer and everything after it.
        conversation.truncate_from(target)?;

        self.send(
            conversation,
            &prompt,
            SendOptions {
                add_user_message: false,
            },
        )
        .await
    }

    /// Drain whatever the provider has produced so far into the store.
    /// Called from the UI event loop on every tick; cheap when nothing is
    /// pending. Returns the phase after draining.
    pub fn pump(&mut self, conversation: &mut Conversation) -> Result<ExchangePhase> {
        let Some(mut exchange) = self.active.take() else {
            return Ok(self.phase);
        };

        let mut still_open = true;
        loop {
            match exchange.rx.try_recv() {
                Ok(LlmEvent::TextDelta(delta)) => {
                    conversation.append_chunk(exchange.placeholder, &delta)?;
                    if !delta.is_empty() {
                        exchange.has_content = true;
                    }
                    self.phase = ExchangePhase::Streaming;
                }
                Ok(LlmEvent::StreamComplete) => {
                    self.finish(conversation, &exchange)?;
                    still_open = false;
                    break;
                }
                Ok(LlmEvent::Error(err)) => {
                    debug!(?err, "exchange failed");
                    conversation.fail(exchange.placeholder, err.user_message())?;
                    self.phase = ExchangePhase::Failed;
                    still_open = false;
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // sender dropped without a terminal event
                    self.finish(conversation, &exchange)?;
                    still_open = false;
                    break;
                }
            }
        }

        if still_open {
            self.active = Some(exchange);
        }
        Ok(self.phase)
    }

    /// Close out an exchange whose stream ended: a reply with content is
    /// final, an empty one becomes the connectivity apology.
    fn finish(&mut self, conversation: &mut Conversation, exchange: &ActiveExchange) -> Result<()> {
        if exchange.has_content {
            conversation.complete(exchange.placeholder)?;
            self.phase = ExchangePhase::Completed;
        } else {
            conversation.fail(exchange.placeholder, ChatError::StreamClosed.user_message())?;
            self.phase = ExchangePhase::Failed;
        }
        Ok(())
    }

    fn attach(&mut self, placeholder: TurnId, rx: mpsc::Receiver<LlmEvent>) {
        self.active = Some(ActiveExchange {
            placeholder,
            rx,
            has_content: false,
        });
        self.phase = ExchangePhase::AwaitingFirstChunk;
    }
}
