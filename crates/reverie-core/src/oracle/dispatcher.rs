//! Interpretation dispatcher.
//!
//! Runs the intent classifier on the first prompt of a session (failing open
//! when the classifier itself is unavailable), assembles the oracle request
//! from the user profile, session history and prior-session openings, and
//! normalizes every oracle failure into a `ChatError` safe to show users.

use reverie_types::chat::{ChatMessage, preview};
use reverie_types::error::{ChatError, OracleError};
use reverie_types::oracle::{FieldViolation, HistoryEntry, InterpretRequest, UserInfo};
use reverie_types::user::User;
use tracing::{debug, error, warn};

use super::provider::InterpretationOracle;

/// Reply used when the classifier decides the prompt is not a dream.
pub const OFF_TOPIC_REFUSAL: &str = "I can only help with interpreting dreams. \
    Please describe a dream you had, and I will gladly interpret it for you.";

/// Message for a prompt the oracle rejected as too short.
pub const SHORT_PROMPT_MESSAGE: &str = "The dream description must be at least 10 characters long.";

const PROMPT_FIELD: &str = "new_message_text";

pub struct InterpretationDispatcher<O: InterpretationOracle> {
    oracle: O,
    preview_chars: usize,
}

impl<O: InterpretationOracle> InterpretationDispatcher<O> {
    /// `preview_chars` bounds each prior-session opening sent as context.
    pub fn new(oracle: O, preview_chars: usize) -> Self {
        Self {
            oracle,
            preview_chars,
        }
    }

    /// Produce an interpretation of `prompt` for `user`.
    ///
    /// `history` is the session's prior messages; it is empty for a new session,
    /// which is the only case where the classifier runs and where
    /// `prior_openings` is forwarded.
    pub async fn interpret(
        &self,
        user: &User,
        prompt: &str,
        history: &[ChatMessage],
        prior_openings: &[String],
    ) -> Result<String, ChatError> {
        let first_turn = history.is_empty();

        if first_turn && !self.is_in_domain(prompt).await {
            debug!(user_id = %user.id, "prompt classified as off-topic");
            return Ok(OFF_TOPIC_REFUSAL.to_string());
        }

        let previous_dreams = if first_turn {
            prior_openings
                .iter()
                .map(|text| preview(text, self.preview_chars))
                .collect()
        } else {
            Vec::new()
        };

        let request = InterpretRequest {
            user_info: UserInfo {
                name: user.display_name().to_string(),
                birth_date: user.birth_date,
            },
            new_message_text: prompt.to_string(),
            history: history.iter().map(HistoryEntry::from).collect(),
            previous_dreams,
        };

        match self.oracle.interpret(&request).await {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => {
                error!(user_id = %user.id, "oracle returned an empty interpretation");
                Err(ChatError::UpstreamUnavailable)
            }
            Err(OracleError::Validation(violations)) => {
                warn!(user_id = %user.id, ?violations, "oracle rejected the request");
                Err(validation_error(&violations))
            }
            Err(e) => {
                error!(user_id = %user.id, error = %e, "interpretation failed");
                Err(ChatError::UpstreamUnavailable)
            }
        }
    }

    /// Classifier verdict. A failing classifier counts as in-domain.
    async fn is_in_domain(&self, prompt: &str) -> bool {
        match self.oracle.classify(prompt).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "intent classification skipped, failing open");
                true
            }
        }
    }
}

fn validation_error(violations: &[FieldViolation]) -> ChatError {
    let Some(first) = violations.first() else {
        return ChatError::UpstreamUnavailable;
    };
    let is_prompt_field = first
        .field
        .as_deref()
        .is_some_and(|field| field.ends_with(PROMPT_FIELD));
    if is_prompt_field {
        return ChatError::Validation(SHORT_PROMPT_MESSAGE.to_string());
    }
    let detail = first.message.as_deref().unwrap_or("unknown error");
    ChatError::Validation(format!("Invalid request data: {detail}"))
}
