//! Domain models: the user's challenge context, the composed request and the
//! outcome of a generation attempt.

use serde::Serialize;

/// Fallback shown when a failed generation carries no description.
pub const GENERIC_FAILURE: &str = "An error occurred";

/// What the user is asking about: a topic label plus a free-text description.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChallengeContext {
  pub topic: String,
  pub description: String,
}

impl ChallengeContext {
  pub fn new(topic: impl Into<String>, description: impl Into<String>) -> Self {
    Self { topic: topic.into(), description: description.into() }
  }
}

/// Fully composed single-turn request handed to the completion client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
  pub system_instruction: String,
  pub user_instruction: String,
}

/// Outcome of the latest submission. Replaced wholesale on every submit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum GenerationResult {
  #[default]
  Idle,
  Pending,
  Success { text: String },
  Failure { message: String },
}
