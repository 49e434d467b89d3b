//! Result presenter: flattens a session into what a client renders.
//!
//! The markdown is handed over exactly as the model produced it; rendering and
//! sanitizing are the client's job.

use serde::Serialize;

use crate::domain::{ChallengeContext, GenerationResult};
use crate::session::Session;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultState {
  Idle,
  Pending,
  Success,
  Failure,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultView {
  pub state: ResultState,
  /// Present only on success.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub markdown: Option<String>,
  /// Present only on failure.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

pub fn present(result: &GenerationResult) -> ResultView {
  match result {
    GenerationResult::Idle => ResultView { state: ResultState::Idle, markdown: None, error: None },
    GenerationResult::Pending => ResultView { state: ResultState::Pending, markdown: None, error: None },
    GenerationResult::Success { text } => ResultView { state: ResultState::Success, markdown: Some(text.clone()), error: None },
    GenerationResult::Failure { message } => ResultView { state: ResultState::Failure, markdown: None, error: Some(message.clone()) },
  }
}

/// Full session snapshot as sent to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionView {
  pub context: ChallengeContext,
  pub busy: bool,
  pub result: ResultView,
}

pub fn present_session(s: &Session) -> SessionView {
  SessionView { context: s.context.clone(), busy: s.busy, result: present(&s.result) }
}

/// Session view carrying the outcome of one particular generation, even if the
/// session has moved on (reset, or a newer generation) since it finished.
pub fn present_outcome(s: &Session, outcome: &GenerationResult) -> SessionView {
  SessionView { result: present(outcome), ..present_session(s) }
}
