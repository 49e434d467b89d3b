//! Per-user session: the challenge context, the latest generation result and
//! the busy flag.
//!
//! States: `Idle -> Pending -> {Success | Failure}`; any later submit goes back
//! to `Pending`. While busy, a submit is a no-op (`Submission::Blocked`). It is
//! neither queued nor cancels the running request.
//!
//! A started generation runs on its own task, so dropping the caller does not
//! cancel it. `BusyGuard` clears the busy flag even if that task panics.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::completion::CompletionClient;
use crate::composer::Composer;
use crate::domain::{ChallengeContext, GenerationRequest, GenerationResult};
use crate::error::RequestFailure;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
  pub context: ChallengeContext,
  pub result: GenerationResult,
  pub busy: bool,
}

/// What happened to a submit attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Submission {
  Completed(GenerationResult),
  /// Another generation was already in flight; nothing was sent.
  Blocked,
}

/// Shared handle to one session.
// std mutex: never held across an await, and `BusyGuard::drop` must lock synchronously.
#[derive(Clone, Debug)]
pub struct SessionHandle {
  inner: Arc<Mutex<Session>>,
  last_seen: Arc<Mutex<Instant>>,
}

impl Default for SessionHandle {
  fn default() -> Self {
    Self::with_context(ChallengeContext::default())
  }
}

impl SessionHandle {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_context(ctx: ChallengeContext) -> Self {
    Self {
      inner: Arc::new(Mutex::new(Session { context: ctx, ..Session::default() })),
      last_seen: Arc::new(Mutex::new(Instant::now())),
    }
  }

  /// Every access through here counts as activity.
  fn lock(&self) -> MutexGuard<'_, Session> {
    *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// True when the session is not generating and has been untouched for at
  /// least `ttl`. Does not itself count as activity.
  pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
    let busy = self.inner.lock().unwrap_or_else(PoisonError::into_inner).busy;
    let last_seen = *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
    !busy && now.saturating_duration_since(last_seen) >= ttl
  }

  pub fn snapshot(&self) -> Session {
    self.lock().clone()
  }

  pub fn set_topic(&self, topic: impl Into<String>) {
    self.lock().context.topic = topic.into();
  }

  pub fn set_description(&self, description: impl Into<String>) {
    self.lock().context.description = description.into();
  }

  /// Picking a canned suggestion overwrites the description text.
  pub fn select_suggestion(&self, suggestion: impl Into<String>) {
    let suggestion = suggestion.into();
    debug!(target: "generation", len = suggestion.len(), "Suggestion selected");
    self.lock().context.description = suggestion;
  }

  /// Clear context and result. Returns false (and changes nothing) while busy.
  pub fn reset(&self) -> bool {
    let mut s = self.lock();
    if s.busy {
      return false;
    }
    *s = Session::default();
    true
  }

  /// Enter `Pending` and compose the request, unless already busy.
  fn begin(&self, composer: &Composer) -> Option<GenerationRequest> {
    let mut s = self.lock();
    if s.busy {
      return None;
    }
    s.busy = true;
    s.result = GenerationResult::Pending;
    Some(composer.compose(&s.context))
  }

  fn finish(&self, result: GenerationResult) {
    let mut s = self.lock();
    s.result = result;
    s.busy = false;
  }

  /// Start a generation on a background task and return its handle, or `None`
  /// when one is already running. The session is `Pending` when this returns.
  #[instrument(level = "info", skip_all)]
  pub fn start(&self, composer: &Composer, client: Arc<dyn CompletionClient>) -> Option<JoinHandle<GenerationResult>> {
    let Some(req) = self.begin(composer) else {
      warn!(target: "generation", "Submit ignored: generation already in flight");
      return None;
    };
    let guard = BusyGuard { session: self.clone(), armed: true };
    info!(target: "generation", model = %client.model(), user_len = req.user_instruction.len(), "Generation started");
    Some(tokio::spawn(async move {
      let outcome = client.generate(&req).await;
      guard.complete(outcome)
    }))
  }

  /// Submit and wait for the outcome.
  pub async fn submit(&self, composer: &Composer, client: Arc<dyn CompletionClient>) -> Submission {
    let Some(task) = self.start(composer, client) else {
      return Submission::Blocked;
    };
    match task.await {
      Ok(result) => Submission::Completed(result),
      Err(e) => {
        error!(target: "generation", error = %e, "Generation task aborted");
        Submission::Completed(self.snapshot().result)
      }
    }
  }
}

/// Leaves the session in a terminal state however the generation task ends.
struct BusyGuard {
  session: SessionHandle,
  armed: bool,
}

impl BusyGuard {
  fn complete(mut self, outcome: Result<String, RequestFailure>) -> GenerationResult {
    let result = match outcome {
      Ok(text) => {
        info!(target: "generation", text_len = text.len(), "Generation succeeded");
        GenerationResult::Success { text }
      }
      Err(f) => {
        warn!(target: "generation", error = %f, "Generation failed");
        GenerationResult::Failure { message: f.message().to_string() }
      }
    };
    self.session.finish(result.clone());
    self.armed = false;
    result
  }
}

impl Drop for BusyGuard {
  fn drop(&mut self) {
    if self.armed {
      error!(target: "generation", "Generation ended without an outcome");
      let message = RequestFailure::unspecified().message().to_string();
      self.session.finish(GenerationResult::Failure { message });
    }
  }
}
