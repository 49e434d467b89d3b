//! HTTP endpoint handlers. These are thin wrappers that forward to the session
//! state machine. Each handler is instrumented and logs ids and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::domain::ChallengeContext;
use crate::error::ApiError;
use crate::presenter::{present, present_outcome, present_session};
use crate::protocol::*;
use crate::session::{SessionHandle, Submission};
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_options(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.options())
}

#[instrument(level = "info", skip(state))]
pub async fn http_create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let (id, handle) = state.create_session().await;
  (StatusCode::CREATED, Json(SessionOut { id, session: present_session(&handle.snapshot()) }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SessionOut>, ApiError> {
  let handle = state.session(&id).await?;
  Ok(Json(SessionOut { id, session: present_session(&handle.snapshot()) }))
}

#[instrument(level = "info", skip(state, body), fields(has_topic = body.topic.is_some(), suggestion = ?body.suggestion))]
pub async fn http_put_context(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<ContextIn>,
) -> Result<Json<SessionOut>, ApiError> {
  let handle = state.session(&id).await?;
  state.apply_context(&handle, body)?;
  Ok(Json(SessionOut { id, session: present_session(&handle.snapshot()) }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<GenerateOut>, ApiError> {
  let handle = state.session(&id).await?;
  let submission = handle.submit(&state.composer, state.client.clone()).await;
  let out = generate_out(&handle, submission);
  info!(target: "generation", %id, accepted = out.accepted, busy = out.session.busy, "HTTP generate handled");
  Ok(Json(out))
}

/// A completed submission reports its own result; a blocked one reports the
/// session as it stands.
fn generate_out(handle: &SessionHandle, submission: Submission) -> GenerateOut {
  let snap = handle.snapshot();
  match submission {
    Submission::Completed(result) => GenerateOut { accepted: true, session: present_outcome(&snap, &result) },
    Submission::Blocked => GenerateOut { accepted: false, session: present_session(&snap) },
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_reset(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<ResetOut>, ApiError> {
  let handle = state.session(&id).await?;
  let reset = handle.reset();
  Ok(Json(ResetOut { reset, session: present_session(&handle.snapshot()) }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  state.remove_session(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// Stateless generation: a throwaway session per call.
#[instrument(level = "info", skip(state, body), fields(topic = %body.topic, description_len = body.description.len()))]
pub async fn http_post_one_shot(
  State(state): State<Arc<AppState>>,
  Json(body): Json<OneShotIn>,
) -> Result<Json<OneShotOut>, ApiError> {
  state.check_topic(&body.topic)?;
  let handle = SessionHandle::with_context(ChallengeContext::new(body.topic, body.description));
  let result = match handle.submit(&state.composer, state.client.clone()).await {
    Submission::Completed(r) => r,
    Submission::Blocked => handle.snapshot().result,
  };
  Ok(Json(OneShotOut { result: present(&result) }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::GenerationResult;
  use crate::presenter::ResultState;

  #[test]
  fn completed_generate_reports_its_own_result() {
    // Session already reset by the time the response is built.
    let handle = SessionHandle::with_context(ChallengeContext::new("Debugging", "stale"));
    handle.reset();
    let out = generate_out(&handle, Submission::Completed(GenerationResult::Success { text: "## Prompt 1".into() }));
    assert!(out.accepted);
    assert_eq!(out.session.result.state, ResultState::Success);
    assert_eq!(out.session.result.markdown.as_deref(), Some("## Prompt 1"));
    assert_eq!(out.session.context, ChallengeContext::default());
  }

  #[test]
  fn blocked_generate_reports_current_session() {
    let handle = SessionHandle::new();
    let out = generate_out(&handle, Submission::Blocked);
    assert!(!out.accepted);
    assert_eq!(out.session.result.state, ResultState::Idle);
  }
}
