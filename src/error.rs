//! Error types: the single generation failure, config loading failures and
//! API-level rejections.

use std::path::PathBuf;

use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::domain::GENERIC_FAILURE;
use crate::protocol::ErrorOut;

/// Any rejection from the completion service (network, auth, rate limit,
/// malformed response). Subtypes collapse into one message.
#[derive(Clone, Debug, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", failure_text(.detail))]
pub struct RequestFailure {
  detail: Option<String>,
}

fn failure_text(detail: &Option<String>) -> &str {
  detail.as_deref().unwrap_or(GENERIC_FAILURE)
}

impl RequestFailure {
  pub fn new(detail: impl Into<String>) -> Self {
    let detail = detail.into();
    if detail.trim().is_empty() { Self { detail: None } } else { Self { detail: Some(detail) } }
  }

  /// Failure without any description; surfaces as the generic message.
  pub fn unspecified() -> Self {
    Self { detail: None }
  }

  pub fn message(&self) -> &str {
    failure_text(&self.detail)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Failed to read config file {path}: {detail}")]
  Read { path: PathBuf, detail: String },

  #[error("Failed to parse config file {path}: {detail}")]
  Parse { path: PathBuf, detail: String },

  #[error("Prompt template is missing the {{{placeholder}}} placeholder")]
  TemplateMissingPlaceholder { placeholder: &'static str },

  #[error("Failed to parse environment variable '{var}': {detail}")]
  EnvParse { var: String, detail: String },
}

/// Rejections surfaced by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  #[error("Unknown session: {id}")]
  UnknownSession { id: String },

  #[error("Topic '{topic}' is not one of the configured topics")]
  TopicNotAllowed { topic: String },

  #[error("No suggestion at index {index} ({available} configured)")]
  UnknownSuggestion { index: usize, available: usize },
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::UnknownSession { .. } => StatusCode::NOT_FOUND,
      ApiError::TopicNotAllowed { .. } | ApiError::UnknownSuggestion { .. } => StatusCode::BAD_REQUEST,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> axum::response::Response {
    (self.status(), Json(ErrorOut { message: self.to_string() })).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn failure_without_detail_uses_generic_message() {
    assert_eq!(RequestFailure::unspecified().message(), "An error occurred");
    assert_eq!(RequestFailure::new("   ").to_string(), "An error occurred");
  }

  #[test]
  fn failure_keeps_provider_detail() {
    let f = RequestFailure::new("Rate limit reached");
    assert_eq!(f.message(), "Rate limit reached");
    assert_eq!(f.to_string(), "Rate limit reached");
  }

  #[test]
  fn template_error_names_placeholder() {
    let e = ConfigError::TemplateMissingPlaceholder { placeholder: "topic" };
    assert_eq!(e.to_string(), "Prompt template is missing the {topic} placeholder");
  }

  #[test]
  fn api_errors_map_to_status() {
    assert_eq!(ApiError::UnknownSession { id: "x".into() }.status(), StatusCode::NOT_FOUND);
    assert_eq!(ApiError::TopicNotAllowed { topic: "x".into() }.status(), StatusCode::BAD_REQUEST);
    let e = ApiError::UnknownSuggestion { index: 7, available: 5 };
    assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    assert_eq!(e.to_string(), "No suggestion at index 7 (5 configured)");
  }
}
