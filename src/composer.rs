//! Request composer: turns the user's challenge context into the system/user
//! instruction pair sent to the completion service.

use tracing::warn;

use crate::config::BuddyConfig;
use crate::domain::{ChallengeContext, GenerationRequest};
use crate::util::fill_template;

#[derive(Clone, Debug)]
pub struct Composer {
  system_instruction: String,
  prompt_template: String,
}

impl Composer {
  /// `prompt_template` is expected to carry `{topic}` and `{description}`;
  /// `BuddyConfig` validates that before a composer is built from it.
  pub fn new(system_instruction: impl Into<String>, prompt_template: impl Into<String>) -> Self {
    Self { system_instruction: system_instruction.into(), prompt_template: prompt_template.into() }
  }

  pub fn from_config(cfg: &BuddyConfig) -> Self {
    Self::new(cfg.system_instruction.clone(), cfg.prompt_template.clone())
  }

  /// Pure function of the context. An empty description passes through as-is.
  pub fn compose(&self, ctx: &ChallengeContext) -> GenerationRequest {
    if ctx.topic.trim().is_empty() {
      warn!(target: "generation", "Composing with an empty topic");
    }
    let user_instruction = fill_template(
      &self.prompt_template,
      &[("topic", ctx.topic.as_str()), ("description", ctx.description.as_str())],
    );
    GenerationRequest {
      system_instruction: self.system_instruction.clone(),
      user_instruction,
    }
  }
}
