//! Configuration: prompt settings from TOML and completion settings from the
//! process environment.
//!
//! Both are read once at startup and passed down explicitly; nothing below
//! `main` looks at the environment again.
//!
//! TOML schema (every key optional):
//! ```toml
//! preset = "guiding"            # or "meta"
//! topics = ["System Design", "Debugging"]
//! suggestions = ["resolving merge conflicts in Git"]
//! system_instruction = "..."    # overrides the preset
//! prompt_template = "... {topic} ... {description} ..."
//! strict_topics = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama3-groq-70b-8192-tool-use-preview";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

const GUIDING_SYSTEM: &str = "You are an AI assistant designed to help software engineers formulate effective user prompts based on their specific challenges across all areas of software engineering. When given a high-level context and challenge, generate a list of prompts that encourage critical thinking and guide the engineer toward finding their own solutions. Ensure your prompts cover relevant topics such as system design, programming, debugging, team collaboration, performance optimization, security, and project management. Focus on clarity, relevance, and promoting a deeper understanding of the issue without providing direct answers.";

const GUIDING_TEMPLATE: &str = "The context of the challenge is {topic}.\nThe specific challenge is: {description}.\nGenerate 2 prompts in markdown format, with the expected outcomes.";

const META_SYSTEM: &str = "You are a helpful assistant with meta-prompting capabilities";

const META_TEMPLATE: &str = "You are an expert prompt engineer.\nI would like you to generate 2 prompts for a software engineer facing a challenge in {topic}.\nThe specific challenge is about {description}.\nPlease provide the prompts in a markdown format, make sure the prompts are specific to the challenge, and state the expected outcome of each.";

const DEFAULT_TOPICS: [&str; 5] = [
  "System Design",
  "Debugging",
  "Database Optimization",
  "Team Collaboration",
  "Conflict Resolution",
];

const DEFAULT_SUGGESTIONS: [&str; 5] = [
  "transitioning from monolithic to microservices architecture",
  "resolving merge conflicts in Git",
  "optimize database query performance in PostgreSQL for handling large datasets",
  "steps can we take to ensure smooth handoffs between development and QA teams",
  "team members have different priorities or competing demands for limited resources",
];

/// Built-in persona + template pairs.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
  /// Coaching persona: prompts that guide without revealing answers.
  #[default]
  Guiding,
  /// Terse meta-prompting persona.
  Meta,
}

impl Preset {
  pub fn system_instruction(self) -> &'static str {
    match self {
      Preset::Guiding => GUIDING_SYSTEM,
      Preset::Meta => META_SYSTEM,
    }
  }

  pub fn prompt_template(self) -> &'static str {
    match self {
      Preset::Guiding => GUIDING_TEMPLATE,
      Preset::Meta => META_TEMPLATE,
    }
  }
}

/// Raw TOML shape. Resolved into `BuddyConfig`.
#[derive(Clone, Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BuddyConfigFile {
  #[serde(default)] pub preset: Preset,
  #[serde(default)] pub topics: Option<Vec<String>>,
  #[serde(default)] pub suggestions: Option<Vec<String>>,
  #[serde(default)] pub system_instruction: Option<String>,
  #[serde(default)] pub prompt_template: Option<String>,
  #[serde(default)] pub strict_topics: bool,
}

/// Prompt-side configuration: topic list, description suggestions and the
/// instruction pair fed to the composer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuddyConfig {
  pub preset: Preset,
  pub topics: Vec<String>,
  pub suggestions: Vec<String>,
  pub system_instruction: String,
  pub prompt_template: String,
  pub strict_topics: bool,
}

impl Default for BuddyConfig {
  fn default() -> Self {
    Self::from_preset(Preset::default())
  }
}

impl BuddyConfig {
  pub fn from_preset(preset: Preset) -> Self {
    Self {
      preset,
      topics: DEFAULT_TOPICS.iter().map(|s| s.to_string()).collect(),
      suggestions: DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
      system_instruction: preset.system_instruction().to_string(),
      prompt_template: preset.prompt_template().to_string(),
      strict_topics: false,
    }
  }

  /// Resolve a parsed file against its preset and validate the template.
  pub fn resolve(raw: BuddyConfigFile) -> Result<Self, ConfigError> {
    let mut cfg = Self::from_preset(raw.preset);
    if let Some(topics) = raw.topics.filter(|t| !t.is_empty()) {
      cfg.topics = topics;
    }
    if let Some(suggestions) = raw.suggestions {
      cfg.suggestions = suggestions;
    }
    if let Some(system) = raw.system_instruction {
      cfg.system_instruction = system;
    }
    if let Some(tpl) = raw.prompt_template {
      cfg.prompt_template = tpl;
    }
    cfg.strict_topics = raw.strict_topics;

    for placeholder in ["topic", "description"] {
      if !cfg.prompt_template.contains(&format!("{{{}}}", placeholder)) {
        return Err(ConfigError::TemplateMissingPlaceholder { placeholder });
      }
    }
    Ok(cfg)
  }

  pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
    let raw = toml::from_str::<BuddyConfigFile>(text)
      .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), detail: e.to_string() })?;
    Self::resolve(raw)
  }

  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path)
      .map_err(|e| ConfigError::Read { path: path.to_path_buf(), detail: e.to_string() })?;
    Self::parse(&text, path)
  }

  /// Freeform topics are accepted unless `strict_topics` is set.
  pub fn topic_allowed(&self, topic: &str) -> bool {
    !self.strict_topics || topic.is_empty() || self.topics.iter().any(|t| t == topic)
  }
}

/// Load `BuddyConfig` from PROMPT_BUDDY_CONFIG_PATH. Any error is logged and the
/// built-in defaults are used instead.
pub fn load_buddy_config_from_env() -> BuddyConfig {
  let Some(path) = std::env::var_os("PROMPT_BUDDY_CONFIG_PATH").map(PathBuf::from) else {
    return BuddyConfig::default();
  };
  match BuddyConfig::load(&path) {
    Ok(cfg) => {
      info!(target: "prompt_buddy", path = %path.display(), preset = ?cfg.preset, topics = cfg.topics.len(), "Loaded prompt config (TOML)");
      cfg
    }
    Err(e) => {
      error!(target: "prompt_buddy", path = %path.display(), error = %e, "Invalid prompt config; using defaults");
      BuddyConfig::default()
    }
  }
}

/// Settings for the completion service.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionSettings {
  /// Absent key disables generation (every submission fails with a clear message).
  pub api_key: Option<String>,
  pub base_url: String,
  pub model: String,
  pub temperature: Option<f32>,
  /// Transport-level timeout handed to the HTTP client.
  pub timeout: Duration,
}

impl Default for CompletionSettings {
  fn default() -> Self {
    Self {
      api_key: None,
      base_url: DEFAULT_BASE_URL.into(),
      model: DEFAULT_MODEL.into(),
      temperature: None,
      timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    }
  }
}

impl CompletionSettings {
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  /// Build from an arbitrary key lookup. Empty values count as unset.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
    let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let mut s = Self::default();

    s.api_key = get("GROQ_API_KEY");
    if let Some(url) = get("LLM_BASE_URL") {
      s.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(model) = get("LLM_MODEL") {
      s.model = model;
    }
    if let Some(raw) = get("LLM_TEMPERATURE") {
      let t = raw.parse::<f32>()
        .map_err(|e| ConfigError::EnvParse { var: "LLM_TEMPERATURE".into(), detail: e.to_string() })?;
      s.temperature = Some(t);
    }
    if let Some(raw) = get("LLM_TIMEOUT_SECS") {
      s.timeout = parse_positive_secs("LLM_TIMEOUT_SECS", &raw)?;
    }
    Ok(s)
  }
}

/// Lifetime of server-side sessions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
  /// Sessions untouched for this long (and not generating) are dropped.
  pub idle_ttl: Duration,
}

impl Default for SessionSettings {
  fn default() -> Self {
    Self { idle_ttl: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS) }
  }
}

impl SessionSettings {
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
    let mut s = Self::default();
    if let Some(raw) = lookup("SESSION_IDLE_SECS").map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
      s.idle_ttl = parse_positive_secs("SESSION_IDLE_SECS", &raw)?;
    }
    Ok(s)
  }
}

/// Whole seconds, strictly positive.
fn parse_positive_secs(var: &str, raw: &str) -> Result<Duration, ConfigError> {
  let secs = raw.parse::<u64>()
    .map_err(|e| ConfigError::EnvParse { var: var.into(), detail: e.to_string() })?;
  if secs == 0 {
    return Err(ConfigError::EnvParse { var: var.into(), detail: "must be greater than zero".into() });
  }
  Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;
  use std::io::Write;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |k: &str| map.get(k).cloned()
  }

  #[test]
  fn defaults_use_guiding_preset_and_original_lists() {
    let cfg = BuddyConfig::default();
    assert_eq!(cfg.preset, Preset::Guiding);
    assert_eq!(cfg.topics.len(), 5);
    assert!(cfg.topics.contains(&"Database Optimization".to_string()));
    assert_eq!(cfg.suggestions[1], "resolving merge conflicts in Git");
    assert!(cfg.system_instruction.contains("without providing direct answers"));
    assert!(!cfg.strict_topics);
  }

  #[test]
  fn meta_preset_switches_instruction_pair() {
    let cfg = BuddyConfig::parse("preset = \"meta\"", Path::new("x.toml")).unwrap();
    assert_eq!(cfg.system_instruction, "You are a helpful assistant with meta-prompting capabilities");
    assert!(cfg.prompt_template.starts_with("You are an expert prompt engineer."));
  }

  #[test]
  fn explicit_fields_override_preset() {
    let text = r#"
preset = "meta"
topics = ["Security"]
system_instruction = "Be brief."
prompt_template = "T={topic} D={description}"
strict_topics = true
"#;
    let cfg = BuddyConfig::parse(text, Path::new("x.toml")).unwrap();
    assert_eq!(cfg.topics, vec!["Security".to_string()]);
    assert_eq!(cfg.system_instruction, "Be brief.");
    assert_eq!(cfg.prompt_template, "T={topic} D={description}");
    assert!(cfg.strict_topics);
  }

  #[test]
  fn template_without_description_is_rejected() {
    let err = BuddyConfig::parse("prompt_template = \"only {topic}\"", Path::new("x.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::TemplateMissingPlaceholder { placeholder: "description" }));
  }

  #[test]
  fn unknown_preset_is_a_parse_error() {
    let err = BuddyConfig::parse("preset = \"loud\"", Path::new("x.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
  }

  #[test]
  fn load_reads_file_and_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("buddy.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "suggestions = []").unwrap();
    let cfg = BuddyConfig::load(&path).unwrap();
    assert!(cfg.suggestions.is_empty());

    let err = BuddyConfig::load(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
  }

  #[test]
  fn strict_topics_only_accept_listed_topics() {
    let mut cfg = BuddyConfig::default();
    assert!(cfg.topic_allowed("Anything goes"));
    cfg.strict_topics = true;
    assert!(cfg.topic_allowed("Debugging"));
    assert!(!cfg.topic_allowed("Anything goes"));
  }

  #[test]
  fn completion_settings_from_lookup() {
    let s = CompletionSettings::from_lookup(lookup(&[
      ("GROQ_API_KEY", "gsk_test"),
      ("LLM_BASE_URL", "http://localhost:8080/v1/"),
      ("LLM_MODEL", "llama3-8b-8192"),
      ("LLM_TEMPERATURE", "0.4"),
      ("LLM_TIMEOUT_SECS", "5"),
    ])).unwrap();
    assert_eq!(s.api_key.as_deref(), Some("gsk_test"));
    assert_eq!(s.base_url, "http://localhost:8080/v1");
    assert_eq!(s.model, "llama3-8b-8192");
    assert_eq!(s.temperature, Some(0.4));
    assert_eq!(s.timeout, Duration::from_secs(5));
  }

  #[test]
  fn completion_settings_defaults_and_blank_key() {
    let s = CompletionSettings::from_lookup(lookup(&[("GROQ_API_KEY", "  ")])).unwrap();
    assert_eq!(s, CompletionSettings::default());
    assert_eq!(s.base_url, DEFAULT_BASE_URL);
  }

  #[test]
  fn bad_timeout_is_reported() {
    let err = CompletionSettings::from_lookup(lookup(&[("LLM_TIMEOUT_SECS", "soon")])).unwrap_err();
    assert!(matches!(err, ConfigError::EnvParse { ref var, .. } if var == "LLM_TIMEOUT_SECS"));
  }

  #[test]
  fn zero_timeout_is_rejected() {
    let err = CompletionSettings::from_lookup(lookup(&[("LLM_TIMEOUT_SECS", "0")])).unwrap_err();
    assert!(matches!(err, ConfigError::EnvParse { ref var, ref detail } if var == "LLM_TIMEOUT_SECS" && detail.contains("greater than zero")));
  }

  #[test]
  fn session_idle_ttl_from_lookup() {
    assert_eq!(SessionSettings::from_lookup(lookup(&[])).unwrap(), SessionSettings::default());
    let s = SessionSettings::from_lookup(lookup(&[("SESSION_IDLE_SECS", "90")])).unwrap();
    assert_eq!(s.idle_ttl, Duration::from_secs(90));
    let err = SessionSettings::from_lookup(lookup(&[("SESSION_IDLE_SECS", "0")])).unwrap_err();
    assert!(matches!(err, ConfigError::EnvParse { ref var, .. } if var == "SESSION_IDLE_SECS"));
  }
}
