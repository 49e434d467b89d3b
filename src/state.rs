//! Application state: prompt config, composer, completion client and the
//! in-memory session store.
//!
//! Everything is injected through `AppState::new`; `main` is the only place that
//! reads the environment.

use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::completion::CompletionClient;
use crate::composer::Composer;
use crate::config::{BuddyConfig, SessionSettings};
use crate::error::ApiError;
use crate::protocol::{ContextIn, OptionsOut};
use crate::session::SessionHandle;

#[derive(Clone)]
pub struct AppState {
    pub config: BuddyConfig,
    pub composer: Composer,
    pub client: Arc<dyn CompletionClient>,
    pub sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
    pub session_idle_ttl: Duration,
}

impl AppState {
    #[instrument(level = "info", skip_all)]
    pub fn new(config: BuddyConfig, client: Arc<dyn CompletionClient>) -> Self {
        info!(target: "prompt_buddy", preset = ?config.preset, topics = config.topics.len(), suggestions = config.suggestions.len(), model = %client.model(), "State initialized");
        Self {
            composer: Composer::from_config(&config),
            config,
            client,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            session_idle_ttl: SessionSettings::default().idle_ttl,
        }
    }

    pub fn with_session_settings(mut self, settings: SessionSettings) -> Self {
        self.session_idle_ttl = settings.idle_ttl;
        self
    }

    pub fn options(&self) -> OptionsOut {
        OptionsOut {
            preset: self.config.preset,
            model: self.client.model().to_string(),
            topics: self.config.topics.clone(),
            suggestions: self.config.suggestions.clone(),
            strict_topics: self.config.strict_topics,
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn create_session(&self) -> (String, SessionHandle) {
        self.evict_idle_sessions().await;
        let id = Uuid::new_v4().to_string();
        let handle = SessionHandle::new();
        self.sessions.write().await.insert(id.clone(), handle.clone());
        info!(target: "prompt_buddy", %id, "Session created");
        (id, handle)
    }

    pub async fn session(&self, id: &str) -> Result<SessionHandle, ApiError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::UnknownSession { id: id.to_string() })
    }

    /// Drop a session. A generation still in flight finishes on its own task
    /// and its result is discarded with the handle.
    #[instrument(level = "debug", skip(self))]
    pub async fn remove_session(&self, id: &str) -> Result<(), ApiError> {
        match self.sessions.write().await.remove(id) {
            Some(_) => {
                info!(target: "prompt_buddy", %id, "Session removed");
                Ok(())
            }
            None => Err(ApiError::UnknownSession { id: id.to_string() }),
        }
    }

    /// Drop sessions idle for longer than the configured TTL. Sessions with a
    /// generation in flight are kept regardless of age.
    pub async fn evict_idle_sessions(&self) -> usize {
        let now = Instant::now();
        let ttl = self.session_idle_ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| !handle.is_expired(now, ttl));
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(target: "prompt_buddy", evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    pub fn check_topic(&self, topic: &str) -> Result<(), ApiError> {
        if self.config.topic_allowed(topic) {
            Ok(())
        } else {
            Err(ApiError::TopicNotAllowed { topic: topic.to_string() })
        }
    }

    pub fn suggestion(&self, index: usize) -> Result<&str, ApiError> {
        self.config
            .suggestions
            .get(index)
            .map(String::as_str)
            .ok_or(ApiError::UnknownSuggestion { index, available: self.config.suggestions.len() })
    }

    /// Validate a partial context update in full before touching the session,
    /// so a rejected request leaves it unchanged.
    pub fn apply_context(&self, session: &SessionHandle, update: ContextIn) -> Result<(), ApiError> {
        if let Some(topic) = &update.topic {
            self.check_topic(topic)?;
        }
        let suggestion = update.suggestion.map(|i| self.suggestion(i)).transpose()?;

        if let Some(topic) = update.topic {
            session.set_topic(topic);
        }
        match (suggestion, update.description) {
            (Some(s), _) => session.select_suggestion(s),
            (None, Some(d)) => session.set_description(d),
            (None, None) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::mock::{GatedClient, MockClient};
    use crate::domain::ChallengeContext;

    fn state(cfg: BuddyConfig) -> AppState {
        AppState::new(cfg, MockClient::ok("ok"))
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let st = state(BuddyConfig::default());
        let (a_id, a) = st.create_session().await;
        let (b_id, _) = st.create_session().await;
        assert_ne!(a_id, b_id);
        a.set_topic("Debugging");
        assert_eq!(st.session(&b_id).await.unwrap().snapshot().context.topic, "");
        assert_eq!(st.session(&a_id).await.unwrap().snapshot().context.topic, "Debugging");
    }

    #[tokio::test]
    async fn remove_unknown_session_fails() {
        let st = state(BuddyConfig::default());
        let (id, _) = st.create_session().await;
        st.remove_session(&id).await.unwrap();
        assert!(matches!(st.remove_session(&id).await, Err(ApiError::UnknownSession { .. })));
        assert!(matches!(st.session(&id).await, Err(ApiError::UnknownSession { .. })));
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_but_busy_ones_kept() {
        tokio::time::pause();
        let st = state(BuddyConfig::default())
            .with_session_settings(SessionSettings { idle_ttl: Duration::from_secs(60) });
        let (idle_id, _) = st.create_session().await;
        let (busy_id, busy) = st.create_session().await;

        let client = GatedClient::new(Ok("done".into()));
        let task = busy.start(&st.composer, client.clone()).unwrap();
        client.wait_entered().await;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(st.evict_idle_sessions().await, 1);
        assert!(matches!(st.session(&idle_id).await, Err(ApiError::UnknownSession { .. })));
        assert!(st.session(&busy_id).await.is_ok());

        client.release();
        task.await.unwrap();
        // Finishing counts as activity, so the session survives another sweep.
        assert_eq!(st.evict_idle_sessions().await, 0);
        assert!(st.session(&busy_id).await.is_ok());
    }

    #[tokio::test]
    async fn create_session_sweeps_expired_ones() {
        tokio::time::pause();
        let st = state(BuddyConfig::default())
            .with_session_settings(SessionSettings { idle_ttl: Duration::from_secs(60) });
        let (old_id, _) = st.create_session().await;
        tokio::time::advance(Duration::from_secs(90)).await;
        let (new_id, _) = st.create_session().await;
        assert!(matches!(st.session(&old_id).await, Err(ApiError::UnknownSession { .. })));
        assert!(st.session(&new_id).await.is_ok());
    }

    #[test]
    fn suggestion_wins_over_description() {
        let st = state(BuddyConfig::default());
        let s = SessionHandle::new();
        st.apply_context(&s, ContextIn {
            topic: Some("Debugging".into()),
            description: Some("typed".into()),
            suggestion: Some(1),
        }).unwrap();
        assert_eq!(s.snapshot().context, ChallengeContext::new("Debugging", "resolving merge conflicts in Git"));
    }

    #[test]
    fn rejected_update_changes_nothing() {
        let mut cfg = BuddyConfig::default();
        cfg.strict_topics = true;
        let st = state(cfg);
        let s = SessionHandle::with_context(ChallengeContext::new("Debugging", "before"));

        let err = st.apply_context(&s, ContextIn { topic: Some("Cooking".into()), description: Some("after".into()), suggestion: None });
        assert!(matches!(err, Err(ApiError::TopicNotAllowed { .. })));
        let err = st.apply_context(&s, ContextIn { topic: None, description: Some("after".into()), suggestion: Some(99) });
        assert!(matches!(err, Err(ApiError::UnknownSuggestion { index: 99, available: 5 })));

        assert_eq!(s.snapshot().context, ChallengeContext::new("Debugging", "before"));
    }

    #[test]
    fn options_reflect_config_and_model() {
        let st = state(BuddyConfig::default());
        let o = st.options();
        assert_eq!(o.model, "mock-model");
        assert_eq!(o.topics.len(), 5);
        assert_eq!(o.suggestions.len(), 5);
    }
}
