//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::config::Preset;
use crate::presenter::{ResultView, SessionView};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetOptions,
    SetTopic {
        topic: String,
    },
    SetDescription {
        description: String,
    },
    SelectSuggestion {
        index: usize,
    },
    Generate,
    Reset,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Options {
        options: OptionsOut,
    },
    /// Current session snapshot; sent after every change, including when a
    /// background generation finishes.
    State {
        session: SessionView,
    },
    /// A generate/reset request arrived while busy and was ignored.
    Blocked {
        session: SessionView,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct OptionsOut {
    pub preset: Preset,
    pub model: String,
    pub topics: Vec<String>,
    pub suggestions: Vec<String>,
    #[serde(rename = "strictTopics")]
    pub strict_topics: bool,
}

/// Partial update of a session's context. A `suggestion` index replaces the
/// description and wins over an explicit `description`.
#[derive(Debug, Default, Deserialize)]
pub struct ContextIn {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub suggestion: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SessionOut {
    pub id: String,
    #[serde(flatten)]
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct GenerateOut {
    /// False when the session was busy and the submit was ignored.
    pub accepted: bool,
    #[serde(flatten)]
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct ResetOut {
    pub reset: bool,
    #[serde(flatten)]
    pub session: SessionView,
}

#[derive(Debug, Deserialize)]
pub struct OneShotIn {
    pub topic: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct OneShotOut {
    #[serde(flatten)]
    pub result: ResultView,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse() {
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"set_topic","topic":"Debugging"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SetTopic { ref topic } if topic == "Debugging"));
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"select_suggestion","index":2}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SelectSuggestion { index: 2 }));
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"generate"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::Generate));
        assert!(serde_json::from_str::<ClientWsMessage>(r#"{"type":"launch"}"#).is_err());
    }

    #[test]
    fn server_messages_are_tagged() {
        let v = serde_json::to_value(ServerWsMessage::Error { message: "x".into() }).unwrap();
        assert_eq!(v, serde_json::json!({"type": "error", "message": "x"}));
        let v = serde_json::to_value(ServerWsMessage::Pong).unwrap();
        assert_eq!(v, serde_json::json!({"type": "pong"}));
    }
}
