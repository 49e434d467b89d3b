//! WebSocket upgrade + message loop. Each socket owns one private session.
//! Client messages are parsed as JSON and applied to it. Generations run in the
//! background, so the loop keeps answering (and blocking resubmits) meanwhile.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::{sync::mpsc, task::JoinError};
use tracing::{debug, error, info, instrument};

use crate::domain::GenerationResult;
use crate::presenter::{present_outcome, present_session};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::session::SessionHandle;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "prompt_buddy", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "prompt_buddy", "WebSocket connected");
  let session = SessionHandle::new();
  let (done_tx, mut done_rx) = mpsc::unbounded_channel::<ServerWsMessage>();

  loop {
    let reply = tokio::select! {
      incoming = socket.recv() => match incoming {
        Some(Ok(Message::Text(txt))) => match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(msg) => {
            debug!(target: "prompt_buddy", "WS received: {:?}", &msg);
            handle_client_ws(msg, &state, &session, &done_tx)
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        },
        Some(Ok(Message::Ping(payload))) => {
          let _ = socket.send(Message::Pong(payload)).await;
          continue;
        }
        Some(Ok(Message::Close(_))) | None => break,
        Some(Ok(_)) => continue,
        Some(Err(e)) => {
          error!(target: "prompt_buddy", error = %e, "WS receive error");
          break;
        }
      },
      Some(done) = done_rx.recv() => done,
    };

    let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });
    if let Err(e) = socket.send(Message::Text(out)).await {
      error!(target: "prompt_buddy", error = %e, "WS send error");
      break;
    }
  }
  info!(target: "prompt_buddy", busy = session.snapshot().busy, "WebSocket disconnected");
}

/// Apply one client message to the socket's session and build the immediate
/// reply. A started generation reports its outcome later through `done_tx`.
fn handle_client_ws(
  msg: ClientWsMessage,
  state: &AppState,
  session: &SessionHandle,
  done_tx: &mpsc::UnboundedSender<ServerWsMessage>,
) -> ServerWsMessage {
  let current = |s: &SessionHandle| ServerWsMessage::State { session: present_session(&s.snapshot()) };
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::GetOptions => ServerWsMessage::Options { options: state.options() },

    ClientWsMessage::SetTopic { topic } => match state.check_topic(&topic) {
      Ok(()) => {
        session.set_topic(topic);
        current(session)
      }
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::SetDescription { description } => {
      session.set_description(description);
      current(session)
    }

    ClientWsMessage::SelectSuggestion { index } => match state.suggestion(index) {
      Ok(s) => {
        session.select_suggestion(s);
        current(session)
      }
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::Generate => match session.start(&state.composer, state.client.clone()) {
      Some(task) => {
        let session_done = session.clone();
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
          let finished = finished_message(&session_done, task.await);
          // Socket may be gone already; the outcome is simply dropped then.
          let _ = done_tx.send(finished);
        });
        current(session)
      }
      None => ServerWsMessage::Blocked { session: present_session(&session.snapshot()) },
    },

    ClientWsMessage::Reset => {
      if session.reset() {
        current(session)
      } else {
        ServerWsMessage::Blocked { session: present_session(&session.snapshot()) }
      }
    }
  }
}

/// The `state` message sent when a background generation ends, carrying that
/// generation's own result.
fn finished_message(session: &SessionHandle, joined: Result<GenerationResult, JoinError>) -> ServerWsMessage {
  let snap = session.snapshot();
  match joined {
    Ok(result) => ServerWsMessage::State { session: present_outcome(&snap, &result) },
    Err(e) => {
      error!(target: "generation", error = %e, "WS generation task aborted");
      ServerWsMessage::State { session: present_session(&snap) }
    }
  }
}
