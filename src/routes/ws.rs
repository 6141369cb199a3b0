//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug, warn};

use crate::logic::{self, ActionError};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "nahw_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "nahw_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "nahw_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid message: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "nahw_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "nahw_backend", "WebSocket disconnected");
}

fn error_reply(e: ActionError) -> ServerWsMessage {
  warn!(target: "nahw_backend", error = %e, "WS request rejected");
  ServerWsMessage::Error { message: e.public_message().into() }
}

async fn load_reply(state: &AppState, advance: bool) -> ServerWsMessage {
  match logic::load_exercise(&state.session, &state.generator, advance).await {
    Ok(exercise) => ServerWsMessage::Exercise { exercise },
    Err(e) => error_reply(e),
  }
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  let session = &state.session;
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::GetSession => ServerWsMessage::Session { session: logic::session_view(&*session.read().await) },

    ClientWsMessage::Login { name } => match logic::login(session, &name).await {
      Ok(s) => ServerWsMessage::Session { session: s },
      Err(e) => error_reply(e),
    },

    ClientWsMessage::Logout => ServerWsMessage::Session { session: logic::logout(session).await },

    ClientWsMessage::Navigate { screen } => match logic::navigate(session, screen).await {
      Ok(s) => ServerWsMessage::Session { session: s },
      Err(e) => error_reply(e),
    },

    ClientWsMessage::Back => match logic::back(session).await {
      Ok(s) => ServerWsMessage::Session { session: s },
      Err(e) => error_reply(e),
    },

    ClientWsMessage::LoadExercise => load_reply(state, false).await,

    ClientWsMessage::NextExercise => load_reply(state, true).await,

    ClientWsMessage::SubmitAnswer { answer } => match logic::submit_answer(session, answer).await {
      Ok(result) => {
        info!(target: "progress", correct = result.correct, points = result.points, streak = result.streak, "WS submit_answer evaluated");
        ServerWsMessage::AnswerResult { result }
      }
      Err(e) => error_reply(e),
    },

    ClientWsMessage::DismissBadge => ServerWsMessage::Badge { badge: logic::dismiss_badge(session).await },

    ClientWsMessage::History => ServerWsMessage::History { history: session.read().await.history().clone() },

    ClientWsMessage::Achievements => ServerWsMessage::Achievements { badges: logic::achievements(&*session.read().await) },
  }
}
