//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Failures become a status code plus `{ "error": "<learner-safe message>" }`.

use std::sync::Arc;
use axum::{
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::logic::{self, ActionError};
use crate::protocol::*;
use crate::session::SessionError;
use crate::state::AppState;

pub struct ApiError(ActionError);

impl From<ActionError> for ApiError {
  fn from(e: ActionError) -> Self { Self(e) }
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match &self.0 {
      ActionError::Generation(_) => StatusCode::SERVICE_UNAVAILABLE,
      ActionError::Session(SessionError::NotSignedIn) => StatusCode::UNAUTHORIZED,
      ActionError::Session(SessionError::StaleExercise | SessionError::AlreadyAnswered) => StatusCode::CONFLICT,
      ActionError::Session(_) => StatusCode::BAD_REQUEST,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    warn!(target: "nahw_backend", %status, error = %self.0, "Request rejected");
    (status, Json(ErrorOut { error: self.0.public_message() })).into_response()
  }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

pub async fn http_get_session(State(state): State<Arc<AppState>>) -> Json<SessionOut> {
  Json(logic::session_view(&*state.session.read().await))
}

#[instrument(level = "info", skip(state, body), fields(name_len = body.name.len()))]
pub async fn http_post_login(State(state): State<Arc<AppState>>, Json(body): Json<LoginIn>) -> ApiResult<SessionOut> {
  Ok(Json(logic::login(&state.session, &body.name).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_logout(State(state): State<Arc<AppState>>) -> Json<SessionOut> {
  Json(logic::logout(&state.session).await)
}

#[instrument(level = "debug", skip(state))]
pub async fn http_post_navigate(State(state): State<Arc<AppState>>, Json(body): Json<NavigateIn>) -> ApiResult<SessionOut> {
  Ok(Json(logic::navigate(&state.session, body.screen).await?))
}

#[instrument(level = "debug", skip(state))]
pub async fn http_post_back(State(state): State<Arc<AppState>>) -> ApiResult<SessionOut> {
  Ok(Json(logic::back(&state.session).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_load_exercise(State(state): State<Arc<AppState>>) -> ApiResult<crate::domain::GeneratedExercise> {
  let ex = logic::load_exercise(&state.session, &state.generator, false).await?;
  Ok(Json(ex))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_next_exercise(State(state): State<Arc<AppState>>) -> ApiResult<crate::domain::GeneratedExercise> {
  let ex = logic::load_exercise(&state.session, &state.generator, true).await?;
  info!(target: "exercise", id = %ex.id, index = ex.index, "HTTP next exercise served");
  Ok(Json(ex))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_answer(State(state): State<Arc<AppState>>, Json(body): Json<AnswerIn>) -> ApiResult<AnswerOut> {
  let out = logic::submit_answer(&state.session, body.answer).await?;
  info!(target: "progress", correct = out.correct, points = out.points, streak = out.streak, "HTTP submit_answer evaluated");
  Ok(Json(out))
}

pub async fn http_post_dismiss_badge(State(state): State<Arc<AppState>>) -> Json<DismissOut> {
  Json(DismissOut { badge: logic::dismiss_badge(&state.session).await })
}

pub async fn http_get_history(State(state): State<Arc<AppState>>) -> Json<HistoryOut> {
  Json(HistoryOut { history: state.session.read().await.history().clone() })
}

pub async fn http_get_achievements(State(state): State<Arc<AppState>>) -> Json<AchievementsOut> {
  Json(AchievementsOut { badges: logic::achievements(&*state.session.read().await) })
}
