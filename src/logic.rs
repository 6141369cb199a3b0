//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Loading the current/next exercise without holding the session lock while generating
//!   - Submitting answers and building the outward views of session state
//!   - Mapping failures to learner-safe messages

use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::badges::CATALOG;
use crate::domain::{Answer, GeneratedExercise, Screen};
use crate::generator::{ContentSource, GenerationError, Generator};
use crate::protocol::{AnswerOut, BadgeOut, SessionOut};
use crate::session::{LoadPlan, Session, SessionError};
use crate::store::KvStore;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
  #[error(transparent)]
  Session(#[from] SessionError),
  #[error(transparent)]
  Generation(#[from] GenerationError),
}

impl ActionError {
  /// Message safe to show the learner. Technical detail only goes to the logs.
  pub fn public_message(&self) -> &'static str {
    match self {
      ActionError::Generation(_) => "Could not load the exercise, please try again.",
      ActionError::Session(e) => match e {
        SessionError::NotSignedIn => "Please sign in first.",
        SessionError::AlreadySignedIn => "You are already signed in.",
        SessionError::EmptyName => "Please enter your name.",
        SessionError::InvalidTransition { .. } | SessionError::NoExerciseScreen(_) => "That page is not available from here.",
        SessionError::NoActiveExercise => "No exercise is loaded yet.",
        SessionError::AlreadyAnswered => "This exercise was already answered.",
        SessionError::StaleExercise => "The exercise changed, please continue with the new one.",
        SessionError::Grade(_) => "That answer does not fit this exercise.",
      },
    }
  }
}

/// Show the exercise for the current screen. With `advance`, move to the next index first.
///
/// The session lock is released while the generation service works; the result is
/// only delivered if the learner is still waiting for it.
#[instrument(level = "info", skip(session, generator))]
pub async fn load_exercise<S: KvStore, C: ContentSource>(
  session: &RwLock<Session<S>>,
  generator: &Generator<C>,
  advance: bool,
) -> Result<GeneratedExercise, ActionError> {
  let plan = {
    let mut s = session.write().await;
    if advance { LoadPlan::Generate(s.request_next()?) } else { s.request_current()? }
  };

  let ticket = match plan {
    LoadPlan::Ready(ex) => return Ok(ex),
    LoadPlan::Generate(t) => t,
  };

  let exercise = generator.generate(ticket.kind, ticket.level).await.map_err(|e| {
    error!(target: "exercise", kind = ticket.kind.as_str(), index = ticket.index, error = %e, "Could not generate exercise");
    e
  })?;

  let delivered = session.write().await.complete(ticket, exercise).map_err(|e| {
    warn!(target: "exercise", kind = ticket.kind.as_str(), index = ticket.index, "Discarding stale exercise");
    e
  })?;
  info!(target: "exercise", id = %delivered.id, kind = ticket.kind.as_str(), index = delivered.index, level = delivered.level.as_str(), "Exercise delivered");
  Ok(delivered)
}

#[instrument(level = "info", skip(session, answer))]
pub async fn submit_answer<S: KvStore>(session: &RwLock<Session<S>>, answer: Answer) -> Result<AnswerOut, ActionError> {
  let out = session.write().await.submit_answer(answer)?;
  if let Some(b) = out.badge {
    info!(target: "progress", badge = b.id, "Badge notification surfaced");
  }
  Ok(AnswerOut {
    correct: out.correct,
    expected: out.expected,
    explanation: out.explanation,
    points: out.progress.points,
    streak: out.progress.streak,
    badge: out.badge.map(|b| BadgeOut::new(b, true)),
  })
}

pub async fn login<S: KvStore>(session: &RwLock<Session<S>>, name: &str) -> Result<SessionOut, ActionError> {
  let mut s = session.write().await;
  s.login(name)?;
  Ok(session_view(&s))
}

pub async fn logout<S: KvStore>(session: &RwLock<Session<S>>) -> SessionOut {
  let mut s = session.write().await;
  s.logout();
  session_view(&s)
}

pub async fn navigate<S: KvStore>(session: &RwLock<Session<S>>, to: Screen) -> Result<SessionOut, ActionError> {
  let mut s = session.write().await;
  s.navigate(to)?;
  Ok(session_view(&s))
}

pub async fn back<S: KvStore>(session: &RwLock<Session<S>>) -> Result<SessionOut, ActionError> {
  let mut s = session.write().await;
  s.back()?;
  Ok(session_view(&s))
}

pub async fn dismiss_badge<S: KvStore>(session: &RwLock<Session<S>>) -> Option<BadgeOut> {
  session.write().await.dismiss_badge().map(|b| BadgeOut::new(b, true))
}

pub fn session_view<S: KvStore>(s: &Session<S>) -> SessionOut {
  let progress = s.progress();
  SessionOut {
    screen: s.screen(),
    name: s.name().map(str::to_string),
    points: progress.points,
    streak: progress.streak,
    unlocked_badges: s.unlocked().ids().to_vec(),
    pending_badge: s.pending_badge().map(|b| BadgeOut::new(b, true)),
  }
}

/// Full catalog in declaration order, flagged with what this device has unlocked.
pub fn achievements<S: KvStore>(s: &Session<S>) -> Vec<BadgeOut> {
  CATALOG.iter().map(|b| BadgeOut::new(b, s.unlocked().contains(b.id))).collect()
}
