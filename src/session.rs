//! Session controller: the learner's screen state machine and the owner of the
//! in-memory progress, history and badges for the lifetime of the process.
//!
//! Every state-mutating operation ends by persisting what it changed. A failed
//! write is logged and the in-memory state stays authoritative.
//!
//! Exercise generation is split in two steps so that no lock is held while the
//! generation service is working: `request_current`/`request_next` hand out a
//! `Ticket`, and `complete` accepts the result only if the ticket is still the
//! live one for the screen the learner is on.

use std::collections::{HashMap, VecDeque};

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::badges::{Badge, UnlockedBadges};
use crate::domain::{
  next_index, Answer, ContentKind, Exercise, GeneratedExercise, HistoryLog, Level, Progress, Screen,
};
use crate::grading::{grade, GradeError};
use crate::progress::{append_history_entry, apply_correct_answer, apply_incorrect_answer, evaluate_badges};
use crate::store::{KvStore, ProgressStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
  #[error("no learner is signed in")]
  NotSignedIn,
  #[error("a learner is already signed in")]
  AlreadySignedIn,
  #[error("name must not be empty")]
  EmptyName,
  #[error("cannot go from {from:?} to {to:?}")]
  InvalidTransition { from: Screen, to: Screen },
  #[error("screen {0:?} has no exercises")]
  NoExerciseScreen(Screen),
  #[error("no exercise is loaded")]
  NoActiveExercise,
  #[error("this exercise was already answered")]
  AlreadyAnswered,
  #[error("exercise arrived after the learner moved on")]
  StaleExercise,
  #[error(transparent)]
  Grade(#[from] GradeError),
}

/// Permission to deliver one generated exercise to a screen slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
  pub id: Uuid,
  pub kind: ContentKind,
  pub index: u32,
  pub level: Level,
}

/// What the caller must do to show an exercise.
#[derive(Debug)]
pub enum LoadPlan {
  Ready(GeneratedExercise),
  Generate(Ticket),
}

#[derive(Debug)]
pub struct AnswerOutcome {
  pub correct: bool,
  pub expected: String,
  pub explanation: String,
  pub progress: Progress,
  /// First badge, in catalog order, that this answer unlocked. The rest wait in the queue.
  pub badge: Option<&'static Badge>,
}

/// Per-screen exercise position. Indices are session-long and cycle 1..=100.
#[derive(Debug)]
struct Slot {
  index: u32,
  ticket: Option<Uuid>,
  current: Option<GeneratedExercise>,
  answered: bool,
}

impl Default for Slot {
  fn default() -> Self {
    Self { index: 1, ticket: None, current: None, answered: false }
  }
}

pub struct Session<S> {
  store: ProgressStore<S>,
  screen: Screen,
  name: Option<String>,
  progress: Progress,
  history: HistoryLog,
  unlocked: UnlockedBadges,
  pending_badges: VecDeque<&'static Badge>,
  slots: HashMap<ContentKind, Slot>,
}

impl<S: KvStore> Session<S> {
  /// Start a session from whatever the store holds.
  pub fn load(store: ProgressStore<S>) -> Self {
    let state = store.load();
    let screen = if state.name.is_some() { Screen::Dashboard } else { Screen::Login };
    Self {
      store,
      screen,
      name: state.name,
      progress: state.progress,
      history: state.history,
      unlocked: state.unlocked,
      pending_badges: VecDeque::new(),
      slots: HashMap::new(),
    }
  }

  pub fn screen(&self) -> Screen { self.screen }
  pub fn name(&self) -> Option<&str> { self.name.as_deref() }
  pub fn progress(&self) -> Progress { self.progress }
  pub fn history(&self) -> &HistoryLog { &self.history }
  pub fn unlocked(&self) -> &UnlockedBadges { &self.unlocked }

  /// The badge notification currently surfaced, if any.
  pub fn pending_badge(&self) -> Option<&'static Badge> {
    self.pending_badges.front().copied()
  }

  fn persist(&self, what: &'static str, result: Result<(), StoreError>) {
    if let Err(e) = result {
      warn!(target: "store", %what, error = %e, "Failed to persist; keeping in-memory state");
    }
  }

  fn require_signed_in(&self) -> Result<(), SessionError> {
    if self.name.is_none() { Err(SessionError::NotSignedIn) } else { Ok(()) }
  }

  #[instrument(level = "info", skip(self, name), fields(name_len = name.len()))]
  pub fn login(&mut self, name: &str) -> Result<(), SessionError> {
    if self.name.is_some() {
      return Err(SessionError::AlreadySignedIn);
    }
    let name = name.trim();
    if name.is_empty() {
      return Err(SessionError::EmptyName);
    }
    self.name = Some(name.to_string());
    self.screen = Screen::Dashboard;
    self.persist("name", self.store.save_name(self.name.as_deref()));
    info!(target: "progress", "Learner signed in");
    Ok(())
  }

  /// Forget the name only. Points, history and badges stay with the device.
  #[instrument(level = "info", skip(self))]
  pub fn logout(&mut self) {
    self.name = None;
    self.screen = Screen::Login;
    self.persist("name", self.store.save_name(None));
    info!(target: "progress", "Learner signed out");
  }

  pub fn navigate(&mut self, to: Screen) -> Result<(), SessionError> {
    self.require_signed_in()?;
    if self.screen != Screen::Dashboard || !to.is_section() {
      return Err(SessionError::InvalidTransition { from: self.screen, to });
    }
    self.screen = to;
    Ok(())
  }

  pub fn back(&mut self) -> Result<(), SessionError> {
    self.require_signed_in()?;
    if !self.screen.is_section() {
      return Err(SessionError::InvalidTransition { from: self.screen, to: Screen::Dashboard });
    }
    self.screen = Screen::Dashboard;
    Ok(())
  }

  fn current_kind(&self) -> Result<ContentKind, SessionError> {
    self.require_signed_in()?;
    self.screen.content_kind().ok_or(SessionError::NoExerciseScreen(self.screen))
  }

  fn issue_ticket(&mut self, kind: ContentKind) -> Ticket {
    let slot = self.slots.entry(kind).or_default();
    let id = Uuid::new_v4();
    slot.ticket = Some(id);
    Ticket { id, kind, index: slot.index, level: Level::for_index(slot.index) }
  }

  /// Exercise for the current index of the current screen, generating it if needed.
  pub fn request_current(&mut self) -> Result<LoadPlan, SessionError> {
    let kind = self.current_kind()?;
    if let Some(ex) = self.slots.get(&kind).and_then(|s| s.current.clone()) {
      return Ok(LoadPlan::Ready(ex));
    }
    Ok(LoadPlan::Generate(self.issue_ticket(kind)))
  }

  /// Move to the next index (cycling) and ask for a fresh exercise.
  pub fn request_next(&mut self) -> Result<Ticket, SessionError> {
    let kind = self.current_kind()?;
    let slot = self.slots.entry(kind).or_default();
    slot.index = next_index(slot.index);
    slot.current = None;
    slot.answered = false;
    Ok(self.issue_ticket(kind))
  }

  /// Deliver a generated exercise. Results for a superseded ticket are discarded.
  pub fn complete(&mut self, ticket: Ticket, exercise: Exercise) -> Result<GeneratedExercise, SessionError> {
    if self.name.is_none() || self.screen.content_kind() != Some(ticket.kind) || exercise.kind() != ticket.kind {
      return Err(SessionError::StaleExercise);
    }
    let slot = self.slots.entry(ticket.kind).or_default();
    if slot.ticket != Some(ticket.id) || slot.index != ticket.index {
      return Err(SessionError::StaleExercise);
    }
    let generated = GeneratedExercise { id: ticket.id, index: ticket.index, level: ticket.level, exercise };
    slot.current = Some(generated.clone());
    slot.answered = false;
    Ok(generated)
  }

  /// Judge an answer, then update progress and history, then evaluate badges
  /// against both, then persist.
  #[instrument(level = "info", skip(self, answer), fields(screen = ?self.screen))]
  pub fn submit_answer(&mut self, answer: Answer) -> Result<AnswerOutcome, SessionError> {
    let kind = self.current_kind()?;
    let graded = {
      let slot = self.slots.get_mut(&kind).ok_or(SessionError::NoActiveExercise)?;
      let current = slot.current.as_ref().ok_or(SessionError::NoActiveExercise)?;
      if slot.answered {
        return Err(SessionError::AlreadyAnswered);
      }
      let graded = grade(&current.exercise, answer)?;
      slot.answered = true;
      graded
    };

    self.progress = if graded.correct {
      apply_correct_answer(self.progress)
    } else {
      apply_incorrect_answer(self.progress)
    };
    self.history = append_history_entry(std::mem::take(&mut self.history), graded.entry);

    let newly = evaluate_badges(&self.history, self.progress.streak, &self.unlocked);
    for badge in newly.iter().copied() {
      self.unlocked.insert(badge);
      self.pending_badges.push_back(badge);
      info!(target: "progress", badge = badge.id, "Badge unlocked");
    }

    self.persist("progress", self.store.save_progress(&self.progress));
    self.persist("history", self.store.save_history(&self.history));
    if !newly.is_empty() {
      self.persist("badges", self.store.save_unlocked(&self.unlocked));
    }

    info!(target: "progress", correct = graded.correct, points = self.progress.points, streak = self.progress.streak, "Answer recorded");
    Ok(AnswerOutcome {
      correct: graded.correct,
      expected: graded.expected,
      explanation: graded.explanation,
      progress: self.progress,
      badge: newly.first().copied(),
    })
  }

  /// Close the surfaced badge notification and surface the next queued one.
  pub fn dismiss_badge(&mut self) -> Option<&'static Badge> {
    self.pending_badges.pop_front();
    self.pending_badge()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Category, FillBlankExercise, HistoryEntry, McqExercise};
  use crate::store::{MemoryStore, KEY_HISTORY, KEY_NAME, KEY_POINTS};
  use std::sync::atomic::Ordering;

  fn signed_in() -> Session<MemoryStore> {
    let mut s = Session::load(ProgressStore::new(MemoryStore::default()));
    s.login("Huda").unwrap();
    s
  }

  fn fill(n: usize) -> Exercise {
    Exercise::FillInBlank(FillBlankExercise {
      sentence: format!("{n} ذهب الولد ___ المدرسة."),
      options: vec!["إلى".into(), "على".into(), "من".into(), "عن".into()],
      answer: "إلى".into(),
      explanation: "حرف الجر إلى يدل على الاتجاه.".into(),
    })
  }

  fn mcq() -> Exercise {
    Exercise::MultipleChoice(McqExercise {
      question: "ما جمع قلم؟".into(),
      options: vec!["أقلام".into(), "قلمان".into(), "قلمين".into(), "قلوم".into()],
      correct_answer: "أقلام".into(),
      explanation: "جمع تكسير.".into(),
    })
  }

  fn serve(s: &mut Session<MemoryStore>, exercise: Exercise) {
    let ticket = match s.request_current().unwrap() {
      LoadPlan::Generate(t) => t,
      LoadPlan::Ready(_) => s.request_next().unwrap(),
    };
    s.complete(ticket, exercise).unwrap();
  }

  fn badge_ids(s: &Session<MemoryStore>) -> Vec<String> {
    s.unlocked().ids().to_vec()
  }

  #[test]
  fn starts_on_login_without_a_name() {
    let mut s = Session::load(ProgressStore::new(MemoryStore::default()));
    assert_eq!(s.screen(), Screen::Login);
    assert!(matches!(s.navigate(Screen::History), Err(SessionError::NotSignedIn)));
    assert!(matches!(s.back(), Err(SessionError::NotSignedIn)));
    assert!(matches!(s.login("   "), Err(SessionError::EmptyName)));
    s.login("  Omar ").unwrap();
    assert_eq!(s.name(), Some("Omar"));
    assert_eq!(s.screen(), Screen::Dashboard);
  }

  #[test]
  fn sections_are_entered_from_dashboard_and_left_via_back() {
    let mut s = signed_in();
    s.navigate(Screen::Achievements).unwrap();
    assert!(matches!(s.navigate(Screen::History), Err(SessionError::InvalidTransition { .. })));
    s.back().unwrap();
    assert_eq!(s.screen(), Screen::Dashboard);
    assert!(matches!(s.back(), Err(SessionError::InvalidTransition { .. })));
    assert!(matches!(s.navigate(Screen::Login), Err(SessionError::InvalidTransition { .. })));
  }

  #[test]
  fn five_correct_fill_in_blank_answers() {
    let mut s = signed_in();
    s.navigate(Screen::FillInBlank).unwrap();
    let mut first_badge = None;
    for n in 0..5 {
      serve(&mut s, fill(n));
      let out = s.submit_answer(Answer::Choice("إلى".into())).unwrap();
      assert!(out.correct);
      if n == 0 {
        first_badge = out.badge.map(|b| b.id);
      }
    }

    assert_eq!(s.progress(), Progress { points: 50, streak: 5 });
    assert_eq!(badge_ids(&s), vec!["first_correct", "streak_5"]);
    assert_eq!(first_badge, Some("first_correct"));

    let history = s.history().entries(Category::FillInBlank);
    assert_eq!(history.len(), 5);
    match &history[0] {
      HistoryEntry::FillInBlank { exercise, .. } => assert!(exercise.sentence.starts_with('4')),
      other => panic!("unexpected entry {other:?}"),
    }

    // Queued notifications surface one at a time, in catalog order.
    assert_eq!(s.pending_badge().map(|b| b.id), Some("first_correct"));
    assert_eq!(s.dismiss_badge().map(|b| b.id), Some("streak_5"));
    assert_eq!(s.dismiss_badge().map(|b| b.id), None);
  }

  #[test]
  fn answer_reports_the_badge_it_unlocked_while_another_is_pending() {
    let mut s = signed_in();
    s.navigate(Screen::FillInBlank).unwrap();
    let mut reported = Vec::new();
    for n in 0..5 {
      serve(&mut s, fill(n));
      let out = s.submit_answer(Answer::Choice("إلى".into())).unwrap();
      reported.push(out.badge.map(|b| b.id));
    }
    // first_correct was never dismissed, yet the fifth answer reports streak_5.
    assert_eq!(reported, vec![Some("first_correct"), None, None, None, Some("streak_5")]);
    assert_eq!(s.pending_badge().map(|b| b.id), Some("first_correct"));
  }

  #[test]
  fn incorrect_answer_resets_streak_but_keeps_points() {
    let mut s = signed_in();
    s.navigate(Screen::FillInBlank).unwrap();
    serve(&mut s, fill(0));
    s.submit_answer(Answer::Choice("إلى".into())).unwrap();
    assert_eq!(s.progress(), Progress { points: 10, streak: 1 });

    serve(&mut s, fill(1));
    let out = s.submit_answer(Answer::Choice("على".into())).unwrap();
    assert!(!out.correct);
    assert_eq!(out.expected, "إلى");
    assert_eq!(s.progress(), Progress { points: 10, streak: 0 });
    assert_eq!(s.history().count(Category::FillInBlank), 2);
  }

  #[test]
  fn each_exercise_takes_one_answer() {
    let mut s = signed_in();
    s.navigate(Screen::FillInBlank).unwrap();
    assert!(matches!(s.submit_answer(Answer::Choice("إلى".into())), Err(SessionError::NoActiveExercise)));
    serve(&mut s, fill(0));
    assert!(matches!(s.submit_answer(Answer::Written("إلى".into())), Err(SessionError::Grade(_))));
    s.submit_answer(Answer::Choice("إلى".into())).unwrap();
    assert!(matches!(s.submit_answer(Answer::Choice("إلى".into())), Err(SessionError::AlreadyAnswered)));
    assert_eq!(s.progress().points, 10);
  }

  #[test]
  fn superseded_ticket_is_discarded() {
    let mut s = signed_in();
    s.navigate(Screen::FillInBlank).unwrap();
    let LoadPlan::Generate(first) = s.request_current().unwrap() else { panic!("expected a ticket") };
    let second = s.request_next().unwrap();
    assert_eq!(second.index, 2);

    assert!(matches!(s.complete(first, fill(1)), Err(SessionError::StaleExercise)));
    let delivered = s.complete(second, fill(2)).unwrap();
    assert_eq!(delivered.index, 2);
  }

  #[test]
  fn result_for_another_screen_is_discarded() {
    let mut s = signed_in();
    s.navigate(Screen::FillInBlank).unwrap();
    let LoadPlan::Generate(ticket) = s.request_current().unwrap() else { panic!("expected a ticket") };
    s.back().unwrap();
    s.navigate(Screen::MultipleChoice).unwrap();
    assert!(matches!(s.complete(ticket, fill(0)), Err(SessionError::StaleExercise)));
  }

  #[test]
  fn loaded_exercise_is_reused_until_next() {
    let mut s = signed_in();
    s.navigate(Screen::MultipleChoice).unwrap();
    serve(&mut s, mcq());
    let LoadPlan::Ready(again) = s.request_current().unwrap() else { panic!("expected cached exercise") };
    assert_eq!(again.index, 1);
    assert_eq!(again.level, Level::Beginner);
  }

  #[test]
  fn index_cycles_and_level_follows() {
    let mut s = signed_in();
    s.navigate(Screen::Dictation).unwrap();
    let mut last = None;
    for _ in 0..50 {
      last = Some(s.request_next().unwrap());
    }
    let t = last.unwrap();
    assert_eq!((t.index, t.level), (51, Level::Intermediate));
    for _ in 0..50 {
      last = Some(s.request_next().unwrap());
    }
    let t = last.unwrap();
    assert_eq!((t.index, t.level), (1, Level::Beginner));
  }

  #[test]
  fn ten_multiple_choice_entries_unlock_mcq_badge() {
    let mut s = signed_in();
    s.navigate(Screen::MultipleChoice).unwrap();
    for n in 0..10 {
      serve(&mut s, mcq());
      s.submit_answer(Answer::Choice("قلمان".into())).unwrap();
      assert_eq!(s.unlocked().contains("mcq_10"), n == 9);
    }
    assert_eq!(s.progress(), Progress { points: 0, streak: 0 });
    assert_eq!(badge_ids(&s), vec!["first_correct", "mcq_10"]);
  }

  #[test]
  fn logout_clears_only_the_name() {
    let mut s = signed_in();
    s.navigate(Screen::FillInBlank).unwrap();
    serve(&mut s, fill(0));
    s.submit_answer(Answer::Choice("إلى".into())).unwrap();
    s.logout();

    assert_eq!(s.screen(), Screen::Login);
    assert_eq!(s.store.kv().get(KEY_NAME).unwrap(), None);
    assert_eq!(s.store.kv().get(KEY_POINTS).unwrap().as_deref(), Some("10"));

    let reloaded = Session::load(ProgressStore::new(MemoryStore {
      map: std::sync::Mutex::new(s.store.kv().map.lock().unwrap().clone()),
      ..MemoryStore::default()
    }));
    assert_eq!(reloaded.screen(), Screen::Login);
    assert_eq!(reloaded.progress(), Progress { points: 10, streak: 1 });
    assert_eq!(reloaded.unlocked().ids(), &["first_correct".to_string()]);
  }

  #[test]
  fn failed_writes_do_not_roll_back() {
    let mut s = signed_in();
    s.store.kv().fail_writes.store(true, Ordering::SeqCst);
    s.navigate(Screen::FillInBlank).unwrap();
    serve(&mut s, fill(0));
    let out = s.submit_answer(Answer::Choice("إلى".into())).unwrap();
    assert!(out.correct);
    assert_eq!(s.progress().points, 10);
    assert_eq!(s.history().count(Category::FillInBlank), 1);
    assert_eq!(s.store.kv().get(KEY_HISTORY).unwrap(), None);
  }
}
