//! Judging a submitted answer against the exercise it answers, producing the
//! history entry that records the attempt.

use crate::domain::{Answer, Exercise, HistoryEntry};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GradeError {
  #[error("this content does not take an answer")]
  NotAnswerable,
  #[error("answer kind `{got}` does not fit this exercise")]
  WrongAnswerKind { got: &'static str },
  #[error("answer is empty")]
  EmptyAnswer,
}

#[derive(Debug, Clone)]
pub struct Graded {
  pub correct: bool,
  /// The expected answer, as shown to the learner after submitting.
  pub expected: String,
  pub explanation: String,
  pub entry: HistoryEntry,
}

fn answer_kind(a: &Answer) -> &'static str {
  match a {
    Answer::Choice(_) => "choice",
    Answer::Written(_) => "written",
    Answer::Words(_) => "words",
  }
}

pub fn grade(exercise: &Exercise, answer: Answer) -> Result<Graded, GradeError> {
  let got = answer_kind(&answer);
  let entry = match (exercise, answer) {
    (Exercise::FillInBlank(ex), Answer::Choice(selected)) => {
      HistoryEntry::FillInBlank { exercise: ex.clone(), selected_answer: selected }
    }
    (Exercise::MultipleChoice(ex), Answer::Choice(selected)) => {
      HistoryEntry::MultipleChoice { exercise: ex.clone(), selected_answer: selected }
    }
    (Exercise::ReadingComprehension(ex), Answer::Choice(selected)) => {
      HistoryEntry::ReadingComprehension { exercise: ex.clone(), selected_answer: selected }
    }
    (Exercise::Dictation(ex), Answer::Written(text)) => {
      let written = text.trim().to_string();
      if written.is_empty() {
        return Err(GradeError::EmptyAnswer);
      }
      HistoryEntry::Dictation { exercise: ex.clone(), written_answer: written }
    }
    (Exercise::SentenceBuilder(ex), Answer::Words(words)) => {
      if words.is_empty() {
        return Err(GradeError::EmptyAnswer);
      }
      HistoryEntry::SentenceBuilder { exercise: ex.clone(), built_sentence: words.join(" ") }
    }
    (Exercise::EducationalCard(_), _) => return Err(GradeError::NotAnswerable),
    _ => return Err(GradeError::WrongAnswerKind { got }),
  };

  let (expected, explanation) = match &entry {
    HistoryEntry::FillInBlank { exercise, .. } => (exercise.answer.clone(), exercise.explanation.clone()),
    HistoryEntry::MultipleChoice { exercise, .. } => (exercise.correct_answer.clone(), exercise.explanation.clone()),
    HistoryEntry::ReadingComprehension { exercise, .. } => {
      (exercise.correct_answer.clone(), exercise.explanation.clone())
    }
    HistoryEntry::Dictation { exercise, .. } => (exercise.word.clone(), exercise.example_sentence.clone()),
    HistoryEntry::SentenceBuilder { exercise, .. } => {
      (exercise.correct_sentence.clone(), exercise.explanation.clone())
    }
  };

  Ok(Graded { correct: entry.is_correct(), expected, explanation, entry })
}
