//! Domain models: screens, categories, difficulty, exercise payloads, answers and history.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The five answerable exercise categories. History and badges are keyed by these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
  FillInBlank,
  MultipleChoice,
  ReadingComprehension,
  Dictation,
  SentenceBuilder,
}

impl Category {
  pub const ALL: [Category; 5] = [
    Category::FillInBlank,
    Category::MultipleChoice,
    Category::ReadingComprehension,
    Category::Dictation,
    Category::SentenceBuilder,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Category::FillInBlank => "fill_in_blank",
      Category::MultipleChoice => "multiple_choice",
      Category::ReadingComprehension => "reading_comprehension",
      Category::Dictation => "dictation",
      Category::SentenceBuilder => "sentence_builder",
    }
  }
}

/// Anything the generation service can produce. Educational cards are content
/// without an answer, so they are not a `Category`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
  FillInBlank,
  MultipleChoice,
  ReadingComprehension,
  Dictation,
  SentenceBuilder,
  EducationalCard,
}

impl ContentKind {
  pub fn category(self) -> Option<Category> {
    match self {
      ContentKind::FillInBlank => Some(Category::FillInBlank),
      ContentKind::MultipleChoice => Some(Category::MultipleChoice),
      ContentKind::ReadingComprehension => Some(Category::ReadingComprehension),
      ContentKind::Dictation => Some(Category::Dictation),
      ContentKind::SentenceBuilder => Some(Category::SentenceBuilder),
      ContentKind::EducationalCard => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self.category() {
      Some(c) => c.as_str(),
      None => "educational_card",
    }
  }
}

/// Screens of the learner-facing state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Screen {
  Login,
  Dashboard,
  FillInBlank,
  MultipleChoice,
  ReadingComprehension,
  EducationalCards,
  Dictation,
  SentenceBuilder,
  History,
  Achievements,
}

impl Screen {
  /// Content produced on this screen, if it shows generated exercises.
  pub fn content_kind(self) -> Option<ContentKind> {
    match self {
      Screen::FillInBlank => Some(ContentKind::FillInBlank),
      Screen::MultipleChoice => Some(ContentKind::MultipleChoice),
      Screen::ReadingComprehension => Some(ContentKind::ReadingComprehension),
      Screen::EducationalCards => Some(ContentKind::EducationalCard),
      Screen::Dictation => Some(ContentKind::Dictation),
      Screen::SentenceBuilder => Some(ContentKind::SentenceBuilder),
      Screen::Login | Screen::Dashboard | Screen::History | Screen::Achievements => None,
    }
  }

  /// Sections are reachable from the dashboard and return to it via `back`.
  pub fn is_section(self) -> bool {
    !matches!(self, Screen::Login | Screen::Dashboard)
  }
}

/// Difficulty requested from the generation service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
  Beginner,
  Intermediate,
}

/// Exercise indices cycle through 1..=EXERCISES_PER_CYCLE.
pub const EXERCISES_PER_CYCLE: u32 = 100;
/// Indices up to this value are generated at beginner level.
pub const BEGINNER_UNTIL: u32 = 50;

impl Level {
  pub fn for_index(index: u32) -> Self {
    if index <= BEGINNER_UNTIL { Level::Beginner } else { Level::Intermediate }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Level::Beginner => "beginner",
      Level::Intermediate => "intermediate",
    }
  }
}

/// Index that follows `index` in the 1..=100 cycle.
pub fn next_index(index: u32) -> u32 {
  (index % EXERCISES_PER_CYCLE) + 1
}

// --- Exercise payloads (wire shape of the generation service, camelCase) ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FillBlankExercise {
  pub sentence: String,
  pub options: Vec<String>,
  pub answer: String,
  pub explanation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McqExercise {
  pub question: String,
  pub options: Vec<String>,
  pub correct_answer: String,
  pub explanation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingExercise {
  pub paragraph: String,
  pub question: String,
  pub options: Vec<String>,
  pub correct_answer: String,
  pub explanation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictationExercise {
  pub word: String,
  pub example_sentence: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceBuilderExercise {
  pub scrambled_words: Vec<String>,
  pub correct_sentence: String,
  pub explanation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EducationalCard {
  pub concept: String,
  pub explanation: String,
  pub example: String,
}

/// Validated content of any kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Exercise {
  FillInBlank(FillBlankExercise),
  MultipleChoice(McqExercise),
  ReadingComprehension(ReadingExercise),
  Dictation(DictationExercise),
  SentenceBuilder(SentenceBuilderExercise),
  EducationalCard(EducationalCard),
}

impl Exercise {
  pub fn kind(&self) -> ContentKind {
    match self {
      Exercise::FillInBlank(_) => ContentKind::FillInBlank,
      Exercise::MultipleChoice(_) => ContentKind::MultipleChoice,
      Exercise::ReadingComprehension(_) => ContentKind::ReadingComprehension,
      Exercise::Dictation(_) => ContentKind::Dictation,
      Exercise::SentenceBuilder(_) => ContentKind::SentenceBuilder,
      Exercise::EducationalCard(_) => ContentKind::EducationalCard,
    }
  }
}

/// Exercise delivered to the learner at a given index of its screen.
#[derive(Clone, Debug, Serialize)]
pub struct GeneratedExercise {
  pub id: Uuid,
  pub index: u32,
  pub level: Level,
  pub exercise: Exercise,
}

/// What the learner submitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
  /// Selected option (fill-in-blank, multiple-choice, reading).
  Choice(String),
  /// Free text (dictation).
  Written(String),
  /// Word tiles in the order they were assembled (sentence builder).
  Words(Vec<String>),
}

/// Points and streak.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
  pub points: u32,
  pub streak: u32,
}

/// One completed attempt: the exercise as shown plus the learner's answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEntry {
  FillInBlank {
    exercise: FillBlankExercise,
    #[serde(rename = "selectedAnswer")]
    selected_answer: String,
  },
  MultipleChoice {
    exercise: McqExercise,
    #[serde(rename = "selectedAnswer")]
    selected_answer: String,
  },
  ReadingComprehension {
    exercise: ReadingExercise,
    #[serde(rename = "selectedAnswer")]
    selected_answer: String,
  },
  Dictation {
    exercise: DictationExercise,
    #[serde(rename = "writtenAnswer")]
    written_answer: String,
  },
  SentenceBuilder {
    exercise: SentenceBuilderExercise,
    #[serde(rename = "builtSentence")]
    built_sentence: String,
  },
}

impl HistoryEntry {
  pub fn category(&self) -> Category {
    match self {
      HistoryEntry::FillInBlank { .. } => Category::FillInBlank,
      HistoryEntry::MultipleChoice { .. } => Category::MultipleChoice,
      HistoryEntry::ReadingComprehension { .. } => Category::ReadingComprehension,
      HistoryEntry::Dictation { .. } => Category::Dictation,
      HistoryEntry::SentenceBuilder { .. } => Category::SentenceBuilder,
    }
  }

  /// Whether the recorded answer was the expected one.
  pub fn is_correct(&self) -> bool {
    match self {
      HistoryEntry::FillInBlank { exercise, selected_answer } => *selected_answer == exercise.answer,
      HistoryEntry::MultipleChoice { exercise, selected_answer } => *selected_answer == exercise.correct_answer,
      HistoryEntry::ReadingComprehension { exercise, selected_answer } => *selected_answer == exercise.correct_answer,
      HistoryEntry::Dictation { exercise, written_answer } => written_answer.trim() == exercise.word,
      HistoryEntry::SentenceBuilder { exercise, built_sentence } => {
        crate::util::normalize_sentence(built_sentence) == crate::util::normalize_sentence(&exercise.correct_sentence)
      }
    }
  }
}

/// Per-category history, newest entry first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryLog {
  #[serde(default)] pub fill_in_blank: Vec<HistoryEntry>,
  #[serde(default)] pub multiple_choice: Vec<HistoryEntry>,
  #[serde(default)] pub reading_comprehension: Vec<HistoryEntry>,
  #[serde(default)] pub dictation: Vec<HistoryEntry>,
  #[serde(default)] pub sentence_builder: Vec<HistoryEntry>,
}

impl HistoryLog {
  pub fn entries(&self, category: Category) -> &[HistoryEntry] {
    match category {
      Category::FillInBlank => &self.fill_in_blank,
      Category::MultipleChoice => &self.multiple_choice,
      Category::ReadingComprehension => &self.reading_comprehension,
      Category::Dictation => &self.dictation,
      Category::SentenceBuilder => &self.sentence_builder,
    }
  }

  pub(crate) fn entries_mut(&mut self, category: Category) -> &mut Vec<HistoryEntry> {
    match category {
      Category::FillInBlank => &mut self.fill_in_blank,
      Category::MultipleChoice => &mut self.multiple_choice,
      Category::ReadingComprehension => &mut self.reading_comprehension,
      Category::Dictation => &mut self.dictation,
      Category::SentenceBuilder => &mut self.sentence_builder,
    }
  }

  pub fn count(&self, category: Category) -> usize {
    self.entries(category).len()
  }

  pub fn is_empty(&self) -> bool {
    Category::ALL.iter().all(|c| self.entries(*c).is_empty())
  }

  /// Entries whose stored list does not match their own category tag.
  pub fn misfiled(&self) -> usize {
    Category::ALL
      .iter()
      .map(|c| self.entries(*c).iter().filter(|e| e.category() != *c).count())
      .sum()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn level_switches_after_fifty() {
    assert_eq!(Level::for_index(1), Level::Beginner);
    assert_eq!(Level::for_index(50), Level::Beginner);
    assert_eq!(Level::for_index(51), Level::Intermediate);
    assert_eq!(Level::for_index(100), Level::Intermediate);
  }

  #[test]
  fn index_cycles_back_to_one() {
    assert_eq!(next_index(1), 2);
    assert_eq!(next_index(99), 100);
    assert_eq!(next_index(100), 1);
  }

  #[test]
  fn history_entry_uses_wire_field_names() {
    let entry = HistoryEntry::Dictation {
      exercise: DictationExercise { word: "كتاب".into(), example_sentence: "قرأت كتابا.".into() },
      written_answer: "كتاب".into(),
    };
    let v = serde_json::to_value(&entry).unwrap();
    assert_eq!(v["type"], "dictation");
    assert_eq!(v["writtenAnswer"], "كتاب");
    assert_eq!(v["exercise"]["exampleSentence"], "قرأت كتابا.");
  }

  #[test]
  fn sections_exclude_login_and_dashboard() {
    assert!(!Screen::Login.is_section());
    assert!(!Screen::Dashboard.is_section());
    assert!(Screen::History.is_section());
    assert_eq!(Screen::History.content_kind(), None);
    assert_eq!(Screen::EducationalCards.content_kind(), Some(ContentKind::EducationalCard));
  }
}
