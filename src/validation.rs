//! Response schemas sent to the generation service and the invariants every
//! payload must satisfy before it reaches the learner.
//!
//! Each payload type knows its own schema, how to validate itself, and (for the
//! sentence builder) how to repair a scramble that gives the answer away.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::domain::{
  ContentKind, DictationExercise, EducationalCard, Exercise, FillBlankExercise, McqExercise, ReadingExercise,
  SentenceBuilderExercise,
};
use crate::util::normalize_sentence;

/// Marker that stands for the single blank in a fill-in-blank sentence.
pub const BLANK_MARKER: &str = "___";
pub const OPTION_COUNT: usize = 4;

/// Why a generated payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidExercise {
  #[error("field `{0}` is empty")]
  EmptyField(&'static str),
  #[error("expected 4 options, got {0}")]
  OptionCount(usize),
  #[error("options are not distinct")]
  DuplicateOptions,
  #[error("correct answer is not one of the options")]
  AnswerNotInOptions,
  #[error("sentence must contain exactly one blank marker, found {0}")]
  BlankCount(usize),
  #[error("scrambled words cannot be put out of reading order")]
  Unscramblable,
}

/// A payload shape the generation service can be asked for.
pub trait Payload: DeserializeOwned + Sized {
  const KIND: ContentKind;

  /// Response schema, in the generation service's OpenAPI subset.
  fn schema() -> Value;

  /// Enforce invariants, repairing what can be repaired.
  fn validate(self) -> Result<Self, InvalidExercise>;

  /// Randomize presentation order where it carries no meaning.
  fn shuffle<R: Rng + ?Sized>(&mut self, _rng: &mut R) {}

  fn into_exercise(self) -> Exercise;
}

fn string_prop(description: &str) -> Value {
  json!({ "type": "STRING", "description": description })
}

fn string_array_prop(description: &str) -> Value {
  json!({ "type": "ARRAY", "items": { "type": "STRING" }, "description": description })
}

fn trim(s: &mut String) {
  let t = s.trim();
  if t.len() != s.len() {
    *s = t.to_string();
  }
}

fn trim_all(xs: &mut [String]) {
  xs.iter_mut().for_each(trim);
}

fn non_empty(field: &'static str, value: &str) -> Result<(), InvalidExercise> {
  if value.trim().is_empty() { Err(InvalidExercise::EmptyField(field)) } else { Ok(()) }
}

fn check_options(options: &[String], correct: &str) -> Result<(), InvalidExercise> {
  if options.len() != OPTION_COUNT {
    return Err(InvalidExercise::OptionCount(options.len()));
  }
  if options.iter().any(|o| o.trim().is_empty()) {
    return Err(InvalidExercise::EmptyField("options"));
  }
  if !options.iter().any(|o| o == correct) {
    return Err(InvalidExercise::AnswerNotInOptions);
  }
  Ok(())
}

impl Payload for FillBlankExercise {
  const KIND: ContentKind = ContentKind::FillInBlank;

  fn schema() -> Value {
    json!({
      "type": "OBJECT",
      "properties": {
        "sentence": string_prop("The sentence containing exactly one blank written as '___'."),
        "options": string_array_prop("Exactly 4 distinct options: the correct word and 3 similar wrong ones."),
        "answer": string_prop("The word that correctly fills the blank."),
        "explanation": string_prop("One simple sentence explaining why the answer is correct."),
      },
      "required": ["sentence", "options", "answer", "explanation"],
    })
  }

  fn validate(mut self) -> Result<Self, InvalidExercise> {
    trim(&mut self.sentence);
    trim(&mut self.answer);
    trim(&mut self.explanation);
    trim_all(&mut self.options);
    non_empty("sentence", &self.sentence)?;
    non_empty("answer", &self.answer)?;
    non_empty("explanation", &self.explanation)?;
    let blanks = self.sentence.matches(BLANK_MARKER).count();
    if blanks != 1 {
      return Err(InvalidExercise::BlankCount(blanks));
    }
    check_options(&self.options, &self.answer)?;
    let mut seen = std::collections::HashSet::new();
    if !self.options.iter().all(|o| seen.insert(o.as_str())) {
      return Err(InvalidExercise::DuplicateOptions);
    }
    Ok(self)
  }

  fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    self.options.shuffle(rng);
  }

  fn into_exercise(self) -> Exercise { Exercise::FillInBlank(self) }
}

impl Payload for McqExercise {
  const KIND: ContentKind = ContentKind::MultipleChoice;

  fn schema() -> Value {
    json!({
      "type": "OBJECT",
      "properties": {
        "question": string_prop("The question text."),
        "options": string_array_prop("Exactly 4 options, one of them correct."),
        "correctAnswer": string_prop("The correct answer, copied exactly from the options."),
        "explanation": string_prop("One simple sentence explaining why the answer is correct."),
      },
      "required": ["question", "options", "correctAnswer", "explanation"],
    })
  }

  fn validate(mut self) -> Result<Self, InvalidExercise> {
    trim(&mut self.question);
    trim(&mut self.correct_answer);
    trim(&mut self.explanation);
    trim_all(&mut self.options);
    non_empty("question", &self.question)?;
    non_empty("explanation", &self.explanation)?;
    check_options(&self.options, &self.correct_answer)?;
    Ok(self)
  }

  fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    self.options.shuffle(rng);
  }

  fn into_exercise(self) -> Exercise { Exercise::MultipleChoice(self) }
}

impl Payload for ReadingExercise {
  const KIND: ContentKind = ContentKind::ReadingComprehension;

  fn schema() -> Value {
    json!({
      "type": "OBJECT",
      "properties": {
        "paragraph": string_prop("A short paragraph of 2-4 sentences."),
        "question": string_prop("One comprehension question about the paragraph."),
        "options": string_array_prop("Exactly 4 options: one correct and 3 wrong."),
        "correctAnswer": string_prop("The correct answer, copied exactly from the options."),
        "explanation": string_prop("One sentence pointing at the supporting part of the paragraph."),
      },
      "required": ["paragraph", "question", "options", "correctAnswer", "explanation"],
    })
  }

  fn validate(mut self) -> Result<Self, InvalidExercise> {
    trim(&mut self.paragraph);
    trim(&mut self.question);
    trim(&mut self.correct_answer);
    trim(&mut self.explanation);
    trim_all(&mut self.options);
    non_empty("paragraph", &self.paragraph)?;
    non_empty("question", &self.question)?;
    non_empty("explanation", &self.explanation)?;
    check_options(&self.options, &self.correct_answer)?;
    Ok(self)
  }

  fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    self.options.shuffle(rng);
  }

  fn into_exercise(self) -> Exercise { Exercise::ReadingComprehension(self) }
}

impl Payload for DictationExercise {
  const KIND: ContentKind = ContentKind::Dictation;

  fn schema() -> Value {
    json!({
      "type": "OBJECT",
      "properties": {
        "word": string_prop("The single Arabic word to be written."),
        "exampleSentence": string_prop("A simple sentence using the word."),
      },
      "required": ["word", "exampleSentence"],
    })
  }

  fn validate(mut self) -> Result<Self, InvalidExercise> {
    trim(&mut self.word);
    trim(&mut self.example_sentence);
    non_empty("word", &self.word)?;
    non_empty("exampleSentence", &self.example_sentence)?;
    Ok(self)
  }

  fn into_exercise(self) -> Exercise { Exercise::Dictation(self) }
}

impl Payload for SentenceBuilderExercise {
  const KIND: ContentKind = ContentKind::SentenceBuilder;

  fn schema() -> Value {
    json!({
      "type": "OBJECT",
      "properties": {
        "correctSentence": string_prop("The complete correct sentence."),
        "scrambledWords": string_array_prop("The words of the sentence in random order."),
        "explanation": string_prop("A simple explanation of the sentence structure."),
      },
      "required": ["correctSentence", "scrambledWords", "explanation"],
    })
  }

  fn validate(mut self) -> Result<Self, InvalidExercise> {
    trim(&mut self.correct_sentence);
    trim(&mut self.explanation);
    trim_all(&mut self.scrambled_words);
    self.scrambled_words.retain(|w| !w.is_empty());
    non_empty("correctSentence", &self.correct_sentence)?;
    non_empty("explanation", &self.explanation)?;
    if self.scrambled_words.is_empty() {
      return Err(InvalidExercise::EmptyField("scrambledWords"));
    }
    // Tiles served in reading order would be judged correct as-is.
    if self.in_reading_order() {
      self.scrambled_words.reverse();
      if self.in_reading_order() {
        return Err(InvalidExercise::Unscramblable);
      }
    }
    Ok(self)
  }

  fn into_exercise(self) -> Exercise { Exercise::SentenceBuilder(self) }
}

impl SentenceBuilderExercise {
  /// Same comparison the grader applies to an assembled answer.
  fn in_reading_order(&self) -> bool {
    normalize_sentence(&self.scrambled_words.join(" ")) == normalize_sentence(&self.correct_sentence)
  }
}

impl Payload for EducationalCard {
  const KIND: ContentKind = ContentKind::EducationalCard;

  fn schema() -> Value {
    json!({
      "type": "OBJECT",
      "properties": {
        "concept": string_prop("Name of the grammar concept."),
        "explanation": string_prop("A very simple explanation of the concept."),
        "example": string_prop("An example sentence using the concept, related to the topic."),
      },
      "required": ["concept", "explanation", "example"],
    })
  }

  fn validate(mut self) -> Result<Self, InvalidExercise> {
    trim(&mut self.concept);
    trim(&mut self.explanation);
    trim(&mut self.example);
    non_empty("concept", &self.concept)?;
    non_empty("explanation", &self.explanation)?;
    non_empty("example", &self.example)?;
    Ok(self)
  }

  fn into_exercise(self) -> Exercise { Exercise::EducationalCard(self) }
}
