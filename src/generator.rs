//! Exercise generator: builds the request for one exercise, asks the content
//! source, validates the result, and regenerates on failure up to a bounded
//! number of attempts.

use std::future::Future;

use rand::seq::SliceRandom;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::{AppConfig, Prompts};
use crate::domain::{
  ContentKind, DictationExercise, EducationalCard, Exercise, FillBlankExercise, Level, McqExercise, ReadingExercise,
  SentenceBuilderExercise,
};
use crate::util::fill_template;
use crate::validation::{InvalidExercise, Payload};

/// One structured request to the generation service.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
  pub kind: ContentKind,
  pub level: Level,
  pub topic: String,
  pub prompt: String,
  pub schema: Value,
}

/// Anything that can turn a `GenerationRequest` into raw JSON text.
pub trait ContentSource {
  fn request(&self, req: &GenerationRequest) -> impl Future<Output = Result<String, String>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
  #[error("generation request failed: {0}")]
  Request(String),
  #[error("response did not match the schema: {0}")]
  Schema(#[from] serde_json::Error),
  #[error("response violated an invariant: {0}")]
  Invalid(#[from] InvalidExercise),
  #[error("gave up after {attempts} attempts; last error: {last}")]
  Exhausted { attempts: u32, last: Box<GenerationError> },
}

pub struct Generator<S> {
  source: S,
  prompts: Prompts,
  topics: Vec<String>,
  max_attempts: u32,
}

impl<S: ContentSource> Generator<S> {
  pub fn new(source: S, cfg: &AppConfig) -> Self {
    Self {
      source,
      prompts: cfg.prompts.clone(),
      topics: cfg.topics.clone(),
      max_attempts: cfg.generation.max_attempts.max(1),
    }
  }

  /// Produce one validated exercise of `kind` at `level`.
  pub async fn generate(&self, kind: ContentKind, level: Level) -> Result<Exercise, GenerationError> {
    match kind {
      ContentKind::FillInBlank => self.generate_as::<FillBlankExercise>(level).await,
      ContentKind::MultipleChoice => self.generate_as::<McqExercise>(level).await,
      ContentKind::ReadingComprehension => self.generate_as::<ReadingExercise>(level).await,
      ContentKind::Dictation => self.generate_as::<DictationExercise>(level).await,
      ContentKind::SentenceBuilder => self.generate_as::<SentenceBuilderExercise>(level).await,
      ContentKind::EducationalCard => self.generate_as::<EducationalCard>(level).await,
    }
  }

  #[instrument(level = "info", skip(self, level), fields(kind = T::KIND.as_str(), level = level.as_str()))]
  async fn generate_as<T: Payload>(&self, level: Level) -> Result<Exercise, GenerationError> {
    let mut last = None;
    for attempt in 1..=self.max_attempts {
      let req = self.build_request::<T>(level);
      let start = std::time::Instant::now();
      match self.try_once::<T>(&req).await {
        Ok(exercise) => {
          info!(target: "exercise", attempt, topic = %req.topic, elapsed = ?start.elapsed(), "Exercise generated");
          return Ok(exercise);
        }
        Err(e) => {
          warn!(target: "exercise", attempt, max_attempts = self.max_attempts, error = %e, "Generation attempt rejected; regenerating");
          last = Some(e);
        }
      }
    }
    let last = last.unwrap_or_else(|| GenerationError::Request("no attempt was made".into()));
    Err(GenerationError::Exhausted { attempts: self.max_attempts, last: Box::new(last) })
  }

  async fn try_once<T: Payload>(&self, req: &GenerationRequest) -> Result<Exercise, GenerationError> {
    let text = self.source.request(req).await.map_err(GenerationError::Request)?;
    let mut payload = serde_json::from_str::<T>(&text)?.validate()?;
    payload.shuffle(&mut rand::thread_rng());
    Ok(payload.into_exercise())
  }

  fn build_request<T: Payload>(&self, level: Level) -> GenerationRequest {
    let topic = self.pick_topic();
    let level_instruction = match level {
      Level::Beginner => &self.prompts.beginner_instruction,
      Level::Intermediate => &self.prompts.intermediate_instruction,
    };
    let base = fill_template(
      &self.prompts.base_template,
      &[("topic", &topic), ("level_instruction", level_instruction)],
    );
    let task = match T::KIND {
      ContentKind::FillInBlank => &self.prompts.fill_in_blank,
      ContentKind::MultipleChoice => &self.prompts.multiple_choice,
      ContentKind::ReadingComprehension => &self.prompts.reading_comprehension,
      ContentKind::Dictation => &self.prompts.dictation,
      ContentKind::SentenceBuilder => &self.prompts.sentence_builder,
      ContentKind::EducationalCard => &self.prompts.educational_card,
    };
    GenerationRequest {
      kind: T::KIND,
      level,
      prompt: format!("{} {}", base, fill_template(task, &[("topic", &topic)])),
      topic,
      schema: T::schema(),
    }
  }

  fn pick_topic(&self) -> String {
    self.topics.choose(&mut rand::thread_rng()).cloned().unwrap_or_default()
  }
}
