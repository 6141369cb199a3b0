//! Loading application configuration (prompts, topics, generation limits) from TOML.
//!
//! See `AppConfig` and `Prompts` for expected schema. Everything has a default,
//! so the file is optional.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("no API key for the generation service (set GEMINI_API_KEY or API_KEY)")]
  MissingApiKey,
  #[error("failed to build HTTP client: {0}")]
  HttpClient(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default = "default_topics")]
  pub topics: Vec<String>,
  #[serde(default)]
  pub generation: GenerationCfg,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self { prompts: Prompts::default(), topics: default_topics(), generation: GenerationCfg::default() }
  }
}

/// Limits applied to every generation request.
#[derive(Clone, Debug, Deserialize)]
pub struct GenerationCfg {
  /// Whole-request attempts before giving up on one exercise.
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  #[serde(default = "default_temperature")]
  pub temperature: f32,
}

fn default_max_attempts() -> u32 { 3 }
fn default_timeout_secs() -> u64 { 30 }
fn default_temperature() -> f32 { 0.9 }

impl Default for GenerationCfg {
  fn default() -> Self {
    Self {
      max_attempts: default_max_attempts(),
      timeout_secs: default_timeout_secs(),
      temperature: default_temperature(),
    }
  }
}

/// Themes picked at random per request to diversify content.
pub fn default_topics() -> Vec<String> {
  [
    "عالم الحيوانات", "الفضاء والكواكب", "أعماق البحار", "الاختراعات المدهشة",
    "الرياضات المختلفة", "عجائب الطبيعة", "الأسرة والأصدقاء", "المدرسة والعلوم",
    "القصص الخيالية", "السفر حول العالم", "الفنون والموسيقى", "الحفاظ على البيئة",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

/// Prompt templates sent to the generation service.
/// `base_template` receives `{topic}` and `{level_instruction}`; each task prompt is appended to it.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub base_template: String,
  pub beginner_instruction: String,
  pub intermediate_instruction: String,
  pub fill_in_blank: String,
  pub multiple_choice: String,
  pub reading_comprehension: String,
  pub dictation: String,
  pub sentence_builder: String,
  pub educational_card: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      base_template: "أنت معلمة لغة عربية تصمم تمارين لطلاب الصف الرابع الابتدائي. اجعلي التمرين ممتعًا ومناسبًا لغويًا ومرتبطًا بموضوع \"{topic}\". {level_instruction} أعيدي الناتج بصيغة JSON فقط.".into(),
      beginner_instruction: "اجعلي التمرين بسيطًا ومباشرًا ومناسبًا لمستوى مبتدئ.".into(),
      intermediate_instruction: "اجعلي التمرين أكثر تحديًا قليلًا بمفردات وقواعد أكثر تنوعًا، لمستوى متوسط.".into(),
      fill_in_blank: "صممي تمرين 'املأ الفراغ' في قواعد اللغة العربية. ضعي '___' مكان الفراغ الوحيد في الجملة. قدمي الإجابة الصحيحة و3 خيارات خاطئة مشابهة (4 خيارات مختلفة)، مع شرح من جملة واحدة للقاعدة.".into(),
      multiple_choice: "صممي سؤال اختيار من متعدد في قواعد اللغة العربية بأربعة خيارات، واحد منها فقط صحيح، مع شرح من جملة واحدة للقاعدة.".into(),
      reading_comprehension: "اكتبي فقرة قصيرة (2-4 جمل)، ثم سؤال فهم واحد حولها بأربعة خيارات واحد منها صحيح، مع شرح من جملة واحدة يشير إلى الجزء الداعم من الفقرة.".into(),
      dictation: "صممي تمرين إملاء: كلمة عربية واحدة شائعة ومفيدة، وجملة مثال بسيطة تستخدمها.".into(),
      sentence_builder: "صممي تمرين 'بناء الجملة': جملة عربية صحيحة من 3 إلى 6 كلمات، ثم الكلمات نفسها بترتيب عشوائي، مع شرح بسيط لتركيب الجملة.".into(),
      educational_card: "أنشئي بطاقة تعليمية عن مفهوم بسيط في قواعد اللغة العربية (مثل الاسم أو الفعل أو حرف الجر) مع شرح مبسط جدًا ومثال مرتبط بالموضوع.".into(),
    }
  }
}

/// Attempt to load `AppConfig` from APP_CONFIG_PATH. On any parsing/IO error, returns defaults.
pub fn load_app_config_from_env() -> AppConfig {
  let Ok(path) = std::env::var("APP_CONFIG_PATH") else {
    return AppConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_app_config(&s) {
      Ok(cfg) => {
        info!(target: "nahw_backend", %path, topics = cfg.topics.len(), "Loaded app config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "nahw_backend", %path, error = %e, "Failed to parse TOML config; using defaults");
        AppConfig::default()
      }
    },
    Err(e) => {
      error!(target: "nahw_backend", %path, error = %e, "Failed to read TOML config file; using defaults");
      AppConfig::default()
    }
  }
}

fn parse_app_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  let mut cfg = toml::from_str::<AppConfig>(s)?;
  if cfg.topics.is_empty() {
    cfg.topics = default_topics();
  }
  if cfg.generation.max_attempts == 0 {
    cfg.generation.max_attempts = 1;
  }
  Ok(cfg)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_file_yields_defaults() {
    let cfg = parse_app_config("").unwrap();
    assert_eq!(cfg.topics.len(), 12);
    assert_eq!(cfg.generation.max_attempts, 3);
    assert!(cfg.prompts.base_template.contains("{topic}"));
  }

  #[test]
  fn partial_overrides_keep_other_defaults() {
    let cfg = parse_app_config(
      r#"
      topics = ["الفضاء"]

      [generation]
      max_attempts = 0

      [prompts]
      dictation = "custom"
      "#,
    )
    .unwrap();
    assert_eq!(cfg.topics, vec!["الفضاء".to_string()]);
    assert_eq!(cfg.generation.max_attempts, 1);
    assert_eq!(cfg.generation.timeout_secs, 30);
    assert_eq!(cfg.prompts.dictation, "custom");
    assert!(!cfg.prompts.fill_in_blank.is_empty());
  }
}
