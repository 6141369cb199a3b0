//! Minimal Gemini client for our use-case.
//!
//! We only call `models/{model}:generateContent` and always request a JSON response
//! constrained by a response schema. Calls are instrumented and log model name,
//! latency, token usage and response size (not contents).
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::config::{ConfigError, GenerationCfg};
use crate::generator::{ContentSource, GenerationRequest};
use crate::util::preview;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
}

impl Gemini {
  pub fn new(api_key: String, base_url: String, model: String, cfg: &GenerationCfg) -> Result<Self, ConfigError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(cfg.timeout_secs))
      .build()
      .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
    Ok(Self { client, api_key, base_url, model, temperature: cfg.temperature })
  }

  /// Construct the client from GEMINI_API_KEY (or API_KEY). A missing key is fatal.
  pub fn from_env(cfg: &GenerationCfg) -> Result<Self, ConfigError> {
    let api_key = std::env::var("GEMINI_API_KEY")
      .or_else(|_| std::env::var("API_KEY"))
      .ok()
      .filter(|k| !k.trim().is_empty())
      .ok_or(ConfigError::MissingApiKey)?;
    let base_url = std::env::var("GEMINI_BASE_URL")
      .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into());
    let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into());
    Self::new(api_key, base_url, model, cfg)
  }

  /// Schema-constrained JSON generation. Returns the raw JSON text of the first candidate.
  #[instrument(level = "info", skip(self, prompt, schema), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<String, String> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
    let req = GenerateContentRequest {
      contents: vec![Content {
        role: "user".into(),
        parts: vec![Part { text: prompt.into() }],
      }],
      generation_config: GenerationConfig {
        response_mime_type: "application/json".into(),
        response_schema: schema.clone(),
        temperature: self.temperature,
      },
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "nahw-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(API_KEY_HEADER, &self.api_key)
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_gemini_error(&body).unwrap_or_else(|| preview(&body, 200));
      error!(elapsed = ?start.elapsed(), %status, "Gemini call failed");
      return Err(format!("Gemini HTTP {}: {}", status, msg));
    }

    let body: GenerateContentResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, completion_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }
    let text = first_candidate_text(body).ok_or_else(|| "Gemini response had no candidate text".to_string())?;
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Gemini response received");
    Ok(text)
  }
}

impl ContentSource for Gemini {
  async fn request(&self, req: &GenerationRequest) -> Result<String, String> {
    self.generate_json(&req.prompt, &req.schema).await
  }
}

fn first_candidate_text(body: GenerateContentResponse) -> Option<String> {
  let text: String = body
    .candidates
    .into_iter()
    .next()?
    .content?
    .parts
    .into_iter()
    .filter_map(|p| p.text)
    .collect();
  let text = text.trim().to_string();
  if text.is_empty() { None } else { Some(text) }
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content { role: String, parts: Vec<Part> }
#[derive(Serialize)]
struct Part { text: String }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  response_mime_type: String,
  response_schema: Value,
  temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate { #[serde(default)] content: Option<CandidateContent> }
#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<CandidatePart> }
#[derive(Deserialize)]
struct CandidatePart { #[serde(default)] text: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn request_body_uses_camel_case_generation_config() {
    let req = GenerateContentRequest {
      contents: vec![Content { role: "user".into(), parts: vec![Part { text: "hi".into() }] }],
      generation_config: GenerationConfig {
        response_mime_type: "application/json".into(),
        response_schema: json!({ "type": "OBJECT" }),
        temperature: 0.5,
      },
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["generationConfig"]["responseMimeType"], "application/json");
    assert_eq!(v["generationConfig"]["responseSchema"]["type"], "OBJECT");
    assert_eq!(v["contents"][0]["parts"][0]["text"], "hi");
  }

  #[test]
  fn candidate_text_is_concatenated_and_trimmed() {
    let body: GenerateContentResponse = serde_json::from_value(json!({
      "candidates": [{ "content": { "parts": [{ "text": " {\"word\":" }, { "text": "\"قلم\"} " }] } }],
      "usageMetadata": { "promptTokenCount": 10, "totalTokenCount": 30 }
    }))
    .unwrap();
    assert_eq!(first_candidate_text(body).as_deref(), Some("{\"word\":\"قلم\"}"));
  }

  #[test]
  fn empty_candidates_yield_none() {
    let body: GenerateContentResponse = serde_json::from_value(json!({ "candidates": [] })).unwrap();
    assert!(first_candidate_text(body).is_none());
  }

  #[test]
  fn error_message_is_extracted() {
    let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
    assert_eq!(extract_gemini_error(body).as_deref(), Some("API key not valid."));
    assert_eq!(extract_gemini_error("<html>"), None);
  }
}
