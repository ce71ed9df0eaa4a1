//! C7's external LLM collaborator (§6 Inbound "LLM endpoint"), abstracted behind a
//! trait the way the teacher abstracts OAuth providers behind
//! `auth::oauth::OAuthProvider` — a real `reqwest`-backed implementation plus a
//! deterministic test double.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::nl::NlError;

#[derive(Clone, Debug)]
pub struct LlmCompletion {
  pub text: String,
  pub model: String,
  pub prompt_tokens: usize,
  pub completion_tokens: usize,
  pub explanation: Option<String>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
  async fn complete(&self, prompt: &str, deadline: Duration) -> Result<LlmCompletion, NlError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
  model: &'a str,
  prompt: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
  text: String,
  #[serde(default)]
  prompt_tokens: usize,
  #[serde(default)]
  completion_tokens: usize,
  #[serde(default)]
  explanation: Option<String>,
}

/// Posts the prompt to a configured HTTP endpoint, racing the call against the
/// caller-supplied deadline. Any non-textual failure (network error, non-2xx status,
/// malformed body) is treated uniformly as `NlError::ModelError` per §6 Inbound.
pub struct HttpLlmClient {
  client: reqwest::Client,
  endpoint: String,
  model: String,
}

impl HttpLlmClient {
  pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
    return Self {
      client: reqwest::Client::new(),
      endpoint: endpoint.into(),
      model: model.into(),
    };
  }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
  async fn complete(&self, prompt: &str, deadline: Duration) -> Result<LlmCompletion, NlError> {
    let response = self
      .client
      .post(&self.endpoint)
      .timeout(deadline)
      .json(&CompletionRequest {
        model: &self.model,
        prompt,
      })
      .send()
      .await
      .map_err(|err| NlError::ModelError(err.to_string()))?;

    if !response.status().is_success() {
      return Err(NlError::ModelError(format!(
        "LLM endpoint returned status {}",
        response.status()
      )));
    }

    let body: CompletionResponse = response
      .json()
      .await
      .map_err(|err| NlError::ModelError(err.to_string()))?;

    return Ok(LlmCompletion {
      text: body.text,
      model: self.model.clone(),
      prompt_tokens: body.prompt_tokens,
      completion_tokens: body.completion_tokens,
      explanation: body.explanation,
    });
  }
}

/// Deterministic test double returning a fixed response, used by this module's own
/// unit tests and by pipeline-level tests that exercise the NL path without a real
/// LLM endpoint.
#[cfg(test)]
pub struct FakeLlmClient {
  pub response: std::sync::Mutex<Result<String, NlError>>,
}

#[cfg(test)]
#[async_trait]
impl LlmClient for FakeLlmClient {
  async fn complete(&self, _prompt: &str, _deadline: Duration) -> Result<LlmCompletion, NlError> {
    let guard = self.response.lock().expect("lock poisoned");
    return match &*guard {
      Ok(text) => Ok(LlmCompletion {
        text: text.clone(),
        model: "fake-model".to_string(),
        prompt_tokens: 10,
        completion_tokens: 5,
        explanation: None,
      }),
      Err(err) => Err(clone_nl_error(err)),
    };
  }
}

#[cfg(test)]
fn clone_nl_error(err: &NlError) -> NlError {
  return match err {
    NlError::Timeout => NlError::Timeout,
    NlError::NoSqlFound => NlError::NoSqlFound,
    NlError::ModelError(msg) => NlError::ModelError(msg.clone()),
  };
}
