//! # Card generator
//!
//! `Generator` is the collaborator `MemoGenerationTask::execute` calls to
//! turn a memo's text into flashcards. `LlmGenerator` is the concrete
//! implementation: render a prompt from a `tera` template, call an
//! `LlmClient` (the seam over the provider's actual wire protocol, which
//! this crate treats as opaque), and parse/validate the response against
//! the generator schema — all under the retry engine in `retry.rs`.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use memoq_domain::models::GeneratedCard;

use crate::error::{WorkerError, WorkerResult};
use crate::retry::{call_with_retry, GenerationError, RetryConfig};

/// Turns memo text into a batch of flashcards for `user_id`.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate_cards(
        &self,
        cancel: &CancellationToken,
        text: &str,
        user_id: Uuid,
    ) -> WorkerResult<Vec<GeneratedCard>>;
}

/// Outcome of one call to the external model, before response parsing.
/// `Text` carries the model's raw completion; this crate treats the wire
/// protocol that produced it as opaque and only classifies the failure
/// modes the retry engine needs to distinguish.
#[derive(Debug)]
pub enum LlmCallOutcome {
    Text(String),
    Transient(String),
    ContentBlocked(String),
}

/// The seam over the provider's actual HTTP/gRPC protocol. Implementations
/// own authentication, the request envelope, and mapping provider-specific
/// failure codes onto `LlmCallOutcome`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, cancel: &CancellationToken, prompt: &str) -> LlmCallOutcome;
}

/// A minimal JSON-over-HTTP client: POSTs `{model, prompt}` to `endpoint`
/// and treats the body's `completion` field as the model's raw text
/// output. Standing in for whatever envelope the real provider actually
/// uses.
#[derive(Debug)]
pub struct HttpLlmClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model_name: String,
}

impl HttpLlmClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model_name: model_name.into(),
        }
    }
}

#[derive(Deserialize)]
struct HttpCompletionResponse {
    completion: String,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, cancel: &CancellationToken, prompt: &str) -> LlmCallOutcome {
        let request = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "model": self.model_name, "prompt": prompt }));

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return LlmCallOutcome::Transient("cancelled before response".to_string()),
            result = request.send() => result,
        };

        let response = match response {
            Ok(r) => r,
            Err(err) => return LlmCallOutcome::Transient(err.to_string()),
        };

        if response.status() == reqwest::StatusCode::FORBIDDEN {
            return LlmCallOutcome::ContentBlocked("provider rejected prompt".to_string());
        }
        if !response.status().is_success() {
            return LlmCallOutcome::Transient(format!("provider returned {}", response.status()));
        }

        match response.json::<HttpCompletionResponse>().await {
            Ok(body) => LlmCallOutcome::Text(body.completion),
            Err(err) => LlmCallOutcome::Transient(format!("malformed provider response: {err}")),
        }
    }
}

/// The generator response envelope:
/// `{ "cards": [ { "front", "back", "hint"?, "tags"? }, ... ] }`.
#[derive(Deserialize)]
struct GenerateCardsResponse {
    cards: Vec<GeneratedCard>,
}

/// Renders a `tera` prompt template, calls an `LlmClient` under the retry
/// engine, and validates the parsed response against the generator schema.
pub struct LlmGenerator {
    client: Box<dyn LlmClient>,
    tera: tera::Tera,
    retry_cfg: RetryConfig,
}

impl LlmGenerator {
    pub fn new(client: Box<dyn LlmClient>, prompt_template_path: &str, retry_cfg: RetryConfig) -> WorkerResult<Self> {
        let mut tera = tera::Tera::default();
        let template = std::fs::read_to_string(prompt_template_path).map_err(|err| {
            WorkerError::Shared(memoq_shared::MemoqError::ConfigurationInvalid(format!(
                "could not read prompt template {prompt_template_path}: {err}"
            )))
        })?;
        tera.add_raw_template("memo_cards", &template).map_err(|err| {
            WorkerError::Shared(memoq_shared::MemoqError::ConfigurationInvalid(format!(
                "invalid prompt template: {err}"
            )))
        })?;
        Ok(Self {
            client,
            tera,
            retry_cfg,
        })
    }

    fn render_prompt(&self, text: &str, user_id: Uuid) -> WorkerResult<String> {
        let mut ctx = tera::Context::new();
        ctx.insert("memo_text", text);
        ctx.insert("user_id", &user_id.to_string());
        self.tera
            .render("memo_cards", &ctx)
            .map_err(|err| {
                WorkerError::Shared(memoq_shared::MemoqError::Internal(format!(
                    "prompt render failed: {err}"
                )))
            })
    }
}

/// Parse and validate one completion against the generator schema.
/// Unparseable JSON, a missing `cards` field, or any card with an empty
/// `front`/`back` rejects the *whole* response as a permanent
/// `invalidResponse` failure. An empty `cards` array is not itself an
/// error — the zero-cards edge case is handled by the task, not the
/// generator.
fn parse_and_validate(raw: &str) -> Result<Vec<GeneratedCard>, GenerationError> {
    if raw.trim().is_empty() {
        return Err(GenerationError::Permanent(
            "empty response from model".to_string(),
        ));
    }
    let parsed: GenerateCardsResponse = serde_json::from_str(raw)
        .map_err(|err| GenerationError::Permanent(format!("invalid response json: {err}")))?;

    if parsed.cards.iter().any(|c| !c.is_valid()) {
        return Err(GenerationError::Permanent(
            "one or more cards missing a non-empty front/back".to_string(),
        ));
    }
    Ok(parsed.cards)
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate_cards(
        &self,
        cancel: &CancellationToken,
        text: &str,
        user_id: Uuid,
    ) -> WorkerResult<Vec<GeneratedCard>> {
        let prompt = self.render_prompt(text, user_id)?;
        call_with_retry(&self.retry_cfg, cancel, |attempt| {
            let prompt = prompt.clone();
            async move {
                tracing::debug!(attempt, "calling llm generator");
                match self.client.complete(cancel, &prompt).await {
                    LlmCallOutcome::Text(raw) => parse_and_validate(&raw),
                    LlmCallOutcome::Transient(msg) => Err(GenerationError::Transient(msg)),
                    LlmCallOutcome::ContentBlocked(msg) => Err(GenerationError::Permanent(msg)),
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct ScriptedClient {
        responses: std::sync::Mutex<Vec<LlmCallOutcome>>,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, _cancel: &CancellationToken, _prompt: &str) -> LlmCallOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                LlmCallOutcome::Transient("no more scripted responses".to_string())
            } else {
                responses.remove(0)
            }
        }
    }

    fn write_template(dir: &std::path::Path) -> String {
        let path = dir.join("cards.tera");
        std::fs::write(&path, "Generate cards for: {{ memo_text }}").unwrap();
        path.to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn valid_response_returns_cards() {
        let dir = tempdir();
        let template_path = write_template(dir.path());
        let calls = Arc::new(AtomicU32::new(0));
        let client = ScriptedClient {
            responses: std::sync::Mutex::new(vec![LlmCallOutcome::Text(
                r#"{"cards":[{"front":"Q1","back":"A1"}]}"#.to_string(),
            )]),
            calls: Arc::clone(&calls),
        };
        let generator = LlmGenerator::new(
            Box::new(client),
            &template_path,
            RetryConfig {
                max_retries: 2,
                base_delay: std::time::Duration::from_millis(1),
            },
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let cards = generator
            .generate_cards(&cancel, "some memo text", Uuid::now_v7())
            .await
            .unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].front, "Q1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn content_blocked_is_permanent_after_one_attempt() {
        let dir = tempdir();
        let template_path = write_template(dir.path());
        let calls = Arc::new(AtomicU32::new(0));
        let client = ScriptedClient {
            responses: std::sync::Mutex::new(vec![LlmCallOutcome::ContentBlocked(
                "safety filter".to_string(),
            )]),
            calls: Arc::clone(&calls),
        };
        let generator = LlmGenerator::new(
            Box::new(client),
            &template_path,
            RetryConfig {
                max_retries: 3,
                base_delay: std::time::Duration::from_millis(1),
            },
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let err = generator
            .generate_cards(&cancel, "memo", Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::PermanentGeneration(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unparseable_response_is_permanent() {
        let dir = tempdir();
        let template_path = write_template(dir.path());
        let client = ScriptedClient {
            responses: std::sync::Mutex::new(vec![LlmCallOutcome::Text("not json".to_string())]),
            calls: Arc::new(AtomicU32::new(0)),
        };
        let generator = LlmGenerator::new(
            Box::new(client),
            &template_path,
            RetryConfig::default(),
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let err = generator
            .generate_cards(&cancel, "memo", Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::PermanentGeneration(_)));
    }

    #[tokio::test]
    async fn card_with_empty_back_rejects_whole_batch() {
        let dir = tempdir();
        let template_path = write_template(dir.path());
        let client = ScriptedClient {
            responses: std::sync::Mutex::new(vec![LlmCallOutcome::Text(
                r#"{"cards":[{"front":"Q1","back":"A1"},{"front":"Q2","back":""}]}"#.to_string(),
            )]),
            calls: Arc::new(AtomicU32::new(0)),
        };
        let generator = LlmGenerator::new(
            Box::new(client),
            &template_path,
            RetryConfig::default(),
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let err = generator
            .generate_cards(&cancel, "memo", Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::PermanentGeneration(_)));
    }

    #[tokio::test]
    async fn transient_then_success_retries_through_generator() {
        let dir = tempdir();
        let template_path = write_template(dir.path());
        let calls = Arc::new(AtomicU32::new(0));
        let client = ScriptedClient {
            responses: std::sync::Mutex::new(vec![
                LlmCallOutcome::Transient("blip".to_string()),
                LlmCallOutcome::Text(r#"{"cards":[]}"#.to_string()),
            ]),
            calls: Arc::clone(&calls),
        };
        let generator = LlmGenerator::new(
            Box::new(client),
            &template_path,
            RetryConfig {
                max_retries: 3,
                base_delay: std::time::Duration::from_millis(1),
            },
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let cards = generator
            .generate_cards(&cancel, "memo", Uuid::now_v7())
            .await
            .unwrap();
        assert!(cards.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    fn tempdir() -> TempDir {
        TempDir::new()
    }

    /// Tiny scoped-directory helper so template tests don't depend on an
    /// external crate just to get a throwaway file on disk.
    struct TempDir(std::path::PathBuf);
    impl TempDir {
        fn new() -> Self {
            let path = std::env::temp_dir().join(format!("memoq-worker-test-{}", Uuid::now_v7()));
            std::fs::create_dir_all(&path).unwrap();
            Self(path)
        }
        fn path(&self) -> &std::path::Path {
            &self.0
        }
    }
    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
}
