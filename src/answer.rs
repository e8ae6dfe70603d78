//! Answer generation over retrieved chunks.
//!
//! The retrieved chunks are joined into a context block and substituted
//! into a fixed prompt. Any [`AnswerGenerator`] can turn that prompt into
//! an answer; [`OpenAiCompatGenerator`] calls an OpenAI-compatible
//! chat-completions endpoint (Groq by default).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use smartdoc_core::models::Chunk;

use crate::config::GenerationConfig;

/// Chunk contents separated by blank lines.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the following question based only on the provided context.\n\
         Your answer should be concise and to the point.\n\
         If the context does not contain the answer, state that the answer is not available in the context.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question:\n\
         {question}\n\
         \n\
         Answer:\n"
    )
}

/// Unique sources of `chunks`, in first-seen order.
pub fn collect_sources(chunks: &[Chunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for chunk in chunks {
        if !sources.contains(&chunk.metadata.source) {
            sources.push(chunk.metadata.source.clone());
        }
    }
    sources
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generate an answer to `question` from `chunks`.
pub async fn answer(
    generator: &dyn AnswerGenerator,
    chunks: &[Chunk],
    question: &str,
) -> Result<String> {
    let prompt = build_prompt(&format_context(chunks), question);
    debug!(prompt_chars = prompt.chars().count(), "generating answer");
    generator.generate(&prompt).await
}

/// Client for `POST {url}` in the OpenAI chat-completions format.
pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    config: GenerationConfig,
    api_key: String,
}

impl OpenAiCompatGenerator {
    /// Reads the API key from the environment variable named by
    /// `generation.api_key_env`.
    pub fn from_env(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

fn parse_chat_response(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).context("Invalid chat completion response")?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Chat completion response has no content"))
}

#[async_trait]
impl AnswerGenerator for OpenAiCompatGenerator {
    /// Retries 429, 5xx and network errors with exponential backoff
    /// (1s, 2s, 4s, ... capped at 32s). Other 4xx fail immediately.
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.config.url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();

                    if status.is_success() {
                        return parse_chat_response(&text);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, attempt, "chat completion failed, retrying");
                        last_err = Some(anyhow::anyhow!("LLM API error {}: {}", status, text));
                        continue;
                    }

                    bail!("LLM API error {}: {}", status, text);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "chat completion request failed, retrying");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("LLM request failed after retries")))
    }
}
