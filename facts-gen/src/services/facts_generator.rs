//! Facts generation
//!
//! Asks the LLM for a single fact about a track, validates the answer and
//! re-prompts when the shape is wrong.
//!
//! **Attempt loop:**
//! 1. Build `[system, user]` messages (the system prompt gains a "previous
//!    answer was malformed" note from the second attempt on)
//! 2. Call the gateway; gateway errors abort the loop immediately
//! 3. Strip one Markdown fence, parse and validate
//! 4. Valid: return the canonical JSON; invalid: wait `format-retry.backoff-ms`
//!    and try again until `format-retry.max-attempts` is spent

use super::llm_client::{ChatCompletion, LlmError};
use super::prompts;
use facts_common::config::{PromptSettings, RetrySettings};
use facts_common::models::{FactsDocument, TrackMetadata};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Template name reported with every generated document
pub const TEMPLATE_NAME: &str = "proxyapi";

const FENCE: &str = "```";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("LLM returned invalid format after {attempts} attempt(s): {reason}")]
    Format { attempts: u32, reason: String },

    #[error("Failed to serialize facts document: {0}")]
    Serialize(String),
}

/// Validated output of one generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub template_name: String,
    pub facts_json: String,
}

pub struct FactsGenerator {
    chat: Arc<dyn ChatCompletion>,
    prompt: PromptSettings,
    format_retry: RetrySettings,
}

impl FactsGenerator {
    pub fn new(chat: Arc<dyn ChatCompletion>, prompt: PromptSettings, format_retry: RetrySettings) -> Self {
        Self {
            chat,
            prompt,
            format_retry,
        }
    }

    pub async fn generate_facts(
        &self,
        metadata: &TrackMetadata,
        event_type: &str,
    ) -> Result<GenerationResult, GenerationError> {
        let max_attempts = self.format_retry.effective_attempts();
        let track_id = metadata.id.as_deref().unwrap_or("unknown");

        for attempt in 1..=max_attempts {
            info!(
                track_id = %track_id,
                event_type = %event_type,
                attempt,
                max_attempts,
                "Requesting LLM facts"
            );

            let messages = prompts::build_messages(&self.prompt, metadata, event_type, attempt);
            let response = self.chat.complete(&messages).await?;

            let cleaned = strip_markdown_fences(&response);
            debug!(track_id = %track_id, content = %cleaned, "LLM response after fence stripping");

            match FactsDocument::parse(cleaned, self.prompt.max_sources as usize) {
                Ok(document) => {
                    let facts_json = document
                        .to_canonical_json()
                        .map_err(|e| GenerationError::Serialize(e.to_string()))?;
                    return Ok(GenerationResult {
                        template_name: TEMPLATE_NAME.to_string(),
                        facts_json,
                    });
                }
                Err(err) => {
                    warn!(
                        track_id = %track_id,
                        attempt,
                        max_attempts,
                        error = %err,
                        "LLM returned invalid fact format"
                    );
                    if attempt == max_attempts {
                        return Err(GenerationError::Format {
                            attempts: max_attempts,
                            reason: err.to_string(),
                        });
                    }
                    if self.format_retry.backoff_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.format_retry.backoff_ms)).await;
                    }
                }
            }
        }

        // effective_attempts() is at least one, so the loop always returns
        Err(GenerationError::Format {
            attempts: max_attempts,
            reason: "no attempt was made".to_string(),
        })
    }
}

/// Remove one leading fence line and one trailing fence, then trim
pub fn strip_markdown_fences(text: &str) -> &str {
    let mut trimmed = text.trim();

    if trimmed.starts_with(FENCE) {
        if let Some(newline) = trimmed.find('\n') {
            trimmed = &trimmed[newline + 1..];
        }
    }
    if let Some(body) = trimmed.strip_suffix(FENCE) {
        trimmed = body;
    }

    trimmed.trim()
}
