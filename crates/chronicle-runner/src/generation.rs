//! The LLM-backed implementation of the engine's generation port.
//!
//! Each port call renders a prompt, sends it to the primary backend (with
//! an optional fallback), and parses the response into the draft shape
//! the lifecycle controller expects. Failures are retried with a doubling
//! delay; after the last attempt the error propagates as
//! [`GenerationError::RetriesExhausted`] and the engine persists nothing.

use std::time::Duration;

use tracing::warn;

use chronicle_engine::context::{AnchorContext, BeatContext, SummaryContext};
use chronicle_engine::ports::{GenerationError, GenerationPort};
use chronicle_types::{AnchorDraft, BeatDraft};

use crate::error::RunnerError;
use crate::llm::LlmBackend;
use crate::parse;
use crate::prompt::{PromptEngine, RenderedPrompt};

/// How many times one generation request is attempted before giving up.
pub const MAX_ATTEMPTS: u32 = 3;

/// Delay before the second attempt; doubles for each attempt after that.
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Generation adapter over HTTP LLM backends.
pub struct LlmGeneration {
    prompts: PromptEngine,
    primary: LlmBackend,
    fallback: Option<LlmBackend>,
}

impl LlmGeneration {
    /// Create the adapter over a prompt engine and backends.
    pub const fn new(
        prompts: PromptEngine,
        primary: LlmBackend,
        fallback: Option<LlmBackend>,
    ) -> Self {
        Self {
            prompts,
            primary,
            fallback,
        }
    }

    /// One completion: primary backend first, fallback (when configured)
    /// only after the primary fails.
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, RunnerError> {
        match self.primary.complete(prompt).await {
            Ok(text) => Ok(text),
            Err(primary_err) => {
                let Some(fallback) = &self.fallback else {
                    return Err(primary_err);
                };
                warn!(
                    error = %primary_err,
                    backend = fallback.name(),
                    "primary backend failed, trying fallback"
                );
                fallback.complete(prompt).await
            }
        }
    }

    /// Run one request through the retry loop: complete, parse, and on
    /// any failure wait with a doubling delay before trying again.
    async fn with_retries<T>(
        &self,
        kind: &'static str,
        prompt: &RenderedPrompt,
        parse: impl Fn(&str) -> Result<T, RunnerError>,
    ) -> Result<T, GenerationError> {
        let mut last_error = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            match self.complete(prompt).await {
                Ok(text) => match parse(&text) {
                    Ok(value) => return Ok(value),
                    Err(e) => {
                        warn!(kind, attempt, error = %e, "generation output rejected");
                        last_error = e.to_string();
                    }
                },
                Err(e) => {
                    warn!(kind, attempt, error = %e, "generation call failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(GenerationError::RetriesExhausted {
            attempts: MAX_ATTEMPTS,
            last_error,
        })
    }
}

impl GenerationPort for LlmGeneration {
    async fn generate_anchors(
        &self,
        ctx: &AnchorContext,
    ) -> Result<Vec<AnchorDraft>, GenerationError> {
        let prompt = self
            .prompts
            .render_anchors(ctx)
            .map_err(|e| GenerationError::Backend(e.to_string()))?;
        self.with_retries("anchors", &prompt, parse::parse_anchor_response)
            .await
    }

    async fn generate_beat(&self, ctx: &BeatContext) -> Result<BeatDraft, GenerationError> {
        let prompt = self
            .prompts
            .render_beat(ctx)
            .map_err(|e| GenerationError::Backend(e.to_string()))?;
        self.with_retries("beat", &prompt, parse::parse_beat_response)
            .await
    }

    async fn summarize_arc(&self, ctx: &SummaryContext) -> Result<String, GenerationError> {
        let prompt = self
            .prompts
            .render_summary(ctx)
            .map_err(|e| GenerationError::Backend(e.to_string()))?;
        self.with_retries("summary", &prompt, parse::parse_summary_response)
            .await
    }
}

/// Delay applied before the given attempt (1-based). The first attempt
/// runs immediately; each later attempt waits twice as long as the one
/// before it.
const fn backoff_delay(attempt: u32) -> Duration {
    let doublings = attempt.saturating_sub(2);
    let factor = match 1_u32.checked_shl(doublings) {
        Some(f) => f,
        None => u32::MAX,
    };
    BASE_BACKOFF.saturating_mul(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(2), Duration::from_millis(500));
        assert_eq!(backoff_delay(3), Duration::from_millis(1000));
        assert_eq!(backoff_delay(4), Duration::from_millis(2000));
    }
}
