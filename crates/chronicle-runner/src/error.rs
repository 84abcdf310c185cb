//! Error types for the runner binary.
//!
//! Uses `thiserror` for typed errors covering the generation pipeline:
//! template rendering, LLM calls, and response parsing. Wiring failures at
//! startup surface through `anyhow` in `main` instead.

/// Errors that can occur inside the runner's generation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Failed to load or render a prompt template.
    #[error("template error: {0}")]
    Template(String),

    /// An LLM backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    LlmBackend(String),

    /// The LLM response could not be parsed into the expected shape.
    #[error("response parse error: {0}")]
    Parse(String),

    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
