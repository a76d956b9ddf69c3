//! LLM-based relevance filtering.
//!
//! The [`FilterExecutor`] asks a model for a `{"match", "explanation"}`
//! decision per record, parses defensively, and persists every decision with
//! the run's statistics. The model itself sits behind [`LlmClient`]; the
//! bundled [`OpenAiClient`] speaks the chat-completions protocol.

mod decision;
mod executor;
mod llm;
mod openai;
mod prompts;

pub use decision::{Decision, error_explanation, parse_decision};
pub use executor::{DEFAULT_MAX_CONCURRENT, FilterExecutor, FilterRequest, FilterRunSummary};
pub use llm::{LlmClient, LlmError, complete_with_retry};
pub use openai::OpenAiClient;
pub use prompts::{FilterPrompt, build_filter_prompt};
