//! External inference collaborator for posting analysis.

mod client;

pub use client::{LlmConfig, LlmError, LlmScorer, DEFAULT_ANALYSIS_PROMPT};
