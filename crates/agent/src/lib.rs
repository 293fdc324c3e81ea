//! Board Agent runtime - refresh and question answering over board snapshots
//!
//! This crate wires the deterministic analysis pipeline from `boardsight-core`
//! to its collaborators:
//! - a `BoardSource` that fetches raw board records (live, cache or demo)
//! - a `SnapshotStore` holding the current snapshot behind an atomically
//!   swapped `Arc`
//! - an optional `NarrativeGenerator` that rephrases executive summaries
//!
//! # Flow
//!
//! 1. **Refresh** (`runtime`) - fetch each board, normalize and audit it, and
//!    swap in a new snapshot. Failed boards fall back to the previous snapshot,
//!    the raw cache, or an unavailable marker.
//! 2. **Ask** (`runtime`) - classify the question, compute metrics for the
//!    boards it needs, compose the structured response.
//! 3. **Narrate** (`narrative`) - optionally rephrase the summary under a
//!    timeout, guarded by `guardrails`.
//!
//! # Safety Principle
//!
//! The LLM is strictly a copy editor. It NEVER produces metrics, insights or
//! recommendations; any summary that introduces a number the templated
//! summary does not contain is discarded.

pub mod guardrails;
pub mod llm;
pub mod narrative;
pub mod runtime;
pub mod sources;
pub mod store;

pub use guardrails::{GuardrailDecision, GuardrailPolicy};
pub use llm::{HttpLlmClient, LlmClient};
pub use narrative::{LlmNarrator, NarrativeError, NarrativeGenerator, NoopNarrator};
pub use runtime::{BoardAgent, RefreshSummary, DEFAULT_FETCH_TIMEOUT, DEFAULT_NARRATIVE_TIMEOUT};
pub use sources::CachedSource;
pub use store::SnapshotStore;
