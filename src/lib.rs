//! foliochat — the core of an AI portfolio chat backend.
//!
//! Answers visitor questions about a portfolio by combining vector-search
//! context with an LLM completion, behind two cost-control layers:
//!
//! - [`cache::ResponseCache`]: an in-memory TTL + LRU cache keyed by hashed
//!   namespace and identifier, so repeated queries never reach the model.
//! - [`limiter::CostLimiter`]: three-tier admission control (per-session
//!   sliding hour, per-portfolio day, per-portfolio month) that fails open
//!   when its persistence layer is unavailable.
//!
//! [`chat::ChatOrchestrator`] wires the two around pluggable
//! [`chat::ContextSearcher`] and [`chat::CompletionProvider`] backends.

pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
pub mod limiter;
pub mod logging;

pub use cache::{CacheStats, CachedValue, ResponseCache};
pub use chat::{ChatOrchestrator, ChatOutcome, ChatReply, ChatRequest, CompletionProvider, ContextSearcher};
pub use config::Config;
pub use error::{FolioError, Result};
pub use limiter::{AdmissionDecision, CostLimiter, LimitTier, MemoryLedger, UsageLedger};
