//! Chat request handling: admission, caching, context retrieval, and
//! completion, wired together by [`ChatOrchestrator`].

pub mod orchestrator;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use orchestrator::ChatOrchestrator;
pub use types::{
    ChatMessage, ChatOutcome, ChatReply, ChatRequest, Completion, Role, SearchHit,
};

/// Produces a completion from a conversation. Implemented by LLM backends.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion>;
}

/// Retrieves portfolio content relevant to a query. Implemented by vector
/// search backends.
#[async_trait]
pub trait ContextSearcher: Send + Sync {
    async fn search(&self, portfolio_id: &str, query: &str, limit: usize)
        -> Result<Vec<SearchHit>>;
}
