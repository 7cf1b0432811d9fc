//! The chat pipeline: admission check, cache lookup, context retrieval,
//! prompt assembly, completion, and usage recording.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{CachedValue, ResponseCache, NS_CHAT_RESPONSE, NS_VECTOR_SEARCH};
use crate::config::ChatConfig;
use crate::error::Result;
use crate::limiter::CostLimiter;

use super::types::{ChatMessage, ChatOutcome, ChatReply, ChatRequest, SearchHit};
use super::{CompletionProvider, ContextSearcher};

const SYSTEM_PROMPT: &str = "\
You are a helpful AI assistant for a portfolio website.

Your role:
- Help visitors learn about the portfolio owner's projects and experience
- Answer questions clearly and concisely
- Suggest relevant projects when appropriate
- Be friendly and professional

Guidelines:
- Use the provided context to answer questions accurately
- If you don't have enough information, say so honestly
- Keep responses focused and brief (2-3 sentences unless more detail requested)
- Suggest exploring specific projects when relevant

Context provided:
";

/// Runs one visitor query through the full pipeline. Holds its collaborators
/// behind `Arc` so the same cache and limiter can back several consumers.
pub struct ChatOrchestrator {
    cache: Arc<ResponseCache>,
    limiter: Arc<CostLimiter>,
    searcher: Arc<dyn ContextSearcher>,
    provider: Arc<dyn CompletionProvider>,
    config: ChatConfig,
}

impl ChatOrchestrator {
    pub fn new(
        cache: Arc<ResponseCache>,
        limiter: Arc<CostLimiter>,
        searcher: Arc<dyn ContextSearcher>,
        provider: Arc<dyn CompletionProvider>,
        config: ChatConfig,
    ) -> Self {
        Self {
            cache,
            limiter,
            searcher,
            provider,
            config,
        }
    }

    /// Handle one request end to end.
    ///
    /// Admission runs before anything else, so blocked requests touch neither
    /// the cache nor any backend. Cached replies are re-served with
    /// `from_cache` set and still count against the session and daily
    /// windows, at zero cost. Only provider failures surface as errors;
    /// context retrieval degrades to an uninformed answer.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatOutcome> {
        let decision = self
            .limiter
            .check(&request.session_id, &request.portfolio_id)
            .await;
        if !decision.allowed {
            info!(
                session_id = %request.session_id,
                tier = ?decision.tier,
                "Chat request blocked"
            );
            return Ok(ChatOutcome::Rejected(decision));
        }

        let cache_id = format!("{}:{}", request.portfolio_id, request.query);
        if let Some(CachedValue::ChatReply(mut reply)) =
            self.cache.get(NS_CHAT_RESPONSE, &cache_id)
        {
            info!(portfolio_id = %request.portfolio_id, "Serving cached chat response");
            reply.from_cache = true;
            self.limiter.record_session(&request.session_id, 0.0);
            self.limiter.record_usage(&request.portfolio_id, 0.0, 0).await;
            return Ok(ChatOutcome::Reply(reply));
        }

        let context = self.retrieve_context(&request.portfolio_id, &request.query).await;
        let messages = self.build_messages(&request, &context);

        debug!(
            portfolio_id = %request.portfolio_id,
            context_count = context.len(),
            "Requesting completion"
        );
        let completion = self.provider.complete(&messages).await?;

        self.limiter
            .record_session(&request.session_id, completion.cost);
        self.limiter
            .record_usage(&request.portfolio_id, completion.cost, completion.tokens)
            .await;

        let reply = ChatReply {
            response: completion.content,
            context_sources: context,
            tokens_used: completion.tokens,
            cost: completion.cost,
            from_cache: false,
        };
        self.cache.set(
            NS_CHAT_RESPONSE,
            &cache_id,
            CachedValue::ChatReply(reply.clone()),
        );

        info!(
            portfolio_id = %request.portfolio_id,
            tokens = reply.tokens_used,
            cost = reply.cost,
            "Chat response generated"
        );
        Ok(ChatOutcome::Reply(reply))
    }

    /// Fetch context hits for a query, memoized per portfolio and query.
    ///
    /// Search failures are logged and yield an empty context, so retrieval
    /// outages degrade answer quality instead of failing the request.
    async fn retrieve_context(&self, portfolio_id: &str, query: &str) -> Vec<SearchHit> {
        let cache_id = format!("{portfolio_id}:{query}");
        if let Some(CachedValue::SearchResults(hits)) =
            self.cache.get(NS_VECTOR_SEARCH, &cache_id)
        {
            return hits;
        }

        match self
            .searcher
            .search(portfolio_id, query, self.config.max_context_results)
            .await
        {
            Ok(hits) => {
                self.cache.set(
                    NS_VECTOR_SEARCH,
                    &cache_id,
                    CachedValue::SearchResults(hits.clone()),
                );
                hits
            }
            Err(e) => {
                warn!(portfolio_id, error = %e, "Context retrieval failed, answering without context");
                Vec::new()
            }
        }
    }

    /// Assemble the prompt: system message with numbered context, the
    /// trailing history window, then the current query.
    fn build_messages(&self, request: &ChatRequest, context: &[SearchHit]) -> Vec<ChatMessage> {
        let context_block = if context.is_empty() {
            "No relevant context found.".to_string()
        } else {
            context
                .iter()
                .enumerate()
                .map(|(i, hit)| {
                    let tech = if hit.tech_stack.is_empty() {
                        "Not specified".to_string()
                    } else {
                        hit.tech_stack.join(", ")
                    };
                    format!(
                        "{}. {} ({})\n   {}\n   Tech: {}\n   Relevance: {:.2}",
                        i + 1,
                        hit.title,
                        hit.content_type,
                        hit.description,
                        tech,
                        hit.score
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage::system(format!("{SYSTEM_PROMPT}{context_block}")));

        let skip = request.history.len().saturating_sub(self.config.history_window);
        for msg in &request.history[skip..] {
            messages.push(msg.clone());
        }

        messages.push(ChatMessage::user(request.query.clone()));
        messages
    }

    /// Starter questions shown to visitors before their first message.
    pub fn suggested_questions(&self, _portfolio_id: &str) -> Vec<String> {
        [
            "What projects have you built?",
            "Tell me about your experience with React",
            "What technologies do you work with?",
            "Show me your most recent projects",
            "What kind of work are you looking for?",
        ]
        .iter()
        .map(|q| q.to_string())
        .collect()
    }
}
