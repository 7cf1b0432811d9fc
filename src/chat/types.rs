//! Chat pipeline types: messages, retrieval hits, completions, and replies.

use serde::{Deserialize, Serialize};

use crate::limiter::AdmissionDecision;

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One semantic-search result used as prompt context and surfaced to the
/// client as a source reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document-store identifier of the indexed content.
    pub content_id: String,
    pub title: String,
    /// Content category, e.g. `"project"` or `"blog_post"`.
    pub content_type: String,
    pub description: String,
    pub url: String,
    pub tech_stack: Vec<String>,
    /// Similarity score from the vector index.
    pub score: f32,
}

/// A single model completion with its metered usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    /// Total tokens billed for the call.
    pub tokens: u64,
    /// Cost of the call in USD.
    pub cost: f64,
}

/// One incoming visitor query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub portfolio_id: String,
    pub session_id: String,
    /// Prior conversation turns; only the trailing window is used.
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// A generated (or cached) answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub context_sources: Vec<SearchHit>,
    pub tokens_used: u64,
    pub cost: f64,
    /// Whether this reply was served from the response cache.
    pub from_cache: bool,
}

/// Result of running one query through the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    /// An admission tier blocked the request; no external call was made.
    Rejected(AdmissionDecision),
    /// The query was answered, fresh or from cache.
    Reply(ChatReply),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_chat_request_history_defaults_empty() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"query":"hi","portfolio_id":"p1","session_id":"s1"}"#,
        )
        .unwrap();
        assert!(req.history.is_empty());
    }

    #[test]
    fn test_reply_serde_roundtrip() {
        let reply = ChatReply {
            response: "I built three Rust projects.".to_string(),
            context_sources: vec![SearchHit {
                content_id: "507f1f77".to_string(),
                title: "FolioChat".to_string(),
                content_type: "project".to_string(),
                description: "Chat backend".to_string(),
                url: "/projects/foliochat".to_string(),
                tech_stack: vec!["Rust".to_string()],
                score: 0.91,
            }],
            tokens_used: 420,
            cost: 0.0042,
            from_cache: false,
        };
        let json = serde_json::to_string(&reply).unwrap();
        let decoded: ChatReply = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, reply);
    }
}
