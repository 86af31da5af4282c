//! Conversation Memory
//!
//! In-process registry of sessions, each owning its conversations. Writes
//! to one conversation are serialized through that conversation's lock;
//! distinct conversations never contend beyond the brief registry lookup.
//! Sessions and conversations are created lazily on first reference and
//! never evicted here.

pub mod context_manager;
pub mod store;

pub use context_manager::{enrich_query, ContextConfig, ContextManager};
pub use store::{ConversationContext, ConversationMessage, ConversationSession, MessageRole};

use crate::error::OrchestrationError;
use crate::models::{MarketOutlook, TradingAction};
use crate::Result;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

type ConversationHandle = Arc<Mutex<ConversationContext>>;

struct SessionEntry {
    user_id: String,
    conversations: HashMap<String, ConversationHandle>,
}

impl SessionEntry {
    fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            conversations: HashMap::new(),
        }
    }
}

/// One completed exchange, written to memory as a unit
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub query: String,
    pub asset_symbol: String,
    pub response: String,
    pub outlook: MarketOutlook,
    pub confidence: f64,
    pub action: TradingAction,
}

pub struct ConversationStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    context_manager: ContextManager,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::with_context_manager(ContextManager::new())
    }

    pub fn with_context_manager(context_manager: ContextManager) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            context_manager,
        }
    }

    /// Register a session with an explicit user; an existing session is left untouched
    pub async fn create_session(&self, session_id: &str, user_id: &str) -> Result<()> {
        validate_id("session_id", session_id)?;

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry::new(user_id));
        Ok(())
    }

    /// Snapshot of an existing conversation, creating it (and its session) when absent
    pub async fn get_or_create(
        &self,
        session_id: &str,
        conversation_id: &str,
        asset_symbol: &str,
    ) -> Result<ConversationContext> {
        let handle = self.handle(session_id, conversation_id, asset_symbol).await?;
        let context = handle.lock().await;
        Ok(context.clone())
    }

    pub async fn append(
        &self,
        session_id: &str,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
        metadata: Map<String, Value>,
    ) -> Result<ConversationMessage> {
        let handle = self.handle(session_id, conversation_id, "").await?;
        let mut context = handle.lock().await;
        Ok(context.add_message(role, content, metadata).clone())
    }

    pub async fn update_context(
        &self,
        session_id: &str,
        conversation_id: &str,
        outlook: MarketOutlook,
        confidence: f64,
        action: TradingAction,
    ) -> Result<()> {
        let handle = self.handle(session_id, conversation_id, "").await?;
        handle.lock().await.update_context(outlook, confidence, action);
        Ok(())
    }

    /// User message, assistant message and "previous" fields under one lock
    pub async fn record_turn(
        &self,
        session_id: &str,
        conversation_id: &str,
        turn: &ConversationTurn,
    ) -> Result<()> {
        let handle = self
            .handle(session_id, conversation_id, &turn.asset_symbol)
            .await?;
        let mut context = handle.lock().await;

        context.add_message(
            MessageRole::User,
            turn.query.as_str(),
            metadata(json!({ "asset_symbol": turn.asset_symbol })),
        );
        context.add_message(
            MessageRole::Assistant,
            turn.response.as_str(),
            metadata(json!({
                "outlook": turn.outlook,
                "confidence": turn.confidence,
                "action": turn.action,
            })),
        );
        context.update_context(turn.outlook, turn.confidence, turn.action);

        debug!(
            session_id,
            conversation_id,
            messages = context.message_count(),
            "Conversation turn recorded"
        );
        Ok(())
    }

    /// Bounded injection text; empty for unknown or empty conversations
    pub async fn context_injection(&self, session_id: &str, conversation_id: &str) -> Result<String> {
        match self.existing(session_id, conversation_id).await {
            Some(handle) => {
                let context = handle.lock().await;
                Ok(self.context_manager.build_injection(&context))
            }
            None => Ok(String::new()),
        }
    }

    /// Full message history of a conversation, oldest first
    pub async fn history(&self, session_id: &str, conversation_id: &str) -> Vec<ConversationMessage> {
        match self.existing(session_id, conversation_id).await {
            Some(handle) => handle.lock().await.messages().to_vec(),
            None => Vec::new(),
        }
    }

    pub async fn session(&self, session_id: &str) -> Option<ConversationSession> {
        let (user_id, handles) = {
            let sessions = self.sessions.read().await;
            let entry = sessions.get(session_id)?;
            let handles: Vec<(String, ConversationHandle)> = entry
                .conversations
                .iter()
                .map(|(id, handle)| (id.clone(), Arc::clone(handle)))
                .collect();
            (entry.user_id.clone(), handles)
        };

        let mut conversations = HashMap::with_capacity(handles.len());
        for (id, handle) in handles {
            conversations.insert(id, handle.lock().await.clone());
        }

        Some(ConversationSession {
            session_id: session_id.to_string(),
            user_id,
            conversations,
        })
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn existing(&self, session_id: &str, conversation_id: &str) -> Option<ConversationHandle> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .and_then(|entry| entry.conversations.get(conversation_id))
            .map(Arc::clone)
    }

    async fn handle(
        &self,
        session_id: &str,
        conversation_id: &str,
        asset_symbol: &str,
    ) -> Result<ConversationHandle> {
        validate_id("session_id", session_id)?;
        validate_id("conversation_id", conversation_id)?;

        if let Some(handle) = self.existing(session_id, conversation_id).await {
            return Ok(handle);
        }

        let mut sessions = self.sessions.write().await;
        // session user defaults to the session id until create_session names one
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry::new(session_id));
        let user_id = entry.user_id.clone();

        let handle = entry
            .conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                debug!(session_id, conversation_id, asset = asset_symbol, "Conversation created");
                Arc::new(Mutex::new(ConversationContext::new(
                    conversation_id,
                    user_id,
                    asset_symbol,
                )))
            });

        Ok(Arc::clone(handle))
    }
}

fn validate_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(OrchestrationError::Conversation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn metadata(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn turn(query: &str, outlook: MarketOutlook, action: TradingAction) -> ConversationTurn {
        ConversationTurn {
            query: query.to_string(),
            asset_symbol: "BTC".to_string(),
            response: format!("Outlook: {}.", outlook),
            outlook,
            confidence: 0.7,
            action,
        }
    }

    #[tokio::test]
    async fn test_lazy_creation_and_session_snapshot() {
        let store = ConversationStore::new();
        let ctx = store.get_or_create("s1", "c1", "ETH").await.unwrap();
        assert_eq!(ctx.asset_symbol, "ETH");
        assert_eq!(ctx.user_id, "s1");

        // asset is fixed at creation
        let again = store.get_or_create("s1", "c1", "BTC").await.unwrap();
        assert_eq!(again.asset_symbol, "ETH");

        let session = store.session("s1").await.unwrap();
        assert_eq!(session.conversations.len(), 1);
        assert!(store.session("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_create_session_sets_user() {
        let store = ConversationStore::new();
        store.create_session("s1", "alice").await.unwrap();
        let ctx = store.get_or_create("s1", "c1", "BTC").await.unwrap();
        assert_eq!(ctx.user_id, "alice");
    }

    #[tokio::test]
    async fn test_append_creates_conversation_with_default_asset() {
        let store = ConversationStore::new();
        store
            .append("s1", "c1", MessageRole::User, "hello", Map::new())
            .await
            .unwrap();

        let ctx = store.get_or_create("s1", "c1", "BTC").await.unwrap();
        assert_eq!(ctx.asset_symbol, "MARKET");
        assert_eq!(ctx.message_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_ids_are_rejected() {
        let store = ConversationStore::new();
        let err = store.get_or_create("", "c1", "BTC").await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Conversation(_)));
        assert!(store.append("s1", " ", MessageRole::User, "x", Map::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_record_turn_updates_history_and_context() {
        let store = ConversationStore::new();
        store
            .record_turn("s1", "c1", &turn("Buy BTC?", MarketOutlook::Bullish, TradingAction::Buy))
            .await
            .unwrap();

        let history = store.history("s1", "c1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[0].metadata["asset_symbol"], "BTC");
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(history[1].metadata["outlook"], "bullish");
        assert_eq!(history[1].metadata["action"], "buy");

        let injection = store.context_injection("s1", "c1").await.unwrap();
        assert!(injection.starts_with("Previous analysis on BTC:"));
        assert!(injection.contains("Last outlook: bullish"));
        assert!(injection.contains("You: Buy BTC?"));
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_is_clamped_before_injection() {
        let store = ConversationStore::new();
        store.append("s", "c", MessageRole::User, "Buy BTC?", Map::new()).await.unwrap();
        store
            .update_context("s", "c", MarketOutlook::Bullish, 1.7, TradingAction::Buy)
            .await
            .unwrap();

        let injection = store.context_injection("s", "c").await.unwrap();
        assert!(injection.contains("  - Confidence: 1\n"), "{}", injection);
        assert!(!injection.contains("1.7"));
    }

    #[tokio::test]
    async fn test_unknown_conversation_has_no_injection() {
        let store = ConversationStore::new();
        assert_eq!(store.context_injection("s", "c").await.unwrap(), "");
        assert!(store.history("s", "c").await.is_empty());
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_are_serialized() {
        let store = Arc::new(ConversationStore::new());
        let n = 64;
        let mut handles = Vec::new();

        for i in 0..n {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .append("s1", "c1", MessageRole::User, &format!("message-{}", i), Map::new())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let history = store.history("s1", "c1").await;
        assert_eq!(history.len(), n);
        assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        let contents: HashSet<_> = history.iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents.len(), n);
        for i in 0..n {
            assert!(contents.contains(&format!("message-{}", i)));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_turns_never_interleave() {
        let store = Arc::new(ConversationStore::new());
        let mut handles = Vec::new();

        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let t = turn(&format!("q{}", i), MarketOutlook::Neutral, TradingAction::Hold);
                store.record_turn("s1", "c1", &t).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let history = store.history("s1", "c1").await;
        assert_eq!(history.len(), 32);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, MessageRole::User);
            assert_eq!(pair[1].role, MessageRole::Assistant);
        }
    }
}
