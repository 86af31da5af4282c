//! Conversation records
//!
//! Messages, per-conversation context, and session snapshots

use crate::models::{clamp_confidence, MarketOutlook, TradingAction, DEFAULT_ASSET_SYMBOL};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    /// Speaker label used in context injection
    pub fn speaker(&self) -> &'static str {
        match self {
            MessageRole::User => "You",
            MessageRole::Assistant | MessageRole::System => "Assistant",
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
        }
    }
}

/// One conversation about (usually) one asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub user_id: String,
    pub asset_symbol: String,
    messages: Vec<ConversationMessage>,
    pub previous_outlook: Option<MarketOutlook>,
    pub previous_confidence: Option<f64>,
    pub previous_action: Option<TradingAction>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
        asset_symbol: impl Into<String>,
    ) -> Self {
        let asset_symbol = asset_symbol.into();
        let asset_symbol = if asset_symbol.trim().is_empty() {
            DEFAULT_ASSET_SYMBOL.to_string()
        } else {
            asset_symbol
        };
        let now = Utc::now();

        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            asset_symbol,
            messages: Vec::new(),
            previous_outlook: None,
            previous_confidence: None,
            previous_action: None,
            created_at: now,
            last_updated: now,
        }
    }

    /// Append keeping timestamps strictly increasing
    pub fn push(&mut self, mut message: ConversationMessage) {
        if let Some(last) = self.messages.last() {
            if message.timestamp <= last.timestamp {
                message.timestamp = last.timestamp + Duration::microseconds(1);
            }
        }
        self.last_updated = message.timestamp;
        self.messages.push(message);
    }

    pub fn add_message(
        &mut self,
        role: MessageRole,
        content: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> &ConversationMessage {
        self.push(ConversationMessage::new(role, content, metadata));
        &self.messages[self.messages.len() - 1]
    }

    /// Record the latest recommendation; confidence is clamped to [0, 1]
    pub fn update_context(&mut self, outlook: MarketOutlook, confidence: f64, action: TradingAction) {
        self.previous_outlook = Some(outlook);
        self.previous_confidence = Some(clamp_confidence(confidence));
        self.previous_action = Some(action);

        let now = Utc::now();
        self.last_updated = match self.messages.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Up to `count` most recent messages, oldest first
    pub fn recent_messages(&self, count: usize) -> &[ConversationMessage] {
        let start = self.messages.len().saturating_sub(count);
        &self.messages[start..]
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Point-in-time copy of a session and all its conversations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub user_id: String,
    pub conversations: HashMap<String, ConversationContext>,
}
