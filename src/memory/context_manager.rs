//! Context Injection
//!
//! Builds the bounded text summary of a conversation that gets appended
//! to a new query before dispatch. Only the most recent window of messages
//! and the three "previous" scalars are used, never the full history.

use crate::config::{DEFAULT_CONTEXT_MESSAGE_CHARS, DEFAULT_CONTEXT_WINDOW};
use crate::memory::store::ConversationContext;

/// Configuration for context injection
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Number of recent messages included
    pub recent_window: usize,
    /// Messages longer than this (in chars) are cut and suffixed with "..."
    pub max_message_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            recent_window: DEFAULT_CONTEXT_WINDOW,
            max_message_chars: DEFAULT_CONTEXT_MESSAGE_CHARS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextManager {
    config: ContextConfig,
}

impl ContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Injection text for a conversation; empty when it has no messages
    pub fn build_injection(&self, context: &ConversationContext) -> String {
        if context.is_empty() {
            return String::new();
        }

        let outlook = context
            .previous_outlook
            .map(|o| o.to_string())
            .unwrap_or_else(|| "none".to_string());
        let confidence = context
            .previous_confidence
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".to_string());
        let action = context
            .previous_action
            .map(|a| a.to_string())
            .unwrap_or_else(|| "none".to_string());

        let mut lines = vec![
            format!("Previous analysis on {}:", context.asset_symbol),
            format!("  - Last outlook: {}", outlook),
            format!("  - Confidence: {}", confidence),
            format!("  - Action: {}", action),
            "\nRecent conversation:".to_string(),
        ];

        for msg in context.recent_messages(self.config.recent_window) {
            lines.push(format!(
                "  {}: {}",
                msg.role.speaker(),
                truncate_chars(&msg.content, self.config.max_message_chars)
            ));
        }

        lines.join("\n")
    }
}

/// Cut to `max` chars, appending "..." when anything was dropped
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Query text as dispatched to specialists
pub fn enrich_query(query: &str, injection: &str) -> String {
    if injection.is_empty() {
        query.to_string()
    } else {
        format!("{}\n\n[Previous context:\n{}]", query, injection)
    }
}
