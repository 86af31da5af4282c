//! Main orchestrator
//!
//! CACHE → CONTEXT → FAN-OUT → SYNTHESIZE → COMMIT
//!
//! A cache hit returns immediately and leaves conversation memory alone.
//! Conversation writes, cache writes and long-term storage are all
//! best-effort: their failures are logged and never reach the caller.

use crate::cache::{derive_cache_key, CacheManager, ANALYSIS_NAMESPACE};
use crate::execution::FanOutExecutor;
use crate::memory::{enrich_query, ConversationStore, ConversationTurn};
use crate::models::{Analysis, AnalysisRequest};
use crate::state::AnalysisStore;
use crate::synthesis::Synthesizer;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Orchestrator {
    executor: FanOutExecutor,
    cache: CacheManager,
    conversations: Arc<ConversationStore>,
    store: Arc<dyn AnalysisStore>,
}

impl Orchestrator {
    /// `cache` is the root cache; analyses are kept under its `analysis:` namespace
    pub fn new(
        executor: FanOutExecutor,
        cache: CacheManager,
        conversations: Arc<ConversationStore>,
        store: Arc<dyn AnalysisStore>,
    ) -> Self {
        Self {
            executor,
            cache: cache.namespaced(ANALYSIS_NAMESPACE),
            conversations,
            store,
        }
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis> {
        request.validate()?;

        let started = Instant::now();
        let cache_key =
            derive_cache_key(&request.query, &request.asset_symbol, request.timeframe);

        info!(
            asset = %request.asset_symbol,
            timeframe = %request.timeframe,
            cache_key = %cache_key,
            "Starting analysis"
        );

        // === CACHE ===
        if let Some(cached) = self.cached_analysis(&cache_key).await {
            info!(cache_key = %cache_key, id = %cached.id, "Returning cached analysis");
            return Ok(cached);
        }

        // === CONTEXT ===
        let injection = self.context_injection(request).await;
        let enriched_query = enrich_query(&request.query, &injection);

        // === FAN-OUT ===
        let sections = self
            .executor
            .run_all(&enriched_query, &request.context())
            .await;

        // === SYNTHESIZE ===
        let synthesis = Synthesizer::synthesize(sections);
        let analysis = Analysis::new(
            request.query.clone(),
            request.asset_symbol.clone(),
            request.timeframe,
            synthesis,
        );

        info!(
            id = %analysis.id,
            outlook = %analysis.outlook(),
            action = %analysis.trading_action(),
            confidence = analysis.overall_confidence,
            failed_specialists = analysis.specialists().failed_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        // === COMMIT ===
        self.commit(request, &cache_key, &analysis).await;
        self.persist(&analysis);

        Ok(analysis)
    }

    async fn cached_analysis(&self, cache_key: &str) -> Option<Analysis> {
        match self.cache.get(cache_key).await {
            Ok(Some(value)) => match value.into_typed::<Analysis>() {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    warn!(cache_key, error = %e, "Cached value is not an analysis, ignoring");
                    None
                }
            },
            Ok(None) => {
                debug!(cache_key, "Cache miss");
                None
            }
            Err(e) => {
                warn!(cache_key, error = %e, "Cache unavailable, treating as miss");
                None
            }
        }
    }

    async fn context_injection(&self, request: &AnalysisRequest) -> String {
        let Some((session_id, conversation_id)) = request.conversation_key() else {
            return String::new();
        };

        let lookup = async {
            self.conversations
                .get_or_create(session_id, conversation_id, &request.asset_symbol)
                .await?;
            self.conversations
                .context_injection(session_id, conversation_id)
                .await
        };

        match lookup.await {
            Ok(injection) => {
                debug!(
                    session_id,
                    conversation_id,
                    chars = injection.len(),
                    "Conversation context resolved"
                );
                injection
            }
            Err(e) => {
                warn!(session_id, conversation_id, error = %e, "Conversation context unavailable");
                String::new()
            }
        }
    }

    /// Conversation turn and cache entry, written by a detached task so a
    /// caller dropping this future does not retract them
    async fn commit(&self, request: &AnalysisRequest, cache_key: &str, analysis: &Analysis) {
        let conversations = Arc::clone(&self.conversations);
        let cache = self.cache.clone();
        let cache_key = cache_key.to_string();
        let analysis = analysis.clone();
        let conversation = request
            .conversation_key()
            .map(|(s, c)| (s.to_string(), c.to_string()));
        let turn = ConversationTurn {
            query: request.query.clone(),
            asset_symbol: request.asset_symbol.clone(),
            response: analysis.synthesis.final_response.clone(),
            outlook: analysis.outlook(),
            confidence: analysis.synthesis.confidence,
            action: analysis.trading_action(),
        };

        let writes = tokio::spawn(async move {
            if let Some((session_id, conversation_id)) = conversation {
                if let Err(e) = conversations
                    .record_turn(&session_id, &conversation_id, &turn)
                    .await
                {
                    warn!(
                        session_id = %session_id,
                        conversation_id = %conversation_id,
                        error = %e,
                        "Failed to update conversation memory"
                    );
                }
            }

            if let Err(e) = cache.set_structured(&cache_key, &analysis, None).await {
                warn!(cache_key = %cache_key, error = %e, "Failed to cache analysis");
            }
        });

        if let Err(e) = writes.await {
            warn!(error = %e, "Commit task did not complete");
        }
    }

    /// Fire-and-forget hand-off to long-term storage
    fn persist(&self, analysis: &Analysis) {
        let store = Arc::clone(&self.store);
        let analysis = analysis.clone();

        tokio::spawn(async move {
            if let Err(e) = store.store_analysis(&analysis).await {
                warn!(id = %analysis.id, error = %e, "Failed to store analysis");
            }
        });
    }
}
