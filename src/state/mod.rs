//! Long-term analysis storage
//!
//! Best-effort sink for finished analyses. The orchestrator never waits on
//! it for correctness; failures are logged by the caller and dropped.

use crate::config::Settings;
use crate::error::OrchestrationError;
use crate::models::Analysis;
use crate::Result;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

#[async_trait::async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn store_analysis(&self, analysis: &Analysis) -> Result<()>;
    async fn load_analysis(&self, id: &str) -> Result<Option<Analysis>>;
}

/// In-memory store for development and tests
#[derive(Default)]
pub struct InMemoryAnalysisStore {
    analyses: RwLock<HashMap<String, Analysis>>,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.analyses.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn store_analysis(&self, analysis: &Analysis) -> Result<()> {
        self.analyses
            .write()
            .await
            .insert(analysis.id.clone(), analysis.clone());
        Ok(())
    }

    async fn load_analysis(&self, id: &str) -> Result<Option<Analysis>> {
        Ok(self.analyses.read().await.get(id).cloned())
    }
}

/// Postgres-backed store; the table is created on first use
pub struct PostgresAnalysisStore {
    pool: PgPool,
    schema_ready: OnceCell<()>,
}

impl PostgresAnalysisStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: OnceCell::new(),
        }
    }

    /// Lazily connecting pool; nothing touches the network until first use
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;
        Ok(Self::new(pool))
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS analyses (
                      id TEXT PRIMARY KEY,
                      query TEXT NOT NULL,
                      asset_symbol TEXT NOT NULL,
                      outlook TEXT NOT NULL,
                      confidence DOUBLE PRECISION NOT NULL,
                      risk_level TEXT NOT NULL,
                      trading_action TEXT NOT NULL,
                      analysis_data JSONB NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_analyses_asset_time
                    ON analyses (asset_symbol, created_at);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                OrchestrationError::Database(format!("Failed to initialize analyses schema: {}", e))
            })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl AnalysisStore for PostgresAnalysisStore {
    async fn store_analysis(&self, analysis: &Analysis) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO analyses
              (id, query, asset_symbol, outlook, confidence, risk_level, trading_action, analysis_data, created_at)
            VALUES
              ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&analysis.id)
        .bind(&analysis.query)
        .bind(&analysis.asset_symbol)
        .bind(analysis.outlook().as_str())
        .bind(analysis.overall_confidence)
        .bind(analysis.risk_level.as_str())
        .bind(analysis.trading_action().as_str())
        .bind(Json(analysis))
        .bind(analysis.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| OrchestrationError::Database(format!("Failed to store analysis: {}", e)))?;

        debug!(id = %analysis.id, "Analysis stored");
        Ok(())
    }

    async fn load_analysis(&self, id: &str) -> Result<Option<Analysis>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT analysis_data FROM analyses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| OrchestrationError::Database(format!("Failed to load analysis: {}", e)))?;

        match row {
            Some(row) => {
                let Json(analysis): Json<Analysis> = row.try_get("analysis_data")?;
                Ok(Some(analysis))
            }
            None => Ok(None),
        }
    }
}

/// Postgres when a database URL is configured and usable, in-memory otherwise
pub fn build_store(settings: &Settings) -> Arc<dyn AnalysisStore> {
    if let Some(url) = settings.database_url.as_deref() {
        match PostgresAnalysisStore::connect_lazy(url) {
            Ok(store) => {
                info!("Analysis store backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres analysis store, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Analysis store backend: in-memory");
    Arc::new(InMemoryAnalysisStore::new())
}
