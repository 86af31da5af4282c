//! Specialist contract and registry types
//!
//! A specialist turns (query, context) into exactly one [`SpecialistResult`].
//! How it reasons is its own business; the executor only relies on this
//! trait.

pub mod llm;
pub mod parse;

pub use llm::LlmSpecialist;

use crate::models::{AnalysisContext, SpecialistResult, SpecialistRole};
use crate::Result;

/// One independent analysis role
#[async_trait::async_trait]
pub trait Specialist: Send + Sync {
    fn role(&self) -> SpecialistRole;

    fn name(&self) -> &'static str {
        self.role().agent_name()
    }

    async fn analyze(&self, query: &str, context: &AnalysisContext) -> Result<SpecialistResult>;
}

/// Text-generation capability used by LLM-backed specialists
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn execute(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Specialist that always answers with the same result
///
/// Used by the offline demo binary and by tests.
#[derive(Debug, Clone)]
pub struct StaticSpecialist {
    result: SpecialistResult,
}

impl StaticSpecialist {
    pub fn new(result: SpecialistResult) -> Self {
        Self { result }
    }

    pub fn with_summary(role: SpecialistRole, summary: impl Into<String>, confidence: f64) -> Self {
        Self::new(SpecialistResult::new(role, summary, confidence))
    }
}

#[async_trait::async_trait]
impl Specialist for StaticSpecialist {
    fn role(&self) -> SpecialistRole {
        self.result.role
    }

    async fn analyze(&self, _query: &str, _context: &AnalysisContext) -> Result<SpecialistResult> {
        Ok(self.result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisRequest, Timeframe};

    #[tokio::test]
    async fn test_static_specialist_echoes_result() {
        let specialist = StaticSpecialist::with_summary(SpecialistRole::Sentiment, "bullish crowd", 0.6);
        let context = AnalysisRequest::new("q", "BTC", Timeframe::Short).context();

        let result = specialist.analyze("anything", &context).await.unwrap();
        assert_eq!(result.summary, "bullish crowd");
        assert_eq!(specialist.name(), "Sentiment Analyst");
        assert_eq!(specialist.role(), SpecialistRole::Sentiment);
    }
}
