//! Templated specialists backed by a text generator

use crate::models::{AnalysisContext, SpecialistResult, SpecialistRole};
use crate::specialists::parse::parse_response;
use crate::specialists::{Specialist, TextGenerator};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info};

const MACRO_PROMPT: &str = r#"You are a professional macroeconomic analyst with expertise in:
- Central bank monetary policy (Fed, ECB, BoE, etc.)
- Inflation trends and indicators (CPI, PCE, PPI)
- Employment data and labor markets
- GDP growth and economic cycles
- Interest rate impacts on currencies and assets

Analyze how macroeconomic conditions affect the asset in question.

Respond in JSON format with:
{
    "summary": "Brief executive summary",
    "outlook": "bearish/neutral/bullish",
    "monetary_policy_stance": "hawkish/dovish/neutral",
    "inflation_outlook": "rising/falling/stable",
    "key_factors": ["factor1", "factor2"],
    "bullish_factors": ["..."],
    "bearish_factors": ["..."],
    "key_risks": ["risk1", "risk2"],
    "investment_thesis": "One paragraph",
    "confidence": 0.0-1.0
}"#;

const TECHNICAL_PROMPT: &str = r#"You are a senior technical analyst. You read price action,
trend structure, momentum oscillators (RSI, MACD), moving averages, volume,
and support/resistance levels.

Respond in JSON format with:
{
    "summary": "Brief technical summary",
    "trend": "bearish/neutral/bullish",
    "support_levels": [number],
    "resistance_levels": [number],
    "key_factors": ["factor1", "factor2"],
    "critical_factors": ["..."],
    "key_risks": ["risk1", "risk2"],
    "risk_mitigations": ["..."],
    "investment_thesis": "One paragraph",
    "confidence": 0.0-1.0
}"#;

const SENTIMENT_PROMPT: &str = r#"You are an expert sentiment analyst specializing in:
- News sentiment analysis
- Market narratives and themes
- Fear & Greed indicators
- Social media sentiment trends
- Contrarian indicators

Respond in JSON format with:
{
    "summary": "Brief sentiment summary",
    "sentiment": "extremely_bearish/bearish/neutral/bullish/extremely_bullish",
    "sentiment_score": 0-100,
    "dominant_narratives": {"bullish": ["..."], "bearish": ["..."]},
    "key_factors": ["factor1", "factor2"],
    "key_risks": ["risk1", "risk2"],
    "investment_thesis": "One paragraph",
    "confidence": 0.0-1.0
}"#;

pub fn system_prompt(role: SpecialistRole) -> &'static str {
    match role {
        SpecialistRole::Macro => MACRO_PROMPT,
        SpecialistRole::Technical => TECHNICAL_PROMPT,
        SpecialistRole::Sentiment => SENTIMENT_PROMPT,
    }
}

pub struct LlmSpecialist {
    role: SpecialistRole,
    generator: Arc<dyn TextGenerator>,
}

impl LlmSpecialist {
    pub fn new(role: SpecialistRole, generator: Arc<dyn TextGenerator>) -> Self {
        Self { role, generator }
    }

    /// One specialist per role sharing the same generator
    pub fn all(generator: Arc<dyn TextGenerator>) -> [LlmSpecialist; 3] {
        SpecialistRole::ALL.map(|role| LlmSpecialist::new(role, Arc::clone(&generator)))
    }

    fn user_prompt(&self, query: &str, context: &AnalysisContext) -> String {
        format!(
            "Asset: {}\nHorizon: {} ({} days of history)\nAnswer language: {}\n\nQuestion: {}\n\nProvide your {} analysis.",
            context.asset_symbol,
            context.timeframe.description(),
            context.days,
            context.language,
            query,
            self.role,
        )
    }
}

#[async_trait::async_trait]
impl Specialist for LlmSpecialist {
    fn role(&self) -> SpecialistRole {
        self.role
    }

    async fn analyze(&self, query: &str, context: &AnalysisContext) -> Result<SpecialistResult> {
        info!(role = %self.role, asset = %context.asset_symbol, "Specialist analyzing");

        let response = self
            .generator
            .execute(system_prompt(self.role), &self.user_prompt(query, context))
            .await?;

        debug!(role = %self.role, chars = response.len(), "Specialist response received");
        Ok(parse_response(self.role, &response))
    }
}
