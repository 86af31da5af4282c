//! Core data models for the analysis orchestrator

use crate::error::OrchestrationError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Asset symbol used when a request does not name one
pub const DEFAULT_ASSET_SYMBOL: &str = "MARKET";
pub const DEFAULT_LANGUAGE: &str = "en";

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Short,
    Medium,
    Long,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Short => "short",
            Timeframe::Medium => "medium",
            Timeframe::Long => "long",
        }
    }

    /// Lookback window handed to specialists
    pub fn days(&self) -> u32 {
        match self {
            Timeframe::Short => 30,
            Timeframe::Medium => 90,
            Timeframe::Long => 365,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Timeframe::Short => "Short-term (days to weeks)",
            Timeframe::Medium => "Medium-term (weeks to months)",
            Timeframe::Long => "Long-term (months to years)",
        }
    }
}

impl FromStr for Timeframe {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" | "short_term" | "short-term" => Ok(Timeframe::Short),
            "medium" | "medium_term" | "medium-term" => Ok(Timeframe::Medium),
            "long" | "long_term" | "long-term" => Ok(Timeframe::Long),
            other => Err(OrchestrationError::InvalidRequest(format!(
                "Invalid timeframe: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MarketOutlook {
    ExtremelyBearish,
    Bearish,
    Neutral,
    Bullish,
    ExtremelyBullish,
}

impl MarketOutlook {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketOutlook::ExtremelyBearish => "extremely_bearish",
            MarketOutlook::Bearish => "bearish",
            MarketOutlook::Neutral => "neutral",
            MarketOutlook::Bullish => "bullish",
            MarketOutlook::ExtremelyBullish => "extremely_bullish",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TradingAction {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
    Wait,
}

impl TradingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingAction::StrongBuy => "strong_buy",
            TradingAction::Buy => "buy",
            TradingAction::Hold => "hold",
            TradingAction::Sell => "sell",
            TradingAction::StrongSell => "strong_sell",
            TradingAction::Wait => "wait",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PositionSizing {
    Small,
    Medium,
    Large,
}

impl PositionSizing {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSizing::Small => "small",
            PositionSizing::Medium => "medium",
            PositionSizing::Large => "large",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::VeryLow => "very_low",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very_high",
        }
    }

    /// Bucket a risk score in [0, 1]
    pub fn from_score(risk_score: f64) -> Self {
        if risk_score < 0.2 {
            RiskLevel::VeryLow
        } else if risk_score < 0.4 {
            RiskLevel::Low
        } else if risk_score < 0.6 {
            RiskLevel::Medium
        } else if risk_score < 0.8 {
            RiskLevel::High
        } else {
            RiskLevel::VeryHigh
        }
    }
}

/// The three independent analysis roles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SpecialistRole {
    Macro,
    Technical,
    Sentiment,
}

impl SpecialistRole {
    pub const ALL: [SpecialistRole; 3] = [
        SpecialistRole::Macro,
        SpecialistRole::Technical,
        SpecialistRole::Sentiment,
    ];

    pub fn agent_name(&self) -> &'static str {
        match self {
            SpecialistRole::Macro => "Macro Analyst",
            SpecialistRole::Technical => "Technical Analyst",
            SpecialistRole::Sentiment => "Sentiment Analyst",
        }
    }

    /// Field of the specialist's structured response that carries its stance
    pub fn signal_field(&self) -> &'static str {
        match self {
            SpecialistRole::Macro => "outlook",
            SpecialistRole::Technical => "trend",
            SpecialistRole::Sentiment => "sentiment",
        }
    }
}

macro_rules! impl_display_via_as_str {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

impl_display_via_as_str!(Timeframe, MarketOutlook, TradingAction, PositionSizing, RiskLevel);

impl fmt::Display for SpecialistRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpecialistRole::Macro => "macro",
            SpecialistRole::Technical => "technical",
            SpecialistRole::Sentiment => "sentiment",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Request =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub query: String,
    pub asset_symbol: String,
    pub timeframe: Timeframe,
    pub session_id: Option<String>,
    pub conversation_id: Option<String>,
    pub language: String,
    pub audio_output: bool,
}

impl AnalysisRequest {
    pub fn new(query: impl Into<String>, asset_symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        let asset_symbol = asset_symbol.into();
        let asset_symbol = if asset_symbol.trim().is_empty() {
            DEFAULT_ASSET_SYMBOL.to_string()
        } else {
            asset_symbol.trim().to_string()
        };

        Self {
            query: query.into(),
            asset_symbol,
            timeframe,
            session_id: None,
            conversation_id: None,
            language: DEFAULT_LANGUAGE.to_string(),
            audio_output: false,
        }
    }

    pub fn with_conversation(
        mut self,
        session_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        self.session_id = Some(session_id.into());
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_audio_output(mut self, audio_output: bool) -> Self {
        self.audio_output = audio_output;
        self
    }

    /// Session and conversation ids, only when both are present and non-empty
    pub fn conversation_key(&self) -> Option<(&str, &str)> {
        match (self.session_id.as_deref(), self.conversation_id.as_deref()) {
            (Some(s), Some(c)) if !s.trim().is_empty() && !c.trim().is_empty() => Some((s, c)),
            _ => None,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.query.trim().is_empty() {
            return Err(OrchestrationError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Context map handed to every specialist
    pub fn context(&self) -> AnalysisContext {
        AnalysisContext {
            asset_symbol: self.asset_symbol.clone(),
            language: self.language.clone(),
            session_id: self.session_id.clone(),
            conversation_id: self.conversation_id.clone(),
            audio_output: self.audio_output,
            timeframe: self.timeframe,
            days: self.timeframe.days(),
        }
    }
}

/// Typed form of the context map recognised by specialists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub asset_symbol: String,
    pub language: String,
    pub session_id: Option<String>,
    pub conversation_id: Option<String>,
    pub audio_output: bool,
    pub timeframe: Timeframe,
    pub days: u32,
}

impl AnalysisContext {
    pub fn to_map(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

//
// ================= Specialist Output =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Error,
    Timeout,
    Panic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecialistFailure {
    pub kind: FailureKind,
    pub message: String,
}

fn default_confidence() -> f64 {
    0.5
}

/// Keep confidences inside [0, 1]; non-finite values fall back to neutral
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        default_confidence()
    }
}

/// One specialist's answer for one invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecialistResult {
    pub role: SpecialistRole,
    pub agent_name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Directional label reported by the specialist (outlook/trend/sentiment)
    #[serde(default)]
    pub signal: Option<String>,
    #[serde(default)]
    pub key_factors: Vec<String>,
    #[serde(default)]
    pub bullish_factors: Vec<String>,
    #[serde(default)]
    pub bearish_factors: Vec<String>,
    #[serde(default)]
    pub critical_factors: Vec<String>,
    #[serde(default)]
    pub key_risks: Vec<String>,
    #[serde(default)]
    pub risk_mitigations: Vec<String>,
    #[serde(default)]
    pub data_sources: Vec<String>,
    #[serde(default)]
    pub raw_detail: serde_json::Value,
    #[serde(default)]
    pub error: Option<SpecialistFailure>,
}

impl SpecialistResult {
    pub fn new(role: SpecialistRole, summary: impl Into<String>, confidence: f64) -> Self {
        Self {
            role,
            agent_name: role.agent_name().to_string(),
            summary: summary.into(),
            confidence: clamp_confidence(confidence),
            signal: None,
            key_factors: Vec::new(),
            bullish_factors: Vec::new(),
            bearish_factors: Vec::new(),
            critical_factors: Vec::new(),
            key_risks: Vec::new(),
            risk_mitigations: Vec::new(),
            data_sources: Vec::new(),
            raw_detail: serde_json::Value::Null,
            error: None,
        }
    }

    /// Degenerate result for a specialist that failed, timed out or panicked
    pub fn failed(role: SpecialistRole, kind: FailureKind, message: impl Into<String>) -> Self {
        let mut result = Self::new(role, "", 0.0);
        result.error = Some(SpecialistFailure {
            kind,
            message: message.into(),
        });
        result
    }

    pub fn with_signal(mut self, signal: impl Into<String>) -> Self {
        self.signal = Some(signal.into());
        self
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Text the stance classifier should read
    pub fn stance_text(&self) -> &str {
        match self.signal.as_deref() {
            Some(signal) if !signal.trim().is_empty() => signal,
            _ => &self.summary,
        }
    }
}

/// Fixed-size record of the three specialist results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecialistResults {
    pub macro_analysis: SpecialistResult,
    pub technical_analysis: SpecialistResult,
    pub sentiment_analysis: SpecialistResult,
}

impl SpecialistResults {
    pub fn get(&self, role: SpecialistRole) -> &SpecialistResult {
        match role {
            SpecialistRole::Macro => &self.macro_analysis,
            SpecialistRole::Technical => &self.technical_analysis,
            SpecialistRole::Sentiment => &self.sentiment_analysis,
        }
    }

    /// Results in fixed macro, technical, sentiment order
    pub fn iter(&self) -> impl Iterator<Item = &SpecialistResult> {
        [
            &self.macro_analysis,
            &self.technical_analysis,
            &self.sentiment_analysis,
        ]
        .into_iter()
    }

    /// Unweighted mean of the raw confidences
    pub fn mean_confidence(&self) -> f64 {
        self.iter().map(|r| r.confidence).sum::<f64>() / 3.0
    }

    pub fn failed_count(&self) -> usize {
        self.iter().filter(|r| r.is_failed()).count()
    }
}

//
// ================= Synthesis =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesisResult {
    pub outlook: MarketOutlook,
    pub trading_action: TradingAction,
    pub position_sizing: PositionSizing,
    pub confidence: f64,
    pub executive_summary: String,
    pub investment_thesis: String,
    pub time_horizon: Timeframe,
    pub entry_points: Vec<f64>,
    pub stop_loss: Option<f64>,
    pub key_factors: Vec<String>,
    pub bullish_factors: Vec<String>,
    pub bearish_factors: Vec<String>,
    pub critical_factors: Vec<String>,
    pub key_risks: Vec<String>,
    pub risk_mitigations: Vec<String>,
    pub macro_summary: String,
    pub technical_summary: String,
    pub sentiment_summary: String,
    pub final_response: String,
    pub sections: SpecialistResults,
}

//
// ================= Analysis =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analysis {
    pub id: String,
    pub query: String,
    pub asset_symbol: String,
    pub timeframe: Timeframe,
    /// Mean of the raw specialist confidences (failed specialists count as 0)
    pub overall_confidence: f64,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub synthesis: SynthesisResult,
    pub created_at: DateTime<Utc>,
}

impl Analysis {
    pub fn new(
        query: impl Into<String>,
        asset_symbol: impl Into<String>,
        timeframe: Timeframe,
        synthesis: SynthesisResult,
    ) -> Self {
        let query = query.into();
        let asset_symbol = asset_symbol.into();
        let created_at = Utc::now();

        let overall_confidence = clamp_confidence(synthesis.sections.mean_confidence());
        let risk_score = 1.0 - overall_confidence;

        Self {
            id: analysis_id(&query, &asset_symbol, &created_at),
            query,
            asset_symbol,
            timeframe,
            overall_confidence,
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            synthesis,
            created_at,
        }
    }

    pub fn specialists(&self) -> &SpecialistResults {
        &self.synthesis.sections
    }

    pub fn outlook(&self) -> MarketOutlook {
        self.synthesis.outlook
    }

    pub fn trading_action(&self) -> TradingAction {
        self.synthesis.trading_action
    }
}

/// Content-derived identifier: sha256(query:asset:created_at), first 16 hex chars
pub fn analysis_id(query: &str, asset_symbol: &str, created_at: &DateTime<Utc>) -> String {
    let id_string = format!(
        "{}:{}:{}",
        query,
        asset_symbol,
        created_at.to_rfc3339_opts(SecondsFormat::Micros, true)
    );
    let digest = hex::encode(Sha256::digest(id_string.as_bytes()));
    digest[..16].to_string()
}
