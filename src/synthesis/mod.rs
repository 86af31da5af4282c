//! Deterministic synthesis of specialist results
//!
//! No LLM is involved here: stances are classified by keyword, combined by
//! majority vote, and mapped through fixed tables. Identical inputs always
//! produce identical output.

use crate::classifier::{Stance, StanceClassifier};
use crate::models::{
    MarketOutlook, PositionSizing, SpecialistResult, SpecialistResults, SynthesisResult,
    Timeframe, TradingAction,
};
use std::collections::HashSet;

/// Word budget for each specialist excerpt in the executive summary
pub const SUMMARY_MAX_WORDS: usize = 40;

pub const LARGE_POSITION_THRESHOLD: f64 = 0.75;
pub const MEDIUM_POSITION_THRESHOLD: f64 = 0.60;

const DEFAULT_THESIS: &str = "Combined analysis from specialists.";

pub struct Synthesizer;

impl Synthesizer {
    pub fn synthesize(sections: SpecialistResults) -> SynthesisResult {
        let stances = Self::stances(&sections);

        let outlook = StanceClassifier::vote(&stances).as_outlook();
        let trading_action = action_for(outlook);

        let avg_confidence = sections.mean_confidence();
        let position_sizing = position_for(avg_confidence);

        let macro_summary = short_summary(&sections.macro_analysis.summary, SUMMARY_MAX_WORDS);
        let technical_summary =
            short_summary(&sections.technical_analysis.summary, SUMMARY_MAX_WORDS);
        let sentiment_summary =
            short_summary(&sections.sentiment_analysis.summary, SUMMARY_MAX_WORDS);

        let display_confidence = round_to(avg_confidence, 2);

        let executive_summary = format!(
            "Technical analysis summary: {}\n\
             Macro analyst summary: {}\n\
             Sentiment analyst summary: {}\n\
             Final: Outlook={}. Recommendation={} (position={}; confidence={}).",
            technical_summary,
            macro_summary,
            sentiment_summary,
            outlook,
            trading_action,
            position_sizing,
            display_confidence
        );

        let final_response = format!(
            "Outlook: {}. Action: {}. Position: {}. Confidence: {}.",
            outlook, trading_action, position_sizing, display_confidence
        );

        SynthesisResult {
            outlook,
            trading_action,
            position_sizing,
            confidence: round_to(avg_confidence, 4),
            executive_summary,
            investment_thesis: investment_thesis(&sections),
            time_horizon: Timeframe::Medium,
            entry_points: Vec::new(),
            stop_loss: None,
            key_factors: merge(&sections, |r| &r.key_factors),
            bullish_factors: merge(&sections, |r| &r.bullish_factors),
            bearish_factors: merge(&sections, |r| &r.bearish_factors),
            critical_factors: merge(&sections, |r| &r.critical_factors),
            key_risks: merge(&sections, |r| &r.key_risks),
            risk_mitigations: merge(&sections, |r| &r.risk_mitigations),
            macro_summary,
            technical_summary,
            sentiment_summary,
            final_response,
            sections,
        }
    }

    /// Stance per specialist, in macro/technical/sentiment order
    pub fn stances(sections: &SpecialistResults) -> [Stance; 3] {
        [
            StanceClassifier::classify(&sections.macro_analysis),
            StanceClassifier::classify(&sections.technical_analysis),
            StanceClassifier::classify(&sections.sentiment_analysis),
        ]
    }
}

/// Fixed outlook → action table. The deterministic path never emits
/// strong_buy, strong_sell or wait.
pub fn action_for(outlook: MarketOutlook) -> TradingAction {
    match outlook {
        MarketOutlook::Bullish | MarketOutlook::ExtremelyBullish => TradingAction::Buy,
        MarketOutlook::Bearish | MarketOutlook::ExtremelyBearish => TradingAction::Sell,
        MarketOutlook::Neutral => TradingAction::Hold,
    }
}

pub fn position_for(avg_confidence: f64) -> PositionSizing {
    if avg_confidence >= LARGE_POSITION_THRESHOLD {
        PositionSizing::Large
    } else if avg_confidence >= MEDIUM_POSITION_THRESHOLD {
        PositionSizing::Medium
    } else {
        PositionSizing::Small
    }
}

/// First sentence of `text`, capped at `max_words` words
pub fn short_summary(text: &str, max_words: usize) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let first = text.split('.').next().unwrap_or_default().trim();
    let words: Vec<&str> = first.split_whitespace().collect();

    if words.len() <= max_words {
        format!("{}.", first)
    } else {
        format!("{}...", words[..max_words].join(" "))
    }
}

/// Union of one list across specialists, first-seen order, exact-text dedup
fn merge<F>(sections: &SpecialistResults, field: F) -> Vec<String>
where
    F: Fn(&SpecialistResult) -> &Vec<String>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for result in sections.iter() {
        for item in field(result) {
            if item.trim().is_empty() {
                continue;
            }
            if seen.insert(item.as_str()) {
                merged.push(item.clone());
            }
        }
    }

    merged
}

fn investment_thesis(sections: &SpecialistResults) -> String {
    let parts: Vec<&str> = sections
        .iter()
        .filter_map(|r| {
            ["investment_thesis", "detailed_analysis"]
                .iter()
                .filter_map(|key| r.raw_detail.get(*key).and_then(|v| v.as_str()))
                .map(str::trim)
                .find(|t| !t.is_empty())
        })
        .collect();

    if parts.is_empty() {
        DEFAULT_THESIS.to_string()
    } else {
        parts.join(" \n\n ")
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FailureKind, SpecialistRole};

    fn result(role: SpecialistRole, summary: &str, confidence: f64) -> SpecialistResult {
        SpecialistResult::new(role, summary, confidence)
    }

    fn sections(
        macro_analysis: SpecialistResult,
        technical_analysis: SpecialistResult,
        sentiment_analysis: SpecialistResult,
    ) -> SpecialistResults {
        SpecialistResults {
            macro_analysis,
            technical_analysis,
            sentiment_analysis,
        }
    }

    #[test]
    fn test_bullish_majority_large_position() {
        let synthesis = Synthesizer::synthesize(sections(
            result(SpecialistRole::Macro, "Dovish central bank is positive for risk assets.", 0.8),
            result(SpecialistRole::Technical, "Breakout to higher highs.", 0.7),
            result(SpecialistRole::Sentiment, "Mixed chatter.", 0.9),
        ));

        assert_eq!(synthesis.outlook, MarketOutlook::Bullish);
        assert_eq!(synthesis.trading_action, TradingAction::Buy);
        assert_eq!(synthesis.position_sizing, PositionSizing::Large);
        assert!((synthesis.confidence - 0.8).abs() < 1e-9);
        assert!(synthesis.executive_summary.contains("Outlook=bullish"));
        assert!(synthesis.executive_summary.contains("Recommendation=buy"));
        assert!(synthesis.executive_summary.contains("confidence=0.8"));
        assert_eq!(
            synthesis.final_response,
            "Outlook: bullish. Action: buy. Position: large. Confidence: 0.8."
        );
    }

    #[test]
    fn test_bearish_majority_sells() {
        let synthesis = Synthesizer::synthesize(sections(
            result(SpecialistRole::Macro, "Rates", 0.5).with_signal("bearish"),
            result(SpecialistRole::Technical, "Chart", 0.5).with_signal("downtrend"),
            result(SpecialistRole::Sentiment, "Chatter", 0.5).with_signal("neutral"),
        ));

        assert_eq!(synthesis.outlook, MarketOutlook::Bearish);
        assert_eq!(synthesis.trading_action, TradingAction::Sell);
        assert_eq!(synthesis.position_sizing, PositionSizing::Small);
    }

    #[test]
    fn test_split_vote_holds() {
        let synthesis = Synthesizer::synthesize(sections(
            result(SpecialistRole::Macro, "bullish", 0.65).with_signal("bullish"),
            result(SpecialistRole::Technical, "bearish", 0.65).with_signal("bearish"),
            result(SpecialistRole::Sentiment, "flat", 0.65),
        ));

        assert_eq!(synthesis.outlook, MarketOutlook::Neutral);
        assert_eq!(synthesis.trading_action, TradingAction::Hold);
        assert_eq!(synthesis.position_sizing, PositionSizing::Medium);
    }

    #[test]
    fn test_position_thresholds_are_exact() {
        assert_eq!(position_for(0.75), PositionSizing::Large);
        assert_eq!(position_for(0.7499), PositionSizing::Medium);
        assert_eq!(position_for(0.60), PositionSizing::Medium);
        assert_eq!(position_for(0.5999), PositionSizing::Small);
        assert_eq!(position_for(0.0), PositionSizing::Small);
        assert_eq!(position_for(1.0), PositionSizing::Large);
    }

    #[test]
    fn test_average_confidence_stays_in_unit_interval() {
        let steps = [0.0, 0.1, 0.33, 0.5, 0.6, 0.75, 0.9, 1.0];
        for a in steps {
            for b in steps {
                for c in steps {
                    let synthesis = Synthesizer::synthesize(sections(
                        result(SpecialistRole::Macro, "", a),
                        result(SpecialistRole::Technical, "", b),
                        result(SpecialistRole::Sentiment, "", c),
                    ));
                    let avg = (a + b + c) / 3.0;
                    assert!((0.0..=1.0).contains(&synthesis.confidence));
                    assert_eq!(synthesis.position_sizing, position_for(avg));
                }
            }
        }
    }

    #[test]
    fn test_failed_specialist_still_synthesizes() {
        let synthesis = Synthesizer::synthesize(sections(
            SpecialistResult::failed(SpecialistRole::Macro, FailureKind::Error, "FRED down"),
            result(SpecialistRole::Technical, "Strong rally.", 0.95),
            result(SpecialistRole::Sentiment, "Positive news flow.", 0.95),
        ));

        assert_eq!(synthesis.outlook, MarketOutlook::Bullish);
        assert!((synthesis.confidence - 0.6333).abs() < 1e-9);
        assert_eq!(synthesis.position_sizing, PositionSizing::Medium);
        assert_eq!(synthesis.macro_summary, "");
        assert!(synthesis.sections.macro_analysis.is_failed());
    }

    #[test]
    fn test_merge_dedups_in_first_seen_order() {
        let mut m = result(SpecialistRole::Macro, "", 0.5);
        m.key_risks = vec!["inflation".into(), "regulation".into()];
        m.bullish_factors = vec!["ETF inflows".into()];
        let mut t = result(SpecialistRole::Technical, "", 0.5);
        t.key_risks = vec!["regulation".into(), "  ".into(), "liquidity".into()];
        let mut s = result(SpecialistRole::Sentiment, "", 0.5);
        s.key_risks = vec!["inflation".into(), "Inflation".into()];
        s.bullish_factors = vec!["ETF inflows".into(), "retail FOMO".into()];

        let synthesis = Synthesizer::synthesize(sections(m, t, s));

        assert_eq!(
            synthesis.key_risks,
            vec!["inflation", "regulation", "liquidity", "Inflation"]
        );
        assert_eq!(synthesis.bullish_factors, vec!["ETF inflows", "retail FOMO"]);
        assert!(synthesis.bearish_factors.is_empty());
    }

    #[test]
    fn test_short_summary_prefers_first_sentence() {
        assert_eq!(short_summary("", 40), "");
        assert_eq!(short_summary("Rates are on hold. Later cuts.", 40), "Rates are on hold.");
        assert_eq!(short_summary("No period here", 40), "No period here.");

        let long = (0..50).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let short = short_summary(&long, 40);
        assert!(short.ends_with("..."));
        assert_eq!(short.trim_end_matches("...").split_whitespace().count(), 40);
    }

    #[test]
    fn test_investment_thesis_from_raw_detail() {
        let mut m = result(SpecialistRole::Macro, "", 0.5);
        m.raw_detail = serde_json::json!({"investment_thesis": " Liquidity is returning. "});
        let mut t = result(SpecialistRole::Technical, "", 0.5);
        t.raw_detail = serde_json::json!({"detailed_analysis": "Higher lows since March."});
        let s = result(SpecialistRole::Sentiment, "", 0.5);

        let synthesis = Synthesizer::synthesize(sections(m, t, s));
        assert_eq!(
            synthesis.investment_thesis,
            "Liquidity is returning. \n\n Higher lows since March."
        );

        let empty = Synthesizer::synthesize(sections(
            result(SpecialistRole::Macro, "", 0.5),
            result(SpecialistRole::Technical, "", 0.5),
            result(SpecialistRole::Sentiment, "", 0.5),
        ));
        assert_eq!(empty.investment_thesis, DEFAULT_THESIS);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let build = || {
            let mut m = result(SpecialistRole::Macro, "Tightening cycle is negative.", 0.42);
            m.key_factors = vec!["CPI".into(), "payrolls".into()];
            let t = result(SpecialistRole::Technical, "Range bound", 0.61).with_signal("sideways");
            let mut s = result(SpecialistRole::Sentiment, "Fear dominates, sell-side cautious.", 0.55);
            s.key_factors = vec!["payrolls".into(), "fear index".into()];
            sections(m, t, s)
        };

        let first = Synthesizer::synthesize(build());
        for _ in 0..10 {
            assert_eq!(Synthesizer::synthesize(build()), first);
        }
        assert_eq!(first.key_factors, vec!["CPI", "payrolls", "fear index"]);
    }
}
