//! Stance Classifier
//!
//! Maps a specialist's directional label (or, failing that, its summary)
//! onto one of three stances using fixed keyword families:
//! - Bullish: "bull", "positive", "up", "higher", "rally"
//! - Bearish: "bear", "negative", "down", "lower", "sell"
//!
//! Matching is a lowercase substring scan and bullish words are checked
//! first, so "bullish despite the selloff" is bullish.

use crate::models::{MarketOutlook, SpecialistResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stance {
    Bullish,
    Bearish,
    Neutral,
}

impl Stance {
    pub fn as_outlook(&self) -> MarketOutlook {
        match self {
            Stance::Bullish => MarketOutlook::Bullish,
            Stance::Bearish => MarketOutlook::Bearish,
            Stance::Neutral => MarketOutlook::Neutral,
        }
    }
}

/// Static keyword lists, zero allocation
const BULLISH_KEYWORDS: &[&str] = &["bull", "positive", "up", "higher", "rally"];

const BEARISH_KEYWORDS: &[&str] = &["bear", "negative", "down", "lower", "sell"];

/// Keyword stance classifier
pub struct StanceClassifier;

impl StanceClassifier {
    /// Classify free text; empty or unmatched text is neutral
    pub fn classify_text(text: &str) -> Stance {
        if text.trim().is_empty() {
            return Stance::Neutral;
        }

        let text = text.to_lowercase();

        if BULLISH_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            Stance::Bullish
        } else if BEARISH_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            Stance::Bearish
        } else {
            Stance::Neutral
        }
    }

    /// Classify a specialist result from its signal field, else its summary
    pub fn classify(result: &SpecialistResult) -> Stance {
        Self::classify_text(result.stance_text())
    }

    /// Majority vote; ties (including all neutral) resolve to neutral
    pub fn vote(stances: &[Stance]) -> Stance {
        let bullish = stances.iter().filter(|s| **s == Stance::Bullish).count();
        let bearish = stances.iter().filter(|s| **s == Stance::Bearish).count();

        if bullish > bearish {
            Stance::Bullish
        } else if bearish > bullish {
            Stance::Bearish
        } else {
            Stance::Neutral
        }
    }
}
