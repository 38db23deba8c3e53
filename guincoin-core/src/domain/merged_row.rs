//! Merged import rows and match confidence tiers

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Confidence at or above which a match is accepted without review
pub const AUTO_MATCH_THRESHOLD: f64 = 0.9;

/// Confidence at or above which a match is shown for review instead of manual entry
pub const REVIEW_THRESHOLD: f64 = 0.7;

/// How the email on a merged row was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Auto,
    Manual,
    None,
}

/// One balance-file row reconciled with a candidate email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedRow {
    pub name: String,
    /// Empty until a match is found or an admin types one in
    #[serde(default)]
    pub email: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    pub match_type: MatchType,
    pub confidence: f64,
}

impl MergedRow {
    /// Row with no email candidate
    pub fn unmatched(name: impl Into<String>, amount: Decimal, market: Option<String>) -> Self {
        Self {
            name: name.into(),
            email: String::new(),
            amount,
            market,
            match_type: MatchType::None,
            confidence: 0.0,
        }
    }

    /// Row whose email came from the matcher (or the balances file itself)
    pub fn matched(
        name: impl Into<String>,
        email: impl Into<String>,
        amount: Decimal,
        market: Option<String>,
        confidence: f64,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            amount,
            market,
            match_type: MatchType::Auto,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Overwrite the email by hand.
    ///
    /// Always forces `Manual` at full confidence, whatever the matcher said.
    /// The address is not format-checked here; validation does that.
    pub fn set_email_manually(&mut self, email: &str) {
        self.email = email.trim().to_string();
        self.match_type = MatchType::Manual;
        self.confidence = 1.0;
    }

    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }

    pub fn tier(&self) -> MatchTier {
        MatchTier::classify(self.confidence, &self.email)
    }
}

/// Display/gating bucket for a merged row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    /// Accepted as-is (green)
    Auto,
    /// Plausible, needs an admin to look (yellow)
    Review,
    /// Needs an email typed in (red)
    Manual,
}

impl MatchTier {
    pub fn classify(confidence: f64, email: &str) -> Self {
        if email.trim().is_empty() {
            return Self::Manual;
        }
        if confidence >= AUTO_MATCH_THRESHOLD {
            Self::Auto
        } else if confidence >= REVIEW_THRESHOLD {
            Self::Review
        } else {
            Self::Manual
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::Review => "Review",
            Self::Manual => "Manual",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Auto => "green",
            Self::Review => "yellow",
            Self::Manual => "red",
        }
    }
}
