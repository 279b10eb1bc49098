//! # Priority Scoring
//!
//! Combines keyword signals, sentiment, customer tier and category into a priority
//! on the 1..=5 scale. The score is a running integer total starting from the
//! configured base, then clamped. Every contributing rule is recorded as a
//! [`PriorityFactor`] with a stable tag, in a fixed order:
//!
//! | tag                   | default weight |
//! |-----------------------|----------------|
//! | `urgent_keyword`      | +2             |
//! | `high_impact_keyword` | +1             |
//! | `negative_sentiment`  | +1             |
//! | `angry_sentiment`     | +2             |
//! | `vip_customer`        | +2             |
//! | `premium_customer`    | +1             |
//! | `free_customer`       | -1             |
//! | `critical_category`   | +1             |
//!
//! Scoring is pure: identical inputs always give identical output.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::PriorityConfig;
use crate::signals::SignalSet;
use crate::ticket::{Category, CustomerTier, PriorityLevel, PriorityScore, SentimentLabel};

/// Stable identifiers of the scoring rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorTag {
    UrgentKeyword,
    HighImpactKeyword,
    NegativeSentiment,
    AngrySentiment,
    VipCustomer,
    PremiumCustomer,
    FreeCustomer,
    CriticalCategory,
    ManualOverride,
}

impl FactorTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactorTag::UrgentKeyword => "urgent_keyword",
            FactorTag::HighImpactKeyword => "high_impact_keyword",
            FactorTag::NegativeSentiment => "negative_sentiment",
            FactorTag::AngrySentiment => "angry_sentiment",
            FactorTag::VipCustomer => "vip_customer",
            FactorTag::PremiumCustomer => "premium_customer",
            FactorTag::FreeCustomer => "free_customer",
            FactorTag::CriticalCategory => "critical_category",
            FactorTag::ManualOverride => "manual_override",
        }
    }
}

impl fmt::Display for FactorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contribution to the running total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityFactor {
    pub tag: FactorTag,
    pub weight: i32,
    pub description: String,
}

/// How the final score was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: i32,
    pub total_adjustment: i32,
    /// Total before clamping
    pub unclamped: i32,
}

/// Result of scoring one ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityOutcome {
    pub score: PriorityScore,
    pub level: PriorityLevel,
    pub factors: Vec<PriorityFactor>,
    pub breakdown: ScoreBreakdown,
}

impl PriorityOutcome {
    /// Factor tags in application order
    pub fn factor_tags(&self) -> Vec<String> {
        self.factors.iter().map(|f| f.tag.as_str().to_string()).collect()
    }
}

/// Direction of a manual priority override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideDirection {
    Up,
    Down,
}

/// Priority scoring engine
#[derive(Debug, Clone)]
pub struct PriorityScorer {
    config: PriorityConfig,
}

impl PriorityScorer {
    pub fn new(config: PriorityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PriorityConfig {
        &self.config
    }

    /// Score a ticket from its signals, sentiment, tier and category
    pub fn score(
        &self,
        signals: &SignalSet,
        sentiment: SentimentLabel,
        tier: CustomerTier,
        category: &Category,
    ) -> PriorityOutcome {
        let weights = &self.config.weights;
        let mut factors = Vec::new();

        if signals.has_urgent_keyword {
            factors.push(PriorityFactor {
                tag: FactorTag::UrgentKeyword,
                weight: weights.urgent_keyword,
                description: format!("Urgent keywords: {}", preview(&signals.urgent_matches)),
            });
        }

        if signals.has_high_impact_keyword {
            factors.push(PriorityFactor {
                tag: FactorTag::HighImpactKeyword,
                weight: weights.high_impact_keyword,
                description: format!("High impact keywords: {}", preview(&signals.high_impact_matches)),
            });
        }

        match sentiment {
            SentimentLabel::Negative => factors.push(PriorityFactor {
                tag: FactorTag::NegativeSentiment,
                weight: weights.negative_sentiment,
                description: "Customer sentiment is negative".to_string(),
            }),
            SentimentLabel::Angry => factors.push(PriorityFactor {
                tag: FactorTag::AngrySentiment,
                weight: weights.angry_sentiment,
                description: "Customer sentiment is angry".to_string(),
            }),
            SentimentLabel::Positive | SentimentLabel::Neutral => {}
        }

        let tier_factor = match tier {
            CustomerTier::Vip => Some((FactorTag::VipCustomer, weights.vip_customer)),
            CustomerTier::Premium => Some((FactorTag::PremiumCustomer, weights.premium_customer)),
            CustomerTier::Free => Some((FactorTag::FreeCustomer, weights.free_customer)),
            CustomerTier::Standard => None,
        };
        if let Some((tag, weight)) = tier_factor {
            factors.push(PriorityFactor {
                tag,
                weight,
                description: format!("Customer tier: {}", tier),
            });
        }

        if self.config.is_critical(category) {
            factors.push(PriorityFactor {
                tag: FactorTag::CriticalCategory,
                weight: weights.critical_category,
                description: format!("Critical category: {}", category),
            });
        }

        // A factor weighted zero contributed nothing
        factors.retain(|f| f.weight != 0);

        let total_adjustment: i32 = factors.iter().map(|f| f.weight).sum();
        let unclamped = self.config.base + total_adjustment;
        let score = PriorityScore::clamped(unclamped);

        debug!(
            "Priority {} ({}) from {} factors, unclamped total {}",
            score,
            score.level(),
            factors.len(),
            unclamped
        );

        PriorityOutcome {
            score,
            level: score.level(),
            factors,
            breakdown: ScoreBreakdown {
                base: self.config.base,
                total_adjustment,
                unclamped,
            },
        }
    }

    /// Move a score one step up or down for a manual override, recording the
    /// operator's reasons on the factor.
    pub fn recalculate_with_override(
        &self,
        current: PriorityScore,
        reasons: &[String],
        direction: OverrideDirection,
    ) -> PriorityOutcome {
        let (adjustment, label) = match direction {
            OverrideDirection::Up => (1, "upward"),
            OverrideDirection::Down => (-1, "downward"),
        };
        let unclamped = current.value() as i32 + adjustment;
        let score = PriorityScore::clamped(unclamped);

        PriorityOutcome {
            score,
            level: score.level(),
            factors: vec![PriorityFactor {
                tag: FactorTag::ManualOverride,
                weight: adjustment,
                description: format!("Manual {} adjustment: {}", label, reasons.join(", ")),
            }],
            breakdown: ScoreBreakdown {
                base: current.value() as i32,
                total_adjustment: adjustment,
                unclamped,
            },
        }
    }
}

impl Default for PriorityScorer {
    fn default() -> Self {
        Self::new(PriorityConfig::default())
    }
}

fn preview(matches: &[String]) -> String {
    matches.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
}
