//! Engine configuration
//!
//! Every weight and threshold the pipeline uses lives here so that scoring and
//! routing can be tuned without a redeploy. Files are TOML or JSON; any section
//! left out falls back to its default.
//!
//! ```toml
//! [priority]
//! critical_categories = ["complaint", "bug_report"]
//!
//! [routing]
//! max_alternatives = 3
//!
//! [routing.weights]
//! language_match = 0.3
//! load = 0.3
//! experience = 0.2
//! performance = 0.2
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use deskroute_infra_common::logging::LoggingSection;
use deskroute_infra_common::ErrorExt;

use crate::error::{Result, TriageError};
use crate::rules::ActionKind;
use crate::ticket::Category;

/// Top-level configuration for the triage pipeline
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub logging: LoggingSection,
    pub categories: CategoryConfig,
    pub keywords: KeywordConfig,
    pub priority: PriorityConfig,
    pub rules: RuleEngineConfig,
    pub routing: RoutingConfig,
}

impl TriageConfig {
    /// Load and validate a TOML or JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: TriageConfig = deskroute_infra_common::load_file(path)
            .with_context("config", format!("load {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: TriageConfig =
            deskroute_infra_common::load_str(contents, deskroute_infra_common::ConfigFormat::Toml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.categories.validate()?;
        self.keywords.validate()?;
        self.routing.validate()?;
        Ok(())
    }
}

/// Category extensions beyond the built-in set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    /// User-defined category names (lowercase, underscores)
    pub custom: Vec<String>,
}

impl CategoryConfig {
    pub fn is_known(&self, category: &Category) -> bool {
        match category {
            Category::Custom(name) => self.custom.iter().any(|c| c.eq_ignore_ascii_case(name)),
            _ => true,
        }
    }

    fn validate(&self) -> Result<()> {
        for name in &self.custom {
            let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_');
            if !valid {
                return Err(TriageError::InvalidConfig(format!(
                    "custom category '{}' must be lowercase letters and underscores",
                    name
                )));
            }
            if Category::from(name.as_str()).is_builtin() {
                return Err(TriageError::InvalidConfig(format!(
                    "custom category '{}' shadows a built-in category",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Keyword lists per language code
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub urgent_words: BTreeMap<String, Vec<String>>,
    pub high_impact_words: BTreeMap<String, Vec<String>>,
    /// How many high-frequency terms to report per ticket
    pub top_terms: usize,
    /// Terms shorter than this are ignored for frequency counting
    pub min_term_length: usize,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            urgent_words: default_urgent_words(),
            high_impact_words: default_high_impact_words(),
            top_terms: 5,
            min_term_length: 4,
        }
    }
}

impl KeywordConfig {
    fn validate(&self) -> Result<()> {
        for (list_name, lists) in [("urgent_words", &self.urgent_words), ("high_impact_words", &self.high_impact_words)] {
            for (language, words) in lists {
                if words.is_empty() {
                    return Err(TriageError::InvalidConfig(format!(
                        "keywords.{}.{} is empty",
                        list_name, language
                    )));
                }
                if words.iter().any(|w| w.trim().is_empty()) {
                    return Err(TriageError::InvalidConfig(format!(
                        "keywords.{}.{} contains a blank keyword",
                        list_name, language
                    )));
                }
            }
        }
        Ok(())
    }
}

fn word_map(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(lang, words)| (lang.to_string(), words.iter().map(|w| w.to_string()).collect()))
        .collect()
}

pub fn default_urgent_words() -> BTreeMap<String, Vec<String>> {
    word_map(&[
        (
            "en",
            &[
                "urgent", "asap", "immediately", "critical", "emergency", "right now",
                "can't wait", "deadline", "down", "outage",
            ],
        ),
        (
            "tr",
            &[
                "acil", "hemen", "kritik", "acilen", "ivedi", "derhal", "bekleyemez",
                "şimdi", "çöktü", "erişilemiyor",
            ],
        ),
    ])
}

pub fn default_high_impact_words() -> BTreeMap<String, Vec<String>> {
    word_map(&[
        (
            "en",
            &[
                "not working", "broken", "error", "can't access", "failed", "stuck",
                "blocked", "crash", "lost", "missing", "deleted",
            ],
        ),
        (
            "tr",
            &[
                "çalışmıyor", "bozuk", "hata", "erişemiyorum", "başarısız", "takıldı",
                "engellendi", "kayboldu", "silindi",
            ],
        ),
    ])
}

/// Priority scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    /// Starting point of the running total
    pub base: i32,
    pub weights: PriorityWeights,
    /// Categories that add the critical-category bonus and may require
    /// critical-authorized agents
    pub critical_categories: Vec<Category>,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            base: 3,
            weights: PriorityWeights::default(),
            critical_categories: vec![Category::Complaint, Category::BugReport],
        }
    }
}

impl PriorityConfig {
    pub fn is_critical(&self, category: &Category) -> bool {
        self.critical_categories.contains(category)
    }
}

/// Integer adjustments applied to the running priority total
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub urgent_keyword: i32,
    pub high_impact_keyword: i32,
    pub negative_sentiment: i32,
    pub angry_sentiment: i32,
    pub vip_customer: i32,
    pub premium_customer: i32,
    pub free_customer: i32,
    pub critical_category: i32,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            urgent_keyword: 2,
            high_impact_keyword: 1,
            negative_sentiment: 1,
            angry_sentiment: 2,
            vip_customer: 2,
            premium_customer: 1,
            free_customer: -1,
            critical_category: 1,
        }
    }
}

/// Rule engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleEngineConfig {
    /// Action kinds that stop evaluation of later rules once emitted
    pub exclusive_actions: Vec<ActionKind>,
}

impl RuleEngineConfig {
    pub fn is_exclusive(&self, kind: ActionKind) -> bool {
        self.exclusive_actions.contains(&kind)
    }
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub weights: RoutingWeights,
    /// Priority at or above which a critical-category ticket needs a
    /// critical-authorized agent
    pub critical_priority_threshold: u8,
    /// Priority at or above which experienced agents get the experience bonus
    pub experience_priority_threshold: u8,
    /// Experience level that counts as experienced
    pub experienced_level: u8,
    /// Minimum experience for any assignment
    pub min_experience: u8,
    /// Top of the satisfaction scale used for normalization
    pub max_satisfaction: f64,
    /// Number of ranked alternatives returned with a result
    pub max_alternatives: usize,
    /// Reservation attempts before giving up with no eligible agent
    pub max_reservation_attempts: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            weights: RoutingWeights::default(),
            critical_priority_threshold: 4,
            experience_priority_threshold: 4,
            experienced_level: 4,
            min_experience: 1,
            max_satisfaction: 5.0,
            max_alternatives: 3,
            max_reservation_attempts: 4,
        }
    }
}

impl RoutingConfig {
    fn validate(&self) -> Result<()> {
        self.weights.validate()?;

        for (name, value) in [
            ("critical_priority_threshold", self.critical_priority_threshold),
            ("experience_priority_threshold", self.experience_priority_threshold),
            ("experienced_level", self.experienced_level),
            ("min_experience", self.min_experience),
        ] {
            if !(1..=5).contains(&value) {
                return Err(TriageError::InvalidConfig(format!("routing.{} = {} outside 1..=5", name, value)));
            }
        }

        if !self.max_satisfaction.is_finite() || self.max_satisfaction <= 0.0 {
            return Err(TriageError::InvalidConfig("routing.max_satisfaction must be positive".to_string()));
        }
        if self.max_reservation_attempts == 0 {
            return Err(TriageError::InvalidConfig(
                "routing.max_reservation_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Weights of the scored (soft) routing preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingWeights {
    pub language_match: f64,
    pub load: f64,
    pub experience: f64,
    pub performance: f64,
}

impl Default for RoutingWeights {
    fn default() -> Self {
        Self {
            language_match: 0.3,
            load: 0.3,
            experience: 0.2,
            performance: 0.2,
        }
    }
}

impl RoutingWeights {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("language_match", self.language_match),
            ("load", self.load),
            ("experience", self.experience),
            ("performance", self.performance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(TriageError::InvalidConfig(format!(
                    "routing.weights.{} = {} must be a non-negative number",
                    name, value
                )));
            }
        }
        Ok(())
    }
}
